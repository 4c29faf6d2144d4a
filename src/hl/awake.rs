use super::Awake;
use crate::{
    fast_command::FastCommand,
    hal_type, ll, maybe_async_attr,
    radio::SysStatus,
    wait::Completion,
    Error, DW3000,
};

impl<SPI, State> DW3000<SPI, State>
where
    SPI: hal_type::spi::SpiDevice<u8>,
    State: Awake,
{
    /// Returns the register identification tag, 0xDECA on every DW3000
    #[maybe_async_attr]
    pub async fn ridtag(&mut self) -> Result<u16, Error<SPI>> {
        Ok(self.ll.dev_id().read().await?.ridtag())
    }

    /// Returns the whole event status register
    #[maybe_async_attr]
    pub async fn sys_status(&mut self) -> Result<SysStatus, Error<SPI>> {
        Ok(SysStatus(self.ll.sys_status().read().await?.bits()))
    }

    /// Clears the given event bits
    ///
    /// The status register is write-1-to-clear, so only the bits set in
    /// `status` are affected.
    #[maybe_async_attr]
    pub async fn clear_status(&mut self, status: SysStatus) -> Result<(), Error<SPI>> {
        self.ll
            .sys_status()
            .write(|w| w.bits(status.bits()))
            .await?;

        Ok(())
    }

    /// Returns true if the DW3000 has been in init_rc
    #[maybe_async_attr]
    pub async fn init_rc_passed(&mut self) -> Result<bool, Error<SPI>> {
        Ok(self.ll.sys_status().read().await?.rcinit() == 0x1)
    }

    /// Returns true if the DW3000 has been in idle_rc
    ///
    /// Both SPIRDY and RCINIT have to be set.
    #[maybe_async_attr]
    pub async fn idle_rc_passed(&mut self) -> Result<bool, Error<SPI>> {
        let status = self.ll.sys_status().read().await?;

        Ok(status.spirdy() == 0x1 && status.rcinit() == 0x1)
    }

    /// Returns true if the DW3000 pll is lock
    #[maybe_async_attr]
    pub async fn idle_pll_passed(&mut self) -> Result<bool, Error<SPI>> {
        Ok(self.ll.sys_status().read().await?.cplock() == 0x1)
    }

    /// Provides direct access to the register-level API
    ///
    /// Be aware that by using the register-level API, you can invalidate
    /// various assumptions that the high-level API makes about the operation of
    /// the DW3000. Don't use the register-level and high-level APIs in tandem,
    /// unless you know what you're doing.
    pub fn ll(&mut self) -> &mut ll::DW3000<SPI> {
        &mut self.ll
    }

    /// Force the DW3000 into IDLE mode
    ///
    /// Any ongoing TX operation will be aborted.
    #[maybe_async_attr]
    pub async fn force_idle(&mut self) -> Result<(), Error<SPI>> {
        self.fast_cmd(FastCommand::TxRxOff).await
    }

    /// Use fast command ll in hl
    #[maybe_async_attr]
    pub async fn fast_cmd(&mut self, fc: FastCommand) -> Result<(), Error<SPI>> {
        self.ll.fast_command(fc.code()).await?;
        Ok(())
    }

    /// Release the SPI device
    pub fn release(self) -> SPI {
        self.ll.release()
    }
}

/// Completes once the DW3000 reports IDLE_RC
pub(crate) struct IdleRcPassed<'d, SPI, State>(pub(crate) &'d mut DW3000<SPI, State>);

#[maybe_async_attr(AFIT)]
impl<'d, SPI, State> Completion for IdleRcPassed<'d, SPI, State>
where
    SPI: hal_type::spi::SpiDevice<u8>,
    State: Awake,
{
    type Output = ();
    type Error = Error<SPI>;

    async fn poll(&mut self) -> nb::Result<(), Error<SPI>> {
        match self.0.idle_rc_passed().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::Other(e)),
        }
    }
}

/// Completes once the clock PLL is locked
pub(crate) struct PllLocked<'d, SPI, State>(pub(crate) &'d mut DW3000<SPI, State>);

#[maybe_async_attr(AFIT)]
impl<'d, SPI, State> Completion for PllLocked<'d, SPI, State>
where
    SPI: hal_type::spi::SpiDevice<u8>,
    State: Awake,
{
    type Output = ();
    type Error = Error<SPI>;

    async fn poll(&mut self) -> nb::Result<(), Error<SPI>> {
        match self.0.idle_pll_passed().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::Other(e)),
        }
    }
}
