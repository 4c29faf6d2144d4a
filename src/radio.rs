//! The radio capabilities the transmit cycle relies on
//!
//! [`RadioDevice`] is what [`TransmitCycle`] needs from a transceiver. The
//! DW3000 driver implements it for `DW3000<SPI, Ready>`, tests and host demos
//! implement it with simulated radios.
//!
//! [`TransmitCycle`]: crate::TransmitCycle

use core::ops::BitOr;

use crate::{
    configs::{Config, TxConfig},
    maybe_async_attr,
    wait::Completion,
};

/// A snapshot of the radio's event status register
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SysStatus(pub u64);

impl SysStatus {
    /// Clock PLL lock
    pub const CPLOCK: Self = SysStatus(1 << 1);
    /// TX frame begins
    pub const TXFRB: Self = SysStatus(1 << 4);
    /// TX preamble sent
    pub const TXPRS: Self = SysStatus(1 << 5);
    /// TX PHY header sent
    pub const TXPHS: Self = SysStatus(1 << 6);
    /// TX frame sent
    pub const TXFRS: Self = SysStatus(1 << 7);
    /// SPI ready for host access
    pub const SPIRDY: Self = SysStatus(1 << 23);
    /// RC init done
    pub const RCINIT: Self = SysStatus(1 << 24);

    /// Every TX event bit
    pub const ALL_TX: Self = SysStatus(0xF0);

    /// Returns true if every bit of `other` is set in `self`
    pub fn contains(self, other: SysStatus) -> bool {
        self.0 & other.0 == other.0
    }

    /// The raw register value
    pub fn bits(self) -> u64 {
        self.0
    }
}

impl BitOr for SysStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        SysStatus(self.0 | rhs.0)
    }
}

/// How a transmission is started
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TxMode {
    /// Start transmitting right away
    #[default]
    Immediate,
    /// Transmit, then turn the receiver on for a response
    WaitForResponse,
    /// Transmit only if no preamble is heard on the channel
    ClearChannel,
}

/// A transceiver the blink cycle can drive
#[maybe_async_attr(AFIT)]
#[allow(async_fn_in_trait)]
pub trait RadioDevice {
    /// Error reported by every operation
    type Error;

    /// Returns true once the radio is in IDLE_RC and can be configured
    async fn check_idle(&mut self) -> Result<bool, Self::Error>;

    /// Applies the PHY configuration
    async fn configure(&mut self, config: &Config) -> Result<(), Self::Error>;

    /// Applies the TX spectrum parameters
    async fn set_tx_rf_params(&mut self, config: &TxConfig) -> Result<(), Self::Error>;

    /// Copies `data` into the TX buffer at `offset`
    async fn write_tx_data(&mut self, data: &[u8], offset: u16) -> Result<(), Self::Error>;

    /// Sets the length (FCS included), buffer offset and ranging bit of the
    /// next frame
    async fn write_tx_frame_control(
        &mut self,
        len: u16,
        offset: u16,
        ranging: bool,
    ) -> Result<(), Self::Error>;

    /// Starts a transmission
    async fn start_tx(&mut self, mode: TxMode) -> Result<(), Self::Error>;

    /// Stops a transmission in progress and returns the radio to idle
    ///
    /// Once this returns, no event of the aborted frame is raised anymore.
    async fn abort_tx(&mut self) -> Result<(), Self::Error>;

    /// Reads the event status
    async fn read_status(&mut self) -> Result<SysStatus, Self::Error>;

    /// Clears the given event bits (write-1-to-clear)
    async fn clear_status(&mut self, status: SysStatus) -> Result<(), Self::Error>;
}

/// Completes once the radio reports "TX frame sent"
pub struct TxFrameSent<'r, R> {
    radio: &'r mut R,
}

impl<'r, R> TxFrameSent<'r, R> {
    /// Waits on `radio`
    pub fn new(radio: &'r mut R) -> Self {
        TxFrameSent { radio }
    }
}

#[maybe_async_attr(AFIT)]
impl<'r, R> Completion for TxFrameSent<'r, R>
where
    R: RadioDevice,
{
    type Output = SysStatus;
    type Error = R::Error;

    async fn poll(&mut self) -> nb::Result<SysStatus, R::Error> {
        let status = self.radio.read_status().await.map_err(nb::Error::Other)?;

        if status.contains(SysStatus::TXFRS) {
            Ok(status)
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

/// Completes once the radio reports IDLE_RC
pub struct IdleRc<'r, R> {
    radio: &'r mut R,
}

impl<'r, R> IdleRc<'r, R> {
    /// Waits on `radio`
    pub fn new(radio: &'r mut R) -> Self {
        IdleRc { radio }
    }
}

#[maybe_async_attr(AFIT)]
impl<'r, R> Completion for IdleRc<'r, R>
where
    R: RadioDevice,
{
    type Output = ();
    type Error = R::Error;

    async fn poll(&mut self) -> nb::Result<(), R::Error> {
        match self.radio.check_idle().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::Other(e)),
        }
    }
}
