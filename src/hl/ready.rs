use log::{debug, trace};

use super::awake::PllLocked;
use crate::{
    configs::{Config, TxConfig},
    fast_command::FastCommand,
    hal_type,
    ll::TX_BUFFER_LEN,
    maybe_async_attr,
    radio::{RadioDevice, SysStatus, TxMode},
    wait::{block_until, WaitError, WaitPolicy},
    Error, Ready, DW3000,
};

/// Number of status reads spent waiting for the PLL to lock
pub const PLL_LOCK_POLLS: u32 = 1000;

impl<SPI> DW3000<SPI, Ready>
where
    SPI: hal_type::spi::SpiDevice<u8>,
{
    /// Configures the radio and hands it back
    ///
    /// See [`DW3000::configure`].
    #[maybe_async_attr]
    pub async fn config(mut self, config: Config) -> Result<Self, Error<SPI>> {
        self.configure(&config).await?;

        Ok(self)
    }

    /// Applies the PHY configuration
    ///
    /// Sets the channel, preamble codes, SFD, data rate, PHR, PAC, SFD
    /// timeout, STS and PDoA modes, then retunes the RF and PLL for the
    /// channel and waits for the PLL to lock again.
    ///
    /// Fails with [`Error::InvalidConfiguration`] before touching the radio if
    /// the combination of settings is not allowed.
    #[maybe_async_attr]
    pub async fn configure(&mut self, config: &Config) -> Result<(), Error<SPI>> {
        if !config.is_valid() {
            return Err(Error::InvalidConfiguration);
        }

        self.ll
            .chan_ctrl()
            .write(|w| {
                w.rf_chan(config.channel as u8)
                    .sfd_type(config.sfd_type as u8)
                    .tx_pcode(config.tx_preamble_code)
                    .rx_pcode(config.rx_preamble_code)
            })
            .await?;

        self.ll
            .sys_cfg()
            .modify(|_, w| {
                w.phr_mode(config.phr_mode as u8)
                    .phr_6m8(config.phr_rate as u8)
                    .cp_spc(config.sts_mode as u8)
                    .pdoa_mode(config.pdoa_mode as u8)
            })
            .await?;

        self.ll
            .tx_fctrl()
            .modify(|_, w| {
                w.txbr(config.bitrate as u8)
                    .txpsr(config.preamble_length as u8)
            })
            .await?;

        self.ll.dtune0().modify(|_, w| w.pac(config.pac as u8)).await?;
        self.ll
            .rx_sfd_toc()
            .write(|w| w.value(config.sfd_timeout))
            .await?;

        self.ll
            .rf_tx_ctrl_2()
            .write(|w| w.value(config.channel.get_recommanded_rf_tx_ctrl_2()))
            .await?;
        self.ll
            .pll_cfg()
            .write(|w| w.value(config.channel.get_recommanded_pll_conf()))
            .await?;

        // Changing the PLL config drops the lock, clear the stale flag and
        // wait for it to come back
        self.ll.sys_status().write(|w| w.cplock(1)).await?;

        match block_until(&mut PllLocked(self), WaitPolicy::Polls(PLL_LOCK_POLLS)).await {
            Ok(((), polls)) => debug!("PLL locked after {} polls", polls),
            Err(WaitError::TimedOut) => return Err(Error::PllNotLocked),
            Err(WaitError::Other(e)) => return Err(e),
        }

        Ok(())
    }

    /// Applies the TX spectrum parameters: TX power and pulse generator delay
    #[maybe_async_attr]
    pub async fn configure_tx_rf(&mut self, config: &TxConfig) -> Result<(), Error<SPI>> {
        self.ll
            .tx_power()
            .write(|w| w.value(config.power))
            .await?;
        self.ll
            .rf_tx_ctrl_2()
            .modify(|_, w| w.pg_delay(config.pg_delay))
            .await?;

        Ok(())
    }

    /// Lets the chip drive the RX and TX LEDs of the evaluation boards
    ///
    /// GPIO2 and GPIO3 are switched to their LED function and LED blinking is
    /// enabled. With `init_blink`, every LED is flashed once.
    #[maybe_async_attr]
    pub async fn enable_leds<D>(&mut self, init_blink: bool, delay: &mut D) -> Result<(), Error<SPI>>
    where
        D: hal_type::delay::DelayNs,
    {
        self.ll
            .gpio_mode()
            .modify(|_, w| w.msgp2(0b1).msgp3(0b1))
            .await?;

        self.ll
            .clk_ctrl()
            .modify(|_, w| {
                w.gpio_clk_en(0b1)
                    .gpio_dclk_en(0b1)
                    .gpio_drst_n(0b1)
                    .lp_clk_en(0b1)
            })
            .await?;

        self.ll
            .led_ctrl()
            .write(|w| w.blink_en(0b1).blink_tim(0x10))
            .await?;

        if init_blink {
            self.ll
                .led_ctrl()
                .write(|w| w.blink_en(0b1).blink_tim(0x10).force_trig(0xF))
                .await?;

            delay.delay_ms(10).await;

            self.ll
                .led_ctrl()
                .write(|w| w.blink_en(0b1).blink_tim(0x10).force_trig(0x0))
                .await?;
        }

        Ok(())
    }

    /// Copies `data` into the TX buffer, starting at `offset`
    ///
    /// Only the first 127 bytes of the buffer can be written this way.
    #[maybe_async_attr]
    pub async fn write_tx_data(&mut self, data: &[u8], offset: u16) -> Result<(), Error<SPI>> {
        let required_len = offset as usize + data.len();
        if required_len > TX_BUFFER_LEN {
            return Err(Error::BufferTooSmall { required_len });
        }

        self.ll.write_tx_buffer(offset as u8, data).await?;

        Ok(())
    }

    /// Describes the next frame
    ///
    /// `len` is the length on air, checksum included, `offset` where the
    /// frame starts in the TX buffer.
    #[maybe_async_attr]
    pub async fn write_tx_frame_control(
        &mut self,
        len: u16,
        offset: u16,
        ranging: bool,
    ) -> Result<(), Error<SPI>> {
        self.ll
            .tx_fctrl()
            .modify(|_, w| w.txflen(len).txb_offset(offset).tr(ranging as u8))
            .await?;

        Ok(())
    }

    /// Starts transmitting the frame described by the frame control
    #[maybe_async_attr]
    pub async fn start_tx(&mut self, mode: TxMode) -> Result<(), Error<SPI>> {
        trace!("start tx: {:?}", mode);

        self.fast_cmd(FastCommand::from(mode)).await
    }
}

#[maybe_async_attr(AFIT)]
impl<SPI> RadioDevice for DW3000<SPI, Ready>
where
    SPI: hal_type::spi::SpiDevice<u8>,
{
    type Error = Error<SPI>;

    async fn check_idle(&mut self) -> Result<bool, Error<SPI>> {
        self.idle_rc_passed().await
    }

    async fn configure(&mut self, config: &Config) -> Result<(), Error<SPI>> {
        DW3000::configure(self, config).await
    }

    async fn set_tx_rf_params(&mut self, config: &TxConfig) -> Result<(), Error<SPI>> {
        self.configure_tx_rf(config).await
    }

    async fn write_tx_data(&mut self, data: &[u8], offset: u16) -> Result<(), Error<SPI>> {
        DW3000::write_tx_data(self, data, offset).await
    }

    async fn write_tx_frame_control(
        &mut self,
        len: u16,
        offset: u16,
        ranging: bool,
    ) -> Result<(), Error<SPI>> {
        DW3000::write_tx_frame_control(self, len, offset, ranging).await
    }

    async fn start_tx(&mut self, mode: TxMode) -> Result<(), Error<SPI>> {
        DW3000::start_tx(self, mode).await
    }

    async fn abort_tx(&mut self) -> Result<(), Error<SPI>> {
        self.force_idle().await
    }

    async fn read_status(&mut self) -> Result<SysStatus, Error<SPI>> {
        self.sys_status().await
    }

    async fn clear_status(&mut self, status: SysStatus) -> Result<(), Error<SPI>> {
        DW3000::clear_status(self, status).await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::{configs::UwbChannel, ll};

    use crate::cycle::test::RecordingDelay;

    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    fn ready(spi: SpiMock<u8>) -> DW3000<SpiMock<u8>, Ready> {
        DW3000 {
            ll: ll::DW3000::new(spi),
            state: Ready,
        }
    }

    fn read(header: [u8; 2], data: &[u8]) -> Vec<SpiTransaction<u8>> {
        let mut expected = header.to_vec();
        expected.resize(2 + data.len(), 0);
        let mut response = vec![0, 0];
        response.extend_from_slice(data);

        vec![
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(expected, response),
            SpiTransaction::transaction_end(),
        ]
    }

    fn write(bytes: &[u8]) -> Vec<SpiTransaction<u8>> {
        vec![
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(bytes.to_vec()),
            SpiTransaction::transaction_end(),
        ]
    }

    #[tokio::test]
    async fn test_configure_default() {
        let _ = env_logger::builder().is_test(true).try_init();

        let expectations = [
            // channel 5, Decawave 8 SFD, preamble code 9
            write(&[0xC2, 0x50, 0x4A, 0x09]),
            read([0x40, 0x40], &[0x88, 0x01, 0x00, 0x00]),
            write(&[0xC0, 0x40, 0x88, 0x01, 0x00, 0x00]),
            // 6.8 Mbps, 128 symbol preamble
            read([0x40, 0x90], &[0x0C, 0x00, 0x00, 0x00, 0x00, 0x00]),
            write(&[0xC0, 0x90, 0x0C, 0x54, 0x00, 0x00, 0x00, 0x00]),
            read([0x4C, 0x00], &[0x0F, 0x10]),
            write(&[0xCC, 0x00, 0x0C, 0x10]),
            write(&[0xCC, 0x08, 0x81, 0x00]),
            write(&[0xCE, 0x70, 0x34, 0x11, 0x07, 0x1C]),
            write(&[0xD2, 0x00, 0x3C, 0x1F]),
            write(&[0xC1, 0x10, 0x02, 0, 0, 0, 0, 0]),
            read([0x41, 0x10], &[0, 0, 0, 0, 0, 0]),
            read([0x41, 0x10], &[0x02, 0, 0, 0, 0, 0]),
        ]
        .concat();

        let spi = SpiMock::new(&expectations);

        let dw3000 = ready(spi).config(Config::default()).await.unwrap();

        dw3000.release().done();
    }

    #[tokio::test]
    async fn test_configure_gives_up_without_pll_lock() {
        let mut expectations = [
            write(&[0xC2, 0x50, 0x4A, 0x09]),
            read([0x40, 0x40], &[0x00, 0x00, 0x00, 0x00]),
            write(&[0xC0, 0x40, 0x00, 0x00, 0x00, 0x00]),
            read([0x40, 0x90], &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
            write(&[0xC0, 0x90, 0x00, 0x54, 0x00, 0x00, 0x00, 0x00]),
            read([0x4C, 0x00], &[0x00, 0x00]),
            write(&[0xCC, 0x00, 0x00, 0x00]),
            write(&[0xCC, 0x08, 0x81, 0x00]),
            write(&[0xCE, 0x70, 0x34, 0x11, 0x07, 0x1C]),
            write(&[0xD2, 0x00, 0x3C, 0x1F]),
            write(&[0xC1, 0x10, 0x02, 0, 0, 0, 0, 0]),
        ]
        .concat();
        for _ in 0..PLL_LOCK_POLLS {
            expectations.extend(read([0x41, 0x10], &[0, 0, 0, 0, 0, 0]));
        }

        let mut spi = SpiMock::new(&expectations);

        let mut dw3000 = ready(spi.clone());
        let result = dw3000.configure(&Config::default()).await;
        assert!(matches!(result, Err(Error::PllNotLocked)));

        spi.done();
    }

    #[tokio::test]
    async fn test_configure_channel_9() {
        let config = Config {
            channel: UwbChannel::Channel9,
            ..Default::default()
        };

        let expectations = [
            write(&[0xC2, 0x50, 0x4B, 0x09]),
            read([0x40, 0x40], &[0x00, 0x00, 0x00, 0x00]),
            write(&[0xC0, 0x40, 0x00, 0x00, 0x00, 0x00]),
            read([0x40, 0x90], &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
            write(&[0xC0, 0x90, 0x00, 0x54, 0x00, 0x00, 0x00, 0x00]),
            read([0x4C, 0x00], &[0x00, 0x00]),
            write(&[0xCC, 0x00, 0x00, 0x00]),
            write(&[0xCC, 0x08, 0x81, 0x00]),
            write(&[0xCE, 0x70, 0x34, 0x00, 0x01, 0x1C]),
            write(&[0xD2, 0x00, 0x3C, 0x0F]),
            write(&[0xC1, 0x10, 0x02, 0, 0, 0, 0, 0]),
            read([0x41, 0x10], &[0x02, 0, 0, 0, 0, 0]),
        ]
        .concat();

        let spi = SpiMock::new(&expectations);

        let mut dw3000 = ready(spi);
        dw3000.configure(&config).await.unwrap();

        dw3000.release().done();
    }

    #[tokio::test]
    async fn test_invalid_configuration_stays_off_the_bus() {
        let spi = SpiMock::new(&[]);

        let mut dw3000 = ready(spi);
        let result = dw3000
            .configure(&Config {
                rx_preamble_code: 0,
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(Error::InvalidConfiguration)));

        dw3000.release().done();
    }

    #[tokio::test]
    async fn test_configure_tx_rf() {
        let expectations = [
            write(&[0xC2, 0x30, 0xfd, 0xfd, 0xfd, 0xfd]),
            read([0x4E, 0x70], &[0x00, 0x11, 0x07, 0x1C]),
            write(&[0xCE, 0x70, 0x34, 0x11, 0x07, 0x1C]),
        ]
        .concat();

        let spi = SpiMock::new(&expectations);

        let mut dw3000 = ready(spi);
        dw3000.configure_tx_rf(&TxConfig::default()).await.unwrap();

        dw3000.release().done();
    }

    #[tokio::test]
    async fn test_enable_leds() {
        let expectations = [
            read([0x4A, 0x00], &[0, 0, 0, 0]),
            write(&[0xCA, 0x00, 0x40, 0x02, 0, 0]),
            read([0x62, 0x10], &[0, 0, 0, 0]),
            write(&[0xE2, 0x10, 0, 0, 0x8D, 0]),
            write(&[0xE2, 0x58, 0x10, 0x01, 0, 0]),
            write(&[0xE2, 0x58, 0x10, 0x01, 0x0F, 0]),
            write(&[0xE2, 0x58, 0x10, 0x01, 0, 0]),
        ]
        .concat();

        let spi = SpiMock::new(&expectations);

        let mut dw3000 = ready(spi);
        let mut delay = RecordingDelay::default();
        dw3000.enable_leds(true, &mut delay).await.unwrap();

        assert_eq!(delay.ms, vec![10]);
        dw3000.release().done();
    }

    #[tokio::test]
    async fn test_send_blink() {
        let expectations = [
            write(&[0xE8, 0x00, 0xC5, 0x07, 0x41]),
            read([0x40, 0x90], &[0x00, 0x54, 0x00, 0x00, 0x00, 0x00]),
            write(&[0xC0, 0x90, 0x05, 0x5C, 0x00, 0x00, 0x00, 0x00]),
            write(&[0x83]),
        ]
        .concat();

        let spi = SpiMock::new(&expectations);

        let mut dw3000 = ready(spi);
        RadioDevice::write_tx_data(&mut dw3000, &[0xC5, 0x07, 0x41], 0)
            .await
            .unwrap();
        RadioDevice::write_tx_frame_control(&mut dw3000, 5, 0, true)
            .await
            .unwrap();
        RadioDevice::start_tx(&mut dw3000, TxMode::Immediate)
            .await
            .unwrap();

        dw3000.release().done();
    }

    #[tokio::test]
    async fn test_abort_tx_forces_idle() {
        let spi = SpiMock::new(&write(&[0x81]));

        let mut dw3000 = ready(spi);
        RadioDevice::abort_tx(&mut dw3000).await.unwrap();

        dw3000.release().done();
    }

    #[tokio::test]
    async fn test_tx_data_past_buffer_end() {
        let spi = SpiMock::new(&[]);

        let mut dw3000 = ready(spi);
        let result = dw3000.write_tx_data(&[0; 4], 125).await;

        assert!(matches!(
            result,
            Err(Error::BufferTooSmall { required_len: 129 })
        ));

        dw3000.release().done();
    }
}
