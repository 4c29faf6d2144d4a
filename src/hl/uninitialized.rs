use log::{debug, error};

use super::awake::IdleRcPassed;
use crate::{
    hal_type, ll, maybe_async_attr,
    wait::{block_until, WaitError, WaitPolicy},
    Error, Ready, Uninitialized, DW3000,
};

/// Register identification tag every DW3000 reports in DEV_ID
pub const DW3000_RIDTAG: u16 = 0xDECA;

/// Number of status reads `init` spends waiting for IDLE_RC
pub const IDLE_RC_POLLS: u32 = 1000;

impl<SPI> DW3000<SPI, Uninitialized>
where
    SPI: hal_type::spi::SpiDevice<u8>,
{
    /// Create a new instance of `DW3000`
    ///
    /// Requires the SPI device that is connected to the DW3000.
    pub fn new(spi: SPI) -> Self {
        DW3000 {
            ll: ll::DW3000::new(spi),
            state: Uninitialized,
        }
    }

    /// Initialize the DW3000
    ///
    /// Waits for the chip to come out of reset and reach IDLE_RC, then checks
    /// that it identifies as a DW3000. Unlike the DW1000, the DW3000 needs no
    /// register tweaking before it can be configured, so this is all `init`
    /// does.
    #[maybe_async_attr]
    pub async fn init<D>(mut self, delay: &mut D) -> Result<DW3000<SPI, Ready>, Error<SPI>>
    where
        D: hal_type::delay::DelayNs,
    {
        // Time needed for DW3000 to start up (transition from INIT_RC to IDLE_RC)
        delay.delay_ms(2).await;

        let polls = match block_until(
            &mut IdleRcPassed(&mut self),
            WaitPolicy::Polls(IDLE_RC_POLLS),
        )
        .await
        {
            Ok(((), polls)) => polls,
            Err(WaitError::TimedOut) => {
                error!("DW3000 never reached IDLE_RC");
                return Err(Error::InitializationFailed);
            }
            Err(WaitError::Other(e)) => return Err(e),
        };

        let ridtag = self.ll.dev_id().read().await?.ridtag();
        if ridtag != DW3000_RIDTAG {
            error!("unexpected device id tag {:#06x}", ridtag);
            return Err(Error::InitializationFailed);
        }
        debug!("DW3000 in IDLE_RC after {} polls", polls);

        Ok(DW3000 {
            ll: self.ll,
            state: Ready,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::cycle::test::RecordingDelay;

    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    /// A status read answering `status`
    fn status_read(status: [u8; 6]) -> Vec<SpiTransaction<u8>> {
        let mut response = vec![0, 0];
        response.extend_from_slice(&status);

        vec![
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(vec![0x41, 0x10, 0, 0, 0, 0, 0, 0], response),
            SpiTransaction::transaction_end(),
        ]
    }

    /// A DEV_ID read answering `ridtag`
    fn dev_id_read(ridtag: u16) -> Vec<SpiTransaction<u8>> {
        let [lo, hi] = ridtag.to_le_bytes();

        vec![
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(
                vec![0x40, 0x00, 0, 0, 0, 0],
                vec![0, 0, 0x02, 0x03, lo, hi],
            ),
            SpiTransaction::transaction_end(),
        ]
    }

    const IDLE: [u8; 6] = [0, 0, 0x80, 0x01, 0, 0];
    const BUSY: [u8; 6] = [0, 0, 0, 0, 0, 0];

    #[tokio::test]
    async fn test_init_after_idle_rc() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut expectations = status_read(BUSY);
        expectations.extend(status_read(IDLE));
        expectations.extend(dev_id_read(DW3000_RIDTAG));

        let spi = SpiMock::new(&expectations);

        let mut delay = RecordingDelay::default();
        let dw3000 = DW3000::new(spi).init(&mut delay).await.unwrap();

        assert_eq!(delay.ms, vec![2]);
        dw3000.release().done();
    }

    #[tokio::test]
    async fn test_init_rejects_foreign_device() {
        let mut expectations = status_read(IDLE);
        expectations.extend(dev_id_read(0x1234));

        let mut spi = SpiMock::new(&expectations);

        let result = DW3000::new(spi.clone())
            .init(&mut RecordingDelay::default())
            .await;
        assert!(matches!(result, Err(Error::InitializationFailed)));

        spi.done();
    }

    #[tokio::test]
    async fn test_init_gives_up_when_never_idle() {
        let expectations: Vec<_> = (0..IDLE_RC_POLLS).flat_map(|_| status_read(BUSY)).collect();

        let mut spi = SpiMock::new(&expectations);

        let result = DW3000::new(spi.clone())
            .init(&mut RecordingDelay::default())
            .await;
        assert!(matches!(result, Err(Error::InitializationFailed)));

        spi.done();
    }
}
