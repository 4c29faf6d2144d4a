//! The blink transmit loop
//!
//! [`TransmitCycle`] owns the frame, the console and the radio. Every
//! [`step`] pulls console input into the frame and, if the frame is ready,
//! transmits it and waits for the radio to report it sent:
//!
//! ``` text
//!            no input, or nothing to resend
//!              +------+
//!              |      v
//!       +----------------+   frame ready   +--------------+
//!  ---> | AwaitingInput  | --------------> | Transmitting |
//!       +----------------+                 +--------------+
//!              ^     TX frame sent, marker cleared,  |
//!              +---- sequence + 1, inter-frame delay +
//! ```
//!
//! [`step`]: TransmitCycle::step

use core::{convert::Infallible, fmt};

use log::{error, info, trace, warn};

use crate::{
    configs::{Config, TxConfig},
    console::{ConsoleInput, ConsoleRefresher},
    frame::FrameBuffer,
    hal_type, maybe_async_attr,
    radio::{IdleRc, RadioDevice, SysStatus, TxFrameSent, TxMode},
    wait::{block_until, WaitError, WaitPolicy},
};

/// Where the cycle is
///
/// Between steps the cycle is `AwaitingInput`. It is only seen in
/// `Transmitting` if a step was dropped before its transmission finished.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Waiting for a ready frame
    AwaitingInput,
    /// Handing a frame to the radio and waiting for it to go out
    Transmitting,
}

/// What one [`TransmitCycle::step`] did
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// Nothing was ready, the radio was not touched
    Idle,
    /// A frame went out
    Sent {
        /// Sequence number the frame carried
        sequence: u8,
    },
}

/// What happens to a payload once it has been sent
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Retransmit {
    /// Every console input is sent once
    #[default]
    OneShot,
    /// The last console input is sent over and over, with increasing
    /// sequence numbers, until new input replaces it
    Repeat,
}

/// Tunables of the transmit cycle
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CycleConfig {
    /// Pause after every sent frame, in milliseconds
    pub inter_frame_delay_ms: u32,
    /// How transmissions are started
    pub tx_mode: TxMode,
    /// How long to wait for "TX frame sent"
    pub completion: WaitPolicy,
    /// How long to wait for the radio to become idle at start up
    pub idle_wait: WaitPolicy,
    /// Sets the ranging bit of every frame
    pub ranging: bool,
    /// What happens to a payload once it has been sent
    pub retransmit: Retransmit,
}

impl Default for CycleConfig {
    fn default() -> Self {
        CycleConfig {
            inter_frame_delay_ms: 10,
            tx_mode: TxMode::Immediate,
            completion: WaitPolicy::Forever,
            idle_wait: WaitPolicy::Polls(1000),
            ranging: false,
            retransmit: Retransmit::OneShot,
        }
    }
}

/// An error of the transmit cycle
pub enum CycleError<E> {
    /// The radio never reported IDLE_RC at start up
    NotIdle,
    /// The radio rejected its configuration
    Configuration(E),
    /// The radio failed while transmitting
    Radio(E),
    /// "TX frame sent" did not show up within the completion budget
    TransmitTimeout,
}

impl<E> fmt::Debug for CycleError<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CycleError::NotIdle => write!(f, "NotIdle"),
            CycleError::Configuration(error) => write!(f, "Configuration({:?})", error),
            CycleError::Radio(error) => write!(f, "Radio({:?})", error),
            CycleError::TransmitTimeout => write!(f, "TransmitTimeout"),
        }
    }
}

impl<E> fmt::Display for CycleError<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for CycleError<E> where E: fmt::Debug {}

#[cfg(feature = "defmt")]
impl<E> defmt::Format for CycleError<E>
where
    E: defmt::Format,
{
    fn format(&self, f: defmt::Formatter) {
        match self {
            CycleError::NotIdle => defmt::write!(f, "NotIdle"),
            CycleError::Configuration(error) => defmt::write!(f, "Configuration({:?})", error),
            CycleError::Radio(error) => defmt::write!(f, "Radio({:?})", error),
            CycleError::TransmitTimeout => defmt::write!(f, "TransmitTimeout"),
        }
    }
}

/// Brings a freshly reset radio up for transmitting
///
/// Gives the chip 2 ms to start, waits for IDLE_RC, then applies the PHY
/// and TX spectrum configuration. Failures are logged and returned; the
/// radio should not be used afterwards.
///
/// A DW3000 that went through [`DW3000::init`] has already had its start-up
/// delay and IDLE_RC wait. Bringing it up again costs the 2 ms delay and a
/// single status read.
///
/// [`DW3000::init`]: crate::DW3000::init
#[maybe_async_attr]
pub async fn bring_up<R, D>(
    radio: &mut R,
    delay: &mut D,
    config: &Config,
    tx_config: &TxConfig,
    idle_wait: WaitPolicy,
) -> Result<(), CycleError<R::Error>>
where
    R: RadioDevice,
    D: hal_type::delay::DelayNs,
{
    delay.delay_ms(2).await;

    match block_until(&mut IdleRc::new(&mut *radio), idle_wait).await {
        Ok(_) => {}
        Err(WaitError::TimedOut) => {
            error!("INIT FAILED");
            return Err(CycleError::NotIdle);
        }
        Err(WaitError::Other(e)) => {
            error!("INIT FAILED");
            return Err(CycleError::Radio(e));
        }
    }

    if let Err(e) = radio.configure(config).await {
        error!("CONFIG FAILED");
        return Err(CycleError::Configuration(e));
    }

    if let Err(e) = radio.set_tx_rf_params(tx_config).await {
        error!("CONFIG FAILED");
        return Err(CycleError::Configuration(e));
    }

    Ok(())
}

/// The blink transmitter: console in, frames out
pub struct TransmitCycle<R, C, D, const N: usize = 12> {
    radio: R,
    console: ConsoleRefresher<C>,
    delay: D,
    frame: FrameBuffer<N>,
    state: State,
    config: CycleConfig,
}

impl<R, C, D, const N: usize> TransmitCycle<R, C, D, N>
where
    R: RadioDevice,
    C: ConsoleInput,
    D: hal_type::delay::DelayNs,
{
    /// Wraps a radio that is already configured
    pub fn new(radio: R, console: C, delay: D, config: CycleConfig) -> Self {
        TransmitCycle {
            radio,
            console: ConsoleRefresher::new(console),
            delay,
            frame: FrameBuffer::new(),
            state: State::AwaitingInput,
            config,
        }
    }

    /// Brings the radio up, see [`bring_up`], and wraps it
    #[maybe_async_attr]
    pub async fn start(
        mut radio: R,
        console: C,
        mut delay: D,
        radio_config: &Config,
        tx_config: &TxConfig,
        config: CycleConfig,
    ) -> Result<Self, CycleError<R::Error>> {
        bring_up(&mut radio, &mut delay, radio_config, tx_config, config.idle_wait).await?;

        info!("Sending started");

        Ok(Self::new(radio, console, delay, config))
    }

    /// Runs one iteration of the cycle
    ///
    /// Refreshes the frame from the console and sends it if it is ready.
    /// Returns as soon as there is nothing to send. A failed transmission
    /// leaves the frame ready, so the next step tries again.
    ///
    /// If the previous step was dropped mid-transmission, the radio is
    /// stopped first.
    #[maybe_async_attr]
    pub async fn step(&mut self) -> Result<Step, CycleError<R::Error>> {
        if self.state == State::Transmitting {
            warn!("transmission of frame {} was interrupted", self.frame.sequence());
            self.abort_transmission().await?;
        }

        self.console.refresh(&mut self.frame);

        if self.config.retransmit == Retransmit::Repeat {
            self.frame.rearm();
        }

        if !self.frame.is_ready() {
            return Ok(Step::Idle);
        }

        self.state = State::Transmitting;
        let result = self.transmit().await;
        self.state = State::AwaitingInput;

        result
    }

    #[maybe_async_attr]
    async fn transmit(&mut self) -> Result<Step, CycleError<R::Error>> {
        let sequence = self.frame.sequence();
        info!("len {}: {:02x?}", N, self.frame.as_bytes());

        self.radio
            .write_tx_data(self.frame.as_bytes(), 0)
            .await
            .map_err(CycleError::Radio)?;
        self.radio
            .write_tx_frame_control(
                FrameBuffer::<N>::ON_AIR_LEN as u16,
                0,
                self.config.ranging,
            )
            .await
            .map_err(CycleError::Radio)?;
        self.radio
            .start_tx(self.config.tx_mode)
            .await
            .map_err(CycleError::Radio)?;

        let sent =
            block_until(&mut TxFrameSent::new(&mut self.radio), self.config.completion).await;
        match sent {
            Ok((_, polls)) => trace!("frame {} sent after {} polls", sequence, polls),
            Err(WaitError::TimedOut) => {
                warn!("frame {} not sent in time", sequence);
                // A late "TX frame sent" would be taken for the retry's
                self.abort_transmission().await?;
                return Err(CycleError::TransmitTimeout);
            }
            Err(WaitError::Other(e)) => return Err(CycleError::Radio(e)),
        }

        self.radio
            .clear_status(SysStatus::TXFRS)
            .await
            .map_err(CycleError::Radio)?;
        self.frame.mark_sent();

        self.delay.delay_ms(self.config.inter_frame_delay_ms).await;

        Ok(Step::Sent { sequence })
    }

    /// Stops the radio and drops every TX event it raised so far
    #[maybe_async_attr]
    async fn abort_transmission(&mut self) -> Result<(), CycleError<R::Error>> {
        self.radio.abort_tx().await.map_err(CycleError::Radio)?;
        self.radio
            .clear_status(SysStatus::ALL_TX)
            .await
            .map_err(CycleError::Radio)?;
        self.state = State::AwaitingInput;

        Ok(())
    }

    /// Steps forever
    ///
    /// Only returns if a step fails.
    #[maybe_async_attr]
    pub async fn run(&mut self) -> Result<Infallible, CycleError<R::Error>> {
        loop {
            self.step().await?;
        }
    }

    /// The frame as it stands
    pub fn frame(&self) -> &FrameBuffer<N> {
        &self.frame
    }

    /// Where the cycle is, see [`State`]
    pub fn state(&self) -> State {
        self.state
    }

    /// The cycle's tunables
    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Gives the radio, console and delay back
    pub fn release(self) -> (R, C, D) {
        (self.radio, self.console.release(), self.delay)
    }
}
