//! IEEE 802.15.4 blink transmitter for the DW3000 UWB transceiver
//!
//! The crate is split in two halves. The radio half is a small DW3000 driver
//! with a [register-level interface] and a [high-level interface]. The blink
//! half is the transmit loop itself: a [`FrameBuffer`] holding the outgoing
//! frame, a [`ConsoleRefresher`] that rewrites its payload from a debug
//! console, and the [`TransmitCycle`] that hands ready frames to any
//! [`RadioDevice`].
//!
//! Like the driver it is built on, every function that touches the bus is
//! written once and compiled either as `async` (the default `async` feature,
//! on top of [`embedded-hal-async`]) or as blocking code (on top of
//! [`embedded-hal`]).
//!
//! [`TransmitCycle::start`] brings a radio up on its own. Given a DW3000
//! that already went through `init`, it only repeats the 2 ms start-up delay
//! and a single IDLE_RC check before configuring it.
//!
//! ``` rust,ignore
//! let mut radio = DW3000::new(spi).init(&mut delay).await?;
//! radio.enable_leds(true, &mut delay).await?;
//! let mut cycle = TransmitCycle::<_, _, _, 12>::start(
//!     radio,
//!     console,
//!     delay,
//!     &Config::default(),
//!     &TxConfig::default(),
//!     CycleConfig::default(),
//! )
//! .await?;
//! cycle.run().await?;
//! ```
//!
//! [register-level interface]: ll/index.html
//! [high-level interface]: hl/index.html
//! [`embedded-hal`]: https://crates.io/crates/embedded-hal
//! [`embedded-hal-async`]: https://crates.io/crates/embedded-hal-async
#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(feature = "async")]
use maybe_async::must_be_async as maybe_async_attr;
#[cfg(not(feature = "async"))]
use maybe_async::must_be_sync as maybe_async_attr;

#[cfg(not(feature = "async"))]
use embedded_hal as hal_type;
#[cfg(feature = "async")]
use embedded_hal_async as hal_type;

pub mod configs;
pub mod console;
pub mod cycle;
pub mod fast_command;
pub mod frame;
pub mod hl;
pub mod ll;
pub mod radio;
pub mod wait;

pub use crate::{
    configs::{Config, TxConfig},
    console::{ConsoleInput, ConsoleRefresher, InputChunk, IoConsole, Refresh},
    cycle::{CycleConfig, CycleError, Retransmit, State, Step, TransmitCycle},
    fast_command::FastCommand,
    frame::{FrameBuffer, Marker, BLINK_TYPE, FCS_LEN},
    hl::{Error, Ready, Uninitialized, DW3000},
    radio::{RadioDevice, SysStatus, TxMode},
    wait::{WaitError, WaitPolicy},
};
