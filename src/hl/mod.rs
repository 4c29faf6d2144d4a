//! High-level interface to the DW3000
//!
//! The entry point to this API is the [DW3000] struct. Please refer to the
//! documentation there for more details.
//!
//! This module implements a high-level interface to the DW3000. This is the
//! recommended way to access the DW3000 using this crate, unless you need the
//! greater flexibility provided by the [register-level interface].
//!
//! [register-level interface]: ../ll/index.html

use core::fmt;

pub use error::*;
pub use ready::*;
pub use state_impls::*;
pub use uninitialized::*;

use crate::ll;

mod awake;
mod error;
mod ready;
mod state_impls;
mod uninitialized;

/// Entry point to the DW3000 driver API
///
/// The driver is a typestate: a freshly created instance is
/// [`Uninitialized`] and [`DW3000::init`] turns it into a [`Ready`] one,
/// which is the state the transmit cycle works with.
pub struct DW3000<SPI, State> {
    ll: ll::DW3000<SPI>,
    state: State,
}

// Can't be derived without putting requirements on `SPI`.
impl<SPI, State> fmt::Debug for DW3000<SPI, State>
where
    State: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DW3000 {{ state: ")?;
        self.state.fmt(f)?;
        write!(f, ", .. }}")?;

        Ok(())
    }
}
