use core::fmt;
use core::fmt::{Display, Formatter};

use embedded_hal::spi;

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::ll;

/// An error that can occur when driving the DW3000
pub enum Error<SPI>
where
    SPI: spi::ErrorType,
{
    /// Error occured while using SPI bus
    Spi(ll::Error<SPI>),

    /// Buffer too small
    BufferTooSmall {
        /// Indicates how large a buffer would have been required
        required_len: usize,
    },

    /// The configuration was not valid. Some combinations of settings are not
    /// allowed.
    InvalidConfiguration,

    /// Failed Initialization
    ///
    /// The radio never reached IDLE_RC, or it did not identify as a DW3000.
    InitializationFailed,

    /// The PLL did not lock after the channel was configured
    PllNotLocked,
}

impl<SPI> From<ll::Error<SPI>> for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn from(error: ll::Error<SPI>) -> Self {
        match error {
            ll::Error::Overflow { required_len } => Error::BufferTooSmall { required_len },
            error => Error::Spi(error),
        }
    }
}

impl<SPI> Display for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(feature = "std")]
impl<SPI> std::error::Error for Error<SPI> where SPI: spi::ErrorType {}

// We can't derive this implementation, as `Debug` is only implemented
// conditionally for `ll::Debug`.
impl<SPI> fmt::Debug for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Spi(error) => write!(f, "Spi({:?})", error),
            Error::BufferTooSmall { required_len } => {
                write!(f, "BufferTooSmall {{ required_len: {:?} }}", required_len,)
            }
            Error::InvalidConfiguration => write!(f, "InvalidConfiguration"),
            Error::InitializationFailed => write!(f, "InitializationFailed"),
            Error::PllNotLocked => write!(f, "PllNotLocked"),
        }
    }
}

#[cfg(feature = "defmt")]
impl<SPI> Format for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Spi(error) => defmt::write!(f, "Spi({:?})", error),
            Error::BufferTooSmall { required_len } => {
                defmt::write!(f, "BufferTooSmall {{ required_len: {:?} }}", required_len,)
            }
            Error::InvalidConfiguration => defmt::write!(f, "InvalidConfiguration"),
            Error::InitializationFailed => defmt::write!(f, "InitializationFailed"),
            Error::PllNotLocked => defmt::write!(f, "PllNotLocked"),
        }
    }
}

// Tests
#[cfg(test)]
mod test {
    use super::*;

    use embedded_hal_mock::eh1::spi::Mock as SpiMock;

    #[test]
    fn overflow_becomes_buffer_too_small() {
        let error: Error<SpiMock<u8>> = ll::Error::Overflow { required_len: 130 }.into();

        assert!(matches!(error, Error::BufferTooSmall { required_len: 130 }));
        assert_eq!(
            format!("{}", error),
            "BufferTooSmall { required_len: 130 }"
        );
    }

    #[cfg(feature = "defmt")]
    #[test]
    fn test_defmt() {
        let error = Error::<SpiMock<u8>>::BufferTooSmall { required_len: 42 };

        defmt::info!("error: {:?}", error);
    }
}
