//! Enumeration for fast commands
//!
//! Only the commands the blink transmitter issues are listed; the values are
//! the 5-bit command codes from the DW3000 user manual.

use crate::radio::TxMode;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Fast command enumeration to easily control the module
pub enum FastCommand {
    /// Go to IDLE state and clear any events
    TxRxOff = 0x0,
    /// Immediate start of transmission
    Tx = 0x1,
    /// TX if no preamble detected
    CcaTx = 0xB,
    /// Start TX immediately, then when TX is done, enable the receiver
    TxWaitForResponse = 0xC,
    /// Clear all interrupt events
    ClearIrqs = 0x12,
}

impl FastCommand {
    /// The raw 5-bit command code
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<TxMode> for FastCommand {
    fn from(mode: TxMode) -> Self {
        match mode {
            TxMode::Immediate => FastCommand::Tx,
            TxMode::WaitForResponse => FastCommand::TxWaitForResponse,
            TxMode::ClearChannel => FastCommand::CcaTx,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn transmit_modes_map_to_commands() {
        assert_eq!(FastCommand::from(TxMode::Immediate).code(), 0x1);
        assert_eq!(FastCommand::from(TxMode::WaitForResponse).code(), 0xC);
        assert_eq!(FastCommand::from(TxMode::ClearChannel).code(), 0xB);
    }
}
