//! Configuration structs for the radio
//!
//! This module houses the datastructures that control how frames are
//! transmitted. [`Config`] is passed to the high-level driver's `config`
//! method, [`TxConfig`] to `configure_tx_rf`.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The PHY configuration of the radio
///
/// The defaults are the ones of the blink tag: channel 5, 128 symbol
/// preamble, preamble code 9, 8 symbol non-standard SFD, 6.8 Mbps.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// The channel that the DW3000 will transmit at.
    pub channel: UwbChannel,
    /// The length of the preamble.
    pub preamble_length: PreambleLength,
    /// Preamble Acquisition Chunk size. Only used by the receiver.
    pub pac: PacSize,
    /// Preamble code used by the transmitter.
    pub tx_preamble_code: u8,
    /// Preamble code used by the receiver.
    pub rx_preamble_code: u8,
    /// The SFD sequence that is used to transmit a frame.
    pub sfd_type: SfdSequence,
    /// Sets the bitrate of the transmission.
    pub bitrate: BitRate,
    /// PHR mode
    pub phr_mode: PhrMode,
    /// PHR rate
    pub phr_rate: PhrRate,
    /// SFD timeout value, in symbols. Must not be zero.
    pub sfd_timeout: u16,
    /// STS mode
    pub sts_mode: StsMode,
    /// PDoA mode
    pub pdoa_mode: PdoaMode,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            channel: Default::default(),
            preamble_length: Default::default(),
            pac: Default::default(),
            tx_preamble_code: 9,
            rx_preamble_code: 9,
            sfd_type: Default::default(),
            bitrate: Default::default(),
            phr_mode: Default::default(),
            phr_rate: Default::default(),
            sfd_timeout: 129,
            sts_mode: Default::default(),
            pdoa_mode: Default::default(),
        }
    }
}

impl Config {
    /// Checks the combination of settings
    ///
    /// Preamble codes must belong to the 16 MHz (3, 4), 64 MHz (9 to 12) or
    /// 802.15.4z (25 to 32) sets, the SFD timeout must not be 0 and PDoA
    /// mode 3 needs STS.
    pub fn is_valid(&self) -> bool {
        fn valid_code(code: u8) -> bool {
            matches!(code, 3..=4 | 9..=12 | 25..=32)
        }

        valid_code(self.tx_preamble_code)
            && valid_code(self.rx_preamble_code)
            && self.sfd_timeout != 0
            && !(self.pdoa_mode == PdoaMode::Mode3 && self.sts_mode == StsMode::Off)
    }
}

/// Transmit spectrum configuration
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TxConfig {
    /// Pulse generator delay
    pub pg_delay: u8,
    /// TX power, one byte per segment of the frame
    pub power: u32,
}

impl Default for TxConfig {
    fn default() -> Self {
        TxConfig {
            pg_delay: 0x34,
            power: 0xfdfdfdfd,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
/// The bitrate at which a message is transmitted
pub enum BitRate {
    /// 850 kilobits per second.
    Kbps850 = 0,
    /// 6.8 megabits per second.
    #[default]
    Kbps6800 = 1,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
/// An enum that specifies the length of the preamble.
///
/// Longer preambles improve the reception quality and thus range.
/// This comes at the cost of longer transmission times and thus power
/// consumption and bandwidth use.
///
/// The values are the TXPSR codes written to TX_FCTRL.
pub enum PreambleLength {
    /// 32 symbols of preamble.
    Symbols32 = 0x04,
    /// 64 symbols of preamble.
    Symbols64 = 0x01,
    /// 72 symbols of preamble.
    Symbols72 = 0x07,
    /// 128 symbols of preamble.
    #[default]
    Symbols128 = 0x05,
    /// 256 symbols of preamble.
    Symbols256 = 0x09,
    /// 512 symbols of preamble.
    Symbols512 = 0x0D,
    /// 1024 symbols of preamble.
    Symbols1024 = 0x02,
    /// 1536 symbols of preamble.
    Symbols1536 = 0x06,
    /// 2048 symbols of preamble.
    Symbols2048 = 0x0A,
    /// 4096 symbols of preamble.
    Symbols4096 = 0x03,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
/// An enum that allows the selection between different SFD sequences
pub enum SfdSequence {
    /// The standard 8 symbol sequence defined by the IEEE standard.
    Ieee4a = 0,
    /// A non-standard 8 symbol sequence defined by Decawave.
    #[default]
    Decawave8 = 1,
    /// A non-standard 16 symbol sequence defined by Decawave.
    Decawave16 = 2,
    /// The 8 symbol sequence defined by IEEE 802.15.4z.
    Ieee4z = 3,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
/// Preamble Acquisition Chunk size
pub enum PacSize {
    /// 8 symbols, for preambles up to 128 symbols
    #[default]
    Pac8 = 0,
    /// 16 symbols, for 256 symbol preambles
    Pac16 = 1,
    /// 32 symbols, for 512 symbol preambles
    Pac32 = 2,
    /// 4 symbols, for 32 symbol preambles
    Pac4 = 3,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
/// PHR mode
pub enum PhrMode {
    /// Standard PHR mode
    #[default]
    Standard = 0,
    /// Decawave proprietary extended frames PHR mode
    Extended = 1,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
/// PHR rate
pub enum PhrRate {
    /// Standard PHR rate
    #[default]
    Standard = 0,
    /// PHR at data rate (6.8 Mbps)
    DataRate = 1,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
/// Scrambled timestamp sequence mode
pub enum StsMode {
    /// STS off
    #[default]
    Off = 0,
    /// STS after SFD, before PHR
    Mode1 = 1,
    /// STS after the payload
    Mode2 = 2,
    /// STS with no data
    ModeNd = 3,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
/// Phase difference of arrival mode
pub enum PdoaMode {
    /// PDoA off
    #[default]
    Mode0 = 0,
    /// PDoA mode 1
    Mode1 = 1,
    /// PDoA mode 3, needs STS
    Mode3 = 3,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
/// All the available UWB channels.
pub enum UwbChannel {
    /// Channel 5
    /// - Center frequency: 6489.6 Mhz
    /// - Bandwidth: 499.2 Mhz
    #[default]
    Channel5 = 0,
    /// Channel 9
    /// - Center frequency: 7987.2 Mhz
    /// - Bandwidth: 499.2 Mhz
    Channel9 = 1,
}

impl UwbChannel {
    /// Gets the recommended value for rf_tx_ctrl_2
    pub fn get_recommanded_rf_tx_ctrl_2(&self) -> u32 {
        match self {
            UwbChannel::Channel5 => 0x1C071134,
            UwbChannel::Channel9 => 0x1C010034,
        }
    }

    /// Gets the recommended value for pll conf
    pub fn get_recommanded_pll_conf(&self) -> u16 {
        match self {
            UwbChannel::Channel5 => 0x1F3C,
            UwbChannel::Channel9 => 0x0F3C,
        }
    }
}
