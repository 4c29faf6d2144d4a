//! Low-level interface to the DW3000
//!
//! This module implements a register-level interface to the DW3000. Users of
//! this library should typically not need to use this. Please consider using
//! the [high-level interface] instead.
//!
//! Only the registers the blink transmitter touches are described here.
//!
//! **NOTE**: Many field access methods accept types that have a larger number
//! of bits than the field actually consists of. If you use such a method to
//! pass a value that is too large to be written to the field, it will be
//! silently truncated.
//!
//! [high-level interface]: ../hl/index.html

use core::{fmt, marker::PhantomData};

use embedded_hal::spi::ErrorType;

use crate::{hal_type::spi::SpiDevice, maybe_async_attr};

/// Length of the SPI header used for every register access
pub(crate) const HEADER_LEN: usize = 2;

/// Number of bytes of the transmit buffer reachable through a direct write
pub const TX_BUFFER_LEN: usize = 127;

/// Base address of the transmit data buffer
const TX_BUFFER_ID: u8 = 0x14;

/// Entry point to the DW3000 driver's low-level API
///
/// Please consider using [hl::DW3000] instead.
///
/// [hl::DW3000]: ../hl/struct.DW3000.html
pub struct DW3000<SPI> {
    pub(crate) spi: SPI,
}

impl<SPI> DW3000<SPI> {
    /// Create a new instance of `DW3000`
    ///
    /// Requires the SPI device that is connected to the DW3000. Chip select is
    /// handled by the `SpiDevice` implementation.
    pub fn new(spi: SPI) -> Self {
        DW3000 { spi }
    }

    /// Allow access to the SPI bus
    pub fn bus(&mut self) -> &mut SPI {
        &mut self.spi
    }

    /// Release the SPI device
    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI> DW3000<SPI>
where
    SPI: SpiDevice<u8>,
{
    /// Issue a fast command
    ///
    /// Fast commands are a single byte: write bit, short mode, the 5-bit
    /// command and a trailing one.
    #[maybe_async_attr]
    pub async fn fast_command(&mut self, fast: u8) -> Result<(), Error<SPI>> {
        let buffer = [(0x1 << 7) | ((fast << 1) & 0x3e) | 0x1];

        self.spi.write(&buffer).await.map_err(Error::Write)?;

        Ok(())
    }

    /// Write `data` into the transmit buffer, starting at `offset`
    ///
    /// Only the first [`TX_BUFFER_LEN`] bytes of the buffer are reachable, so
    /// `offset + data.len()` must not exceed it. The caller is expected to have
    /// checked this; excess data is rejected with [`Error::Overflow`].
    #[maybe_async_attr]
    pub async fn write_tx_buffer(&mut self, offset: u8, data: &[u8]) -> Result<(), Error<SPI>> {
        use byte::BytesExt as _;

        let end = offset as usize + data.len();
        if end > TX_BUFFER_LEN {
            return Err(Error::Overflow { required_len: end });
        }

        let mut buffer = [0u8; HEADER_LEN + TX_BUFFER_LEN];
        init_header_raw(true, TX_BUFFER_ID, offset, &mut buffer);

        let mut len = HEADER_LEN;
        buffer
            .write(&mut len, data)
            .map_err(|_| Error::Overflow { required_len: end })?;

        self.spi
            .write(&buffer[..len])
            .await
            .map_err(Error::Write)?;

        Ok(())
    }
}

/// Provides access to a register
///
/// You can get an instance for a given register using one of the methods on
/// [`DW3000`].
pub struct RegAccessor<'s, R, SPI>(&'s mut DW3000<SPI>, PhantomData<R>);

impl<'s, R, SPI> RegAccessor<'s, R, SPI>
where
    SPI: SpiDevice<u8>,
{
    /// Read from the register
    #[inline]
    #[maybe_async_attr]
    pub async fn read(&mut self) -> Result<R::Read, Error<SPI>>
    where
        R: Register + Readable,
    {
        let mut r = R::read();
        let buffer = R::buffer(&mut r);

        init_header::<R>(false, buffer);
        self.0
            .spi
            .transfer_in_place(buffer)
            .await
            .map_err(Error::Transfer)?;

        Ok(r)
    }

    /// Write to the register
    #[inline]
    #[maybe_async_attr]
    pub async fn write<F>(&mut self, f: F) -> Result<(), Error<SPI>>
    where
        R: Register + Writable,
        F: FnOnce(&mut R::Write) -> &mut R::Write,
    {
        let mut w = R::write();
        f(&mut w);

        let buffer = R::buffer(&mut w);
        init_header::<R>(true, buffer);

        self.0.spi.write(buffer).await.map_err(Error::Write)?;

        Ok(())
    }

    /// Modify the register
    ///
    /// Reads the register, lets `f` change the fields it cares about and
    /// writes the result back. Fields not touched by `f` keep the value that
    /// was read.
    #[inline]
    #[maybe_async_attr]
    pub async fn modify<F>(&mut self, f: F) -> Result<(), Error<SPI>>
    where
        R: Register + Readable + Writable,
        F: for<'r> FnOnce(&mut R::Read, &'r mut R::Write) -> &'r mut R::Write,
    {
        let mut r = self.read().await?;
        let mut w = R::write();

        <R as Writable>::buffer(&mut w).copy_from_slice(<R as Readable>::buffer(&mut r));

        f(&mut r, &mut w);

        let buffer = <R as Writable>::buffer(&mut w);
        init_header::<R>(true, buffer);

        self.0.spi.write(buffer).await.map_err(Error::Write)?;

        Ok(())
    }
}

/// An SPI error that can occur when communicating with the DW3000
pub enum Error<SPI>
where
    SPI: ErrorType,
{
    /// SPI error occured during a transfer transaction
    Transfer(SPI::Error),

    /// SPI error occured during a write transaction
    Write(SPI::Error),

    /// The data does not fit in the directly addressable part of a buffer
    Overflow {
        /// Indicates how large the buffer would have to be
        required_len: usize,
    },
}

// We can't derive this implementation, as the compiler will complain that the
// associated error type doesn't implement `Debug`.
impl<SPI> fmt::Debug for Error<SPI>
where
    SPI: ErrorType,
    SPI::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Transfer(error) => write!(f, "Transfer({:?})", error),
            Error::Write(error) => write!(f, "Write({:?})", error),
            Error::Overflow { required_len } => {
                write!(f, "Overflow {{ required_len: {:?} }}", required_len)
            }
        }
    }
}

#[cfg(feature = "defmt")]
impl<SPI> defmt::Format for Error<SPI>
where
    SPI: ErrorType,
{
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Transfer(_) => defmt::write!(f, "Transfer()"),
            Error::Write(_) => defmt::write!(f, "Write()"),
            Error::Overflow { required_len } => {
                defmt::write!(f, "Overflow {{ required_len: {} }}", required_len)
            }
        }
    }
}

/// Initializes the SPI message header
///
/// Initializes the SPI message header for accessing a given register, writing
/// the header directly into the provided buffer. Returns the length of the
/// header that was written.
#[inline(always)]
fn init_header<R: Register>(write: bool, buffer: &mut [u8]) -> usize {
    init_header_raw(write, R::ID, R::SUB_ID, buffer)
}

/// Writes a full (2-octet) address header for base `id` and 7-bit `sub_id`
#[inline(always)]
fn init_header_raw(write: bool, id: u8, sub_id: u8, buffer: &mut [u8]) -> usize {
    buffer[0] = (((write as u8) << 7) & 0x80)
        | 0x40 // always 2-octet addressing
        | ((id << 1) & 0x3e)
        | ((sub_id >> 6) & 0x01);

    // M1 M0 stay 0: no masked writes
    buffer[1] = sub_id << 2;

    HEADER_LEN
}

/// Extracts bits `first..=last` of a little-endian register image
#[inline(always)]
pub(crate) fn get_bits(data: &[u8], first: usize, last: usize) -> u128 {
    let start = first / 8;
    let end = last / 8 + 1;

    let raw = data[start..end]
        .iter()
        .enumerate()
        .fold(0u128, |acc, (i, &b)| acc | (b as u128) << (8 * i));

    (raw >> (first % 8)) & field_mask(last - first + 1)
}

/// Replaces bits `first..=last` of a little-endian register image
#[inline(always)]
pub(crate) fn set_bits(data: &mut [u8], first: usize, last: usize, value: u128) {
    let start = first / 8;
    let end = last / 8 + 1;
    let shift = first % 8;

    let mask = field_mask(last - first + 1) << shift;
    let value = (value << shift) & mask;

    for (i, b) in data[start..end].iter_mut().enumerate() {
        let byte_mask = (mask >> (8 * i)) as u8;
        let byte_value = (value >> (8 * i)) as u8;

        *b = (*b & !byte_mask) | (byte_value & byte_mask);
    }
}

#[inline(always)]
fn field_mask(width: usize) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

/// Implemented for all registers
///
/// This is a mostly internal crate that should not be implemented or used
/// directly by users of this crate. It is exposed through the public API
/// though, so it can't be made private.
///
/// The DW3000 user manual, section 8, specifies what the values of the
/// constant should be for each register.
pub trait Register {
    /// The register index
    const ID: u8;

    /// The registers's sub-index
    const SUB_ID: u8;

    /// The lenght of the register
    const LEN: usize;
}

/// Marker trait for registers that can be read from
///
/// This is a mostly internal crate that should not be implemented or used
/// directly by users of this crate. It is exposed through the public API
/// though, so it can't be made private.
pub trait Readable {
    /// The type that is used to read from the register
    type Read;

    /// Return the read type for this register
    fn read() -> Self::Read;

    /// Return the read type's internal buffer
    fn buffer(r: &mut Self::Read) -> &mut [u8];
}

/// Marker trait for registers that can be written to
///
/// This is a mostly internal crate that should not be implemented or used
/// directly by users of this crate. It is exposed through the public API
/// though, so it can't be made private.
pub trait Writable {
    /// The type that is used to write to the register
    type Write;

    /// Return the write type for this register
    fn write() -> Self::Write;

    /// Return the write type's internal buffer
    fn buffer(w: &mut Self::Write) -> &mut [u8];
}

/// Generates register implementations
macro_rules! impl_register {
    (
        $(
            $id:expr,
            $sub_id:expr,
            $len:expr,
            $rw:tt,
            $name:ident($name_lower:ident) {
            #[$doc:meta]
            $(
                $field:ident,
                $first_bit:expr,
                $last_bit:expr,
                $ty:ty;
                #[$field_doc:meta]
            )*
            }
        )*
    ) => {
        $(
            #[$doc]
            #[allow(non_camel_case_types)]
            pub struct $name;

            impl Register for $name {
                const ID:     u8    = $id;
                const SUB_ID: u8    = $sub_id;
                const LEN:    usize = $len;
            }

            #[$doc]
            pub mod $name_lower {
                use core::fmt;

                use crate::ll::{get_bits, set_bits, HEADER_LEN};

                /// Used to read from the register
                pub struct R(pub(crate) [u8; HEADER_LEN + $len]);

                impl R {
                    $(
                        #[$field_doc]
                        #[inline(always)]
                        pub fn $field(&self) -> $ty {
                            get_bits(&self.0[HEADER_LEN..], $first_bit, $last_bit) as $ty
                        }
                    )*
                }

                impl fmt::Debug for R {
                    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                        write!(f, "0x")?;
                        for i in (0 .. $len).rev() {
                            write!(f, "{:02x}", self.0[HEADER_LEN + i])?;
                        }

                        Ok(())
                    }
                }

                #[cfg(feature = "defmt")]
                impl defmt::Format for R {
                    fn format(&self, f: defmt::Formatter) {
                        defmt::write!(f, "0x");
                        for i in (0 .. $len).rev() {
                            defmt::write!(f, "{:02x}", self.0[HEADER_LEN + i]);
                        }
                    }
                }

                /// Used to write to the register
                pub struct W(pub(crate) [u8; HEADER_LEN + $len]);

                impl W {
                    $(
                        #[$field_doc]
                        #[inline(always)]
                        pub fn $field(&mut self, value: $ty) -> &mut Self {
                            set_bits(
                                &mut self.0[HEADER_LEN..],
                                $first_bit,
                                $last_bit,
                                value as u128,
                            );
                            self
                        }
                    )*
                }
            }

            impl_rw!($rw, $name, $name_lower, $len);
        )*


        impl<SPI> DW3000<SPI> {
            $(
                #[$doc]
                pub fn $name_lower(&mut self) -> RegAccessor<$name, SPI> {
                    RegAccessor(self, PhantomData)
                }
            )*
        }
    }
}

// Helper macro, used internally by `impl_register!`
macro_rules! impl_rw {
    (RO, $name:ident, $name_lower:ident, $len:expr) => {
        impl_rw!(@R, $name, $name_lower, $len);
    };
    (RW, $name:ident, $name_lower:ident, $len:expr) => {
        impl_rw!(@R, $name, $name_lower, $len);
        impl_rw!(@W, $name, $name_lower, $len);
    };

    (@R, $name:ident, $name_lower:ident, $len:expr) => {
        impl Readable for $name {
            type Read = $name_lower::R;

            fn read() -> Self::Read {
                $name_lower::R([0; HEADER_LEN + $len])
            }

            fn buffer(r: &mut Self::Read) -> &mut [u8] {
                &mut r.0
            }
        }
    };
    (@W, $name:ident, $name_lower:ident, $len:expr) => {
        impl Writable for $name {
            type Write = $name_lower::W;

            fn write() -> Self::Write {
                $name_lower::W([0; HEADER_LEN + $len])
            }

            fn buffer(w: &mut Self::Write) -> &mut [u8] {
                &mut w.0
            }
        }
    };
}

// Registers follow this syntax:
// <Id>, <Offset>, <Length>, <Access>, <NAME(name)> { /// <doc>
//      <name>, <first-bit-index>, <last-bit-index>, <type>; /// <doc>
// }
impl_register! {

    /*******************************************************************/
    /*****************     GEN_CFG_AES REGISTERS    ********************/
    /*******************************************************************/
    0x00, 0x00, 4, RO, DEV_ID(dev_id) { /// Device identifier
        rev,     0,  3, u8;  /// Revision
        ver,     4,  7, u8;  /// Version
        model,   8, 15, u8;  /// Model
        ridtag, 16, 31, u16; /// Register Identification Tag
    }
    0x00, 0x10, 4, RW, SYS_CFG(sys_cfg) { /// System Configuration
        ffen,        0,  0, u8; /// Frame Filtering Enable
        dis_fcs_tx,  1,  1, u8; /// disable auto-FCS Transmission
        phr_mode,    4,  4, u8; /// PHR Mode
        phr_6m8,     5,  5, u8; /// Sets the PHR rate to match the data rate
        cp_spc,     12, 13, u8; /// STS Packet Configuration
        pdoa_mode,  16, 17, u8; /// configure PDoA
    }
    0x00, 0x24, 6, RW, TX_FCTRL(tx_fctrl) { /// TX Frame Control
        txflen,      0,  9, u16; /// TX Frame Length
        txbr,       10, 10, u8;  /// Transmit Bit Rate
        tr,         11, 11, u8;  /// Transmit Ranging enable
        txpsr,      12, 15, u8;  /// Transmit Preamble Symbol Repetitions
        txb_offset, 16, 25, u16; /// Transmit buffer index offset
        fine_plen,  40, 47, u8;  /// Fine PSR control
    }
    0x00, 0x44, 6, RW, SYS_STATUS(sys_status) { /// System Event Status Register
        cplock,     1,  1, u8;  /// Clock PLL Lock
        txfrb,      4,  4, u8;  /// TX Frame Begins
        txprs,      5,  5, u8;  /// TX Preamble Sent
        txphs,      6,  6, u8;  /// TX PHY Header Sent
        txfrs,      7,  7, u8;  /// TX Frame Sent
        spirdy,    23, 23, u8;  /// SPI ready for host access
        rcinit,    24, 24, u8;  /// RC INIT
        cmd_err,   39, 39, u8;  /// Command error
        bits,       0, 47, u64; /// All event bits at once
    }
    0x01, 0x0C, 4, RW, TX_POWER(tx_power) { /// TX Power Control
        value, 0, 31, u32; /// TX Power Control value
    }
    0x01, 0x14, 2, RW, CHAN_CTRL(chan_ctrl) { /// Channel Control Register
        rf_chan,   0,  0, u8; /// Selects the receive channel.
        sfd_type,  1,  2, u8; /// Selects the SFD sequence.
        tx_pcode,  3,  7, u8; /// This field selects the preamble code used in the transmitter.
        rx_pcode,  8, 12, u8; /// This field selects the preamble code used in the receiver.
    }

    /*******************************************************************/
    /*******************     GPIO_CTRL REGISTER    *********************/
    /*******************************************************************/
    0x05, 0x00, 4, RW, GPIO_MODE(gpio_mode) { /// GPIO Mode Control Register
        msgp2,  6,  8, u8; ///  Mode Selection for GPIO2/RXLED
        msgp3,  9, 11, u8; ///  Mode Selection for GPIO3/TXLED
    }

    /*******************************************************************/
    /*******************     DRX_CONF REGISTER    **********************/
    /*******************************************************************/
    0x06, 0x00, 2, RW, DTUNE0(dtune0) { /// PAC configuration
        pac,    0,  1, u8; ///   Preamble Acquisition Chunk size
        dt0b4,  4,  4, u8; ///   Tuning bit 4 of digital tuning reg0
    }
    0x06, 0x02, 2, RW, RX_SFD_TOC(rx_sfd_toc) { /// SFD timeout
        value,  0, 15, u16; /// don't set to 0
    }

    /*******************************************************************/
    /*******************     RF_CONF REGISTER    ***********************/
    /*******************************************************************/
    0x07, 0x1C, 4, RW, RF_TX_CTRL_2(rf_tx_ctrl_2) { /// RF transmitter configuration
        pg_delay, 0,  5, u8;  /// Pulse Generator Delay
        value,    0, 31, u32; /// Whole register
    }

    /*******************************************************************/
    /*******************     FS_CTRL REGISTER    ***********************/
    /*******************************************************************/
    0x09, 0x00, 2, RW, PLL_CFG(pll_cfg) { /// PLL configuration
        value, 0, 15, u16; /// PLL configuration
    }

    /*******************************************************************/
    /*******************     PMSC REGISTER    **************************/
    /*******************************************************************/
    0x11, 0x04, 4, RW, CLK_CTRL(clk_ctrl) { /// PMSC clock control register
        gpio_clk_en,  16, 16, u8; /// GPIO clock Enable
        gpio_dclk_en, 18, 18, u8; /// GPIO De-bounce Clock Enable.
        gpio_drst_n,  19, 19, u8; /// GPIO de-bounce reset (NOT), active low.
        lp_clk_en,    23, 23, u8; /// Kilohertz clock Enable.
    }
    0x11, 0x16, 4, RW, LED_CTRL(led_ctrl) { /// LED control register
        blink_tim,   0,  7, u8; /// Blink time count value.
        blink_en,    8,  8, u8; /// Blink Enable.
        force_trig, 16, 19, u8; /// Manually triggers an LED blink.
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    #[test]
    fn header_uses_two_octet_addressing() {
        let mut buffer = [0u8; 2];

        init_header::<SYS_STATUS>(false, &mut buffer);
        assert_eq!(buffer, [0x41, 0x10]);

        init_header::<SYS_STATUS>(true, &mut buffer);
        assert_eq!(buffer, [0xC1, 0x10]);

        init_header::<LED_CTRL>(true, &mut buffer);
        assert_eq!(buffer, [0xE2, 0x58]);
    }

    #[test]
    fn fields_are_read_across_byte_boundaries() {
        // txflen = 0x20E, txbr = 1, txpsr = 5, txb_offset = 0x101
        let data = [0x0E, 0x56, 0x01, 0x01, 0x00, 0x00];

        assert_eq!(get_bits(&data, 0, 9), 0x20E);
        assert_eq!(get_bits(&data, 10, 10), 1);
        assert_eq!(get_bits(&data, 11, 11), 0);
        assert_eq!(get_bits(&data, 12, 15), 5);
        assert_eq!(get_bits(&data, 16, 25), 0x101);
    }

    #[test]
    fn writing_a_field_preserves_its_neighbours() {
        let mut data = [0xFF, 0xFF, 0xFF, 0xFF];

        set_bits(&mut data, 6, 8, 0b001);
        assert_eq!(data, [0x7F, 0xFE, 0xFF, 0xFF]);

        // Values wider than the field are truncated
        set_bits(&mut data, 16, 19, 0xFF);
        assert_eq!(data, [0x7F, 0xFE, 0xFF, 0xFF]);
        set_bits(&mut data, 16, 19, 0x0);
        assert_eq!(data, [0x7F, 0xFE, 0xF0, 0xFF]);
    }

    #[tokio::test]
    async fn test_read_dev_id() {
        let spi = SpiMock::new(&[
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(
                vec![0x40, 0x00, 0, 0, 0, 0],
                vec![0x00, 0x00, 0x02, 0x03, 0xCA, 0xDE],
            ),
            SpiTransaction::transaction_end(),
        ]);

        let mut dw3000 = DW3000::new(spi);

        let dev_id = dw3000.dev_id().read().await.unwrap();
        assert_eq!(dev_id.ridtag(), 0xDECA);
        assert_eq!(dev_id.model(), 0x03);
        assert_eq!(dev_id.ver(), 0x0);
        assert_eq!(dev_id.rev(), 0x2);

        dw3000.release().done();
    }

    #[tokio::test]
    async fn test_write_tx_buffer_at_offset() {
        let spi = SpiMock::new(&[
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0xE8, 0x10, 0xAA, 0xBB]),
            SpiTransaction::transaction_end(),
        ]);

        let mut dw3000 = DW3000::new(spi);
        dw3000.write_tx_buffer(4, &[0xAA, 0xBB]).await.unwrap();

        dw3000.release().done();
    }

    #[tokio::test]
    async fn test_write_tx_buffer_rejects_overflow() {
        let spi = SpiMock::new(&[]);

        let mut dw3000 = DW3000::new(spi);
        let result = dw3000.write_tx_buffer(120, &[0; 8]).await;

        assert!(matches!(result, Err(Error::Overflow { required_len: 128 })));

        dw3000.release().done();
    }
}
