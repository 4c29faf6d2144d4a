//! The outgoing blink frame
//!
//! A blink is the smallest IEEE 802.15.4 frame there is: one frame control
//! byte, a sequence number and whatever payload the tag wants to announce.
//! The radio appends the [`FCS_LEN`] byte checksum on its own.
//!
//! The frame control byte doubles as the ready flag: it holds [`BLINK_TYPE`]
//! while the frame waits to be sent and `0` otherwise.

use smoltcp::wire::{Ieee802154Frame, Ieee802154FrameType};

/// Frame control byte of a blink frame
pub const BLINK_TYPE: u8 = 0xC5;

/// Length of the frame check sequence the radio appends
pub const FCS_LEN: usize = 2;

/// State of the frame control byte
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Marker {
    /// Nothing to send
    NotReady,
    /// Waiting to be sent
    Ready,
}

/// An `N` byte blink frame, owned by whoever drives the transmissions
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FrameBuffer<const N: usize = 12> {
    bytes: [u8; N],
    loaded: bool,
}

impl<const N: usize> FrameBuffer<N> {
    const HAS_PAYLOAD: () = assert!(N > 2, "a blink frame needs room for a payload");

    /// Payload bytes the frame can carry
    pub const CAPACITY: usize = N - 2;

    /// Bytes the radio puts on air, checksum included
    pub const ON_AIR_LEN: usize = N + FCS_LEN;

    /// A zeroed, not ready frame with sequence number 0
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::HAS_PAYLOAD;

        FrameBuffer {
            bytes: [0; N],
            loaded: false,
        }
    }

    /// Back to sequence number 0, not ready, no payload
    pub fn reset(&mut self) {
        self.bytes = [0; N];
        self.loaded = false;
    }

    /// Loads `payload` and marks the frame ready
    ///
    /// Anything past [`Self::CAPACITY`] is dropped and unused payload bytes
    /// are zeroed. The sequence number is left alone. Returns the number of
    /// payload bytes taken.
    pub fn mark_ready(&mut self, payload: &[u8]) -> usize {
        let len = payload.len().min(Self::CAPACITY);
        let (loaded, rest) = self.bytes[2..].split_at_mut(len);

        loaded.copy_from_slice(&payload[..len]);
        rest.fill(0);

        self.bytes[0] = BLINK_TYPE;
        self.loaded = true;

        len
    }

    /// Records a completed transmission
    ///
    /// Clears the marker and advances the sequence number, wrapping at 256.
    /// The payload is kept.
    pub fn mark_sent(&mut self) {
        self.bytes[0] = 0;
        self.bytes[1] = self.bytes[1].wrapping_add(1);
    }

    /// Marks the retained payload ready again
    ///
    /// Does nothing until a payload has been loaded once. Returns whether the
    /// frame is ready afterwards.
    pub fn rearm(&mut self) -> bool {
        if self.loaded {
            self.bytes[0] = BLINK_TYPE;
        }

        self.is_ready()
    }

    /// True while the frame waits to be sent
    pub fn is_ready(&self) -> bool {
        self.marker() == Marker::Ready
    }

    /// State of the frame control byte
    pub fn marker(&self) -> Marker {
        if self.bytes[0] == BLINK_TYPE {
            Marker::Ready
        } else {
            Marker::NotReady
        }
    }

    /// Sequence number of the next transmission
    pub fn sequence(&self) -> u8 {
        self.bytes[1]
    }

    /// The payload bytes, zero padding included
    pub fn payload(&self) -> &[u8] {
        &self.bytes[2..]
    }

    /// The whole frame as it goes into the TX buffer
    pub fn as_bytes(&self) -> &[u8; N] {
        &self.bytes
    }

    /// How an IEEE 802.15.4 parser reads the frame control byte
    ///
    /// A ready blink decodes as a multipurpose frame.
    pub fn ieee802154_frame_type(&self) -> Ieee802154FrameType {
        Ieee802154Frame::new_unchecked(&self.bytes[..]).frame_type()
    }
}

impl<const N: usize> Default for FrameBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn starts_empty() {
        let frame = FrameBuffer::<12>::new();

        assert_eq!(frame.marker(), Marker::NotReady);
        assert_eq!(frame.sequence(), 0);
        assert_eq!(frame.as_bytes(), &[0; 12]);
        assert_eq!(FrameBuffer::<12>::CAPACITY, 10);
        assert_eq!(FrameBuffer::<12>::ON_AIR_LEN, 14);
    }

    #[test]
    fn mark_ready_zero_fills() {
        let mut frame = FrameBuffer::<12>::new();
        frame.mark_ready(b"ABCDEFGHIJ");
        frame.mark_sent();

        assert_eq!(frame.mark_ready(b"AB"), 2);

        assert_eq!(frame.as_bytes()[0], BLINK_TYPE);
        assert_eq!(frame.sequence(), 1);
        assert_eq!(&frame.payload()[..2], b"AB");
        assert!(frame.payload()[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn mark_ready_truncates_to_capacity() {
        let mut frame = FrameBuffer::<6>::new();

        assert_eq!(frame.mark_ready(b"0123456789"), 4);
        assert_eq!(frame.as_bytes(), &[BLINK_TYPE, 0, b'0', b'1', b'2', b'3']);
    }

    #[test]
    fn exact_capacity_needs_no_padding() {
        let mut frame = FrameBuffer::<12>::new();

        frame.mark_ready(b"0123456789");
        assert_eq!(frame.payload(), b"0123456789");
    }

    #[test]
    fn sequence_wraps() {
        let mut frame = FrameBuffer::<12>::new();

        for k in 1..=300u32 {
            frame.mark_ready(b"x");
            frame.mark_sent();
            assert_eq!(frame.sequence() as u32, k % 256);
            assert_eq!(frame.marker(), Marker::NotReady);
        }
        assert_eq!(frame.payload()[0], b'x');
    }

    #[test]
    fn marker_is_only_ever_blink_or_zero() {
        let mut frame = FrameBuffer::<4>::new();

        for step in 0..10 {
            match step % 3 {
                0 => {
                    frame.mark_ready(&[step; 7]);
                }
                1 => frame.mark_sent(),
                _ => {
                    frame.rearm();
                }
            }
            assert!(matches!(frame.as_bytes()[0], 0 | BLINK_TYPE));
        }
    }

    #[test]
    fn rearm_needs_a_loaded_payload() {
        let mut frame = FrameBuffer::<12>::new();
        assert!(!frame.rearm());

        frame.mark_ready(b"hi");
        frame.mark_sent();
        assert!(frame.rearm());
        assert_eq!(&frame.payload()[..2], b"hi");

        frame.reset();
        assert!(!frame.rearm());
        assert_eq!(frame.sequence(), 0);
    }

    #[test]
    fn ready_blink_parses_as_multipurpose() {
        let mut frame = FrameBuffer::<12>::new();
        frame.mark_ready(b"AB");

        assert_eq!(
            frame.ieee802154_frame_type(),
            Ieee802154FrameType::Multipurpose
        );
    }
}
