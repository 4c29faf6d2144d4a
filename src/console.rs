//! Console input feeding the blink payload
//!
//! The debug console is read without ever waiting: whatever bytes are
//! available when the cycle comes around become the next payload, and an
//! empty read leaves the frame as it is.

use log::{debug, warn};

use crate::frame::FrameBuffer;

/// A non-blocking byte source
pub trait ConsoleInput {
    /// Reads up to `buf.len()` bytes that are available right now
    ///
    /// Returns the number of bytes read, `0` if there are none. Must not
    /// block.
    fn try_read(&mut self, buf: &mut [u8]) -> usize;
}

impl<C> ConsoleInput for &mut C
where
    C: ConsoleInput + ?Sized,
{
    fn try_read(&mut self, buf: &mut [u8]) -> usize {
        (**self).try_read(buf)
    }
}

/// Bytes read from the console for one refresh, at most `N - 2` of them
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InputChunk<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> InputChunk<N> {
    /// The bytes that were read
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Number of bytes that were read, never zero
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false, empty reads produce no chunk
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Outcome of [`ConsoleRefresher::refresh`]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Refresh {
    /// Nothing was available, the frame was not touched
    Unchanged,
    /// The frame got a new payload of this many bytes and is ready
    Updated(usize),
}

/// Moves console input into the frame payload
pub struct ConsoleRefresher<C> {
    input: C,
}

impl<C> ConsoleRefresher<C>
where
    C: ConsoleInput,
{
    /// Reads from `input`
    pub fn new(input: C) -> Self {
        ConsoleRefresher { input }
    }

    /// Takes whatever fits in the payload of an `N` byte frame
    ///
    /// Bytes beyond the payload capacity stay in the source for a later
    /// call.
    pub fn poll<const N: usize>(&mut self) -> Option<InputChunk<N>> {
        let mut chunk = InputChunk {
            buf: [0; N],
            len: 0,
        };

        let capacity = FrameBuffer::<N>::CAPACITY;
        let len = self.input.try_read(&mut chunk.buf[..capacity]);

        // A misbehaving source could claim more than it was given
        chunk.len = len.min(capacity);

        if chunk.len == 0 {
            None
        } else {
            Some(chunk)
        }
    }

    /// Rewrites the payload of `frame` if console input is available
    ///
    /// Without input a ready frame stays ready and is sent as it is.
    pub fn refresh<const N: usize>(&mut self, frame: &mut FrameBuffer<N>) -> Refresh {
        match self.poll::<N>() {
            Some(chunk) => {
                let len = frame.mark_ready(chunk.as_slice());
                debug!("console: {} new payload bytes", len);

                Refresh::Updated(len)
            }
            None => Refresh::Unchanged,
        }
    }

    /// Gives the input source back
    pub fn release(self) -> C {
        self.input
    }
}

/// A [`ConsoleInput`] over any `embedded-io` reader, typically a UART
///
/// Only reads when the reader reports data, so it never blocks. Read errors
/// are logged and count as no input.
pub struct IoConsole<T> {
    io: T,
}

impl<T> IoConsole<T>
where
    T: embedded_io::Read + embedded_io::ReadReady,
{
    /// Wraps `io`
    pub fn new(io: T) -> Self {
        IoConsole { io }
    }

    /// Gives the reader back
    pub fn release(self) -> T {
        self.io
    }
}

impl<T> ConsoleInput for IoConsole<T>
where
    T: embedded_io::Read + embedded_io::ReadReady,
{
    fn try_read(&mut self, buf: &mut [u8]) -> usize {
        use embedded_io::Error as _;

        if buf.is_empty() {
            return 0;
        }

        match self.io.read_ready() {
            Ok(true) => {}
            Ok(false) => return 0,
            Err(e) => {
                warn!("console not readable: {:?}", e.kind());
                return 0;
            }
        }

        match self.io.read(buf) {
            Ok(n) => n,
            Err(e) => {
                warn!("console read failed: {:?}", e.kind());
                0
            }
        }
    }
}

/// The J-Link RTT down channel
#[cfg(feature = "rtt")]
impl ConsoleInput for rtt_target::DownChannel {
    fn try_read(&mut self, buf: &mut [u8]) -> usize {
        self.read(buf)
    }
}
