//! # Encoder output sources

use crate::frame::FrameFlags;
use anyhow::Result;

/// One buffer as returned by the encoder.
///
/// A buffer may hold a whole encoded unit, a fragment of one, or a motion vector side info
/// payload, depending on its flags.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodedBuffer {
    pub data: Vec<u8>,
    pub flags: FrameFlags,
    /// Presentation timestamp in microseconds.
    pub timestamp: u64,
}

impl EncodedBuffer {
    pub fn new(data: Vec<u8>, flags: FrameFlags, timestamp: u64) -> Self {
        Self {
            data,
            flags,
            timestamp,
        }
    }
}

/// Stream of encoder output buffers.
pub trait EncoderSource: Send {
    /// Get the next buffer in the stream.
    ///
    /// Returns `Ok(None)` once the stream has cleanly ended.
    fn next_buffer(&mut self) -> Result<Option<EncodedBuffer>>;

    /// Get the dimensions of encoded frames in pixels, as `(width, height)`.
    fn dimensions(&self) -> (usize, usize);

    /// Get the nominal framerate of the stream, if it is known.
    fn framerate(&self) -> Option<u32>;
}

impl<T: EncoderSource + ?Sized> EncoderSource for Box<T> {
    fn next_buffer(&mut self) -> Result<Option<EncodedBuffer>> {
        (**self).next_buffer()
    }

    fn dimensions(&self) -> (usize, usize) {
        (**self).dimensions()
    }

    fn framerate(&self) -> Option<u32> {
        (**self).framerate()
    }
}
