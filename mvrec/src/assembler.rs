//! # Encoder buffer assembly

use crate::frame::Frame;
use crate::source::EncodedBuffer;
use log::*;

/// Output of [`FrameAssembler::push`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Assembled {
    /// Raw motion vector side info for the latest frame.
    Motion(Vec<u8>),
    /// A complete encoded unit.
    Frame(Frame),
}

/// Joins fragmented encoder buffers into whole units.
#[derive(Default)]
pub struct FrameAssembler {
    pending: Vec<u8>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes buffered towards an incomplete unit.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Append a buffer, returning a unit if it completed one.
    pub fn push(&mut self, buffer: EncodedBuffer) -> Option<Assembled> {
        let EncodedBuffer {
            data,
            flags,
            timestamp,
        } = buffer;

        if self.pending.is_empty() {
            self.pending = data;
        } else {
            self.pending.extend_from_slice(&data);
        }

        if flags.side_info {
            let data = std::mem::take(&mut self.pending);
            trace!("Side info of {} bytes", data.len());
            Some(Assembled::Motion(data))
        } else if flags.end_of_unit {
            let data = std::mem::take(&mut self.pending);
            trace!("Frame of {} bytes at {timestamp}", data.len());
            Some(Assembled::Frame(Frame::new(data, flags, timestamp)))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameFlags;

    fn fragment(data: &[u8]) -> EncodedBuffer {
        EncodedBuffer::new(data.to_vec(), FrameFlags::default(), 0)
    }

    #[test]
    fn joins_fragments() {
        let mut asm = FrameAssembler::new();

        assert_eq!(asm.push(fragment(&[0, 0, 0, 1])), None);
        assert_eq!(asm.push(fragment(&[0x65])), None);
        assert_eq!(asm.pending(), 5);

        let out = asm.push(EncodedBuffer::new(vec![7, 8], FrameFlags::keyframe(), 40));

        assert_eq!(
            out,
            Some(Assembled::Frame(Frame::new(
                vec![0, 0, 0, 1, 0x65, 7, 8],
                FrameFlags::keyframe(),
                40
            )))
        );
        assert_eq!(asm.pending(), 0);
    }

    #[test]
    fn side_info_is_motion() {
        let mut asm = FrameAssembler::new();

        let flags = FrameFlags {
            side_info: true,
            end_of_unit: true,
            ..Default::default()
        };

        assert_eq!(
            asm.push(EncodedBuffer::new(vec![1, 2, 3, 4], flags, 0)),
            Some(Assembled::Motion(vec![1, 2, 3, 4]))
        );

        assert!(matches!(
            asm.push(EncodedBuffer::new(vec![5], FrameFlags::delta(), 1)),
            Some(Assembled::Frame(f)) if f.data == [5]
        ));
    }
}
