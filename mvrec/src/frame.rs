//! # Encoded frames

/// Flags the encoder attaches to each output buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FrameFlags {
    /// Self-contained frame, safe to start or end a segment on.
    pub keyframe: bool,
    /// Last buffer of an encoded unit.
    pub end_of_unit: bool,
    /// Buffer carries codec side info (motion vectors) instead of picture data.
    pub side_info: bool,
}

impl FrameFlags {
    const KEYFRAME: u8 = 1 << 0;
    const END_OF_UNIT: u8 = 1 << 1;
    const SIDE_INFO: u8 = 1 << 2;

    pub fn keyframe() -> Self {
        Self {
            keyframe: true,
            end_of_unit: true,
            side_info: false,
        }
    }

    pub fn delta() -> Self {
        Self {
            end_of_unit: true,
            ..Default::default()
        }
    }

    /// Pack into the on-wire bit representation.
    pub fn bits(&self) -> u8 {
        let mut bits = 0;
        if self.keyframe {
            bits |= Self::KEYFRAME;
        }
        if self.end_of_unit {
            bits |= Self::END_OF_UNIT;
        }
        if self.side_info {
            bits |= Self::SIDE_INFO;
        }
        bits
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            keyframe: bits & Self::KEYFRAME != 0,
            end_of_unit: bits & Self::END_OF_UNIT != 0,
            side_info: bits & Self::SIDE_INFO != 0,
        }
    }
}

/// One encoded unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub data: Vec<u8>,
    pub flags: FrameFlags,
    /// Presentation timestamp in microseconds.
    pub timestamp: u64,
}

impl Frame {
    pub fn new(data: Vec<u8>, flags: FrameFlags, timestamp: u64) -> Self {
        Self {
            data,
            flags,
            timestamp,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_keyframe(&self) -> bool {
        self.flags.keyframe
    }

    /// NAL unit type, if the frame starts with a 4 byte Annex-B start code.
    pub fn nal_type(&self) -> Option<u8> {
        match self.data.as_slice() {
            [0, 0, 0, 1, header, ..] => Some(header & 0x1f),
            _ => None,
        }
    }
}

const NAL_SPS: u8 = 7;
const NAL_PPS: u8 = 8;

/// Latest sequence and picture parameter sets seen in the stream.
///
/// A segment that starts mid-stream needs these before its first keyframe to be decodable.
#[derive(Clone, Debug, Default)]
pub struct ParameterSets {
    sps: Option<Vec<u8>>,
    pps: Option<Vec<u8>>,
}

impl ParameterSets {
    /// Remember the frame if it is a parameter set.
    pub fn observe(&mut self, frame: &Frame) {
        match frame.nal_type() {
            Some(NAL_SPS) => self.sps = Some(frame.data.clone()),
            Some(NAL_PPS) => self.pps = Some(frame.data.clone()),
            _ => {}
        }
    }

    pub fn sps(&self) -> Option<&[u8]> {
        self.sps.as_deref()
    }

    pub fn pps(&self) -> Option<&[u8]> {
        self.pps.as_deref()
    }

    /// Iterate the known parameter sets in stream order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.sps().into_iter().chain(self.pps())
    }
}
