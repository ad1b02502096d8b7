//! # Pre-roll frame ring buffer

use crate::frame::Frame;

/// Number of frames retained for pre-roll.
pub const CAPACITY: usize = 128;

/// Fixed capacity store of the most recently encoded frames.
///
/// Frame `n` lives in slot `n % CAPACITY` and is released when frame `n + CAPACITY` is written.
pub struct FrameRing {
    slots: Vec<Option<(u64, Frame)>>,
    latest: Option<u64>,
}

impl Default for FrameRing {
    fn default() -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(CAPACITY).collect(),
            latest: None,
        }
    }
}

impl FrameRing {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(frame_number: u64) -> usize {
        (frame_number % CAPACITY as u64) as usize
    }

    /// Store a frame, releasing whatever previously occupied its slot.
    pub fn put(&mut self, frame_number: u64, frame: Frame) {
        self.slots[Self::slot(frame_number)] = Some((frame_number, frame));
        self.latest = Some(self.latest.map_or(frame_number, |l| l.max(frame_number)));
    }

    /// Most recently written frame number.
    pub fn latest(&self) -> Option<u64> {
        self.latest
    }

    /// Oldest frame number still guaranteed to be retained.
    pub fn oldest(&self) -> Option<u64> {
        self.latest.map(|l| l.saturating_sub(CAPACITY as u64 - 1))
    }

    /// Whether `frame_number` is within the last `CAPACITY` written frames.
    pub fn contains(&self, frame_number: u64) -> bool {
        match self.slots[Self::slot(frame_number)] {
            Some((n, _)) => n == frame_number,
            None => false,
        }
    }

    /// Get a frame if it is still retained.
    pub fn try_get(&self, frame_number: u64) -> Option<&Frame> {
        match &self.slots[Self::slot(frame_number)] {
            Some((n, frame)) if *n == frame_number => Some(frame),
            _ => None,
        }
    }

    /// Get a retained frame.
    ///
    /// # Panics
    ///
    /// If `frame_number` has been evicted or was never written. Callers must stay within the
    /// retained window.
    pub fn get(&self, frame_number: u64) -> &Frame {
        match self.try_get(frame_number) {
            Some(frame) => frame,
            None => panic!(
                "frame {frame_number} is outside the retained window (latest {:?})",
                self.latest
            ),
        }
    }

    /// Iterate retained frames from `start` through `end` inclusive, in frame number order.
    ///
    /// # Panics
    ///
    /// If any frame in the range is no longer retained.
    pub fn range(&self, start: u64, end: u64) -> impl Iterator<Item = (u64, &Frame)> + '_ {
        (start..=end).map(move |n| (n, self.get(n)))
    }
}
