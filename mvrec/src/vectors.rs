//! # Macroblock motion vectors

use crate::error::{Error, Result};
use bytemuck::{Pod, Zeroable};

/// Macroblock edge length in pixels.
pub const MACROBLOCK_SIZE: usize = 16;

/// Layout of the per-macroblock grid reported by the encoder.
///
/// Every row carries one extra sentinel column that absorbs the padding macroblock the encoder
/// appends to each row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MacroblockGrid {
    rows: usize,
    cols: usize,
}

impl MacroblockGrid {
    /// Compute the grid for a frame of given pixel dimensions.
    ///
    /// # Arguments
    ///
    /// * `width` - frame width in pixels.
    /// * `height` - frame height in pixels.
    pub fn for_frame(width: usize, height: usize) -> Self {
        Self {
            rows: (height + MACROBLOCK_SIZE - 1) / MACROBLOCK_SIZE,
            cols: (width + MACROBLOCK_SIZE - 1) / MACROBLOCK_SIZE + 1,
        }
    }

    /// Number of macroblock rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns, including the sentinel.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of columns that map onto actual picture content.
    pub fn real_cols(&self) -> usize {
        self.cols.saturating_sub(1)
    }

    /// Total cell count, `rows * cols`.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cells that can ever register motion.
    pub fn real_len(&self) -> usize {
        self.rows * self.real_cols()
    }

    /// Whether the given flat index falls into the sentinel column.
    pub fn is_sentinel(&self, idx: usize) -> bool {
        idx % self.cols == self.cols - 1
    }
}

/// Single macroblock motion vector, laid out as the encoder emits it.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MotionVector {
    pub dx: i8,
    pub dy: i8,
    /// Sum of absolute differences.
    pub sad: u16,
}

impl MotionVector {
    pub fn new(dx: i8, dy: i8) -> Self {
        Self { dx, dy, sad: 0 }
    }

    /// Squared magnitude of the displacement.
    pub fn magnitude_squared(&self) -> u32 {
        let (dx, dy) = (self.dx as i32, self.dy as i32);
        (dx * dx + dy * dy) as u32
    }
}

/// One frame worth of motion vectors, in row-major grid order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MotionSample {
    vectors: Vec<MotionVector>,
}

impl From<Vec<MotionVector>> for MotionSample {
    fn from(vectors: Vec<MotionVector>) -> Self {
        Self { vectors }
    }
}

impl MotionSample {
    /// Decode a raw side-info payload.
    ///
    /// Payloads longer than the grid are truncated, shorter ones are rejected.
    pub fn from_bytes(grid: MacroblockGrid, bytes: &[u8]) -> Result<Self> {
        let needed = grid.len() * std::mem::size_of::<MotionVector>();

        if bytes.len() < needed {
            return Err(Error::Stream(format!(
                "motion vector payload of {} bytes, expected at least {needed}",
                bytes.len()
            )));
        }

        Ok(Self {
            vectors: bytemuck::pod_collect_to_vec(&bytes[..needed]),
        })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn as_slice(&self) -> &[MotionVector] {
        &self.vectors
    }

    pub fn iter(&self) -> impl Iterator<Item = &MotionVector> + '_ {
        self.vectors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_dimensions() {
        let grid = MacroblockGrid::for_frame(1920, 1080);
        assert_eq!(grid.rows(), 68);
        assert_eq!(grid.cols(), 121);
        assert_eq!(grid.real_len(), 68 * 120);

        let grid = MacroblockGrid::for_frame(32, 16);
        assert_eq!((grid.rows(), grid.cols()), (1, 3));
        assert!(grid.is_sentinel(2));
        assert!(!grid.is_sentinel(1));
    }

    #[test]
    fn decode_payload() {
        let grid = MacroblockGrid::for_frame(16, 16);
        // Two vectors plus trailing padding.
        let mut bytes = vec![];
        bytes.extend_from_slice(&[3u8, 0xfc]);
        bytes.extend_from_slice(&7u16.to_ne_bytes());
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(&[0xff; 3]);

        let sample = MotionSample::from_bytes(grid, &bytes).unwrap();

        assert_eq!(
            sample.as_slice(),
            &[
                MotionVector {
                    dx: 3,
                    dy: -4,
                    sad: 7
                },
                MotionVector::default()
            ]
        );
        assert_eq!(sample.as_slice()[0].magnitude_squared(), 25);
    }

    #[test]
    fn short_payload_rejected() {
        let grid = MacroblockGrid::for_frame(32, 16);
        assert!(matches!(
            MotionSample::from_bytes(grid, &[0; 8]),
            Err(Error::Stream(_))
        ));
    }

    #[test]
    fn extreme_magnitude() {
        let v = MotionVector::new(-128, -128);
        assert_eq!(v.magnitude_squared(), 32768);
    }
}
