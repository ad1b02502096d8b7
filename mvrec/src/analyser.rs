//! Motion detection module

use crate::heatmap::Heatmap;
use crate::vectors::MotionSample;
use log::*;

/// Change of scene state reported by the [`MotionAnalyser`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MotionEvent {
    Movement,
    Quiescent,
}

/// Heatmap based motion detector.
///
/// Every macroblock whose squared vector magnitude strictly exceeds its heatmap cell counts as a
/// hit. Once the number of hits reaches `threshold` a [`MotionEvent::Movement`] is emitted, and
/// when it falls below, a [`MotionEvent::Quiescent`] one. Events are only emitted on change.
pub struct MotionAnalyser {
    heatmap: Heatmap,
    threshold: usize,
    moving: bool,
}

impl MotionAnalyser {
    /// Create a new analyser.
    ///
    /// # Arguments
    ///
    /// * `heatmap` - per-macroblock squared thresholds.
    /// * `threshold` - number of macroblocks that need to exceed their threshold.
    pub fn new(heatmap: Heatmap, threshold: usize) -> Self {
        Self {
            heatmap,
            threshold,
            moving: false,
        }
    }

    pub fn heatmap(&self) -> &Heatmap {
        &self.heatmap
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Whether the last analysed sample was over the threshold.
    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// Count the macroblocks exceeding their heatmap threshold.
    pub fn count_exceeding(&self, sample: &MotionSample) -> usize {
        if sample.len() != self.heatmap.cells().len() {
            warn!(
                "Motion sample has {} vectors, heatmap has {} cells",
                sample.len(),
                self.heatmap.cells().len()
            );
        }

        sample
            .iter()
            .zip(self.heatmap.cells())
            .filter(|(v, cell)| u32::from(**cell) < v.magnitude_squared())
            .count()
    }

    /// Analyse a single frame worth of motion vectors.
    ///
    /// Returns an event only when the scene state changes.
    pub fn analyse(&mut self, sample: &MotionSample) -> Option<MotionEvent> {
        let count = self.count_exceeding(sample);

        trace!("{count:5} / {}", self.threshold);

        match (count >= self.threshold, self.moving) {
            (true, false) => {
                self.moving = true;
                Some(MotionEvent::Movement)
            }
            (false, true) => {
                self.moving = false;
                Some(MotionEvent::Quiescent)
            }
            _ => None,
        }
    }
}
