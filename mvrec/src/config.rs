//! # Recorder configuration

use crate::error::{Error, Result};
use crate::heatmap::Heatmap;
use crate::recorder::Timing;
use crate::ring::CAPACITY;
use crate::vectors::MacroblockGrid;
use std::path::PathBuf;

/// Every tunable of the recording pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RecorderConfig {
    /// Number of macroblocks that must exceed their threshold to register movement.
    pub threshold: usize,
    /// Uniform per-macroblock sensitivity, used when no heatmap image is given.
    pub sensitivity: u32,
    /// Grayscale image with per-macroblock sensitivities.
    pub heatmap: Option<PathBuf>,
    pub debounce_frames: u64,
    /// Defaults to two seconds worth of frames.
    pub outro_frames: Option<u64>,
    pub framerate: u32,
    pub bitrate_mbps: u32,
    pub output_directory: PathBuf,
    pub notify_command: Option<PathBuf>,
    pub continuous_stream_url: Option<String>,
    /// printf-style file pattern for motion vector images.
    pub vector_debug_pattern: Option<String>,
    pub width: usize,
    pub height: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            threshold: 20,
            sensitivity: 40,
            heatmap: None,
            debounce_frames: 12,
            outro_frames: None,
            framerate: 25,
            bitrate_mbps: 2,
            output_directory: ".".into(),
            notify_command: None,
            continuous_stream_url: None,
            vector_debug_pattern: None,
            width: 1920,
            height: 1080,
        }
    }
}

impl RecorderConfig {
    pub fn grid(&self) -> MacroblockGrid {
        MacroblockGrid::for_frame(self.width, self.height)
    }

    pub fn outro_frames(&self) -> u64 {
        self.outro_frames.unwrap_or_else(|| 2 * u64::from(self.framerate))
    }

    pub fn timing(&self) -> Timing {
        Timing {
            debounce_frames: self.debounce_frames,
            outro_frames: self.outro_frames(),
        }
    }

    /// Check value ranges and their consistency with the frame size.
    pub fn validate(&self) -> Result<()> {
        if self.sensitivity > u8::MAX as u32 {
            return Err(Error::Config(format!(
                "sensitivity {} is out of range 0..=255",
                self.sensitivity
            )));
        }

        if self.threshold == 0 {
            return Err(Error::Config("threshold must be at least 1".into()));
        }

        if self.framerate == 0 {
            return Err(Error::Config("framerate must be positive".into()));
        }

        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "invalid frame size {}x{}",
                self.width, self.height
            )));
        }

        if self.debounce_frames >= CAPACITY as u64 {
            return Err(Error::Config(format!(
                "debounce of {} frames does not fit the {CAPACITY} frame pre-roll buffer",
                self.debounce_frames
            )));
        }

        let blocks = self.grid().real_len();

        if self.threshold > blocks {
            return Err(Error::Config(format!(
                "threshold {} exceeds the {blocks} macroblocks of a {}x{} frame",
                self.threshold, self.width, self.height
            )));
        }

        Ok(())
    }

    /// Build the heatmap, from the image if one is configured.
    pub fn build_heatmap(&self) -> Result<Heatmap> {
        match &self.heatmap {
            Some(path) => Heatmap::from_image(self.grid(), path),
            None => {
                let sensitivity = u8::try_from(self.sensitivity).map_err(|_| {
                    Error::Config(format!("sensitivity {} out of range", self.sensitivity))
                })?;
                Ok(Heatmap::uniform(self.grid(), sensitivity))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid(f: impl FnOnce(&mut RecorderConfig)) -> bool {
        let mut config = RecorderConfig::default();
        f(&mut config);
        matches!(config.validate(), Err(Error::Config(_)))
    }

    #[test]
    fn defaults() {
        let config = RecorderConfig::default();
        config.validate().unwrap();
        assert_eq!(config.outro_frames(), 50);
        assert_eq!(
            config.timing(),
            Timing {
                debounce_frames: 12,
                outro_frames: 50
            }
        );
    }

    #[test]
    fn validation() {
        assert!(invalid(|c| c.sensitivity = 256));
        assert!(invalid(|c| c.threshold = 0));
        assert!(invalid(|c| c.framerate = 0));
        assert!(invalid(|c| c.height = 0));
        assert!(invalid(|c| c.debounce_frames = CAPACITY as u64));
        assert!(!invalid(|c| c.debounce_frames = CAPACITY as u64 - 1));

        // 32x16 has two real macroblocks.
        assert!(invalid(|c| {
            c.width = 32;
            c.height = 16;
            c.threshold = 3;
        }));
        assert!(!invalid(|c| {
            c.width = 32;
            c.height = 16;
            c.threshold = 2;
        }));
    }

    #[test]
    fn uniform_heatmap() {
        let config = RecorderConfig {
            width: 32,
            height: 16,
            sensitivity: 10,
            ..Default::default()
        };

        assert_eq!(config.build_heatmap().unwrap().cells(), &[100, 100, 65535]);
    }

    #[test]
    fn missing_heatmap_is_fatal() {
        let config = RecorderConfig {
            heatmap: Some("/nonexistent/heatmap.png".into()),
            ..Default::default()
        };

        let err = config.build_heatmap().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_fatal_at_startup());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json() {
        let config: RecorderConfig =
            serde_json::from_str(r#"{ "threshold": 5, "outro_frames": 10 }"#).unwrap();

        assert_eq!(config.threshold, 5);
        assert_eq!(config.outro_frames(), 10);
        assert_eq!(config.sensitivity, 40);
        assert_eq!(config.output_directory, PathBuf::from("."));
    }
}
