//! # Motion vector debug dump
//!
//! Renders every analysed sample as a grayscale image, where brightness is the vector magnitude.

use crate::error::Result;
use crate::vectors::{MacroblockGrid, MotionSample};
use image::{GrayImage, Luma};
use log::*;
use std::path::PathBuf;

/// Expand a printf-style pattern with a frame counter.
///
/// Supports `%d`, `%Nd`, `%0Nd` and `%%`. Anything else is copied as is.
pub fn expand_pattern(pattern: &str, counter: u64) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut digits = String::new();

        while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
            digits.push(d);
            chars.next();
        }

        match chars.next() {
            Some('%') if digits.is_empty() => out.push('%'),
            Some('d') => {
                let width = digits.parse::<usize>().unwrap_or(0);
                if digits.starts_with('0') {
                    out.push_str(&format!("{counter:0width$}"));
                } else {
                    out.push_str(&format!("{counter:width$}"));
                }
            }
            Some(other) => {
                out.push('%');
                out.push_str(&digits);
                out.push(other);
            }
            None => {
                out.push('%');
                out.push_str(&digits);
            }
        }
    }

    out
}

/// Render a sample, dropping the sentinel column.
pub fn render(grid: MacroblockGrid, sample: &MotionSample) -> GrayImage {
    let cols = grid.cols();

    GrayImage::from_fn(grid.real_cols() as u32, grid.rows() as u32, |x, y| {
        let magnitude = sample
            .as_slice()
            .get(y as usize * cols + x as usize)
            .map(|v| (v.magnitude_squared() as f32).sqrt() as u8)
            .unwrap_or(0);
        Luma([magnitude])
    })
}

/// Writes sequentially numbered vector images.
pub struct VectorDump {
    grid: MacroblockGrid,
    pattern: String,
    counter: u64,
}

impl VectorDump {
    pub fn new(grid: MacroblockGrid, pattern: impl Into<String>) -> Self {
        Self {
            grid,
            pattern: pattern.into(),
            counter: 0,
        }
    }

    /// Number of the next image.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Write out the sample, returning the written path.
    pub fn write(&mut self, sample: &MotionSample) -> Result<PathBuf> {
        let path = PathBuf::from(expand_pattern(&self.pattern, self.counter));
        self.counter += 1;

        render(self.grid, sample).save_with_format(&path, image::ImageFormat::Png)?;

        trace!("Dumped vectors to {}", path.display());

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectors::MotionVector;

    #[test]
    fn patterns() {
        assert_eq!(expand_pattern("mv%d.png", 7), "mv7.png");
        assert_eq!(expand_pattern("mv%05d.png", 42), "mv00042.png");
        assert_eq!(expand_pattern("mv%3d.png", 42), "mv 42.png");
        assert_eq!(expand_pattern("100%%-%d", 1), "100%-1");
        assert_eq!(expand_pattern("plain", 3), "plain");
        assert_eq!(expand_pattern("odd%s%", 3), "odd%s%");
    }

    #[test]
    fn renders_magnitudes() {
        let grid = MacroblockGrid::for_frame(32, 16);
        let sample = MotionSample::from(vec![
            MotionVector::new(3, 4),
            MotionVector::new(-8, 6),
            MotionVector::new(100, 100),
        ]);

        let img = render(grid, &sample);

        assert_eq!(img.dimensions(), (2, 1));
        assert_eq!(img.get_pixel(0, 0), &Luma([5]));
        assert_eq!(img.get_pixel(1, 0), &Luma([10]));
    }

    #[test]
    fn writes_numbered_files() {
        let dir = tempfile::tempdir().unwrap();
        let grid = MacroblockGrid::for_frame(32, 32);
        let pattern = dir.path().join("v%03d.png");
        let mut dump = VectorDump::new(grid, pattern.to_str().unwrap());

        let sample = MotionSample::from(vec![MotionVector::new(1, 0); grid.len()]);

        for _ in 0..2 {
            dump.write(&sample).unwrap();
        }

        assert_eq!(dump.counter(), 2);

        let img = image::open(dir.path().join("v001.png")).unwrap().to_luma8();
        assert_eq!(img.dimensions(), (2, 2));
        assert!(img.pixels().all(|p| p.0[0] == 1));
        assert!(dir.path().join("v000.png").exists());
    }
}
