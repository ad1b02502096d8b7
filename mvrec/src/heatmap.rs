//! # Per-macroblock sensitivity heatmap

use crate::error::{Error, Result};
use crate::vectors::MacroblockGrid;
use image::{ColorType, DynamicImage, GrayImage};
use log::*;
use std::path::Path;

/// Threshold that no motion vector can exceed.
pub const MAX_THRESHOLD: u16 = u16::MAX;

/// Squared motion thresholds, one per macroblock.
///
/// A macroblock registers motion when its squared vector magnitude is strictly greater than the
/// cell value. The sentinel column is always [`MAX_THRESHOLD`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Heatmap {
    grid: MacroblockGrid,
    cells: Vec<u16>,
}

fn square(sensitivity: u8) -> u16 {
    std::cmp::min(sensitivity as u32 * sensitivity as u32, MAX_THRESHOLD as u32) as u16
}

impl Heatmap {
    /// Build a heatmap with the same sensitivity across the whole frame.
    pub fn uniform(grid: MacroblockGrid, sensitivity: u8) -> Self {
        let cell = square(sensitivity);

        let cells = (0..grid.len())
            .map(|i| {
                if grid.is_sentinel(i) {
                    MAX_THRESHOLD
                } else {
                    cell
                }
            })
            .collect();

        Self { grid, cells }
    }

    /// Load a heatmap from an 8-bit grayscale image.
    ///
    /// The image must be exactly `real_cols x rows` pixels. Each pixel is a sensitivity value.
    pub fn from_image(grid: MacroblockGrid, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Reading heatmap {}", path.display());

        let image = image::open(path)?;

        Self::from_luma(grid, &into_luma(image)?)
    }

    /// Build a heatmap from an in-memory grayscale image.
    pub fn from_luma(grid: MacroblockGrid, image: &GrayImage) -> Result<Self> {
        let (width, height) = image.dimensions();

        if (width as usize, height as usize) != (grid.real_cols(), grid.rows()) {
            return Err(Error::Config(format!(
                "heatmap is {width}x{height}, but the macroblock grid is {}x{}",
                grid.real_cols(),
                grid.rows()
            )));
        }

        let mut cells = Vec::with_capacity(grid.len());

        for row in image.rows() {
            cells.extend(row.map(|px| square(px.0[0])));
            cells.push(MAX_THRESHOLD);
        }

        Ok(Self { grid, cells })
    }

    pub fn grid(&self) -> MacroblockGrid {
        self.grid
    }

    /// Cells in row-major order, sentinel column included.
    pub fn cells(&self) -> &[u16] {
        &self.cells
    }

    /// Get the threshold at given macroblock coordinates, sentinel column included.
    pub fn try_get(&self, x: usize, y: usize) -> Option<u16> {
        if x < self.grid.cols() && y < self.grid.rows() {
            Some(self.cells[y * self.grid.cols() + x])
        } else {
            None
        }
    }

    /// Get the threshold at given macroblock coordinates.
    ///
    /// # Panics
    ///
    /// If `(x, y)` lies outside the grid, sentinel column included.
    pub fn get(&self, x: usize, y: usize) -> u16 {
        match self.try_get(x, y) {
            Some(cell) => cell,
            None => panic!(
                "macroblock ({x}, {y}) is outside the {}x{} grid",
                self.grid.cols(),
                self.grid.rows()
            ),
        }
    }
}

/// Reduce a decoded image to a single 8-bit channel, refusing colour input.
fn into_luma(image: DynamicImage) -> Result<GrayImage> {
    match image.color() {
        ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16 => Ok(image.to_luma8()),
        other => Err(Error::Config(format!(
            "heatmap must be a grayscale image, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn uniform_cells() {
        let grid = MacroblockGrid::for_frame(64, 48);

        for s in 0..=255u8 {
            let map = Heatmap::uniform(grid, s);

            for (i, &cell) in map.cells().iter().enumerate() {
                if grid.is_sentinel(i) {
                    assert_eq!(cell, MAX_THRESHOLD);
                } else {
                    assert_eq!(cell as u32, std::cmp::min(s as u32 * s as u32, 65535));
                }
            }
        }
    }

    #[test]
    fn small_frame() {
        let map = Heatmap::uniform(MacroblockGrid::for_frame(32, 16), 10);
        assert_eq!(map.cells(), &[100, 100, MAX_THRESHOLD]);
    }

    #[test]
    fn from_png() {
        let grid = MacroblockGrid::for_frame(48, 32);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.png");

        GrayImage::from_fn(3, 2, |x, y| Luma([(x + 3 * y) as u8 * 10]))
            .save(&path)
            .unwrap();

        let map = Heatmap::from_image(grid, &path).unwrap();

        assert_eq!(
            map.cells(),
            &[0, 100, 400, MAX_THRESHOLD, 900, 1600, 2500, MAX_THRESHOLD]
        );
        assert_eq!(map.get(1, 1), 1600);
    }

    #[test]
    fn coordinate_lookup() {
        let map = Heatmap::uniform(MacroblockGrid::for_frame(48, 32), 4);

        assert_eq!(map.try_get(2, 1), Some(16));
        assert_eq!(map.try_get(3, 1), Some(MAX_THRESHOLD));
        // Would alias into the next row with plain indexing.
        assert_eq!(map.try_get(4, 0), None);
        assert_eq!(map.try_get(0, 2), None);
    }

    #[test]
    #[should_panic(expected = "outside the 4x2 grid")]
    fn lookup_outside_grid_panics() {
        Heatmap::uniform(MacroblockGrid::for_frame(48, 32), 4).get(4, 0);
    }

    #[test]
    fn dimension_mismatch() {
        let grid = MacroblockGrid::for_frame(48, 32);
        let image = GrayImage::new(4, 2);

        assert!(matches!(
            Heatmap::from_luma(grid, &image),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn missing_file() {
        let grid = MacroblockGrid::for_frame(48, 32);
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            Heatmap::from_image(grid, dir.path().join("nope.png")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn not_an_image() {
        let grid = MacroblockGrid::for_frame(48, 32);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let err = Heatmap::from_image(grid, &path).unwrap_err();
        assert!(matches!(err, Error::Image(_)), "{err:?}");
    }

    #[test]
    fn colour_rejected() {
        let grid = MacroblockGrid::for_frame(16, 16);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.png");

        image::RgbImage::new(1, 1).save(&path).unwrap();

        assert!(matches!(
            Heatmap::from_image(grid, &path),
            Err(Error::Config(_))
        ));
    }
}
