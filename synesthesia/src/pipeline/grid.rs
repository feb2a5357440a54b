// Turns a still image into the time x pitch grid the scan line plays.
// Columns are time, rows are pitch, and row 0 is the *bottom* of the image.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;
use thiserror::Error;

use crate::shared::{MAX_SCAN_WIDTH, MIN_SCAN_WIDTH, SCAN_COLUMNS, SCAN_ROWS};

#[derive(Error, Debug)]
pub enum GridError {
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has no pixels")]
    Empty,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridCell {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub brightness: f32, // 0-1
    pub row: usize,      // 0 = lowest pitch
}

impl GridCell {
    pub fn new(r: u8, g: u8, b: u8, row: usize) -> Self {
        Self { r, g, b, brightness: luma(r, g, b), row }
    }

    pub fn color(&self) -> [f32; 3] {
        [self.r as f32, self.g as f32, self.b as f32]
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Grid {
    columns: Vec<Vec<GridCell>>,
    height: usize,
}

impl Grid {
    // every column must hold `height` cells ordered by row
    pub fn from_columns(columns: Vec<Vec<GridCell>>, height: usize) -> Self {
        Self { columns, height }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn column(&self, index: usize) -> Option<&[GridCell]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    pub fn columns(&self) -> impl Iterator<Item = &[GridCell]> {
        self.columns.iter().map(Vec::as_slice)
    }

    pub fn column_means(&self) -> Vec<f32> {
        self.columns().map(mean_brightness).collect()
    }
}

pub fn mean_brightness(column: &[GridCell]) -> f32 {
    if column.is_empty() {
        return 0.0;
    }
    column.iter().map(|c| c.brightness).sum::<f32>() / column.len() as f32
}

#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> f32 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) / 255.0
}

// width = clamp(round(base * aspect), min, max)
pub fn scan_width(aspect: f64, base_columns: u32, min_width: u32, max_width: u32) -> u32 {
    let raw = (base_columns as f64 * aspect).round();
    if raw.is_nan() {
        return min_width;
    }
    (raw.max(0.0).min(u32::MAX as f64) as u32).clamp(min_width, max_width)
}

pub fn sample(
    image: &RgbImage,
    target_height: u32,
    min_width: u32,
    max_width: u32,
    base_columns: u32,
) -> Result<Grid, GridError> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 || target_height == 0 {
        return Err(GridError::Empty);
    }
    let width = scan_width(w as f64 / h as f64, base_columns, min_width, max_width);
    let resized = imageops::resize(image, width, target_height, FilterType::Triangle);

    let columns = (0..width)
        .map(|x| {
            // walk bottom-up so row 0 is the lowest pixel row
            (0..target_height)
                .rev()
                .enumerate()
                .map(|(row, y)| {
                    let [r, g, b] = resized.get_pixel(x, y).0;
                    GridCell::new(r, g, b, row)
                })
                .collect()
        })
        .collect();

    Ok(Grid::from_columns(columns, target_height as usize))
}

// Decode an image file and sample it with the stock dimensions.
pub fn load(path: &Path) -> Result<Grid, GridError> {
    let image = image::open(path)?.to_rgb8();
    let grid = sample(&image, SCAN_ROWS, MIN_SCAN_WIDTH, MAX_SCAN_WIDTH, SCAN_COLUMNS)?;
    log::info!(
        "sampled {} ({}x{}) into a {}x{} grid",
        path.display(),
        image.width(),
        image.height(),
        grid.width(),
        grid.height()
    );
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn width_follows_aspect_ratio_within_bounds() {
        let cases = [(0.5, 512), (1.0, 512), (2.0, 1024), (4.0, 2048), (10.0, 2048)];
        for (aspect, expected) in cases {
            assert_eq!(scan_width(aspect, 512, 512, 2048), expected, "aspect {aspect}");
        }
        assert_eq!(scan_width(1.5, 512, 512, 2048), 768);
    }

    #[test]
    fn bottom_of_image_becomes_row_zero() {
        // one pixel wide, getting brighter towards the bottom
        let img = RgbImage::from_fn(1, 32, |_, y| {
            let v = (y * 8) as u8;
            Rgb([v, v, v])
        });
        let grid = sample(&img, 32, 512, 2048, 512).unwrap();
        assert_eq!(grid.height(), 32);
        assert_eq!(grid.width(), 512);

        let column = grid.column(0).unwrap();
        assert_eq!(column[0].row, 0);
        let brightest = column
            .iter()
            .max_by(|a, b| a.brightness.total_cmp(&b.brightness))
            .unwrap();
        assert_eq!(brightest.row, 0);
        assert!(column[0].brightness > column[31].brightness);
    }

    #[test]
    fn luma_is_normalised() {
        assert_eq!(luma(0, 0, 0), 0.0);
        assert!((luma(255, 255, 255) - 1.0).abs() < 1e-4);
        assert!(luma(0, 255, 0) > luma(255, 0, 0));
    }

    #[test]
    fn empty_image_produces_no_grid() {
        let img = RgbImage::new(0, 0);
        assert!(matches!(sample(&img, 32, 512, 2048, 512), Err(GridError::Empty)));
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join("synesthesia-does-not-exist.png");
        assert!(load(&path).is_err());
    }
}
