//! Tiling a batch of generated images into one picture

use tch::{Device, Kind, Tensor};

use crate::data::{to_display_range, to_u8, ColorMode};
use crate::error::{Error, Result};

/// A rows x cols mosaic of images, stored row-major with interleaved channels
#[derive(Debug, Clone)]
pub struct ImageGrid {
    rows: usize,
    cols: usize,
    tile_height: usize,
    tile_width: usize,
    color_mode: ColorMode,
    /// Values in [0, 1], length `height * width * channels`
    pixels: Vec<f32>,
}

impl ImageGrid {
    /// Lay out generator output as a grid
    ///
    /// # Arguments
    ///
    /// * `images` - Tensor of shape (rows * cols, C, H, W) with values in [-1, 1]
    /// * `rows` - Number of tile rows
    /// * `cols` - Number of tile columns
    pub fn from_images(images: &Tensor, rows: usize, cols: usize) -> Result<Self> {
        let dims = images.size();
        if dims.len() != 4 || dims[0] != (rows * cols) as i64 {
            return Err(Error::ConfigurationError(format!(
                "expected {} images of shape [C, H, W] for a {}x{} grid, got {:?}",
                rows * cols,
                rows,
                cols,
                dims
            )));
        }
        let (channels, height, width) = (dims[1], dims[2], dims[3]);
        let color_mode = ColorMode::from_channels(channels)?;

        // (rows, cols, C, H, W) -> (rows, H, cols, W, C)
        let tiled = to_display_range(&images.to_device(Device::Cpu))
            .view([rows as i64, cols as i64, channels, height, width])
            .permute([0, 3, 1, 4, 2])
            .contiguous()
            .to_kind(Kind::Float);
        let pixels = Vec::<f32>::try_from(&tiled.flatten(0, -1))?;

        Ok(Self {
            rows,
            cols,
            tile_height: height as usize,
            tile_width: width as usize,
            color_mode,
            pixels,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    /// Total width in pixels
    pub fn width(&self) -> usize {
        self.cols * self.tile_width
    }

    /// Total height in pixels
    pub fn height(&self) -> usize {
        self.rows * self.tile_height
    }

    /// Channel values of the pixel at column `x`, row `y`
    pub fn pixel(&self, x: usize, y: usize) -> &[f32] {
        let c = self.color_mode.channels();
        let start = (y * self.width() + x) * c;
        &self.pixels[start..start + c]
    }

    /// All pixels as 8-bit values, row-major with interleaved channels
    pub fn to_bytes(&self) -> Vec<u8> {
        self.pixels.iter().map(|&v| to_u8(v)).collect()
    }
}
