//! Periodic sample rendering during training

use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};
use rand::rngs::StdRng;
use tch::{nn::ModuleT, Device};
use tracing::info;

use super::grid::ImageGrid;
use crate::data::ColorMode;
use crate::error::{Error, Result};
use crate::model::{latent_batch, ImageGenerator};

/// Something the trainer hands the generator to every `sample_interval` steps
pub trait Sampler {
    /// Build the sample grid for `step` and pass it on for rendering
    fn sample(&mut self, generator: &dyn ImageGenerator, step: usize, rng: &mut StdRng) -> Result<ImageGrid>;
}

/// Turns an image grid into an artifact
pub trait GridRenderer {
    /// Render the grid for `step`, returning where it was written
    fn render(&self, grid: &ImageGrid, step: usize) -> Result<PathBuf>;
}

/// Writes `sample_<step>.png` files into a directory
#[derive(Debug, Clone)]
pub struct PngRenderer {
    output_dir: PathBuf,
    color_mode: ColorMode,
}

impl PngRenderer {
    /// Create a renderer; the directory is created on first use
    pub fn new<P: AsRef<Path>>(output_dir: P, color_mode: ColorMode) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            color_mode,
        }
    }

    /// Path the sample for `step` is written to
    pub fn path_for(&self, step: usize) -> PathBuf {
        self.output_dir.join(format!("sample_{}.png", step))
    }
}

impl GridRenderer for PngRenderer {
    fn render(&self, grid: &ImageGrid, step: usize) -> Result<PathBuf> {
        let failure = |reason: String| Error::RenderFailure { step, reason };

        if grid.color_mode() != self.color_mode {
            return Err(failure(format!(
                "grid is {:?} but renderer was configured for {:?}",
                grid.color_mode(),
                self.color_mode
            )));
        }

        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| failure(format!("{}: {}", self.output_dir.display(), e)))?;

        let (width, height) = (grid.width() as u32, grid.height() as u32);
        let path = self.path_for(step);
        let saved = match self.color_mode {
            ColorMode::Grayscale => GrayImage::from_raw(width, height, grid.to_bytes())
                .ok_or_else(|| failure("pixel buffer does not match grid size".to_string()))?
                .save(&path),
            ColorMode::Rgb => RgbImage::from_raw(width, height, grid.to_bytes())
                .ok_or_else(|| failure("pixel buffer does not match grid size".to_string()))?
                .save(&path),
        };
        saved.map_err(|e| failure(format!("{}: {}", path.display(), e)))?;

        Ok(path)
    }
}

/// Generates a fixed-size grid of samples and hands it to a renderer
pub struct GridSampler {
    rows: usize,
    cols: usize,
    device: Device,
    renderer: Box<dyn GridRenderer>,
}

impl GridSampler {
    pub fn new(rows: usize, cols: usize, device: Device, renderer: Box<dyn GridRenderer>) -> Self {
        Self {
            rows,
            cols,
            device,
            renderer,
        }
    }

    /// 4x4 grid of PNG files under `output_dir`
    pub fn png<P: AsRef<Path>>(output_dir: P, color_mode: ColorMode, device: Device) -> Self {
        Self::new(4, 4, device, Box::new(PngRenderer::new(output_dir, color_mode)))
    }
}

impl Sampler for GridSampler {
    fn sample(&mut self, generator: &dyn ImageGenerator, step: usize, rng: &mut StdRng) -> Result<ImageGrid> {
        let count = (self.rows * self.cols) as i64;
        let latent = latent_batch(count, generator.latent_dim(), self.device, rng);
        let images = tch::no_grad(|| generator.forward_t(&latent, false));

        let grid = ImageGrid::from_images(&images, self.rows, self.cols).map_err(|e| {
            Error::RenderFailure {
                step,
                reason: e.to_string(),
            }
        })?;
        let path = self.renderer.render(&grid, step)?;

        info!("Saved samples for step {} to {}", step, path.display());
        Ok(grid)
    }
}
