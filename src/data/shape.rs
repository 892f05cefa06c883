//! Image geometry shared by the dataset, the models and the sampler

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-image shape, fixed for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub height: i64,
    pub width: i64,
    /// 1 (grayscale) or 3 (RGB)
    pub channels: i64,
}

impl Default for ImageShape {
    fn default() -> Self {
        Self::cifar10()
    }
}

impl ImageShape {
    pub fn new(height: i64, width: i64, channels: i64) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// 32x32 RGB
    pub fn cifar10() -> Self {
        Self::new(32, 32, 3)
    }

    /// 28x28 grayscale
    pub fn mnist() -> Self {
        Self::new(28, 28, 1)
    }

    /// Tensor dimensions of a single image in `[C, H, W]` order
    pub fn dims(&self) -> [i64; 3] {
        [self.channels, self.height, self.width]
    }

    /// Tensor dimensions of a batch in `[N, C, H, W]` order
    pub fn batch_dims(&self, batch_size: i64) -> [i64; 4] {
        [batch_size, self.channels, self.height, self.width]
    }

    /// Number of scalar values in one image
    pub fn num_values(&self) -> usize {
        (self.channels * self.height * self.width) as usize
    }

    /// Colour mode implied by the channel count
    pub fn color_mode(&self) -> Result<ColorMode> {
        ColorMode::from_channels(self.channels)
    }

    /// Check that the default generator / discriminator stacks can handle this shape
    ///
    /// The generator upsamples twice by a factor of two, so both sides must be
    /// divisible by 4, and at least 8 so every discriminator stage shrinks.
    pub fn validate(&self) -> Result<()> {
        self.color_mode()?;
        for (name, side) in [("height", self.height), ("width", self.width)] {
            if side < 8 || side % 4 != 0 {
                return Err(Error::ConfigurationError(format!(
                    "image {} must be a multiple of 4 and at least 8, got {}",
                    name, side
                )));
            }
        }
        Ok(())
    }
}

/// How sample grids are encoded, decided once from the channel count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Grayscale,
    Rgb,
}

impl ColorMode {
    pub fn from_channels(channels: i64) -> Result<Self> {
        match channels {
            1 => Ok(ColorMode::Grayscale),
            3 => Ok(ColorMode::Rgb),
            other => Err(Error::ConfigurationError(format!(
                "images must have 1 or 3 channels, got {}",
                other
            ))),
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            ColorMode::Grayscale => 1,
            ColorMode::Rgb => 3,
        }
    }
}
