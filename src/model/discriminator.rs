//! Discriminator network for DCGAN
//!
//! The Discriminator classifies images as real or fake.
//! Architecture uses strided 2D convolutions to downsample and extract features.

use tch::{nn, nn::Module, nn::ModuleT, Tensor};

use super::generator::batch_norm_config;
use super::ImageDiscriminator;
use crate::data::ImageShape;
use crate::error::{Error, Result};

/// Discriminator network configuration
#[derive(Debug, Clone)]
pub struct DiscriminatorConfig {
    /// Shape of the input images
    pub image_shape: ImageShape,
    /// Channels of the first convolution, doubled at each later stage
    pub base_filters: i64,
}

impl Default for DiscriminatorConfig {
    fn default() -> Self {
        Self {
            image_shape: ImageShape::cifar10(),
            base_filters: 32,
        }
    }
}

/// Output size of a k3 s2 p1 convolution
fn downsampled(n: i64) -> i64 {
    (n - 1) / 2 + 1
}

impl DiscriminatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_filters <= 0 {
            return Err(Error::ConfigurationError(format!(
                "discriminator base filters must be > 0, got {}",
                self.base_filters
            )));
        }
        self.image_shape.validate()
    }

    /// Spatial (height, width) at the input and after each of the three stages
    pub fn stage_sizes(&self) -> Vec<(i64, i64)> {
        let mut sizes = vec![(self.image_shape.height, self.image_shape.width)];
        for _ in 0..3 {
            let (h, w) = sizes[sizes.len() - 1];
            sizes.push((downsampled(h), downsampled(w)));
        }
        sizes
    }

    fn flat_size(&self) -> i64 {
        let (h, w) = self.stage_sizes()[3];
        self.base_filters * 4 * h * w
    }
}

/// Discriminator network
///
/// Architecture:
/// 1. Conv2d stride 2 + LeakyReLU
/// 2. Two Conv2d stride 2 + BatchNorm + LeakyReLU stages
/// 3. Flatten and Dense layer with Sigmoid
#[derive(Debug)]
pub struct Discriminator {
    config: DiscriminatorConfig,
    conv1: nn::Conv2D,
    conv2: nn::Conv2D,
    bn2: nn::BatchNorm,
    conv3: nn::Conv2D,
    bn3: nn::BatchNorm,
    fc: nn::Linear,
}

impl Discriminator {
    /// Create a new Discriminator network
    pub fn new(vs: &nn::Path, config: DiscriminatorConfig) -> Self {
        let base = config.base_filters;

        let conv_config = nn::ConvConfig {
            stride: 2,
            padding: 1,
            ..Default::default()
        };

        let conv1 = nn::conv2d(vs / "conv1", config.image_shape.channels, base, 3, conv_config);
        let conv2 = nn::conv2d(vs / "conv2", base, base * 2, 3, conv_config);
        let bn2 = nn::batch_norm2d(vs / "bn2", base * 2, batch_norm_config());
        let conv3 = nn::conv2d(vs / "conv3", base * 2, base * 4, 3, conv_config);
        let bn3 = nn::batch_norm2d(vs / "bn3", base * 4, batch_norm_config());

        let fc = nn::linear(vs / "fc", config.flat_size(), 1, Default::default());

        Self {
            config,
            conv1,
            conv2,
            bn2,
            conv3,
            bn3,
            fc,
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    ///
    /// * `input` - Tensor of shape (batch_size, channels, height, width)
    /// * `train` - Whether in training mode (affects batch norm)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch_size, 1) with probabilities of being real
    pub fn forward_t(&self, input: &Tensor, train: bool) -> Tensor {
        let x = self.conv1.forward(input).leaky_relu();

        let x = self.conv2.forward(&x);
        let x = self.bn2.forward_t(&x, train).leaky_relu();

        let x = self.conv3.forward(&x);
        let x = self.bn3.forward_t(&x, train).leaky_relu();

        let batch_size = x.size()[0];
        let x = x.view([batch_size, -1]);

        self.fc.forward(&x).sigmoid()
    }

    /// Classify samples (inference mode, no gradient tracking)
    pub fn classify(&self, input: &Tensor) -> Tensor {
        tch::no_grad(|| self.forward_t(input, false))
    }

    pub fn config(&self) -> &DiscriminatorConfig {
        &self.config
    }
}

impl ModuleT for Discriminator {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        Discriminator::forward_t(self, xs, train)
    }
}

impl ImageDiscriminator for Discriminator {
    fn image_shape(&self) -> ImageShape {
        self.config.image_shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::VarStore, Device, Kind};

    #[test]
    fn test_discriminator_output_shape() {
        let vs = VarStore::new(Device::Cpu);
        let disc = Discriminator::new(&vs.root(), DiscriminatorConfig::default());

        let input = Tensor::randn([4, 3, 32, 32], (Kind::Float, Device::Cpu));
        let output = disc.forward_t(&input, false);

        assert_eq!(output.size(), vec![4, 1]);
    }

    #[test]
    fn test_discriminator_classify() {
        let vs = VarStore::new(Device::Cpu);
        let config = DiscriminatorConfig {
            image_shape: ImageShape::mnist(),
            base_filters: 8,
        };
        let disc = Discriminator::new(&vs.root(), config);

        let input = Tensor::rand([6, 1, 28, 28], (Kind::Float, Device::Cpu)) * 2.0 - 1.0;
        let probs = disc.classify(&input);

        // Probabilities should be strictly inside (0, 1)
        assert_eq!(probs.size(), vec![6, 1]);
        assert!(probs.min().double_value(&[]) > 0.0);
        assert!(probs.max().double_value(&[]) < 1.0);
    }

    #[test]
    fn test_stage_sizes_strictly_decrease() {
        for shape in [ImageShape::cifar10(), ImageShape::mnist(), ImageShape::new(8, 8, 1)] {
            let config = DiscriminatorConfig {
                image_shape: shape,
                base_filters: 8,
            };
            let sizes = config.stage_sizes();
            assert_eq!(sizes.len(), 4);
            for pair in sizes.windows(2) {
                assert!(pair[1].0 < pair[0].0);
                assert!(pair[1].1 < pair[0].1);
            }
        }
    }

    #[test]
    fn test_cifar_stage_sizes() {
        let config = DiscriminatorConfig::default();
        assert_eq!(
            config.stage_sizes(),
            vec![(32, 32), (16, 16), (8, 8), (4, 4)]
        );
    }
}
