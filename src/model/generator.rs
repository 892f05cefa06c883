//! Generator network for DCGAN
//!
//! The Generator transforms random noise vectors into synthetic images.
//! Architecture uses transposed 2D convolutions to upsample from latent space.

use tch::{nn, nn::Module, nn::ModuleT, Tensor};

use super::ImageGenerator;
use crate::data::ImageShape;
use crate::error::{Error, Result};

/// Generator network configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Size of the latent noise vector
    pub latent_dim: i64,
    /// Shape of the generated images
    pub image_shape: ImageShape,
    /// Channels of the initial feature map, halved after each upsampling block
    pub base_filters: i64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            latent_dim: 100,
            image_shape: ImageShape::cifar10(),
            base_filters: 256,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.latent_dim <= 0 {
            return Err(Error::ConfigurationError(format!(
                "latent dimension must be > 0, got {}",
                self.latent_dim
            )));
        }
        if self.base_filters < 4 || self.base_filters % 4 != 0 {
            return Err(Error::ConfigurationError(format!(
                "generator base filters must be a positive multiple of 4, got {}",
                self.base_filters
            )));
        }
        self.image_shape.validate()
    }

    /// Spatial size of the projected feature map, a quarter of the output
    fn initial_size(&self) -> (i64, i64) {
        (self.image_shape.height / 4, self.image_shape.width / 4)
    }
}

pub(crate) fn batch_norm_config() -> nn::BatchNormConfig {
    nn::BatchNormConfig {
        eps: 1e-3,
        momentum: 0.01,
        ..Default::default()
    }
}

/// Generator network
///
/// Architecture:
/// 1. Dense projection from latent space to a (base, H/4, W/4) feature map
/// 2. ConvTranspose2d stride 2 + BatchNorm + LeakyReLU (base/2 channels)
/// 3. ConvTranspose2d stride 1 + BatchNorm + LeakyReLU (base/4 channels)
/// 4. ConvTranspose2d stride 2 to the image channels, Tanh
#[derive(Debug)]
pub struct Generator {
    config: GeneratorConfig,
    fc: nn::Linear,
    conv1: nn::ConvTranspose2D,
    bn1: nn::BatchNorm,
    conv2: nn::ConvTranspose2D,
    bn2: nn::BatchNorm,
    conv3: nn::ConvTranspose2D,
}

impl Generator {
    /// Create a new Generator network
    pub fn new(vs: &nn::Path, config: GeneratorConfig) -> Self {
        let base = config.base_filters;
        let (init_h, init_w) = config.initial_size();

        let fc = nn::linear(
            vs / "fc",
            config.latent_dim,
            base * init_h * init_w,
            Default::default(),
        );

        // k3 s2 p1 op1 doubles the spatial size
        let upsample = nn::ConvTransposeConfig {
            stride: 2,
            padding: 1,
            output_padding: 1,
            ..Default::default()
        };
        let same = nn::ConvTransposeConfig {
            stride: 1,
            padding: 1,
            ..Default::default()
        };

        let conv1 = nn::conv_transpose2d(vs / "conv1", base, base / 2, 3, upsample);
        let bn1 = nn::batch_norm2d(vs / "bn1", base / 2, batch_norm_config());

        let conv2 = nn::conv_transpose2d(vs / "conv2", base / 2, base / 4, 3, same);
        let bn2 = nn::batch_norm2d(vs / "bn2", base / 4, batch_norm_config());

        let conv3 = nn::conv_transpose2d(
            vs / "conv3",
            base / 4,
            config.image_shape.channels,
            3,
            upsample,
        );

        Self {
            config,
            fc,
            conv1,
            bn1,
            conv2,
            bn2,
            conv3,
        }
    }

    /// Generate images from noise
    ///
    /// # Arguments
    ///
    /// * `noise` - Tensor of shape (batch_size, latent_dim)
    /// * `train` - Whether in training mode (affects batch norm)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch_size, channels, height, width) in [-1, 1]
    pub fn forward_t(&self, noise: &Tensor, train: bool) -> Tensor {
        let batch_size = noise.size()[0];
        let (init_h, init_w) = self.config.initial_size();

        let x = self.fc.forward(noise);
        let x = x.view([batch_size, self.config.base_filters, init_h, init_w]);

        let x = self.conv1.forward(&x);
        let x = self.bn1.forward_t(&x, train);
        let x = x.leaky_relu();

        let x = self.conv2.forward(&x);
        let x = self.bn2.forward_t(&x, train);
        let x = x.leaky_relu();

        self.conv3.forward(&x).tanh()
    }

    /// Generate images (inference mode, no gradient tracking)
    pub fn generate(&self, noise: &Tensor) -> Tensor {
        tch::no_grad(|| self.forward_t(noise, false))
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}

impl ModuleT for Generator {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        Generator::forward_t(self, xs, train)
    }
}

impl ImageGenerator for Generator {
    fn latent_dim(&self) -> i64 {
        self.config.latent_dim
    }

    fn image_shape(&self) -> ImageShape {
        self.config.image_shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::VarStore, Device, Kind};

    fn small_config(shape: ImageShape) -> GeneratorConfig {
        GeneratorConfig {
            latent_dim: 16,
            image_shape: shape,
            base_filters: 32,
        }
    }

    #[test]
    fn test_generator_output_shape() {
        let vs = VarStore::new(Device::Cpu);
        let gen = Generator::new(&vs.root(), GeneratorConfig::default());

        let noise = Tensor::randn([4, 100], (Kind::Float, Device::Cpu));
        let output = gen.generate(&noise);

        assert_eq!(output.size(), vec![4, 3, 32, 32]);
    }

    #[test]
    fn test_generator_shape_for_any_batch_size() {
        let vs = VarStore::new(Device::Cpu);
        let shape = ImageShape::mnist();
        let gen = Generator::new(&vs.root(), small_config(shape));

        for batch in [1, 3, 16] {
            let noise = Tensor::randn([batch, 16], (Kind::Float, Device::Cpu));
            assert_eq!(gen.generate(&noise).size(), vec![batch, 1, 28, 28]);
        }
    }

    #[test]
    fn test_generator_output_range() {
        let vs = VarStore::new(Device::Cpu);
        let gen = Generator::new(&vs.root(), small_config(ImageShape::new(8, 8, 3)));

        let noise = Tensor::randn([32, 16], (Kind::Float, Device::Cpu)) * 10.0;
        let output = gen.forward_t(&noise, true);

        assert!(output.min().double_value(&[]) >= -1.0);
        assert!(output.max().double_value(&[]) <= 1.0);
    }

    #[test]
    fn test_generator_inference_is_deterministic() {
        let vs = VarStore::new(Device::Cpu);
        let gen = Generator::new(&vs.root(), small_config(ImageShape::new(8, 8, 1)));

        let noise = Tensor::randn([5, 16], (Kind::Float, Device::Cpu));
        let a = gen.generate(&noise);
        let b = gen.generate(&noise);

        assert!(a.equal(&b));
    }

    #[test]
    fn test_config_validation() {
        assert!(GeneratorConfig::default().validate().is_ok());

        let mut config = GeneratorConfig::default();
        config.latent_dim = 0;
        assert!(config.validate().is_err());

        let mut config = GeneratorConfig::default();
        config.base_filters = 6;
        assert!(config.validate().is_err());

        let mut config = GeneratorConfig::default();
        config.image_shape = ImageShape::new(30, 30, 3);
        assert!(config.validate().is_err());
    }
}
