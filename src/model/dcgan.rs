//! DCGAN wrapper combining Generator and Discriminator
//!
//! Each network owns its own `VarStore`, so an optimizer built for one of them
//! can never touch the other's parameters. The generator is trained through a
//! [`CompositeModel`], which freezes the discriminator for as long as it lives.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tch::{nn, nn::ModuleT, nn::OptimizerConfig as _, nn::VarStore, Device, Kind, Tensor};

use super::discriminator::{Discriminator, DiscriminatorConfig};
use super::generator::{Generator, GeneratorConfig};
use super::{ImageDiscriminator, ImageGenerator, ModelRole};
use crate::data::ImageShape;
use crate::error::{Error, Result};

/// Adam settings shared by both networks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
        }
    }
}

impl OptimizerConfig {
    fn build(&self, vs: &VarStore) -> Result<nn::Optimizer> {
        let opt = nn::Adam {
            beta1: self.beta1,
            beta2: self.beta2,
            wd: 0.0,
            ..Default::default()
        }
        .build(vs, self.learning_rate)?;
        Ok(opt)
    }
}

/// Draw a `[batch_size, latent_dim]` batch of standard normal latent vectors
pub fn latent_batch<R: Rng>(batch_size: i64, latent_dim: i64, device: Device, rng: &mut R) -> Tensor {
    let values: Vec<f32> = (0..batch_size * latent_dim)
        .map(|_| rng.sample(StandardNormal))
        .collect();
    Tensor::from_slice(&values)
        .view([batch_size, latent_dim])
        .to_device(device)
}

/// Deterministic fingerprint of every variable in a store
///
/// Includes batch-norm running statistics, so any parameter or buffer update
/// changes the value.
pub fn parameter_checksum(vs: &VarStore) -> f64 {
    let mut vars: Vec<(String, Tensor)> = vs.variables().into_iter().collect();
    vars.sort_by(|a, b| a.0.cmp(&b.0));

    tch::no_grad(|| {
        vars.iter()
            .enumerate()
            .map(|(i, (_, t))| {
                let t = t.to_kind(Kind::Double);
                let sum = t.sum(Kind::Double).double_value(&[]);
                let sum_sq = (&t * &t).sum(Kind::Double).double_value(&[]);
                (sum + sum_sq) * (i + 1) as f64
            })
            .sum()
    })
}

/// Complete DCGAN model
pub struct Dcgan<G = Generator, D = Discriminator> {
    generator: G,
    discriminator: D,
    gen_vs: VarStore,
    disc_vs: VarStore,
    device: Device,
}

impl Dcgan {
    /// Create a new DCGAN model with the default architectures
    ///
    /// # Arguments
    ///
    /// * `gen_config` - Generator configuration
    /// * `disc_config` - Discriminator configuration
    /// * `device` - Device to create model on
    pub fn new(
        gen_config: GeneratorConfig,
        disc_config: DiscriminatorConfig,
        device: Device,
    ) -> Result<Self> {
        gen_config.validate()?;
        disc_config.validate()?;

        Self::from_builders(
            device,
            |p| Generator::new(p, gen_config),
            |p| Discriminator::new(p, disc_config),
        )
    }

    /// Create DCGAN with default filter counts for the given image shape
    pub fn with_defaults(image_shape: ImageShape, latent_dim: i64, device: Device) -> Result<Self> {
        let gen_config = GeneratorConfig {
            latent_dim,
            image_shape,
            ..Default::default()
        };
        let disc_config = DiscriminatorConfig {
            image_shape,
            ..Default::default()
        };

        Self::new(gen_config, disc_config, device)
    }
}

impl<G: ImageGenerator, D: ImageDiscriminator> Dcgan<G, D> {
    /// Create a DCGAN from arbitrary network builders
    ///
    /// Each builder receives the root path of a fresh `VarStore` on `device`.
    pub fn from_builders<FG, FD>(device: Device, build_gen: FG, build_disc: FD) -> Result<Self>
    where
        FG: FnOnce(&nn::Path) -> G,
        FD: FnOnce(&nn::Path) -> D,
    {
        let gen_vs = VarStore::new(device);
        let disc_vs = VarStore::new(device);

        let generator = build_gen(&gen_vs.root());
        let discriminator = build_disc(&disc_vs.root());

        if generator.image_shape() != discriminator.image_shape() {
            return Err(Error::ConfigurationError(format!(
                "generator produces {:?} but discriminator expects {:?}",
                generator.image_shape(),
                discriminator.image_shape()
            )));
        }

        Ok(Self {
            generator,
            discriminator,
            gen_vs,
            disc_vs,
            device,
        })
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn discriminator(&self) -> &D {
        &self.discriminator
    }

    pub fn gen_vs(&self) -> &VarStore {
        &self.gen_vs
    }

    pub fn disc_vs(&self) -> &VarStore {
        &self.disc_vs
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn latent_dim(&self) -> i64 {
        self.generator.latent_dim()
    }

    pub fn image_shape(&self) -> ImageShape {
        self.generator.image_shape()
    }

    /// Adam optimizer over the generator's parameters only
    pub fn gen_optimizer(&self, config: &OptimizerConfig) -> Result<nn::Optimizer> {
        config.build(&self.gen_vs)
    }

    /// Adam optimizer over the discriminator's parameters only
    pub fn disc_optimizer(&self, config: &OptimizerConfig) -> Result<nn::Optimizer> {
        config.build(&self.disc_vs)
    }

    /// Draw latent vectors for this model
    pub fn sample_latent<R: Rng>(&self, batch_size: i64, rng: &mut R) -> Tensor {
        latent_batch(batch_size, self.latent_dim(), self.device, rng)
    }

    /// Generate images from latent vectors (inference mode)
    pub fn generate(&self, latent: &Tensor) -> Tensor {
        tch::no_grad(|| self.generator.forward_t(latent, false))
    }

    /// Probability of each image being real (inference mode)
    pub fn discriminate(&self, images: &Tensor) -> Tensor {
        tch::no_grad(|| self.discriminator.forward_t(images, false))
    }

    /// Chain generator into a frozen discriminator
    ///
    /// The discriminator is unfrozen again when the returned view is dropped.
    pub fn composite(&mut self) -> CompositeModel<'_, G, D> {
        self.disc_vs.freeze();
        CompositeModel {
            generator: &self.generator,
            discriminator: &self.discriminator,
            disc_vs: &mut self.disc_vs,
        }
    }

    /// Checksum of one network's variables
    pub fn checksum(&self, role: ModelRole) -> f64 {
        match role {
            ModelRole::Generator => parameter_checksum(&self.gen_vs),
            ModelRole::Discriminator => parameter_checksum(&self.disc_vs),
        }
    }
}

/// Generator followed by a frozen discriminator
///
/// The discriminator runs in inference mode so its batch-norm statistics are
/// not updated either.
pub struct CompositeModel<'a, G, D> {
    generator: &'a G,
    discriminator: &'a D,
    disc_vs: &'a mut VarStore,
}

impl<'a, G: ImageGenerator, D: ImageDiscriminator> CompositeModel<'a, G, D> {
    /// Score freshly generated images; gradients flow back into the generator only
    pub fn forward(&self, latent: &Tensor) -> Tensor {
        let fake = self.generator.forward_t(latent, true);
        self.discriminator.forward_t(&fake, false)
    }

    /// Whether every trainable discriminator variable is excluded from autograd
    pub fn discriminator_frozen(&self) -> bool {
        self.disc_vs
            .trainable_variables()
            .iter()
            .all(|t| !t.requires_grad())
    }
}

impl<'a, G, D> Drop for CompositeModel<'a, G, D> {
    fn drop(&mut self) {
        self.disc_vs.unfreeze();
    }
}
