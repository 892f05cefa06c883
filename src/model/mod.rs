//! Model module containing GAN architecture components
//!
//! This module provides:
//! - Generator network mapping latent vectors to images
//! - Discriminator network scoring images as real or fake
//! - DCGAN wrapper owning both networks and the composite view used to
//!   train the generator through a frozen discriminator
//!
//! Both networks are pluggable: anything implementing [`ImageGenerator`] or
//! [`ImageDiscriminator`] can be handed to [`Dcgan::from_builders`].

mod dcgan;
mod discriminator;
mod generator;

use std::fmt;

use tch::nn::ModuleT;

use crate::data::ImageShape;

pub use dcgan::{latent_batch, parameter_checksum, CompositeModel, Dcgan, OptimizerConfig};
pub use discriminator::{Discriminator, DiscriminatorConfig};
pub use generator::{Generator, GeneratorConfig};

/// A network mapping `[batch, latent_dim]` noise to `[batch, C, H, W]` images in [-1, 1]
pub trait ImageGenerator: ModuleT {
    fn latent_dim(&self) -> i64;
    fn image_shape(&self) -> ImageShape;
}

/// A network mapping `[batch, C, H, W]` images to `[batch, 1]` probabilities of being real
pub trait ImageDiscriminator: ModuleT {
    fn image_shape(&self) -> ImageShape;
}

/// Which of the two networks an event or error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRole {
    Generator,
    Discriminator,
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRole::Generator => write!(f, "generator"),
            ModelRole::Discriminator => write!(f, "discriminator"),
        }
    }
}
