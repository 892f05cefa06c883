//! # DCGAN for Image Synthesis
//!
//! This crate trains a Deep Convolutional Generative Adversarial Network
//! (DCGAN) to synthesize small images resembling one or more categories of a
//! labeled image dataset such as CIFAR-10 or MNIST.
//!
//! ## Modules
//!
//! - `data`: Dataset loading, category filtering and batch sampling
//! - `model`: DCGAN architecture (Generator and Discriminator)
//! - `training`: Label smoothing, losses and the adversarial training loop
//! - `visualization`: Sample grids written during training
//! - `utils`: Configuration
//! - `error`: Error types

pub mod data;
pub mod error;
pub mod model;
pub mod training;
pub mod utils;
pub mod visualization;

pub use data::{filter_by_category, DatasetSource, ImageShape, LabeledImages};
pub use error::{Error, Result};
pub use model::{Dcgan, Discriminator, Generator, ImageDiscriminator, ImageGenerator, ModelRole};
pub use training::{smooth_labels, AdversarialTrainer, StopHandle, TrainerStatus, TrainingConfig, TrainingHistory};
pub use utils::Config;
pub use visualization::{GridSampler, Sampler};
