//! Data module for loading and preparing training images
//!
//! This module provides:
//! - Labeled image datasets (CIFAR-10, MNIST, synthetic)
//! - Category filtering
//! - Pixel range conversions
//! - Random mini-batch sampling

mod batch;
mod dataset;
mod filter;
mod preprocessing;
mod shape;

pub use batch::BatchSampler;
pub use dataset::{parse_category, DatasetSource, LabeledImages, CIFAR10_CLASSES};
pub use filter::{filter_by_category, matching_indices, select_training_images};
pub use preprocessing::{normalize_images, to_display_range, to_u8, PIXEL_MAX_U8};
pub use shape::{ColorMode, ImageShape};
