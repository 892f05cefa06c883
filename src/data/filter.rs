//! Restricting a dataset to a set of categories
//!
//! Filtering keeps the relative order of the source images. An empty result is
//! not an error here; `select_training_images` is the guard that turns it into
//! one before training starts.

use std::collections::BTreeSet;

use tch::{Kind, Tensor};
use tracing::{debug, info};

use super::dataset::LabeledImages;
use super::preprocessing::normalize_images;
use crate::error::{Error, Result};

/// Ascending indices of every label contained in `categories`
pub fn matching_indices(labels: &[i64], categories: &BTreeSet<i64>) -> Vec<i64> {
    labels
        .iter()
        .enumerate()
        .filter(|(_, label)| categories.contains(label))
        .map(|(idx, _)| idx as i64)
        .collect()
}

/// Keep only the images whose label is in `categories`
///
/// # Arguments
///
/// * `images` - Tensor of shape (N, C, H, W)
/// * `labels` - Labels of the N images, in the same order
/// * `categories` - Categories to keep
///
/// # Returns
///
/// Tensor of shape (M, C, H, W) with M <= N, in source order. M may be 0.
pub fn filter_by_category(
    images: &Tensor,
    labels: &[i64],
    categories: &BTreeSet<i64>,
) -> Tensor {
    let indices = matching_indices(labels, categories);
    debug!(
        "Category filter kept {} of {} images",
        indices.len(),
        labels.len()
    );
    let index = Tensor::from_slice(&indices)
        .to_kind(Kind::Int64)
        .to_device(images.device());
    images.index_select(0, &index)
}

/// Filter a dataset to `categories` and scale it to [-1, 1] for training
///
/// Fails with `DataUnavailableError` when nothing matches.
pub fn select_training_images(
    dataset: &LabeledImages,
    categories: &BTreeSet<i64>,
) -> Result<Tensor> {
    let labels = dataset.label_vec()?;
    let selected = filter_by_category(dataset.images(), &labels, categories);

    if selected.size()[0] == 0 {
        return Err(Error::DataUnavailableError {
            categories: categories.iter().copied().collect(),
            available: dataset.distinct_labels()?,
        });
    }

    info!(
        "Selected {} training images for categories {:?}",
        selected.size()[0],
        categories
    );
    Ok(normalize_images(&selected, 1.0))
}
