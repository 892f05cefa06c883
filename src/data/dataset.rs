//! Labeled image datasets
//!
//! Images are held as a single `[N, C, H, W]` float tensor with values in
//! [0, 1] and a parallel `[N]` int64 label tensor. Loading from disk goes
//! through `tch::vision`, which already scales bytes to [0, 1].

use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tch::{Kind, Tensor};
use tracing::info;

use super::shape::ImageShape;
use crate::error::{Error, Result};

/// CIFAR-10 class names, indexed by label
pub const CIFAR10_CLASSES: [&str; 10] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

/// Parse a category given either as a label number or a CIFAR-10 class name
pub fn parse_category(value: &str) -> Result<i64> {
    let value = value.trim();
    if let Ok(label) = value.parse::<i64>() {
        return Ok(label);
    }
    CIFAR10_CLASSES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(value))
        .map(|idx| idx as i64)
        .ok_or_else(|| Error::ConfigurationError(format!("unknown category '{}'", value)))
}

/// Where training images come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetSource {
    /// CIFAR-10 binary batches (`data_batch_*.bin`)
    Cifar10 { dir: String },
    /// MNIST idx files (`train-images-idx3-ubyte`, ...)
    Mnist { dir: String },
    /// In-memory noise images, one block per class
    Synthetic {
        classes: Vec<i64>,
        images_per_class: usize,
        shape: ImageShape,
    },
}

impl Default for DatasetSource {
    fn default() -> Self {
        DatasetSource::Cifar10 {
            dir: "data/cifar-10-batches-bin".to_string(),
        }
    }
}

impl DatasetSource {
    /// Image shape this source produces
    pub fn image_shape(&self) -> ImageShape {
        match self {
            DatasetSource::Cifar10 { .. } => ImageShape::cifar10(),
            DatasetSource::Mnist { .. } => ImageShape::mnist(),
            DatasetSource::Synthetic { shape, .. } => *shape,
        }
    }

    /// Load the training split
    pub fn load<R: Rng>(&self, rng: &mut R) -> Result<LabeledImages> {
        let dataset = match self {
            DatasetSource::Cifar10 { dir } => {
                info!("Loading CIFAR-10 from {}", dir);
                let ds = tch::vision::cifar::load_dir(dir)
                    .map_err(|e| Error::DatasetError(format!("{}: {}", dir, e)))?;
                LabeledImages::new(ds.train_images, ds.train_labels)?
            }
            DatasetSource::Mnist { dir } => {
                info!("Loading MNIST from {}", dir);
                let ds = tch::vision::mnist::load_dir(dir)
                    .map_err(|e| Error::DatasetError(format!("{}: {}", dir, e)))?;
                let n = ds.train_images.size()[0];
                let shape = ImageShape::mnist();
                LabeledImages::new(ds.train_images.view(shape.batch_dims(n)), ds.train_labels)?
            }
            DatasetSource::Synthetic {
                classes,
                images_per_class,
                shape,
            } => {
                let counts: Vec<(i64, usize)> =
                    classes.iter().map(|&c| (c, *images_per_class)).collect();
                LabeledImages::synthetic(&counts, *shape, rng)
            }
        };

        info!(
            "Loaded {} images of shape {:?}",
            dataset.len(),
            dataset.image_shape()
        );
        Ok(dataset)
    }
}

/// Images with their integer class labels
#[derive(Debug)]
pub struct LabeledImages {
    images: Tensor,
    labels: Tensor,
}

impl LabeledImages {
    /// Wrap image and label tensors, checking that they line up
    pub fn new(images: Tensor, labels: Tensor) -> Result<Self> {
        let dims = images.size();
        if dims.len() != 4 {
            return Err(Error::DatasetError(format!(
                "images must be [N, C, H, W], got {:?}",
                dims
            )));
        }
        let label_dims = labels.size();
        if label_dims.len() != 1 || label_dims[0] != dims[0] {
            return Err(Error::DatasetError(format!(
                "expected {} labels, got shape {:?}",
                dims[0], label_dims
            )));
        }

        Ok(Self {
            images: images.to_kind(Kind::Float),
            labels: labels.to_kind(Kind::Int64),
        })
    }

    /// Build a dataset of noise images
    ///
    /// Each class gets a distinct base tone so the classes are separable.
    ///
    /// # Arguments
    ///
    /// * `class_sizes` - `(label, count)` pairs, emitted in order
    /// * `shape` - Shape of every image
    /// * `rng` - Source of pixel noise
    pub fn synthetic<R: Rng>(class_sizes: &[(i64, usize)], shape: ImageShape, rng: &mut R) -> Self {
        let per_image = shape.num_values();
        let total: usize = class_sizes.iter().map(|(_, n)| n).sum();

        let mut pixels = Vec::with_capacity(total * per_image);
        let mut labels = Vec::with_capacity(total);

        for &(label, count) in class_sizes {
            let tone = label.rem_euclid(10) as f32 / 9.0;
            for _ in 0..count {
                pixels.extend((0..per_image).map(|_| 0.5 * tone + 0.5 * rng.gen::<f32>()));
                labels.push(label);
            }
        }

        Self {
            images: Tensor::from_slice(&pixels).view(shape.batch_dims(total as i64)),
            labels: Tensor::from_slice(&labels),
        }
    }

    pub fn images(&self) -> &Tensor {
        &self.images
    }

    pub fn labels(&self) -> &Tensor {
        &self.labels
    }

    /// Labels copied out to host memory
    pub fn label_vec(&self) -> Result<Vec<i64>> {
        Ok(Vec::<i64>::try_from(&self.labels)?)
    }

    /// Sorted set of labels present in the dataset
    pub fn distinct_labels(&self) -> Result<Vec<i64>> {
        let set: BTreeSet<i64> = self.label_vec()?.into_iter().collect();
        Ok(set.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.labels.size()[0] as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn image_shape(&self) -> ImageShape {
        let dims = self.images.size();
        ImageShape::new(dims[2], dims[3], dims[1])
    }
}
