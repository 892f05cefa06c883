//! Random mini-batch sampling for GAN training
//!
//! Each training step draws its real batch independently, uniformly and with
//! replacement, so there is no notion of an epoch boundary.

use rand::Rng;
use tch::{Device, Kind, Tensor};

use crate::error::{Error, Result};

/// Draws random batches from a fixed training tensor
#[derive(Debug)]
pub struct BatchSampler {
    /// Training images of shape (num_images, C, H, W), already on `device`
    images: Tensor,
    /// Number of images per batch
    batch_size: usize,
    device: Device,
}

impl BatchSampler {
    /// Create a new sampler
    ///
    /// # Arguments
    ///
    /// * `images` - Training images, first dimension indexes images
    /// * `batch_size` - Number of images per batch
    /// * `device` - Device the batches should live on
    pub fn new(images: Tensor, batch_size: usize, device: Device) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::ConfigurationError(
                "batch size must be > 0".to_string(),
            ));
        }
        if images.size().first().copied().unwrap_or(0) == 0 {
            return Err(Error::DatasetError(
                "cannot sample batches from an empty image set".to_string(),
            ));
        }

        Ok(Self {
            images: images.to_device(device),
            batch_size,
            device,
        })
    }

    /// Uniform indices in `[0, num_images)`, drawn with replacement
    pub fn sample_indices<R: Rng>(&self, rng: &mut R) -> Vec<i64> {
        let n = self.num_images() as i64;
        (0..self.batch_size).map(|_| rng.gen_range(0..n)).collect()
    }

    /// Gather one random batch of shape (batch_size, C, H, W)
    pub fn next_batch<R: Rng>(&self, rng: &mut R) -> Tensor {
        let indices = self.sample_indices(rng);
        let index = Tensor::from_slice(&indices)
            .to_kind(Kind::Int64)
            .to_device(self.device);
        self.images.index_select(0, &index)
    }

    pub fn num_images(&self) -> usize {
        self.images.size()[0] as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_batch_shape() {
        let images = Tensor::zeros([10, 3, 8, 8], (Kind::Float, Device::Cpu));
        let sampler = BatchSampler::new(images, 20, Device::Cpu).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        // Larger than the dataset is fine: sampling is with replacement
        let batch = sampler.next_batch(&mut rng);
        assert_eq!(batch.size(), vec![20, 3, 8, 8]);
    }

    #[test]
    fn test_indices_in_range() {
        let images = Tensor::zeros([7, 1, 8, 8], (Kind::Float, Device::Cpu));
        let sampler = BatchSampler::new(images, 50, Device::Cpu).unwrap();
        let mut rng = StdRng::seed_from_u64(11);

        let indices = sampler.sample_indices(&mut rng);
        assert_eq!(indices.len(), 50);
        assert!(indices.iter().all(|&i| (0..7).contains(&i)));
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let images = Tensor::zeros([100, 1, 8, 8], (Kind::Float, Device::Cpu));
        let sampler = BatchSampler::new(images, 16, Device::Cpu).unwrap();

        let a = sampler.sample_indices(&mut StdRng::seed_from_u64(42));
        let b = sampler.sample_indices(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_images_rejected() {
        let images = Tensor::zeros([0, 1, 8, 8], (Kind::Float, Device::Cpu));
        assert!(BatchSampler::new(images, 4, Device::Cpu).is_err());
    }
}
