//! Noisy, smoothed targets for discriminator and generator updates
//!
//! Instead of hard 1s and 0s, every target is drawn from a normal
//! distribution, and a tenth of each batch is deliberately drawn from the
//! opposite class.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use tch::{Device, Tensor};

/// Mean of the "real" target distribution
pub const REAL_MEAN: f32 = 0.7;
/// Standard deviation of the "real" target distribution
pub const REAL_STD: f32 = 1.0;
/// Mean of the "fake" target distribution
pub const FAKE_MEAN: f32 = 0.0;
/// Standard deviation of the "fake" target distribution
pub const FAKE_STD: f32 = 0.3;
/// One in this many labels is flipped to the opposite class
pub const MISLABEL_DIVISOR: usize = 10;

/// Number of flipped labels in a batch of `batch_size`
pub fn mislabeled_count(batch_size: usize) -> usize {
    batch_size / MISLABEL_DIVISOR
}

/// Draws label vectors from the real and fake target distributions
#[derive(Debug, Clone, Copy)]
pub struct LabelSmoother {
    real: Normal<f32>,
    fake: Normal<f32>,
}

impl Default for LabelSmoother {
    fn default() -> Self {
        Self {
            real: normal(REAL_MEAN, REAL_STD),
            fake: normal(FAKE_MEAN, FAKE_STD),
        }
    }
}

fn normal(mean: f32, std: f32) -> Normal<f32> {
    match Normal::new(mean, std) {
        Ok(dist) => dist,
        Err(_) => unreachable!("label distributions use positive, finite constants"),
    }
}

impl LabelSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// Smoothed labels for one batch
    ///
    /// The majority block comes first, followed by `batch_size / 10` entries
    /// drawn from the opposite class. Batches smaller than 10 have no
    /// flipped entries.
    pub fn labels<R: Rng>(&self, is_real: bool, batch_size: usize, rng: &mut R) -> Vec<f32> {
        let flipped = mislabeled_count(batch_size);
        let (majority, minority) = if is_real {
            (&self.real, &self.fake)
        } else {
            (&self.fake, &self.real)
        };

        let mut labels: Vec<f32> = majority
            .sample_iter(&mut *rng)
            .take(batch_size - flipped)
            .collect();
        labels.extend(minority.sample_iter(&mut *rng).take(flipped));
        labels
    }

    /// Smoothed labels as a `[batch_size, 1]` tensor on `device`
    pub fn label_tensor<R: Rng>(
        &self,
        is_real: bool,
        batch_size: usize,
        device: Device,
        rng: &mut R,
    ) -> Tensor {
        let labels = self.labels(is_real, batch_size, rng);
        Tensor::from_slice(&labels)
            .view([batch_size as i64, 1])
            .to_device(device)
    }
}

/// Smoothed labels for one batch using the default distributions
pub fn smooth_labels<R: Rng>(is_real: bool, batch_size: usize, rng: &mut R) -> Vec<f32> {
    LabelSmoother::default().labels(is_real, batch_size, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn mean(values: &[f32]) -> f64 {
        values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
    }

    #[test]
    fn test_label_count() {
        let mut rng = StdRng::seed_from_u64(0);
        for batch in [1, 9, 10, 20, 32, 64] {
            assert_eq!(smooth_labels(true, batch, &mut rng).len(), batch);
            assert_eq!(smooth_labels(false, batch, &mut rng).len(), batch);
        }
    }

    #[test]
    fn test_mislabeled_count() {
        assert_eq!(mislabeled_count(9), 0);
        assert_eq!(mislabeled_count(10), 1);
        assert_eq!(mislabeled_count(32), 3);
        assert_eq!(mislabeled_count(64), 6);
    }

    #[test]
    fn test_real_label_distribution() {
        let mut rng = StdRng::seed_from_u64(7);
        let batch = 100_000;
        let labels = smooth_labels(true, batch, &mut rng);
        let flipped = mislabeled_count(batch);

        let majority = &labels[..batch - flipped];
        let minority = &labels[batch - flipped..];

        assert!((mean(majority) - 0.7).abs() < 0.02);
        assert!(mean(minority).abs() < 0.02);
    }

    #[test]
    fn test_fake_label_distribution_swaps_roles() {
        let mut rng = StdRng::seed_from_u64(8);
        let batch = 100_000;
        let labels = smooth_labels(false, batch, &mut rng);
        let flipped = mislabeled_count(batch);

        let majority = &labels[..batch - flipped];
        let minority = &labels[batch - flipped..];

        assert!(mean(majority).abs() < 0.01);
        assert!((mean(minority) - 0.7).abs() < 0.05);
    }

    #[test]
    fn test_label_tensor_shape() {
        let mut rng = StdRng::seed_from_u64(3);
        let labels = LabelSmoother::new().label_tensor(true, 20, Device::Cpu, &mut rng);
        assert_eq!(labels.size(), vec![20, 1]);
    }

    #[test]
    fn test_seeded_labels_reproducible() {
        let a = smooth_labels(true, 32, &mut StdRng::seed_from_u64(5));
        let b = smooth_labels(true, 32, &mut StdRng::seed_from_u64(5));
        assert_eq!(a, b);
    }
}
