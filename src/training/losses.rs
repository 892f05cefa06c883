//! Loss functions for GAN training
//!
//! The discriminator ends in a sigmoid, so losses work on probabilities.
//! Targets are smoothed and may fall outside [0, 1], which rules out
//! `binary_cross_entropy` (it rejects such targets); the cross entropy is
//! written out instead, with probabilities clamped away from 0 and 1.

use tch::{Kind, Tensor};

/// Clamp applied to probabilities before taking logs
pub const PROB_EPSILON: f64 = 1e-7;

/// Mean binary cross entropy: -[y log p + (1 - y) log(1 - p)]
///
/// # Arguments
///
/// * `probs` - Discriminator output in (0, 1), shape (batch, 1)
/// * `targets` - Target labels of the same shape, not necessarily in [0, 1]
///
/// # Returns
///
/// Scalar loss tensor
pub fn binary_cross_entropy(probs: &Tensor, targets: &Tensor) -> Tensor {
    let p = probs.clamp(PROB_EPSILON, 1.0 - PROB_EPSILON);
    let ones = Tensor::ones_like(targets);

    let pos = targets * p.log();
    let neg = (&ones - targets) * (Tensor::ones_like(&p) - &p).log();

    -(pos + neg).mean(Kind::Float)
}

/// Fraction of predictions on the same side of 0.5 as their target
///
/// Both prediction and target are thresholded at 0.5, so smoothed and
/// flipped labels count as whichever class they fall closest to.
pub fn binary_accuracy(probs: &Tensor, targets: &Tensor) -> f64 {
    let predicted = probs.ge(0.5);
    let expected = targets.ge(0.5);
    predicted
        .eq_tensor(&expected)
        .to_kind(Kind::Float)
        .mean(Kind::Float)
        .double_value(&[])
}

/// Discriminator loss on a single batch against its labels
pub fn discriminator_loss(probs: &Tensor, labels: &Tensor) -> Tensor {
    binary_cross_entropy(probs, labels)
}

/// Generator loss: cross entropy of D(G(z)) against "real" labels
pub fn generator_loss(fake_probs: &Tensor, real_labels: &Tensor) -> Tensor {
    binary_cross_entropy(fake_probs, real_labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    fn column(values: &[f32]) -> Tensor {
        Tensor::from_slice(values).view([values.len() as i64, 1])
    }

    #[test]
    fn test_bce_matches_closed_form() {
        let probs = column(&[0.8, 0.3]);
        let targets = column(&[1.0, 0.0]);
        let loss = binary_cross_entropy(&probs, &targets).double_value(&[]);

        let expected = -((0.8f64).ln() + (0.7f64).ln()) / 2.0;
        assert!((loss - expected).abs() < 1e-5);
    }

    #[test]
    fn test_bce_is_finite_at_saturation() {
        let probs = column(&[0.0, 1.0]);
        let targets = column(&[1.0, 0.0]);
        let loss = binary_cross_entropy(&probs, &targets).double_value(&[]);

        assert!(loss.is_finite());
        assert!(loss > 10.0);
    }

    #[test]
    fn test_bce_accepts_targets_outside_unit_interval() {
        let probs = Tensor::full([4, 1], 0.5, (Kind::Float, Device::Cpu));
        let targets = column(&[1.9, -0.4, 0.7, 0.0]);
        let loss = binary_cross_entropy(&probs, &targets);

        assert_eq!(loss.size(), Vec::<i64>::new());
        assert!(loss.double_value(&[]).is_finite());
    }

    #[test]
    fn test_perfect_discriminator() {
        let real = column(&[0.999, 0.999]);
        let fake = column(&[0.001, 0.001]);
        let ones = column(&[1.0, 1.0]);
        let zeros = column(&[0.0, 0.0]);

        assert!(discriminator_loss(&real, &ones).double_value(&[]) < 0.01);
        assert!(discriminator_loss(&fake, &zeros).double_value(&[]) < 0.01);
        assert!(generator_loss(&fake, &ones).double_value(&[]) > 5.0);
    }

    #[test]
    fn test_binary_accuracy_thresholds_both_sides() {
        let probs = column(&[0.9, 0.6, 0.2, 0.4]);
        let targets = column(&[0.8, -0.1, 0.1, 1.3]);

        // matches: 0.9/0.8 yes, 0.6/-0.1 no, 0.2/0.1 yes, 0.4/1.3 no
        assert!((binary_accuracy(&probs, &targets) - 0.5).abs() < 1e-9);
    }
}
