//! Training module for DCGAN
//!
//! This module provides:
//! - The adversarial training loop and its state machine
//! - Smoothed, noisy labels
//! - Loss functions (Binary Cross Entropy) and accuracy
//! - Training history

mod labels;
mod losses;
mod metrics;
mod state;
mod trainer;

pub use labels::{mislabeled_count, smooth_labels, LabelSmoother};
pub use losses::{binary_accuracy, binary_cross_entropy, discriminator_loss, generator_loss};
pub use metrics::{StepRecord, TrainingHistory};
pub use state::{PhaseContext, StopHandle, TrainerState, TrainerStatus, TrainingObserver};
pub use trainer::{AdversarialTrainer, TrainingConfig};
