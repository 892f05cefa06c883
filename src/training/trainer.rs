//! Training loop implementation for DCGAN
//!
//! Every step updates the discriminator on a real batch and on a fake batch,
//! then updates the generator through the frozen discriminator. Losses are
//! checked before each optimizer step; a non-finite loss fails the run
//! without recording the step.

use std::collections::BTreeSet;
use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use tch::{nn, nn::ModuleT, Tensor};
use tracing::{debug, info, warn};

use super::labels::{mislabeled_count, LabelSmoother};
use super::losses::{binary_accuracy, discriminator_loss, generator_loss};
use super::metrics::{StepRecord, TrainingHistory};
use super::state::{PhaseContext, StopHandle, TrainerState, TrainerStatus, TrainingObserver};
use crate::data::{select_training_images, BatchSampler, LabeledImages};
use crate::error::{Error, Result};
use crate::model::{
    Dcgan, Discriminator, Generator, ImageDiscriminator, ImageGenerator, ModelRole,
    OptimizerConfig,
};
use crate::visualization::Sampler;

/// Training configuration
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Total number of training steps (one batch each)
    pub epochs: usize,
    /// Images per batch, for both real and fake batches
    pub batch_size: usize,
    /// Call the sampler every N steps, starting at step 0
    pub sample_interval: usize,
    /// Dataset labels to train on
    pub categories: BTreeSet<i64>,
    /// Adam settings for both networks
    pub optimizer: OptimizerConfig,
    /// Seed for batch, latent and label sampling
    pub seed: u64,
    /// Draw new smoothed labels every step instead of once per run
    pub refresh_labels_each_step: bool,
    /// Window for the mode-collapse heuristic
    pub collapse_window: usize,
    /// Show a progress bar
    pub show_progress: bool,
    /// Where to write the history CSV at the end of the run
    pub history_path: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 1_000_000,
            batch_size: 32,
            sample_interval: 1000,
            categories: [7].into_iter().collect(),
            optimizer: OptimizerConfig::default(),
            seed: 42,
            refresh_labels_each_step: true,
            collapse_window: 100,
            show_progress: true,
            history_path: None,
        }
    }
}

impl TrainingConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::ConfigurationError(msg));

        if self.epochs == 0 {
            return invalid("number of epochs must be > 0".to_string());
        }
        if self.batch_size < 10 {
            return invalid(format!(
                "batch size must be at least 10 so a tenth of each label batch can be flipped, got {}",
                self.batch_size
            ));
        }
        if self.sample_interval == 0 {
            return invalid("sample interval must be > 0".to_string());
        }
        if self.categories.is_empty() {
            return invalid("at least one category is required".to_string());
        }
        if self.collapse_window == 0 {
            return invalid("collapse window must be > 0".to_string());
        }
        if self.optimizer.learning_rate <= 0.0 || !self.optimizer.learning_rate.is_finite() {
            return invalid(format!(
                "learning rate must be a positive number, got {}",
                self.optimizer.learning_rate
            ));
        }

        if self.batch_size % 10 != 0 {
            warn!(
                "Batch size {} is not a multiple of 10; {} labels per batch will be flipped",
                self.batch_size,
                mislabeled_count(self.batch_size)
            );
        }
        Ok(())
    }
}

/// Drives alternating discriminator and generator updates
pub struct AdversarialTrainer<G = Generator, D = Discriminator> {
    config: TrainingConfig,
    model: Dcgan<G, D>,
    batches: BatchSampler,
    labels: LabelSmoother,
    gen_opt: nn::Optimizer,
    disc_opt: nn::Optimizer,
    /// (real, fake) labels reused by every step when not refreshed
    fixed_labels: Option<(Tensor, Tensor)>,
    sampler: Option<Box<dyn Sampler>>,
    observers: Vec<Box<dyn TrainingObserver>>,
    state: TrainerState,
    stop: StopHandle,
}

impl<G: ImageGenerator, D: ImageDiscriminator> AdversarialTrainer<G, D> {
    /// Create a trainer over already-filtered training images
    ///
    /// # Arguments
    ///
    /// * `config` - Training configuration
    /// * `model` - Generator / discriminator pair to train
    /// * `training_images` - Tensor of shape (N, C, H, W) with values in [-1, 1]
    pub fn new(config: TrainingConfig, model: Dcgan<G, D>, training_images: Tensor) -> Result<Self> {
        config.validate()?;

        let dims = training_images.size();
        if dims.first().copied().unwrap_or(0) == 0 {
            return Err(Error::DataUnavailableError {
                categories: config.categories.iter().copied().collect(),
                available: Vec::new(),
            });
        }
        let expected = model.image_shape().dims();
        if dims[1..] != expected[..] {
            return Err(Error::ConfigurationError(format!(
                "training images have shape {:?} but the model expects {:?}",
                &dims[1..],
                expected
            )));
        }

        let batches = BatchSampler::new(training_images, config.batch_size, model.device())?;
        let gen_opt = model.gen_optimizer(&config.optimizer)?;
        let disc_opt = model.disc_optimizer(&config.optimizer)?;
        let state = TrainerState::new(config.seed);

        Ok(Self {
            config,
            model,
            batches,
            labels: LabelSmoother::new(),
            gen_opt,
            disc_opt,
            fixed_labels: None,
            sampler: None,
            observers: Vec::new(),
            state,
            stop: StopHandle::new(),
        })
    }

    /// Filter a labeled dataset to the configured categories and build a trainer
    ///
    /// Fails with `DataUnavailableError` before any step if nothing matches.
    pub fn from_dataset(config: TrainingConfig, model: Dcgan<G, D>, dataset: &LabeledImages) -> Result<Self> {
        let images = select_training_images(dataset, &config.categories)?;
        Self::new(config, model, images)
    }

    /// Attach the sampler called every `sample_interval` steps
    pub fn with_sampler(mut self, sampler: Box<dyn Sampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn TrainingObserver>) {
        self.observers.push(observer);
    }

    /// Handle that stops the run before its next step
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn status(&self) -> &TrainerStatus {
        self.state.status()
    }

    pub fn history(&self) -> &TrainingHistory {
        self.state.history()
    }

    pub fn state(&self) -> &TrainerState {
        &self.state
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn model(&self) -> &Dcgan<G, D> {
        &self.model
    }

    /// Consume the trainer, returning the trained model and final state
    pub fn into_parts(self) -> (Dcgan<G, D>, TrainerState) {
        (self.model, self.state)
    }

    /// Run the training loop until all steps complete, a stop is requested,
    /// or a step fails
    pub fn run(&mut self) -> Result<&TrainingHistory> {
        if self.state.status != TrainerStatus::Initialized {
            return Err(Error::ConfigurationError(format!(
                "trainer cannot run from state {:?}",
                self.state.status
            )));
        }

        info!(
            "Starting training for {} steps: batch size {}, {} training images, categories {:?}",
            self.config.epochs,
            self.config.batch_size,
            self.batches.num_images(),
            self.config.categories
        );

        if !self.config.refresh_labels_each_step {
            let real = self.draw_labels(true);
            let fake = self.draw_labels(false);
            self.fixed_labels = Some((real, fake));
        }

        let pb = self.progress_bar();
        let mut cancelled = false;

        for step in 0..self.config.epochs {
            if self.stop.is_stop_requested() {
                info!("Stop requested, ending training before step {}", step);
                cancelled = true;
                break;
            }

            self.state.status = TrainerStatus::Running { step };

            let record = match self.train_step(step) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Training failed at step {}: {}", step, e);
                    self.state.status = TrainerStatus::Failed {
                        step,
                        reason: e.to_string(),
                    };
                    pb.abandon_with_message(format!("failed at step {}", step));
                    return Err(e);
                }
            };

            self.state.history.record(record);
            for observer in self.observers.iter_mut() {
                observer.on_step_end(&record);
            }

            debug!(
                "{} [D loss: {:.6}, acc.: {:.2}%] [G loss: {:.6}]",
                step,
                record.disc_loss,
                record.disc_accuracy * 100.0,
                record.gen_loss
            );
            pb.set_message(format!(
                "D: {:.4}, acc: {:.1}%, G: {:.4}",
                record.disc_loss,
                record.disc_accuracy * 100.0,
                record.gen_loss
            ));
            pb.inc(1);

            if step % self.config.sample_interval == 0 {
                info!(
                    "{} [D loss: {:.6}, acc.: {:.2}%] [G loss: {:.6}]",
                    step,
                    record.disc_loss,
                    record.disc_accuracy * 100.0,
                    record.gen_loss
                );
                self.sample(step);
            }

            let window = self.config.collapse_window;
            if (step + 1) % window == 0 && self.state.history.check_mode_collapse(window) {
                warn!(
                    "Possible mode collapse detected at step {} (D acc. over last {} steps: {:.2}%)! Consider adjusting learning rates.",
                    step,
                    window,
                    self.state.history.disc_accuracy_ma(window) * 100.0
                );
            }
        }

        let steps_completed = self.state.history.len();
        self.state.status = TrainerStatus::Stopped {
            steps_completed,
            cancelled,
        };
        pb.finish_with_message("done");

        if let Some(latest) = self.state.history.latest() {
            info!(
                "Training finished after {} steps. Final D_loss: {:.4}, acc: {:.2}%, G_loss: {:.4}",
                steps_completed,
                latest.disc_loss,
                latest.disc_accuracy * 100.0,
                latest.gen_loss
            );
        }

        if let Some(path) = &self.config.history_path {
            if let Err(e) = self.state.history.save_csv(path) {
                warn!("Failed to save training history: {}", e);
            } else {
                info!("Saved training history to {}", path.display());
            }
        }

        Ok(&self.state.history)
    }

    /// One full iteration; nothing is recorded if it fails
    fn train_step(&mut self, step: usize) -> Result<StepRecord> {
        let batch_size = self.config.batch_size as i64;

        let real = self.batches.next_batch(&mut self.state.rng);
        let latent = self.model.sample_latent(batch_size, &mut self.state.rng);
        let fake = self.model.generate(&latent);

        let fixed = self
            .fixed_labels
            .as_ref()
            .map(|(real, fake)| (real.shallow_clone(), fake.shallow_clone()));
        let (real_labels, fake_labels) = match fixed {
            Some(pair) => pair,
            None => (self.draw_labels(true), self.draw_labels(false)),
        };

        self.notify_phase(step, ModelRole::Discriminator, true);
        let (loss_real, acc_real) = self.update_discriminator(step, &real, &real_labels)?;
        let (loss_fake, acc_fake) = self.update_discriminator(step, &fake, &fake_labels)?;
        self.notify_phase(step, ModelRole::Discriminator, false);

        let latent = self.model.sample_latent(batch_size, &mut self.state.rng);

        self.notify_phase(step, ModelRole::Generator, true);
        let gen_loss = self.update_generator(step, &latent, &real_labels)?;
        self.notify_phase(step, ModelRole::Generator, false);

        Ok(StepRecord {
            step,
            disc_loss: 0.5 * (loss_real + loss_fake),
            gen_loss,
            disc_accuracy: 0.5 * (acc_real + acc_fake),
        })
    }

    /// One discriminator optimizer step, returning (loss, accuracy) before the update
    fn update_discriminator(&mut self, step: usize, images: &Tensor, labels: &Tensor) -> Result<(f64, f64)> {
        let probs = self.model.discriminator().forward_t(images, true);
        let loss = discriminator_loss(&probs, labels);

        let value = loss.double_value(&[]);
        if !value.is_finite() {
            return Err(Error::NumericalInstabilityError {
                step,
                model: ModelRole::Discriminator,
                value,
            });
        }

        self.disc_opt.zero_grad();
        loss.backward();
        self.disc_opt.step();

        let accuracy = tch::no_grad(|| binary_accuracy(&probs, labels));
        Ok((value, accuracy))
    }

    /// One generator optimizer step through the composite model
    fn update_generator(&mut self, step: usize, latent: &Tensor, labels: &Tensor) -> Result<f64> {
        let composite = self.model.composite();
        let probs = composite.forward(latent);
        let loss = generator_loss(&probs, labels);

        let value = loss.double_value(&[]);
        if !value.is_finite() {
            return Err(Error::NumericalInstabilityError {
                step,
                model: ModelRole::Generator,
                value,
            });
        }

        self.gen_opt.zero_grad();
        loss.backward();
        self.gen_opt.step();

        Ok(value)
    }

    fn draw_labels(&mut self, is_real: bool) -> Tensor {
        self.labels.label_tensor(
            is_real,
            self.config.batch_size,
            self.model.device(),
            &mut self.state.rng,
        )
    }

    fn notify_phase(&mut self, step: usize, role: ModelRole, start: bool) {
        if self.observers.is_empty() {
            return;
        }
        let ctx = PhaseContext {
            step,
            role,
            gen_vs: self.model.gen_vs(),
            disc_vs: self.model.disc_vs(),
        };
        for observer in self.observers.iter_mut() {
            if start {
                observer.on_phase_start(&ctx);
            } else {
                observer.on_phase_end(&ctx);
            }
        }
    }

    /// Invoke the sampler; failures are logged and training continues
    fn sample(&mut self, step: usize) {
        if let Some(sampler) = self.sampler.as_mut() {
            match sampler.sample(self.model.generator(), step, &mut self.state.rng) {
                Ok(grid) => debug!(
                    "Sampled a {}x{} grid at step {}",
                    grid.rows(),
                    grid.cols(),
                    step
                ),
                Err(e) => warn!("Sampling at step {} failed, continuing: {}", step, e),
            }
        }
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(self.config.epochs as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("##-"));
        }
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ImageShape;
    use crate::model::{DiscriminatorConfig, GeneratorConfig};
    use tch::{Device, Kind};

    fn small_model() -> Dcgan {
        let shape = ImageShape::new(8, 8, 1);
        Dcgan::new(
            GeneratorConfig {
                latent_dim: 8,
                image_shape: shape,
                base_filters: 8,
            },
            DiscriminatorConfig {
                image_shape: shape,
                base_filters: 4,
            },
            Device::Cpu,
        )
        .unwrap()
    }

    fn quiet_config(epochs: usize) -> TrainingConfig {
        TrainingConfig {
            epochs,
            batch_size: 10,
            sample_interval: 1,
            show_progress: false,
            ..Default::default()
        }
    }

    fn images(n: i64) -> Tensor {
        Tensor::rand([n, 1, 8, 8], (Kind::Float, Device::Cpu)) * 2.0 - 1.0
    }

    #[test]
    fn test_training_config_default() {
        let config = TrainingConfig::default();
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.sample_interval, 1000);
        assert!(config.categories.contains(&7));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = quiet_config(1);
        config.batch_size = 9;
        assert!(matches!(config.validate(), Err(Error::ConfigurationError(_))));

        let mut config = quiet_config(1);
        config.sample_interval = 0;
        assert!(config.validate().is_err());

        let mut config = quiet_config(0);
        config.epochs = 0;
        assert!(config.validate().is_err());

        let mut config = quiet_config(1);
        config.categories.clear();
        assert!(config.validate().is_err());

        // Not a multiple of 10 only warns
        let mut config = quiet_config(1);
        config.batch_size = 25;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_run_records_every_step() {
        let mut trainer = AdversarialTrainer::new(quiet_config(3), small_model(), images(30)).unwrap();
        assert_eq!(trainer.status(), &TrainerStatus::Initialized);

        let history = trainer.run().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(
            history.records().iter().map(|r| r.step).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        for r in history.records() {
            assert!(r.disc_loss.is_finite() && r.gen_loss.is_finite());
            assert!((0.0..=1.0).contains(&r.disc_accuracy));
        }
        assert_eq!(
            trainer.status(),
            &TrainerStatus::Stopped {
                steps_completed: 3,
                cancelled: false
            }
        );
    }

    #[test]
    fn test_stop_before_first_step() {
        let mut trainer = AdversarialTrainer::new(quiet_config(5), small_model(), images(20)).unwrap();
        trainer.stop_handle().request_stop();

        assert!(trainer.run().unwrap().is_empty());
        assert_eq!(
            trainer.status(),
            &TrainerStatus::Stopped {
                steps_completed: 0,
                cancelled: true
            }
        );
    }

    #[test]
    fn test_cannot_run_twice() {
        let mut trainer = AdversarialTrainer::new(quiet_config(1), small_model(), images(20)).unwrap();
        trainer.run().unwrap();
        assert!(trainer.run().is_err());
    }

    #[test]
    fn test_non_finite_data_fails_without_recording() {
        let poisoned = Tensor::full([20, 1, 8, 8], f64::NAN, (Kind::Float, Device::Cpu));
        let mut trainer = AdversarialTrainer::new(quiet_config(4), small_model(), poisoned).unwrap();
        let gen_before = trainer.model().checksum(ModelRole::Generator);

        match trainer.run() {
            Err(Error::NumericalInstabilityError { step, model, .. }) => {
                assert_eq!(step, 0);
                assert_eq!(model, ModelRole::Discriminator);
            }
            other => panic!("expected NumericalInstabilityError, got {:?}", other.map(|h| h.len())),
        }
        assert!(trainer.history().is_empty());
        assert!(matches!(trainer.status(), TrainerStatus::Failed { step: 0, .. }));
        // The generator phase of the failed step never ran
        assert_eq!(trainer.model().checksum(ModelRole::Generator), gen_before);
    }

    /// Default generator whose output turns to NaN in training mode only
    #[derive(Debug)]
    struct NanWhenTraining(Generator);

    impl ModuleT for NanWhenTraining {
        fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
            let out = self.0.forward_t(xs, train);
            if train {
                out * f64::NAN
            } else {
                out
            }
        }
    }

    impl ImageGenerator for NanWhenTraining {
        fn latent_dim(&self) -> i64 {
            self.0.latent_dim()
        }

        fn image_shape(&self) -> ImageShape {
            self.0.image_shape()
        }
    }

    #[test]
    fn test_non_finite_generator_loss_fails_without_recording() {
        let shape = ImageShape::new(8, 8, 1);
        let model = Dcgan::from_builders(
            Device::Cpu,
            |p| {
                NanWhenTraining(Generator::new(
                    p,
                    GeneratorConfig {
                        latent_dim: 8,
                        image_shape: shape,
                        base_filters: 8,
                    },
                ))
            },
            |p| {
                Discriminator::new(
                    p,
                    DiscriminatorConfig {
                        image_shape: shape,
                        base_filters: 4,
                    },
                )
            },
        )
        .unwrap();
        let mut trainer = AdversarialTrainer::new(quiet_config(3), model, images(20)).unwrap();

        match trainer.run() {
            Err(Error::NumericalInstabilityError { step, model, value }) => {
                assert_eq!(step, 0);
                assert_eq!(model, ModelRole::Generator);
                assert!(value.is_nan());
            }
            other => panic!("expected NumericalInstabilityError, got {:?}", other.map(|h| h.len())),
        }
        assert!(trainer.history().is_empty());
        assert!(matches!(trainer.status(), TrainerStatus::Failed { step: 0, .. }));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let wrong = Tensor::zeros([20, 3, 8, 8], (Kind::Float, Device::Cpu));
        assert!(matches!(
            AdversarialTrainer::new(quiet_config(1), small_model(), wrong),
            Err(Error::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_empty_training_set_is_unavailable() {
        let empty = Tensor::zeros([0, 1, 8, 8], (Kind::Float, Device::Cpu));
        match AdversarialTrainer::new(quiet_config(1), small_model(), empty) {
            Err(e @ Error::DataUnavailableError { .. }) => {
                assert!(e.to_string().contains("training image tensor is empty"));
            }
            Err(e) => panic!("expected DataUnavailableError, got {}", e),
            Ok(_) => panic!("expected DataUnavailableError, got a trainer"),
        }
    }

    #[test]
    fn test_fixed_labels_mode_runs() {
        let mut config = quiet_config(2);
        config.refresh_labels_each_step = false;
        let mut trainer = AdversarialTrainer::new(config, small_model(), images(20)).unwrap();

        assert_eq!(trainer.run().unwrap().len(), 2);
    }
}
