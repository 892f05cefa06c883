//! Trainer state machine, cancellation and step observers
//!
//! Status transitions:
//!
//! ```text
//! Initialized -> Running { step } -> Running { step + 1 } -> ...
//!                   |                                         |
//!                   +--> Failed { step, .. }                  +--> Stopped { .. }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tch::nn::VarStore;

use super::metrics::{StepRecord, TrainingHistory};
use crate::model::{parameter_checksum, ModelRole};

/// Where the trainer is in its lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum TrainerStatus {
    Initialized,
    Running { step: usize },
    /// All steps ran, or a stop was requested between steps
    Stopped { steps_completed: usize, cancelled: bool },
    /// A step hit a non-finite loss; that step was not recorded
    Failed { step: usize, reason: String },
}

impl TrainerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrainerStatus::Stopped { .. } | TrainerStatus::Failed { .. })
    }
}

/// Everything that evolves over a run
#[derive(Debug)]
pub struct TrainerState {
    pub(crate) status: TrainerStatus,
    pub(crate) history: TrainingHistory,
    pub(crate) rng: StdRng,
}

impl TrainerState {
    pub fn new(seed: u64) -> Self {
        Self {
            status: TrainerStatus::Initialized,
            history: TrainingHistory::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn status(&self) -> &TrainerStatus {
        &self.status
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    /// Index of the next step to run, equal to the number of completed steps
    pub fn next_step(&self) -> usize {
        self.history.len()
    }
}

/// Cloneable flag checked by the trainer between steps
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Read-only view of both networks' parameters at a phase boundary
pub struct PhaseContext<'a> {
    pub step: usize,
    /// Network being updated in this phase
    pub role: ModelRole,
    pub(crate) gen_vs: &'a VarStore,
    pub(crate) disc_vs: &'a VarStore,
}

impl<'a> PhaseContext<'a> {
    pub fn checksum(&self, role: ModelRole) -> f64 {
        match role {
            ModelRole::Generator => parameter_checksum(self.gen_vs),
            ModelRole::Discriminator => parameter_checksum(self.disc_vs),
        }
    }
}

/// Hooks called by the trainer; every method defaults to doing nothing
pub trait TrainingObserver {
    fn on_phase_start(&mut self, _ctx: &PhaseContext<'_>) {}

    fn on_phase_end(&mut self, _ctx: &PhaseContext<'_>) {}

    fn on_step_end(&mut self, _record: &StepRecord) {}
}
