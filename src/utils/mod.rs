//! Utility module with helper functions
//!
//! This module provides:
//! - Configuration handling

mod config;

pub use config::{
    ensure_config_exists, Config, DataConfig, ModelConfig, SamplingConfig, TrainingConfigFile,
};
