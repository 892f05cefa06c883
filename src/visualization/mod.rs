//! Visualization of generator progress
//!
//! This module provides:
//! - Image grids built from generator output
//! - The sampler contract the trainer calls on an interval
//! - PNG rendering of sample grids

mod grid;
mod sampler;

pub use grid::ImageGrid;
pub use sampler::{GridRenderer, GridSampler, PngRenderer, Sampler};
