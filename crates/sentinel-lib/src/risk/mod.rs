//! Risk classification for the farmed species
//!
//! This module provides:
//! - Species threshold profiles with a conservative default
//! - Additive, explainable scoring of forecasts with a live-reading safety net

mod engine;
mod thresholds;


pub use engine::{assess_with, classify, DANGER_SCORE, WARNING_SCORE};
pub use thresholds::{SpeciesThresholdConfig, ThresholdRegistry, DEFAULT_SPECIES};
