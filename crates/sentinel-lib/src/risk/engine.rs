//! Multi-species risk scoring
//!
//! Each factor compares one forecast against the species thresholds and adds
//! to an integer score, recording a reason with the evidence. Variables
//! missing from the forecast are not scored. A live dissolved-oxygen reading
//! already below the lethal threshold forces the danger level regardless of
//! what the forecast says.

use super::thresholds::SpeciesThresholdConfig;
use crate::models::{CurrentReadings, PredictionSet, RiskAssessment, RiskLevel, TrackedVariable};

/// Score at or above which action is needed
pub const DANGER_SCORE: u32 = 5;

/// Score at or above which the pond is flagged
pub const WARNING_SCORE: u32 = 2;

const DO_DANGER_POINTS: u32 = 5;
const DO_WARNING_POINTS: u32 = 2;
const PH_SEVERE_POINTS: u32 = 3;
const PH_MILD_POINTS: u32 = 1;
/// Tolerance beyond the optimal pH range before a deviation is severe
const PH_SEVERE_MARGIN: f64 = 0.5;
const AMMONIA_DANGER_POINTS: u32 = 5;
const AMMONIA_WARNING_POINTS: u32 = 2;
const TEMP_EXTREME_POINTS: u32 = 3;
const TEMP_MILD_POINTS: u32 = 1;
/// Tolerance beyond the optimal temperature range before it is extreme
const TEMP_EXTREME_MARGIN: f64 = 2.0;
const THERMAL_SHOCK_POINTS: u32 = 5;

/// Map a score to its level
pub fn classify(score: u32) -> RiskLevel {
    if score >= DANGER_SCORE {
        RiskLevel::DangerActionNeeded
    } else if score >= WARNING_SCORE {
        RiskLevel::Warning
    } else {
        RiskLevel::Safe
    }
}

/// Additive score with its explanation
#[derive(Debug, Default)]
struct Scorecard {
    score: u32,
    reasons: Vec<String>,
}

impl Scorecard {
    fn add(&mut self, points: u32, reason: String) {
        self.score += points;
        self.reasons.push(reason);
    }
}

/// Assess a forecast against an already-resolved threshold profile
pub fn assess_with(
    prediction: &PredictionSet,
    current: &CurrentReadings,
    cfg: &SpeciesThresholdConfig,
) -> RiskAssessment {
    let mut card = Scorecard::default();

    if let Some(forecast_do) = prediction.value(TrackedVariable::DissolvedOxygen) {
        score_oxygen(&mut card, forecast_do, cfg);
    }
    if let Some(forecast_ph) = prediction.value(TrackedVariable::Ph) {
        score_ph(&mut card, forecast_ph, cfg);
    }
    if let Some(forecast_ammonia) = prediction.value(TrackedVariable::Ammonia) {
        score_ammonia(&mut card, forecast_ammonia, cfg);
    }
    if let (Some(forecast_temp), Some(current_temp)) = (
        prediction.value(TrackedVariable::Temperature),
        current.value(TrackedVariable::Temperature),
    ) {
        score_temperature(&mut card, forecast_temp, current_temp, cfg);
    }

    // A forecast must never mask an already critical live reading
    if let Some(current_do) = current.value(TrackedVariable::DissolvedOxygen) {
        if current_do < cfg.do_danger {
            card.score = card.score.max(DANGER_SCORE);
            card.reasons.push(format!(
                "Safety net: current dissolved oxygen ({:.2} mg/L) is already below the lethal threshold ({} mg/L)",
                current_do, cfg.do_danger
            ));
        }
    }

    RiskAssessment {
        level: classify(card.score),
        score: card.score,
        reasons: card.reasons,
        thresholds_used: *cfg,
    }
}

fn score_oxygen(card: &mut Scorecard, forecast: f64, cfg: &SpeciesThresholdConfig) {
    if forecast < cfg.do_danger {
        card.add(
            DO_DANGER_POINTS,
            format!(
                "Forecast dissolved oxygen ({:.2} mg/L) is below the lethal threshold ({} mg/L)",
                forecast, cfg.do_danger
            ),
        );
    } else if forecast < cfg.do_warning {
        card.add(
            DO_WARNING_POINTS,
            format!(
                "Forecast dissolved oxygen ({:.2} mg/L) is below the warning threshold ({} mg/L)",
                forecast, cfg.do_warning
            ),
        );
    }
}

fn score_ph(card: &mut Scorecard, forecast: f64, cfg: &SpeciesThresholdConfig) {
    let severe_low = cfg.ph_min - PH_SEVERE_MARGIN;
    let severe_high = cfg.ph_max + PH_SEVERE_MARGIN;
    if forecast < severe_low || forecast > severe_high {
        card.add(
            PH_SEVERE_POINTS,
            format!(
                "Forecast pH ({:.2}) deviates severely from the safe range {}-{} (tolerance {}-{})",
                forecast, cfg.ph_min, cfg.ph_max, severe_low, severe_high
            ),
        );
    } else if forecast < cfg.ph_min || forecast > cfg.ph_max {
        card.add(
            PH_MILD_POINTS,
            format!(
                "Forecast pH ({:.2}) is slightly outside the safe range {}-{}",
                forecast, cfg.ph_min, cfg.ph_max
            ),
        );
    }
}

fn score_ammonia(card: &mut Scorecard, forecast: f64, cfg: &SpeciesThresholdConfig) {
    if forecast > cfg.ammonia_danger {
        card.add(
            AMMONIA_DANGER_POINTS,
            format!(
                "Forecast ammonia ({:.4} mg/L) exceeds the toxic threshold ({} mg/L)",
                forecast, cfg.ammonia_danger
            ),
        );
    } else if forecast > cfg.ammonia_warning {
        card.add(
            AMMONIA_WARNING_POINTS,
            format!(
                "Forecast ammonia ({:.4} mg/L) exceeds the warning threshold ({} mg/L)",
                forecast, cfg.ammonia_warning
            ),
        );
    }
}

fn score_temperature(card: &mut Scorecard, forecast: f64, current: f64, cfg: &SpeciesThresholdConfig) {
    let extreme_low = cfg.temp_min - TEMP_EXTREME_MARGIN;
    let extreme_high = cfg.temp_max + TEMP_EXTREME_MARGIN;
    if forecast < extreme_low || forecast > extreme_high {
        card.add(
            TEMP_EXTREME_POINTS,
            format!(
                "Forecast temperature ({:.1}°C) is beyond the tolerance range {}-{}°C",
                forecast, extreme_low, extreme_high
            ),
        );
    } else if forecast < cfg.temp_min || forecast > cfg.temp_max {
        card.add(
            TEMP_MILD_POINTS,
            format!(
                "Forecast temperature ({:.1}°C) is outside the optimal range {}-{}°C",
                forecast, cfg.temp_min, cfg.temp_max
            ),
        );
    }

    let change = (forecast - current).abs();
    if change > cfg.temp_shock_delta {
        card.add(
            THERMAL_SHOCK_POINTS,
            format!(
                "Thermal shock risk: temperature change of {:.1}°C exceeds {}°C within one interval",
                change, cfg.temp_shock_delta
            ),
        );
    }
}
