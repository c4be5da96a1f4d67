//! Sliding-window feature engineering
//!
//! Turns an ascending sensor history into a single snapshot describing the
//! most recent sample: current value, rolling means and trend deltas over
//! short and long windows, plus temporal context.
//!
//! Windows that reach before the first sample do not produce a partial value:
//! the feature falls back to zero. The trained models were calibrated with
//! this behaviour, so it must not be "corrected" here.

use crate::models::{SensorHistory, TrackedVariable};
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Short trend window, in samples
pub const SHORT_WINDOW: usize = 3;

/// Long trend window, in samples
pub const LONG_WINDOW: usize = 12;

/// Derived features of one variable at the latest sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariableFeatures {
    pub value: f64,
    pub roll_mean_3: f64,
    pub roll_mean_12: f64,
    pub delta_3: f64,
    pub delta_12: f64,
}

/// Engineered features of the most recent sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub timestamp: NaiveDateTime,
    pub hour: u32,
    pub month: u32,
    pub rain_event: u8,
    pub feeding_event: u8,
    pub dissolved_oxygen: VariableFeatures,
    pub ph: VariableFeatures,
    pub ammonia: VariableFeatures,
    pub turbidity: VariableFeatures,
    pub temperature: VariableFeatures,
}

impl FeatureSnapshot {
    pub fn variable(&self, variable: TrackedVariable) -> &VariableFeatures {
        match variable {
            TrackedVariable::DissolvedOxygen => &self.dissolved_oxygen,
            TrackedVariable::Ph => &self.ph,
            TrackedVariable::Ammonia => &self.ammonia,
            TrackedVariable::Turbidity => &self.turbidity,
            TrackedVariable::Temperature => &self.temperature,
        }
    }

    /// Value of a named model input column
    pub fn column(&self, column: FeatureColumn) -> f64 {
        match column {
            FeatureColumn::RainEvent => f64::from(self.rain_event),
            FeatureColumn::FeedingEvent => f64::from(self.feeding_event),
            FeatureColumn::Hour => f64::from(self.hour),
            FeatureColumn::Month => f64::from(self.month),
            FeatureColumn::Value(v) => self.variable(v).value,
            FeatureColumn::RollMean3(v) => self.variable(v).roll_mean_3,
            FeatureColumn::RollMean12(v) => self.variable(v).roll_mean_12,
            FeatureColumn::Delta3(v) => self.variable(v).delta_3,
            FeatureColumn::Delta12(v) => self.variable(v).delta_12,
        }
    }

    /// Assemble an input row in the given column order
    pub fn row(&self, columns: &[FeatureColumn]) -> Vec<f64> {
        columns.iter().map(|c| self.column(*c)).collect()
    }
}

/// A model input column, named the way the training job names it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureColumn {
    RainEvent,
    FeedingEvent,
    Hour,
    Month,
    Value(TrackedVariable),
    RollMean3(TrackedVariable),
    RollMean12(TrackedVariable),
    Delta3(TrackedVariable),
    Delta12(TrackedVariable),
}

impl FeatureColumn {
    /// Parse a training column name such as `ph_roll_mean_12`
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "rain_event" => return Some(FeatureColumn::RainEvent),
            "feeding_event" => return Some(FeatureColumn::FeedingEvent),
            "hour" => return Some(FeatureColumn::Hour),
            "month" => return Some(FeatureColumn::Month),
            _ => {}
        }
        if let Some(v) = TrackedVariable::from_name(name) {
            return Some(FeatureColumn::Value(v));
        }
        let suffixes: [(&str, fn(TrackedVariable) -> FeatureColumn); 4] = [
            ("_roll_mean_3", FeatureColumn::RollMean3),
            ("_roll_mean_12", FeatureColumn::RollMean12),
            ("_delta_3", FeatureColumn::Delta3),
            ("_delta_12", FeatureColumn::Delta12),
        ];
        suffixes.iter().find_map(|(suffix, make)| {
            name.strip_suffix(*suffix)
                .and_then(TrackedVariable::from_name)
                .map(*make)
        })
    }

    /// Column layout used by the training job
    pub fn training_layout() -> Vec<FeatureColumn> {
        let mut columns = vec![
            FeatureColumn::RainEvent,
            FeatureColumn::FeedingEvent,
            FeatureColumn::Hour,
            FeatureColumn::Month,
        ];
        for v in TrackedVariable::ALL {
            columns.extend([
                FeatureColumn::Value(v),
                FeatureColumn::RollMean3(v),
                FeatureColumn::RollMean12(v),
                FeatureColumn::Delta3(v),
                FeatureColumn::Delta12(v),
            ]);
        }
        columns
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureColumn::RainEvent => f.write_str("rain_event"),
            FeatureColumn::FeedingEvent => f.write_str("feeding_event"),
            FeatureColumn::Hour => f.write_str("hour"),
            FeatureColumn::Month => f.write_str("month"),
            FeatureColumn::Value(v) => write!(f, "{}", v),
            FeatureColumn::RollMean3(v) => write!(f, "{}_roll_mean_3", v),
            FeatureColumn::RollMean12(v) => write!(f, "{}_roll_mean_12", v),
            FeatureColumn::Delta3(v) => write!(f, "{}_delta_3", v),
            FeatureColumn::Delta12(v) => write!(f, "{}_delta_12", v),
        }
    }
}

/// Builds the feature snapshot for the latest sample of a history
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder;

impl FeatureBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, history: &SensorHistory) -> FeatureSnapshot {
        let (latest, time) = history.latest();
        let end = history.len() - 1;
        let features = |variable: TrackedVariable| {
            let series = history.series(variable);
            VariableFeatures {
                value: series[end],
                roll_mean_3: rolling_mean(&series, end, SHORT_WINDOW),
                roll_mean_12: rolling_mean(&series, end, LONG_WINDOW),
                delta_3: delta(&series, end, SHORT_WINDOW),
                delta_12: delta(&series, end, LONG_WINDOW),
            }
        };

        FeatureSnapshot {
            timestamp: time.local,
            hour: time.local.hour(),
            month: time.local.month(),
            rain_event: latest.rain_event,
            feeding_event: latest.feeding_event,
            dissolved_oxygen: features(TrackedVariable::DissolvedOxygen),
            ph: features(TrackedVariable::Ph),
            ammonia: features(TrackedVariable::Ammonia),
            turbidity: features(TrackedVariable::Turbidity),
            temperature: features(TrackedVariable::Temperature),
        }
    }
}

/// Mean of the `window` samples ending at `end`; 0.0 when fewer exist
pub fn rolling_mean(values: &[f64], end: usize, window: usize) -> f64 {
    if window == 0 || end >= values.len() || end + 1 < window {
        return 0.0;
    }
    let slice = &values[end + 1 - window..=end];
    slice.iter().sum::<f64>() / window as f64
}

/// `values[end] - values[end - window]`; 0.0 when the lookback does not exist
pub fn delta(values: &[f64], end: usize, window: usize) -> f64 {
    if end >= values.len() || end < window {
        return 0.0;
    }
    values[end] - values[end - window]
}
