//! Core data models for the water-quality pipeline

use crate::error::PipelineError;
use crate::risk::SpeciesThresholdConfig;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum number of sensor points accepted by the pipeline
pub const MIN_HISTORY_POINTS: usize = 12;

/// Variables the pipeline tracks and forecasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedVariable {
    DissolvedOxygen,
    Ph,
    Ammonia,
    Turbidity,
    Temperature,
}

impl TrackedVariable {
    /// All tracked variables in canonical order
    pub const ALL: [TrackedVariable; 5] = [
        TrackedVariable::DissolvedOxygen,
        TrackedVariable::Ph,
        TrackedVariable::Ammonia,
        TrackedVariable::Turbidity,
        TrackedVariable::Temperature,
    ];

    /// Wire name, also used as the feature-column prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedVariable::DissolvedOxygen => "dissolved_oxygen",
            TrackedVariable::Ph => "ph",
            TrackedVariable::Ammonia => "ammonia",
            TrackedVariable::Turbidity => "turbidity",
            TrackedVariable::Temperature => "temperature",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == name)
    }

    /// Read this variable from a sensor point
    pub fn read(&self, point: &SensorPoint) -> f64 {
        match self {
            TrackedVariable::DissolvedOxygen => point.dissolved_oxygen,
            TrackedVariable::Ph => point.ph,
            TrackedVariable::Ammonia => point.ammonia,
            TrackedVariable::Turbidity => point.turbidity,
            TrackedVariable::Temperature => point.temperature,
        }
    }
}

impl fmt::Display for TrackedVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value slot per tracked variable.
///
/// Absent entries are skipped on serialization, and unknown keys are rejected
/// on deserialization, so the JSON form is a map over the closed variable set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableMap<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dissolved_oxygen: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ph: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ammonia: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turbidity: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<T>,
}

impl<T> Default for VariableMap<T> {
    fn default() -> Self {
        Self {
            dissolved_oxygen: None,
            ph: None,
            ammonia: None,
            turbidity: None,
            temperature: None,
        }
    }
}

impl<T> VariableMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, variable: TrackedVariable) -> &Option<T> {
        match variable {
            TrackedVariable::DissolvedOxygen => &self.dissolved_oxygen,
            TrackedVariable::Ph => &self.ph,
            TrackedVariable::Ammonia => &self.ammonia,
            TrackedVariable::Turbidity => &self.turbidity,
            TrackedVariable::Temperature => &self.temperature,
        }
    }

    fn slot_mut(&mut self, variable: TrackedVariable) -> &mut Option<T> {
        match variable {
            TrackedVariable::DissolvedOxygen => &mut self.dissolved_oxygen,
            TrackedVariable::Ph => &mut self.ph,
            TrackedVariable::Ammonia => &mut self.ammonia,
            TrackedVariable::Turbidity => &mut self.turbidity,
            TrackedVariable::Temperature => &mut self.temperature,
        }
    }

    pub fn get(&self, variable: TrackedVariable) -> Option<&T> {
        self.slot(variable).as_ref()
    }

    pub fn insert(&mut self, variable: TrackedVariable, value: T) -> Option<T> {
        self.slot_mut(variable).replace(value)
    }

    pub fn remove(&mut self, variable: TrackedVariable) -> Option<T> {
        self.slot_mut(variable).take()
    }

    pub fn contains(&self, variable: TrackedVariable) -> bool {
        self.slot(variable).is_some()
    }

    /// Present entries in canonical variable order
    pub fn iter(&self) -> impl Iterator<Item = (TrackedVariable, &T)> {
        TrackedVariable::ALL
            .into_iter()
            .filter_map(move |v| self.get(v).map(|value| (v, value)))
    }

    pub fn variables(&self) -> Vec<TrackedVariable> {
        self.iter().map(|(v, _)| v).collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Copy> VariableMap<T> {
    pub fn value(&self, variable: TrackedVariable) -> Option<T> {
        self.get(variable).copied()
    }
}

/// Forecast for the next sampling interval, per variable
pub type PredictionSet = VariableMap<f64>;

/// Latest measured values, per variable
pub type CurrentReadings = VariableMap<f64>;

/// Raw sensor sample as produced by the ingestion side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorPoint {
    pub timestamp: String,
    pub temperature: f64,
    pub dissolved_oxygen: f64,
    pub ph: f64,
    pub turbidity: f64,
    pub ammonia: f64,
    pub rain_event: u8,
    pub feeding_event: u8,
}

impl SensorPoint {
    /// All tracked readings of this sample
    pub fn readings(&self) -> CurrentReadings {
        let mut readings = CurrentReadings::new();
        for variable in TrackedVariable::ALL {
            readings.insert(variable, variable.read(self));
        }
        readings
    }
}

/// Parsed timestamp: `local` is the wall-clock time used for hour/month
/// features, `instant` is the comparable point used for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleTime {
    pub local: NaiveDateTime,
    pub instant: NaiveDateTime,
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a sortable date-time string
pub fn parse_timestamp(raw: &str) -> Option<SampleTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(SampleTime {
            local: dt.naive_local(),
            instant: dt.naive_utc(),
        });
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(SampleTime {
                local: dt,
                instant: dt,
            });
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| SampleTime {
            local: dt,
            instant: dt,
        })
}

/// Validated, ascending sensor history of at least [`MIN_HISTORY_POINTS`]
#[derive(Debug, Clone)]
pub struct SensorHistory {
    points: Vec<SensorPoint>,
    times: Vec<SampleTime>,
}

impl SensorHistory {
    pub fn new(points: Vec<SensorPoint>) -> Result<Self, PipelineError> {
        if points.len() < MIN_HISTORY_POINTS {
            return Err(PipelineError::validation(format!(
                "history has {} points, at least {} are required",
                points.len(),
                MIN_HISTORY_POINTS
            )));
        }

        let mut times: Vec<SampleTime> = Vec::with_capacity(points.len());
        for (idx, point) in points.iter().enumerate() {
            let time = parse_timestamp(&point.timestamp).ok_or_else(|| {
                PipelineError::validation(format!(
                    "point {}: malformed timestamp {:?}",
                    idx, point.timestamp
                ))
            })?;
            if let Some(prev) = times.last() {
                if time.instant <= prev.instant {
                    return Err(PipelineError::validation(format!(
                        "point {}: timestamp {} is not after the previous sample",
                        idx, point.timestamp
                    )));
                }
            }
            for variable in TrackedVariable::ALL {
                if !variable.read(point).is_finite() {
                    return Err(PipelineError::validation(format!(
                        "point {}: {} is not a finite number",
                        idx, variable
                    )));
                }
            }
            if point.rain_event > 1 || point.feeding_event > 1 {
                return Err(PipelineError::validation(format!(
                    "point {}: event flags must be 0 or 1",
                    idx
                )));
            }
            times.push(time);
        }

        Ok(Self { points, times })
    }

    pub fn points(&self) -> &[SensorPoint] {
        &self.points
    }

    pub fn times(&self) -> &[SampleTime] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Most recent sample; a validated history is never empty
    pub fn latest(&self) -> (&SensorPoint, SampleTime) {
        let last = self.points.len() - 1;
        (&self.points[last], self.times[last])
    }

    /// One variable's series in chronological order
    pub fn series(&self, variable: TrackedVariable) -> Vec<f64> {
        self.points.iter().map(|p| variable.read(p)).collect()
    }
}

/// Tri-level risk classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Safe,
    Warning,
    DangerActionNeeded,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Warning => "WARNING",
            RiskLevel::DangerActionNeeded => "DANGER_ACTION_NEEDED",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk verdict with its explanation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub score: u32,
    pub reasons: Vec<String>,
    pub thresholds_used: SpeciesThresholdConfig,
}

fn default_species() -> String {
    crate::risk::DEFAULT_SPECIES.to_string()
}

/// Pipeline entry request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(default = "default_species")]
    pub species: String,
    pub history: Vec<SensorPoint>,
}

/// Pipeline entry response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub species: String,
    pub current_values: CurrentReadings,
    pub prediction_next_interval: PredictionSet,
    pub risk_level: RiskLevel,
    pub score: u32,
    pub details: Vec<String>,
    pub thresholds: SpeciesThresholdConfig,
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_variable_map_serializes_present_entries_in_order() {
        let mut map = PredictionSet::new();
        map.insert(TrackedVariable::Temperature, 28.5);
        map.insert(TrackedVariable::DissolvedOxygen, 5.1);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"dissolved_oxygen":5.1,"temperature":28.5}"#);
    }

    #[test]
    fn test_variable_map_rejects_unknown_keys() {
        let parsed: Result<PredictionSet, _> = serde_json::from_str(r#"{"salinity": 3.0}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-01-01T05:30:00").is_some());
        assert!(parse_timestamp("2024-01-01 05:30:00").is_some());
        assert!(parse_timestamp("2024-01-01 05:30").is_some());
        assert!(parse_timestamp("2024-01-01").is_some());
        let with_offset = parse_timestamp("2024-01-01T05:30:00+07:00").unwrap();
        assert_eq!(with_offset.local.to_string(), "2024-01-01 05:30:00");
        assert_eq!(with_offset.instant.to_string(), "2023-12-31 22:30:00");
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_history_too_short() {
        let err = SensorHistory::new(steady_history(11)).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
        assert!(err.to_string().contains("11 points"));
    }

    #[test]
    fn test_history_rejects_non_monotonic_timestamps() {
        let mut points = steady_history(12);
        points.swap(4, 5);
        let err = SensorHistory::new(points).unwrap_err();
        assert!(err.to_string().contains("point 5"));
    }

    #[test]
    fn test_history_rejects_malformed_values() {
        let mut points = steady_history(12);
        points[3].timestamp = "not-a-date".to_string();
        assert!(SensorHistory::new(points).is_err());

        let mut points = steady_history(12);
        points[7].ph = f64::NAN;
        assert!(SensorHistory::new(points).is_err());

        let mut points = steady_history(12);
        points[2].feeding_event = 2;
        assert!(SensorHistory::new(points).is_err());
    }

    #[test]
    fn test_history_accepts_valid_series() {
        let history = SensorHistory::new(steady_history(15)).unwrap();
        assert_eq!(history.len(), 15);
        let (latest, time) = history.latest();
        assert_eq!(latest.timestamp, "2024-05-01T07:10:00");
        assert_eq!(time.local.to_string(), "2024-05-01 07:10:00");
        assert_eq!(history.series(TrackedVariable::DissolvedOxygen).len(), 15);
    }

    #[test]
    fn test_request_defaults_species() {
        let req: PredictRequest = serde_json::from_str(r#"{"history": []}"#).unwrap();
        assert_eq!(req.species, "tom");
    }

    #[test]
    fn test_risk_level_wire_names() {
        assert_eq!(
            serde_json::to_string(&RiskLevel::DangerActionNeeded).unwrap(),
            r#""DANGER_ACTION_NEEDED""#
        );
        assert_eq!(RiskLevel::Warning.to_string(), "WARNING");
    }
}
