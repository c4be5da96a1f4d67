//! Subcommand implementations

pub mod assess;
pub mod health;
pub mod predict;
pub mod species;

use anyhow::{Context, Result};
use sentinel_lib::{PredictRequest, SensorPoint};
use serde::Deserialize;
use std::path::Path;

/// A history file holds either a bare list of points or a full request
#[derive(Deserialize)]
#[serde(untagged)]
enum HistoryFile {
    Request(PredictRequest),
    Points(Vec<SensorPoint>),
}

/// Read a prediction request from a JSON file.
///
/// `species` overrides the species named in the file.
pub fn load_request(path: &Path, species: Option<String>) -> Result<PredictRequest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file {}", path.display()))?;
    let parsed: HistoryFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse history file {}", path.display()))?;

    let mut request = match parsed {
        HistoryFile::Request(request) => request,
        HistoryFile::Points(history) => PredictRequest {
            species: sentinel_lib::risk::DEFAULT_SPECIES.to_string(),
            history,
        },
    };
    if let Some(species) = species {
        request.species = species;
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const POINT: &str = r#"{"timestamp": "2024-05-01T06:00:00", "temperature": 28.0,
        "dissolved_oxygen": 6.5, "ph": 7.8, "turbidity": 5.0, "ammonia": 0.02,
        "rain_event": 0, "feeding_event": 1}"#;

    #[test]
    fn test_load_bare_points() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[{}]", POINT).unwrap();

        let request = load_request(file.path(), None).unwrap();
        assert_eq!(request.species, "tom");
        assert_eq!(request.history.len(), 1);
        assert_eq!(request.history[0].feeding_event, 1);
    }

    #[test]
    fn test_species_flag_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"species": "luon", "history": [{}]}}"#, POINT).unwrap();

        assert_eq!(load_request(file.path(), None).unwrap().species, "luon");
        let request = load_request(file.path(), Some("ca_basa".to_string())).unwrap();
        assert_eq!(request.species, "ca_basa");
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = load_request(file.path(), None).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
