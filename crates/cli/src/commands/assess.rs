//! Offline pond assessment with locally stored models

use anyhow::{Context, Result};
use sentinel_lib::{
    predictor::ModelLoader, risk::ThresholdRegistry, Pipeline, PredictResponse,
};
use std::path::Path;

use crate::output::{print_assessment, print_info, OutputFormat};

/// Run the pipeline in-process against a model directory
pub fn assess(
    history: &Path,
    models: &Path,
    thresholds: Option<&Path>,
    species: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let response = evaluate(history, models, thresholds, species)?;
    if let OutputFormat::Table = format {
        print_info(&format!("Evaluated locally with models from {}", models.display()));
    }
    print_assessment(&response, format)
}

fn evaluate(
    history: &Path,
    models: &Path,
    thresholds: Option<&Path>,
    species: Option<String>,
) -> Result<PredictResponse> {
    let request = super::load_request(history, species)?;
    let registry = match thresholds {
        Some(path) => ThresholdRegistry::with_overrides(path)
            .with_context(|| format!("Failed to load thresholds from {}", path.display()))?,
        None => ThresholdRegistry::builtin(),
    };
    let model_set = ModelLoader::new(models).load()?;

    let pipeline = Pipeline::new(model_set, registry);
    Ok(pipeline.evaluate(&request)?)
}
