//! Remote pond assessment through the sentinel API

use anyhow::Result;
use sentinel_lib::PredictResponse;
use std::path::Path;

use crate::client::ApiClient;
use crate::output::{print_assessment, OutputFormat};

/// Send a history file to the service and show the assessment
pub async fn predict(
    client: &ApiClient,
    history: &Path,
    species: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let request = super::load_request(history, species)?;
    let response: PredictResponse = client.post("v1/predict", &request).await?;
    print_assessment(&response, format)
}
