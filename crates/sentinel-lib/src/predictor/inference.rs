//! Regression model backends
//!
//! Provides the per-variable estimators consumed by the constraint engine:
//! ONNX graphs executed with tract-onnx (the export format of the training
//! job) and plain linear models described in JSON.

use super::features::{FeatureColumn, FeatureSnapshot};
use super::RegressionModel;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 5;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX regression model taking a single `[1, n_features]` f32 row
pub struct OnnxRegressor {
    model: TractModel,
    columns: Vec<FeatureColumn>,
}

impl OnnxRegressor {
    /// Load and optimize an ONNX model from bytes
    pub fn new(model_bytes: &[u8], columns: Vec<FeatureColumn>) -> Result<Self> {
        if columns.is_empty() {
            anyhow::bail!("ONNX model needs at least one input column");
        }
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, columns.len()]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(Self { model, columns })
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    fn features_to_tensor(&self, features: &FeatureSnapshot) -> Result<Tensor> {
        let data: Vec<f32> = features.row(&self.columns).into_iter().map(|v| v as f32).collect();
        let array = tract_ndarray::Array2::from_shape_vec((1, self.columns.len()), data)
            .context("Failed to shape input row")?;
        Ok(array.into())
    }
}

impl RegressionModel for OnnxRegressor {
    fn estimate(&self, features: &FeatureSnapshot) -> Result<f64> {
        let start = Instant::now();
        let input = self.features_to_tensor(features)?;

        let result = self.model.run(tvec!(input.into()))?;
        let output = result.first().context("No output from model")?;
        let value = output
            .to_array_view::<f32>()?
            .iter()
            .next()
            .copied()
            .context("Model output is empty")?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Ok(f64::from(value))
    }

    fn kind(&self) -> &'static str {
        "onnx"
    }
}

/// JSON description of a linear model
#[derive(Debug, Clone, Deserialize)]
struct LinearFile {
    #[serde(default)]
    intercept: f64,
    weights: BTreeMap<String, f64>,
}

/// Linear model: `intercept + sum(weight * column)`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRegressor {
    intercept: f64,
    weights: Vec<(FeatureColumn, f64)>,
}

impl LinearRegressor {
    pub fn new(intercept: f64, weights: Vec<(FeatureColumn, f64)>) -> Self {
        Self { intercept, weights }
    }

    /// Parse `{"intercept": .., "weights": {"column": coef}}`
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let file: LinearFile =
            serde_json::from_slice(bytes).context("Failed to parse linear model")?;
        if !file.intercept.is_finite() {
            anyhow::bail!("Linear model intercept is not finite");
        }
        let mut weights = Vec::with_capacity(file.weights.len());
        for (name, weight) in file.weights {
            let column = FeatureColumn::parse(&name)
                .with_context(|| format!("Unknown feature column {:?}", name))?;
            if !weight.is_finite() {
                anyhow::bail!("Weight for {} is not finite", name);
            }
            weights.push((column, weight));
        }
        Ok(Self::new(file.intercept, weights))
    }
}

impl RegressionModel for LinearRegressor {
    fn estimate(&self, features: &FeatureSnapshot) -> Result<f64> {
        Ok(self
            .weights
            .iter()
            .fold(self.intercept, |acc, (column, w)| acc + w * features.column(*column)))
    }

    fn kind(&self) -> &'static str {
        "linear"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::steady_history;
    use crate::models::{SensorHistory, TrackedVariable};
    use crate::predictor::FeatureBuilder;

    fn snapshot() -> FeatureSnapshot {
        FeatureBuilder::new().build(&SensorHistory::new(steady_history(12)).unwrap())
    }

    #[test]
    fn test_linear_estimate() {
        let model = LinearRegressor::new(
            0.5,
            vec![
                (FeatureColumn::Value(TrackedVariable::DissolvedOxygen), 0.9),
                (FeatureColumn::Hour, 0.01),
            ],
        );
        // 0.5 + 0.9 * 6.5 + 0.01 * 6
        let estimate = model.estimate(&snapshot()).unwrap();
        assert!((estimate - 6.41).abs() < 1e-9);
    }

    #[test]
    fn test_linear_from_json() {
        let json = br#"{"intercept": 1.0, "weights": {"ph": 0.5, "ph_delta_3": 2.0}}"#;
        let model = LinearRegressor::from_json(json).unwrap();
        let estimate = model.estimate(&snapshot()).unwrap();
        assert!((estimate - 4.9).abs() < 1e-9);
    }

    #[test]
    fn test_linear_rejects_unknown_column() {
        let json = br#"{"weights": {"salinity": 0.5}}"#;
        let err = LinearRegressor::from_json(json).unwrap_err();
        assert!(err.to_string().contains("salinity"));
    }

    #[test]
    fn test_onnx_rejects_invalid_bytes() {
        let result = OnnxRegressor::new(b"definitely not onnx", FeatureColumn::training_layout());
        assert!(result.is_err());
    }
}
