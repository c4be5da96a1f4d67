//! Immutable per-variable model tables and the directory loader
//!
//! A model directory holds one regression model per tracked variable and an
//! optional `manifest.json`:
//!
//! ```json
//! {
//!   "version": "2024.06.1",
//!   "features": ["rain_event", "feeding_event", "hour", "month", "dissolved_oxygen", "..."],
//!   "models": {
//!     "dissolved_oxygen": { "file": "xgb_dissolved_oxygen.onnx", "sha256": "..." },
//!     "ph": { "file": "ph.json", "format": "linear" }
//!   }
//! }
//! ```
//!
//! Without a manifest, `<variable>.onnx` or `<variable>.json` files are used.
//! A model that cannot be loaded is skipped so the remaining variables are
//! still served.

use super::features::FeatureColumn;
use super::inference::{LinearRegressor, OnnxRegressor};
use super::RegressionModel;
use crate::models::{TrackedVariable, VariableMap};
use anyhow::{Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Manifest file name inside a model directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Immutable set of regression models, at most one per variable
#[derive(Clone, Default)]
pub struct ModelSet {
    models: VariableMap<Arc<dyn RegressionModel>>,
    version: String,
}

impl ModelSet {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            models: VariableMap::new(),
            version: version.into(),
        }
    }

    /// A set with no models; every forecast request is unavailable
    pub fn empty() -> Self {
        Self::new("none")
    }

    pub fn with_model(
        mut self,
        variable: TrackedVariable,
        model: impl RegressionModel + 'static,
    ) -> Self {
        self.models.insert(variable, Arc::new(model));
        self
    }

    pub fn insert(&mut self, variable: TrackedVariable, model: Arc<dyn RegressionModel>) {
        self.models.insert(variable, model);
    }

    pub fn get(&self, variable: TrackedVariable) -> Option<&Arc<dyn RegressionModel>> {
        self.models.get(variable)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TrackedVariable, &Arc<dyn RegressionModel>)> {
        self.models.iter()
    }

    /// Variables with a model
    pub fn coverage(&self) -> Vec<TrackedVariable> {
        self.models.variables()
    }

    /// Variables without a model
    pub fn missing(&self) -> Vec<TrackedVariable> {
        TrackedVariable::ALL
            .into_iter()
            .filter(|v| !self.models.contains(*v))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Debug for ModelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let models: Vec<String> = self
            .iter()
            .map(|(v, m)| format!("{}:{}", v, m.kind()))
            .collect();
        f.debug_struct("ModelSet")
            .field("version", &self.version)
            .field("models", &models)
            .finish()
    }
}

/// Serialized model format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    Onnx,
    Linear,
}

impl ModelFormat {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("onnx") => Some(ModelFormat::Onnx),
            Some("json") => Some(ModelFormat::Linear),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ManifestEntry {
    file: String,
    #[serde(default)]
    format: Option<ModelFormat>,
    #[serde(default)]
    sha256: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelManifest {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    features: Option<Vec<String>>,
    models: BTreeMap<String, ManifestEntry>,
}

/// Where a variable's model comes from
#[derive(Debug, Clone)]
struct ModelSource {
    variable: TrackedVariable,
    path: PathBuf,
    format: ModelFormat,
    sha256: Option<String>,
}

/// Loads a [`ModelSet`] from a model directory
#[derive(Debug, Clone)]
pub struct ModelLoader {
    model_dir: PathBuf,
}

impl ModelLoader {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Load every available model; unloadable models are skipped
    pub fn load(&self) -> Result<ModelSet> {
        if !self.model_dir.is_dir() {
            anyhow::bail!("Model directory not found: {}", self.model_dir.display());
        }

        let manifest_path = self.model_dir.join(MANIFEST_FILE);
        let (declared_version, columns, sources) = if manifest_path.is_file() {
            self.read_manifest(&manifest_path)?
        } else {
            (None, FeatureColumn::training_layout(), self.discover())
        };

        let mut set = VariableMap::<Arc<dyn RegressionModel>>::new();
        let mut checksums = Vec::new();
        for source in &sources {
            match load_source(source, &columns) {
                Ok((model, checksum)) => {
                    info!(
                        variable = %source.variable,
                        kind = model.kind(),
                        path = %source.path.display(),
                        "Loaded regression model"
                    );
                    checksums.push(checksum);
                    set.insert(source.variable, model);
                }
                Err(e) => {
                    warn!(
                        variable = %source.variable,
                        path = %source.path.display(),
                        error = %e,
                        "Failed to load regression model, skipping"
                    );
                }
            }
        }

        for variable in TrackedVariable::ALL {
            if !set.contains(variable) {
                warn!(variable = %variable, "No regression model available");
            }
        }

        let version = declared_version.unwrap_or_else(|| derived_version(&checksums));
        Ok(ModelSet {
            models: set,
            version,
        })
    }

    fn read_manifest(
        &self,
        path: &Path,
    ) -> Result<(Option<String>, Vec<FeatureColumn>, Vec<ModelSource>)> {
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read manifest {:?}", path))?;
        let manifest: ModelManifest =
            serde_json::from_slice(&bytes).context("Failed to parse model manifest")?;

        let columns = match manifest.features {
            Some(names) => parse_columns(&names)?,
            None => FeatureColumn::training_layout(),
        };

        let mut sources = Vec::with_capacity(manifest.models.len());
        for (name, entry) in manifest.models {
            let variable = TrackedVariable::from_name(&name)
                .with_context(|| format!("Manifest names unknown variable {:?}", name))?;
            let path = self.model_dir.join(&entry.file);
            let format = entry
                .format
                .or_else(|| ModelFormat::from_path(&path))
                .with_context(|| format!("Cannot infer model format of {}", entry.file))?;
            sources.push(ModelSource {
                variable,
                path,
                format,
                sha256: entry.sha256,
            });
        }
        Ok((manifest.version, columns, sources))
    }

    fn discover(&self) -> Vec<ModelSource> {
        TrackedVariable::ALL
            .into_iter()
            .filter_map(|variable| {
                [ModelFormat::Onnx, ModelFormat::Linear]
                    .into_iter()
                    .map(|format| {
                        let ext = match format {
                            ModelFormat::Onnx => "onnx",
                            ModelFormat::Linear => "json",
                        };
                        (format, self.model_dir.join(format!("{}.{}", variable, ext)))
                    })
                    .find(|(_, path)| path.is_file())
                    .map(|(format, path)| ModelSource {
                        variable,
                        path,
                        format,
                        sha256: None,
                    })
            })
            .collect()
    }
}

/// Parse manifest column names, rejecting any the pipeline cannot supply
pub fn parse_columns(names: &[String]) -> Result<Vec<FeatureColumn>> {
    names
        .iter()
        .map(|name| {
            FeatureColumn::parse(name)
                .with_context(|| format!("Unknown feature column {:?}", name))
        })
        .collect()
}

fn load_source(
    source: &ModelSource,
    columns: &[FeatureColumn],
) -> Result<(Arc<dyn RegressionModel>, String)> {
    let bytes = fs::read(&source.path)
        .with_context(|| format!("Failed to read model file {:?}", source.path))?;

    let checksum = compute_checksum(&bytes);
    if let Some(expected) = &source.sha256 {
        if !expected.eq_ignore_ascii_case(&checksum) {
            anyhow::bail!("Checksum mismatch: expected {}, got {}", expected, checksum);
        }
    }

    let model: Arc<dyn RegressionModel> = match source.format {
        ModelFormat::Onnx => Arc::new(OnnxRegressor::new(&bytes, columns.to_vec())?),
        ModelFormat::Linear => Arc::new(LinearRegressor::from_json(&bytes)?),
    };
    Ok((model, checksum))
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn derived_version(checksums: &[String]) -> String {
    if checksums.is_empty() {
        return "none".to_string();
    }
    let combined = compute_checksum(checksums.join(":").as_bytes());
    format!("sha256-{}", &combined[..12])
}
