//! Forecasting engine: features, model backends and physical constraints

mod constraints;
mod features;
mod inference;
mod model_set;
mod watcher;

pub use constraints::{
    round_forecast, ConstraintEngine, Forecast, ModelFailure, DO_CRASH_DELTA,
    INFERENCE_TIMEOUT,
};
pub use features::{
    delta, rolling_mean, FeatureBuilder, FeatureColumn, FeatureSnapshot, VariableFeatures,
    LONG_WINDOW, SHORT_WINDOW,
};
pub use inference::{LinearRegressor, OnnxRegressor};
pub use model_set::{compute_checksum, parse_columns, ModelFormat, ModelLoader, ModelSet, MANIFEST_FILE};
pub use watcher::{ModelWatcher, WatcherHandle};

use anyhow::Result;

/// A trained estimator for one variable's next-interval value
pub trait RegressionModel: Send + Sync {
    /// Estimate the next value from the latest feature snapshot
    fn estimate(&self, features: &FeatureSnapshot) -> Result<f64>;

    /// Short backend name for logs
    fn kind(&self) -> &'static str;
}
