//! Model directory hot reload
//!
//! Watches the model directory via filesystem notifications and, after a
//! short quiet period, reloads the whole directory into a fresh `ModelSet`
//! that is installed into the pipeline in one step.

use super::model_set::{ModelLoader, ModelSet};
use crate::health::HealthRegistry;
use crate::observability::StructuredLogger;
use crate::pipeline::Pipeline;
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Quiet period after the last filesystem event before reloading
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Reloads models into a pipeline when the model directory changes
pub struct ModelWatcher {
    loader: ModelLoader,
    pipeline: Arc<Pipeline>,
    health: HealthRegistry,
    logger: StructuredLogger,
    debounce: Duration,
}

/// Keeps the watch alive; dropping it stops watching
pub struct WatcherHandle {
    _watcher: RecommendedWatcher,
    _task: tokio::task::JoinHandle<()>,
}

impl ModelWatcher {
    pub fn new(
        loader: ModelLoader,
        pipeline: Arc<Pipeline>,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            loader,
            pipeline,
            health,
            logger,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Reload the model directory now.
    ///
    /// On failure, including a directory with no usable model, the installed
    /// models are left untouched.
    pub async fn reload(&self) -> Result<Arc<ModelSet>> {
        let loader = self.loader.clone();
        let old_version = self.pipeline.models().version().to_string();

        let loaded = tokio::task::spawn_blocking(move || loader.load())
            .await
            .context("Model loading task panicked")?
            .and_then(|models| {
                if models.is_empty() {
                    anyhow::bail!(
                        "No regression models found in {}",
                        self.loader.model_dir().display()
                    );
                }
                Ok(models)
            });

        match loaded {
            Ok(models) => {
                self.health.observe_models(&models).await;
                let new_version = models.version().to_string();
                self.pipeline.install_models(models);
                self.logger.log_model_reload(&old_version, &new_version, true);
                Ok(self.pipeline.models())
            }
            Err(e) => {
                warn!(
                    dir = %self.loader.model_dir().display(),
                    error = %e,
                    "Model reload failed"
                );
                self.logger.log_model_reload(&old_version, "", false);
                Err(e)
            }
        }
    }

    /// Start watching the model directory
    pub async fn start(self) -> Result<WatcherHandle> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = tx.send(event);
                }
            },
            notify::Config::default(),
        )
        .context("Failed to create filesystem watcher")?;

        let dir = self.loader.model_dir().to_path_buf();
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;
        info!(path = %dir.display(), "Watching model directory");

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if !is_relevant(&event) {
                    continue;
                }
                // Let a multi-file copy settle, then fold queued events into one reload
                tokio::time::sleep(self.debounce).await;
                while rx.try_recv().is_ok() {}

                debug!(paths = ?event.paths, "Model directory changed");
                if self.reload().await.is_err() {
                    debug!("Keeping previously installed models");
                }
            }
            debug!("Watcher channel closed");
        });

        Ok(WatcherHandle {
            _watcher: watcher,
            _task: handle,
        })
    }
}

fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
