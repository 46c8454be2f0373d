use std::sync::Arc;

use serde::Serialize;

use crate::config::ConfigStore;
use crate::ml::ModelStore;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    config: ConfigStore,
    models: ModelStore,
}

impl AppState {
    pub fn new(config: ConfigStore, models: ModelStore) -> Self {
        Self {
            inner: Arc::new(InnerState { config, models }),
        }
    }

    /// Store rooted at the configured model directory and file name.
    pub fn from_config(config: ConfigStore) -> Self {
        let models = ModelStore::new(config.model_dir(), config.model_file());
        Self::new(config, models)
    }

    pub fn config(&self) -> &ConfigStore {
        &self.inner.config
    }

    pub fn models(&self) -> &ModelStore {
        &self.inner.models
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub status: &'static str,
}
