//! Application state for the NDVI API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;

use ee_client::{Credentials, EvalBackend, RestBackend};

use crate::config::{RecommenderConfig, ServiceConfig};

/// Shared application state. Read-only after construction; requests share
/// it by reference without locking.
pub struct AppState {
    /// Service-account credentials, loaded once per process.
    pub credentials: Credentials,

    /// Evaluation backend for all deferred-graph boundaries.
    pub backend: Arc<dyn EvalBackend>,

    /// Pooled HTTP client for tile proxying and text generation.
    pub http: reqwest::Client,

    /// Text-generation backend configuration.
    pub recommender: RecommenderConfig,

    /// Prometheus exposition handle.
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// Build the production state from loaded configuration.
    pub fn new(config: ServiceConfig, metrics: PrometheusHandle) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build HTTP client")?;

        let backend = Arc::new(RestBackend::new(http.clone(), config.backend_base_url));

        Ok(Self {
            credentials: config.credentials,
            backend,
            http,
            recommender: config.recommender,
            metrics,
        })
    }
}
