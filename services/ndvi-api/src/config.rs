//! Service configuration loading.

use std::path::Path;

use anyhow::{Context, Result};

use ee_client::Credentials;

/// Text-generation backend used by the recommendation endpoint.
#[derive(Debug, Clone)]
pub struct RecommenderConfig {
    /// Full URL of the generation endpoint.
    pub api_url: String,
    /// API key; requests fail with a backend error when unset.
    pub api_key: Option<String>,
}

/// Everything the service reads at startup. Immutable afterwards and
/// shared by reference across all requests.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub credentials: Credentials,
    pub backend_base_url: String,
    pub recommender: RecommenderConfig,
}

impl ServiceConfig {
    /// Load the configuration, reading the service-account key file once.
    /// A missing or malformed key file is fatal before any request is
    /// served.
    pub fn load(
        key_path: &Path,
        project: &str,
        backend_base_url: String,
        recommender: RecommenderConfig,
    ) -> Result<Self> {
        let credentials = Credentials::from_key_file(key_path, project)
            .context("failed to load service-account credentials")?;

        tracing::info!(
            project,
            client_email = %credentials.key.client_email,
            "loaded service-account credentials"
        );

        Ok(Self {
            credentials,
            backend_base_url,
            recommender,
        })
    }
}
