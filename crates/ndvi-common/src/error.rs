//! Error types for ndvi services.

use thiserror::Error;

/// Result type alias using NdviError.
pub type NdviResult<T> = Result<T, NdviError>;

/// Primary error type for the NDVI pipeline.
#[derive(Debug, Error)]
pub enum NdviError {
    // === Request Errors ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    // === Session Errors ===
    #[error("Authentication failed: {0}")]
    Authentication(String),

    // === Catalog / Evaluation Errors ===
    #[error("No qualifying image found: {0}")]
    NoImageFound(String),

    #[error("No data at location ({lon}, {lat})")]
    NoDataAtLocation { lon: f64, lat: f64 },

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    // === Proxy Errors ===
    #[error("Tile proxy I/O error: {0}")]
    ProxyIo(String),

    // === Startup Errors ===
    #[error("Configuration error: {0}")]
    Config(String),
}

impl NdviError {
    /// Short machine-readable code for this error, used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            NdviError::MissingParameter(_) => "missing_parameter",
            NdviError::InvalidParameter { .. } => "invalid_parameter",
            NdviError::Authentication(_) => "authentication_failed",
            NdviError::NoImageFound(_) => "no_image_found",
            NdviError::NoDataAtLocation { .. } => "no_data_at_location",
            NdviError::Evaluation(_) => "evaluation_failed",
            NdviError::ProxyIo(_) => "proxy_io_error",
            NdviError::Config(_) => "configuration_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            NdviError::MissingParameter(_) | NdviError::InvalidParameter { .. } => 400,

            NdviError::ProxyIo(_) => 502,

            NdviError::Authentication(_)
            | NdviError::NoImageFound(_)
            | NdviError::NoDataAtLocation { .. }
            | NdviError::Evaluation(_)
            | NdviError::Config(_) => 500,
        }
    }
}

impl From<serde_json::Error> for NdviError {
    fn from(err: serde_json::Error) -> Self {
        NdviError::Evaluation(format!("JSON error: {}", err))
    }
}
