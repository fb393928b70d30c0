//! Evaluation boundaries: the async backend trait and its REST
//! implementation.
//!
//! Every method is a single remote round-trip with exactly one resolution,
//! success or error. There are no retries; a transient failure at any
//! boundary fails the request that hit it.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use ndvi_common::{NdviError, NdviResult, TileDescriptor, Visualization};

use crate::expr::Expr;
use crate::session::{signed_assertion, Credentials, SessionHandle};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// The remote evaluation boundary.
#[async_trait]
pub trait EvalBackend: Send + Sync {
    /// Authenticate and initialize a session. Must complete before any
    /// evaluation call on a request path; failure maps to a server error
    /// and is never retried.
    async fn establish(&self, credentials: &Credentials) -> NdviResult<SessionHandle>;

    /// Register a visualization of the expression, returning its tile-URL
    /// template.
    async fn map_tiles(
        &self,
        session: &SessionHandle,
        expr: &Expr,
        viz: &Visualization,
    ) -> NdviResult<TileDescriptor>;

    /// Cheap existence probe: does the composite expression resolve to an
    /// image with any bands?
    async fn composite_exists(&self, session: &SessionHandle, expr: &Expr) -> NdviResult<bool>;

    /// Mean-reduce the expression at a point at the given scale.
    /// `Ok(None)` means the reduction yielded no value there.
    async fn sample_point(
        &self,
        session: &SessionHandle,
        expr: &Expr,
        lon: f64,
        lat: f64,
        scale_m: f64,
    ) -> NdviResult<Option<f64>>;
}

/// REST implementation over the imagery backend's v1 API.
#[derive(Debug, Clone)]
pub struct RestBackend {
    http: Client,
    base_url: String,
}

impl RestBackend {
    pub const DEFAULT_BASE_URL: &'static str = "https://earthengine.googleapis.com/v1";

    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    async fn post_json(
        &self,
        session: &SessionHandle,
        url: &str,
        body: &Value,
    ) -> NdviResult<Value> {
        debug!(url, "evaluating expression");
        let response = self
            .http
            .post(url)
            .bearer_auth(&session.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| NdviError::Evaluation(format!("backend request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = extract_error_message(&response.text().await.unwrap_or_default());
            return Err(NdviError::Evaluation(format!(
                "backend returned {}: {}",
                status, message
            )));
        }

        response
            .json()
            .await
            .map_err(|e| NdviError::Evaluation(format!("malformed backend response: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[async_trait]
impl EvalBackend for RestBackend {
    async fn establish(&self, credentials: &Credentials) -> NdviResult<SessionHandle> {
        let assertion = signed_assertion(&credentials.key, Utc::now())?;

        let response = self
            .http
            .post(&credentials.key.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| NdviError::Authentication(format!("token exchange failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NdviError::Authentication(format!(
                "token endpoint returned {}: {}",
                status,
                extract_error_message(&body)
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            NdviError::Authentication(format!("malformed token response: {}", e))
        })?;

        Ok(SessionHandle {
            access_token: token.access_token,
            project: credentials.project.clone(),
        })
    }

    async fn map_tiles(
        &self,
        session: &SessionHandle,
        expr: &Expr,
        viz: &Visualization,
    ) -> NdviResult<TileDescriptor> {
        let url = format!("{}/projects/{}/maps", self.base_url, session.project);
        let body = json!({
            "expression": expr,
            "visualization": viz,
        });

        let response = self.post_json(session, &url, &body).await?;
        let name = response
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                NdviError::Evaluation("map registration response missing 'name'".to_string())
            })?;

        Ok(TileDescriptor {
            url_template: format!("{}/{}/tiles/{{z}}/{{x}}/{{y}}", self.base_url, name),
            viz: viz.clone(),
        })
    }

    async fn composite_exists(&self, session: &SessionHandle, expr: &Expr) -> NdviResult<bool> {
        let url = format!("{}/projects/{}/image:metadata", self.base_url, session.project);
        let body = json!({ "expression": expr });

        let response = self.post_json(session, &url, &body).await?;
        Ok(metadata_has_bands(&response))
    }

    async fn sample_point(
        &self,
        session: &SessionHandle,
        expr: &Expr,
        lon: f64,
        lat: f64,
        scale_m: f64,
    ) -> NdviResult<Option<f64>> {
        let reduction = Expr::ReduceRegion {
            input: Box::new(expr.clone()),
            reducer: "mean".to_string(),
            geometry: json!({
                "type": "Point",
                "coordinates": [lon, lat],
            }),
            scale: scale_m,
        };

        let url = format!("{}/projects/{}/value:compute", self.base_url, session.project);
        let body = json!({ "expression": reduction });

        let response = self.post_json(session, &url, &body).await?;
        sample_from_response(&response)
    }
}

/// Pull the human-readable message out of a backend error body, falling
/// back to the raw body so the upstream message is always passed through.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| Some(v.get("error")?.get("message")?.as_str()?.to_string()))
        .unwrap_or_else(|| body.to_string())
}

/// An absent composite reports no bands.
fn metadata_has_bands(response: &Value) -> bool {
    response
        .get("bands")
        .and_then(Value::as_array)
        .map(|bands| !bands.is_empty())
        .unwrap_or(false)
}

/// A reduction that produced nothing (masked pixel, outside data extent,
/// NaN band math) comes back as a null result, never as zero.
fn sample_from_response(response: &Value) -> NdviResult<Option<f64>> {
    match response.get("result") {
        None => Err(NdviError::Evaluation(
            "reduction response missing 'result'".to_string(),
        )),
        Some(Value::Null) => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or_else(|| {
            NdviError::Evaluation(format!("non-numeric reduction result: {}", value))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_message_structured() {
        let body = r#"{"error": {"code": 400, "message": "Expression is invalid"}}"#;
        assert_eq!(extract_error_message(body), "Expression is invalid");
    }

    #[test]
    fn test_extract_error_message_passthrough() {
        assert_eq!(extract_error_message("upstream exploded"), "upstream exploded");
    }

    #[test]
    fn test_metadata_has_bands() {
        assert!(metadata_has_bands(&json!({"bands": [{"id": "B8"}]})));
        assert!(!metadata_has_bands(&json!({"bands": []})));
        assert!(!metadata_has_bands(&json!({})));
    }

    #[test]
    fn test_sample_from_response_value() {
        assert_eq!(
            sample_from_response(&json!({"result": 0.42})).unwrap(),
            Some(0.42)
        );
    }

    #[test]
    fn test_sample_from_response_null_is_no_data() {
        assert_eq!(sample_from_response(&json!({"result": null})).unwrap(), None);
    }

    #[test]
    fn test_sample_from_response_missing_is_error() {
        assert!(sample_from_response(&json!({})).is_err());
    }

    #[test]
    fn test_sample_from_response_non_numeric_is_error() {
        assert!(sample_from_response(&json!({"result": "high"})).is_err());
    }
}
