//! Recommendation handler: templated agronomic guidance from a
//! text-generation backend.
//!
//! This endpoint is plumbing around the core pipeline: it accepts the NDVI
//! scalar the client already fetched, renders a prompt, and relays the
//! generated text. Backend failures are passed through verbatim.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::Response,
    Json,
};
use metrics::counter;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use ndvi_common::{NdviError, NdviResult};

use super::common::{error_response, error_response_with_details, json_response};
use crate::state::AppState;

/// Sampling parameters sent with every generation call.
const TEMPERATURE: f64 = 0.2;
const TOP_P: f64 = 0.95;
const MAX_OUTPUT_TOKENS: u32 = 512;

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub ndvi: Option<f64>,
    pub weather: Option<String>,
    pub lang: Option<String>,
}

/// POST /recommend
#[instrument(skip(state, request))]
pub async fn recommend_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<RecommendRequest>,
) -> Response {
    counter!("ndvi_requests_total", "endpoint" => "recommend").increment(1);

    let missing = missing_fields(&request);
    if !missing.is_empty() {
        return error_response(&NdviError::MissingParameter(missing.join(", ")));
    }

    let prompt = build_prompt(
        request.lat.unwrap(),
        request.lon.unwrap(),
        request.ndvi.unwrap(),
        request.weather.as_deref().unwrap(),
        request.lang.as_deref().unwrap(),
    );

    match generate(&state, &prompt).await {
        Ok(text) => json_response(StatusCode::OK, &json!({ "recommendation": text })),
        Err(err) => {
            tracing::warn!(%err, "recommendation generation failed");
            error_response_with_details(
                &NdviError::Evaluation("recommendation generation failed".to_string()),
                Some(Value::String(err.to_string())),
            )
        }
    }
}

fn missing_fields(request: &RecommendRequest) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if request.lat.is_none() {
        missing.push("lat");
    }
    if request.lon.is_none() {
        missing.push("lon");
    }
    if request.ndvi.is_none() {
        missing.push("ndvi");
    }
    if request.weather.is_none() {
        missing.push("weather");
    }
    if request.lang.is_none() {
        missing.push("lang");
    }
    missing
}

fn build_prompt(lat: f64, lon: f64, ndvi: f64, weather: &str, lang: &str) -> String {
    format!(
        "You are an agronomy advisor for smallholder farms.\n\
         Field location: latitude {:.5}, longitude {:.5}\n\
         Latest satellite vegetation index (NDVI): {:.3}\n\
         Recent weather: {}\n\
         Give short, practical recommendations for the coming weeks: \
         irrigation, fertilization, and crop-stress checks appropriate to \
         this vegetation level. Respond in the language with tag '{}'.",
        lat, lon, ndvi, weather, lang
    )
}

async fn generate(state: &AppState, prompt: &str) -> NdviResult<String> {
    let api_key = state.recommender.api_key.as_deref().ok_or_else(|| {
        NdviError::Evaluation("text-generation backend is not configured".to_string())
    })?;

    let body = json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "temperature": TEMPERATURE,
            "topP": TOP_P,
            "maxOutputTokens": MAX_OUTPUT_TOKENS,
        },
    });

    let response = state
        .http
        .post(&state.recommender.api_url)
        .query(&[("key", api_key)])
        .json(&body)
        .send()
        .await
        .map_err(|e| NdviError::Evaluation(format!("generation request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(NdviError::Evaluation(format!(
            "generation backend returned {}: {}",
            status, detail
        )));
    }

    let payload: Value = response
        .json()
        .await
        .map_err(|e| NdviError::Evaluation(format!("malformed generation response: {}", e)))?;

    payload["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| NdviError::Evaluation("generation response carried no text".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_request() -> RecommendRequest {
        RecommendRequest {
            lat: Some(41.3),
            lon: Some(69.2),
            ndvi: Some(0.41),
            weather: Some("dry, 31°C".to_string()),
            lang: Some("uz".to_string()),
        }
    }

    #[test]
    fn test_missing_fields_empty_for_full_request() {
        assert!(missing_fields(&full_request()).is_empty());
    }

    #[test]
    fn test_missing_fields_lists_all_absent() {
        let mut request = full_request();
        request.ndvi = None;
        request.lang = None;
        assert_eq!(missing_fields(&request), vec!["ndvi", "lang"]);
    }

    #[test]
    fn test_prompt_carries_inputs() {
        let prompt = build_prompt(41.3, 69.2, 0.412, "dry, 31°C", "uz");
        assert!(prompt.contains("41.30000"));
        assert!(prompt.contains("69.20000"));
        assert!(prompt.contains("0.412"));
        assert!(prompt.contains("dry, 31°C"));
        assert!(prompt.contains("'uz'"));
    }
}
