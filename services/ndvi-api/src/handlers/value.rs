//! Point-sample handler: a single NDVI scalar for a lat/lon.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::Response,
};
use chrono::Utc;
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use ee_client::query::{ImageQuery, POINT_WINDOW_DAYS, SAMPLE_SCALE_METERS};
use ndvi_common::{GeoRegion, NdviError, NdviResult, RegionError, TimeWindow};

use super::common::{error_response, json_response};
use crate::state::AppState;

/// Query parameters for the point-value endpoint. Carried as strings so
/// malformed numbers produce a structured 400 instead of a bare rejection.
#[derive(Debug, Deserialize)]
pub struct ValueQueryParams {
    pub lat: Option<String>,
    pub lon: Option<String>,
}

/// GET /ndvi/value?lat=..&lon=..
#[instrument(skip(state))]
pub async fn ndvi_value_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ValueQueryParams>,
) -> Response {
    counter!("ndvi_requests_total", "endpoint" => "value").increment(1);

    match sample_ndvi(&state, &params).await {
        Ok(value) => json_response(StatusCode::OK, &json!({ "ndvi": value })),
        Err(err) => {
            tracing::warn!(%err, "point sample failed");
            error_response(&err)
        }
    }
}

fn parse_coordinate(name: &str, raw: Option<&str>) -> NdviResult<f64> {
    let raw = raw.ok_or_else(|| NdviError::MissingParameter(name.to_string()))?;
    raw.trim().parse::<f64>().map_err(|_| NdviError::InvalidParameter {
        param: name.to_string(),
        message: format!("'{}' is not a decimal number", raw),
    })
}

fn region_error_to_parameter(err: RegionError) -> NdviError {
    let param = match err {
        RegionError::LatitudeOutOfRange(_) => "lat",
        RegionError::LongitudeOutOfRange(_) => "lon",
    };
    NdviError::InvalidParameter {
        param: param.to_string(),
        message: err.to_string(),
    }
}

/// The full point-sampling path: validate, authenticate, assemble the
/// point-scoped query, pre-flight for an existing composite, then reduce.
async fn sample_ndvi(state: &AppState, params: &ValueQueryParams) -> NdviResult<f64> {
    // Validation happens before any backend call; invalid input never
    // costs an authentication round-trip.
    let lat = parse_coordinate("lat", params.lat.as_deref())?;
    let lon = parse_coordinate("lon", params.lon.as_deref())?;
    let region = GeoRegion::point(lon, lat).map_err(region_error_to_parameter)?;

    let session = state.backend.establish(&state.credentials).await?;

    let query = ImageQuery::new(region, TimeWindow::last_days(POINT_WINDOW_DAYS, Utc::now()));

    // Cheap existence probe before the costlier reduction.
    let exists = state
        .backend
        .composite_exists(&session, query.composite().expr())
        .await?;
    if !exists {
        return Err(NdviError::NoImageFound(query.describe()));
    }

    let sample = state
        .backend
        .sample_point(&session, query.ndvi().expr(), lon, lat, SAMPLE_SCALE_METERS)
        .await?;

    sample.ok_or(NdviError::NoDataAtLocation { lon, lat })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinate_valid() {
        assert_eq!(parse_coordinate("lat", Some("41.3")).unwrap(), 41.3);
        assert_eq!(parse_coordinate("lat", Some(" -12.5 ")).unwrap(), -12.5);
    }

    #[test]
    fn test_parse_coordinate_missing() {
        let err = parse_coordinate("lon", None).unwrap_err();
        assert!(matches!(err, NdviError::MissingParameter(ref p) if p == "lon"));
    }

    #[test]
    fn test_parse_coordinate_non_numeric() {
        let err = parse_coordinate("lat", Some("abc")).unwrap_err();
        assert!(matches!(err, NdviError::InvalidParameter { ref param, .. } if param == "lat"));
        assert_eq!(err.http_status_code(), 400);
    }

    #[test]
    fn test_out_of_range_latitude_names_lat() {
        let err = region_error_to_parameter(RegionError::LatitudeOutOfRange(95.0));
        assert!(matches!(err, NdviError::InvalidParameter { ref param, .. } if param == "lat"));
    }
}
