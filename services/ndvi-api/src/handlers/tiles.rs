//! Map-tile handlers: redirect and proxy modes over one resolution path.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Extension, Path},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use chrono::Utc;
use metrics::counter;
use tracing::{debug, instrument};

use ee_client::query::{ImageQuery, TILE_WINDOW_DAYS};
use ndvi_common::{service_area, GeoRegion, NdviError, NdviResult, TileCoord, TimeWindow, Visualization};

use super::common::error_response;
use crate::state::AppState;

/// GET /tiles/:z/:x/:y - redirect to the resolved upstream tile URL.
#[instrument(skip(state))]
pub async fn tile_redirect_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((z, x, y)): Path<(u32, u32, u32)>,
) -> Response {
    counter!("ndvi_requests_total", "endpoint" => "tile_redirect").increment(1);

    match resolve_tile_url(&state, TileCoord::new(z, x, y)).await {
        Ok(url) => Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, url)
            .body(Body::empty())
            .unwrap(),
        Err(err) => {
            tracing::warn!(%err, "tile resolution failed");
            error_response(&err)
        }
    }
}

/// GET /tiles/proxy/:z/:x/:y - fetch the resolved tile server-side and
/// stream it back.
#[instrument(skip(state, headers))]
pub async fn tile_proxy_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((z, x, y)): Path<(u32, u32, u32)>,
    headers: HeaderMap,
) -> Response {
    counter!("ndvi_requests_total", "endpoint" => "tile_proxy").increment(1);

    match proxy_tile(&state, TileCoord::new(z, x, y), &headers).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(%err, "tile proxy failed");
            error_response(&err)
        }
    }
}

/// Resolve a tile coordinate to a fully substituted upstream URL:
/// authenticate, assemble the deferred NDVI image over the service area,
/// register the visualization, and fill the returned template.
///
/// The tile path carries no existence pre-flight; with no qualifying
/// imagery the upstream renders a blank tile.
async fn resolve_tile_url(state: &AppState, coord: TileCoord) -> NdviResult<String> {
    let session = state.backend.establish(&state.credentials).await?;

    let query = ImageQuery::new(
        GeoRegion::Rect(service_area()),
        TimeWindow::last_days(TILE_WINDOW_DAYS, Utc::now()),
    );

    let descriptor = state
        .backend
        .map_tiles(&session, query.ndvi().expr(), &Visualization::ndvi())
        .await?;

    debug!(template = %descriptor.url_template, "resolved tile template");

    descriptor
        .tile_url(coord)
        .map_err(|e| NdviError::Evaluation(e.to_string()))
}

async fn proxy_tile(
    state: &AppState,
    coord: TileCoord,
    caller_headers: &HeaderMap,
) -> NdviResult<Response> {
    let url = resolve_tile_url(state, coord).await?;

    let mut request = state.http.get(&url);
    if let Some(user_agent) = caller_headers.get(header::USER_AGENT) {
        if let Ok(value) = reqwest::header::HeaderValue::from_bytes(user_agent.as_bytes()) {
            request = request.header(reqwest::header::USER_AGENT, value);
        }
    }

    let upstream = request
        .send()
        .await
        .map_err(|e| NdviError::ProxyIo(format!("tile fetch failed: {}", e)))?;

    let status = StatusCode::from_u16(upstream.status().as_u16())
        .map_err(|e| NdviError::ProxyIo(format!("invalid upstream status: {}", e)))?;

    let mut builder = Response::builder().status(status);
    for (name, value) in upstream.headers() {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        let Ok(name) = HeaderName::try_from(name.as_str()) else {
            continue;
        };
        let Ok(value) = HeaderValue::from_bytes(value.as_bytes()) else {
            continue;
        };
        builder = builder.header(name, value);
    }

    // Stream upstream bytes through as received; the full payload is never
    // buffered.
    builder
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| NdviError::ProxyIo(format!("failed to build proxied response: {}", e)))
}

fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}
