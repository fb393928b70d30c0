//! Proxy-mode tile tests against a live local upstream.

mod common;

use std::sync::{Arc, Mutex};

use axum::extract::{Extension, Path};
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::routing::get;
use axum::Router;

use ndvi_api::handlers::tiles::tile_proxy_handler;

use common::{body_json, spawn_server, test_state, MockBackend};

fn caller_headers(user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, user_agent.parse().unwrap());
    headers
}

#[tokio::test]
async fn proxy_streams_upstream_body_and_forwards_user_agent() {
    let seen_user_agent: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let capture = seen_user_agent.clone();

    let upstream = Router::new().route(
        "/maps/m1/tiles/:z/:x/:y",
        get(move |headers: HeaderMap| {
            let capture = capture.clone();
            async move {
                *capture.lock().unwrap() = headers
                    .get(header::USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .map(String::from);
                (
                    [
                        (header::CONTENT_TYPE, "image/png"),
                        (HeaderName::from_static("x-upstream-tag"), "tile-42"),
                    ],
                    "tile-bytes",
                )
            }
        }),
    );
    let addr = spawn_server(upstream).await;

    let backend = Arc::new(MockBackend::default().with_template(format!(
        "http://{}/maps/m1/tiles/{{z}}/{{x}}/{{y}}",
        addr
    )));
    let state = test_state(backend);

    let response = tile_proxy_handler(
        Extension(state),
        Path((5u32, 10u32, 3u32)),
        caller_headers("leaflet-test/1.0"),
    )
    .await;

    // Status, headers, and body mirror the upstream response.
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-upstream-tag").unwrap(),
        "tile-42"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"tile-bytes");

    // The caller's User-Agent reached the upstream unmodified.
    assert_eq!(
        seen_user_agent.lock().unwrap().as_deref(),
        Some("leaflet-test/1.0")
    );
}

#[tokio::test]
async fn proxy_mirrors_upstream_error_status() {
    let upstream = Router::new().route(
        "/maps/m1/tiles/:z/:x/:y",
        get(|| async { (StatusCode::NOT_FOUND, "tile expired") }),
    );
    let addr = spawn_server(upstream).await;

    let backend = Arc::new(MockBackend::default().with_template(format!(
        "http://{}/maps/m1/tiles/{{z}}/{{x}}/{{y}}",
        addr
    )));
    let state = test_state(backend);

    let response = tile_proxy_handler(
        Extension(state),
        Path((1u32, 2u32, 3u32)),
        caller_headers("leaflet-test/1.0"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"tile expired");
}

#[tokio::test]
async fn proxy_fetch_failure_is_a_distinct_proxy_error() {
    // Reserve an ephemeral port, then close it so the fetch has nowhere to
    // connect.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = Arc::new(
        MockBackend::default()
            .with_template(format!("http://{}/tiles/{{z}}/{{x}}/{{y}}", addr)),
    );
    let state = test_state(backend);

    let response = tile_proxy_handler(
        Extension(state),
        Path((1u32, 2u32, 3u32)),
        HeaderMap::new(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["code"], "proxy_io_error");
}
