//! Common utilities shared across handlers.

use axum::{
    http::{header, StatusCode},
    response::Response,
};
use serde_json::{json, Value};

use ndvi_common::NdviError;

/// Render an error as the structured JSON body the API contract promises:
/// message, machine code, and the status from the taxonomy.
pub fn error_response(err: &NdviError) -> Response {
    error_response_with_details(err, None)
}

/// As [`error_response`], with an extra `details` field when the caller
/// has upstream context to pass through.
pub fn error_response_with_details(err: &NdviError, details: Option<Value>) -> Response {
    let status = StatusCode::from_u16(err.http_status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut body = json!({
        "error": err.to_string(),
        "code": err.code(),
    });
    if let Some(details) = details {
        body["details"] = details;
    }

    json_response(status, &body)
}

/// Serialize a JSON value into a response with the given status.
pub fn json_response(status: StatusCode, body: &Value) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.to_string().into())
        .unwrap()
}
