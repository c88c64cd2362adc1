//! Response builders for the API.

use bytes::Bytes;
use http_body_util::Full;
use hyper::http::header::{self, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;

fn with_body(
    status: StatusCode,
    content_type: Option<&'static str>,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    response
}

/// Build a JSON response with status code.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|e| {
        serde_json::json!({
            "error": {
                "code": "internal",
                "message": format!("Serialization error: {}", e),
                "status": 500
            }
        })
        .to_string()
    });

    with_body(status, Some("application/json"), Bytes::from(json))
}

/// Build a 200 OK JSON response.
pub fn ok<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, body)
}

/// Build a 200 OK response with no body.
pub fn ok_empty() -> Response<Full<Bytes>> {
    with_body(StatusCode::OK, None, Bytes::new())
}

/// Build a 200 OK plain text response.
pub fn ok_text(text: &'static str) -> Response<Full<Bytes>> {
    with_body(
        StatusCode::OK,
        Some("text/plain; charset=utf-8"),
        Bytes::from_static(text.as_bytes()),
    )
}

/// Build a 404 Not Found response.
pub fn not_found() -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": {
            "code": "not_found",
            "message": "Not found",
            "status": 404
        }
    });
    json_response(StatusCode::NOT_FOUND, &body)
}

/// Build a 405 Method Not Allowed response.
pub fn method_not_allowed(allowed: &[&str]) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": {
            "code": "method_not_allowed",
            "message": format!("Method not allowed. Allowed: {}", allowed.join(", ")),
            "status": 405
        }
    });

    let mut response = json_response(StatusCode::METHOD_NOT_ALLOWED, &body);
    if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
        response.headers_mut().insert(header::ALLOW, value);
    }
    response
}
