//! Liveness endpoint.

use crate::api::response;
use crate::api::state::AppState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use std::sync::Arc;

/// GET /ping
pub async fn ping(_state: Arc<AppState>) -> Response<Full<Bytes>> {
    response::ok_text("pong")
}
