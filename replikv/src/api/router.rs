//! Request routing for the API.
//!
//! Routes requests to handlers based on method and path.

use super::handlers;
use super::response;
use super::state::AppState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;

/// Prefix of the per-key paths.
const KEYS_PREFIX: &str = "/keys/";

/// Route an incoming request to the appropriate handler.
pub async fn route<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    tracing::debug!(method = %method, path = %path, "Routing request");

    let response = match (method, path.as_str()) {
        (Method::GET, "/ping") => handlers::health::ping(state).await,
        (_, "/ping") => response::method_not_allowed(&["GET"]),

        (Method::POST, "/keys") => handlers::keys::set(req, state).await,
        (_, "/keys") => response::method_not_allowed(&["POST"]),

        (method, p) if p.starts_with(KEYS_PREFIX) => {
            let key = &p[KEYS_PREFIX.len()..];
            match method {
                Method::GET => handlers::keys::get(key, state).await,
                Method::DELETE => handlers::keys::delete(key, state).await,
                _ => response::method_not_allowed(&["GET", "DELETE"]),
            }
        }

        (Method::POST, "/join") => handlers::join::join(req, state).await,
        (_, "/join") => response::method_not_allowed(&["POST"]),

        _ => response::not_found(),
    };

    Ok(response)
}
