//! Join endpoint.

use crate::api::error::ApiError;
use crate::api::request;
use crate::api::response;
use crate::api::state::AppState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Request, Response};
use serde::Deserialize;
use std::fmt::Display;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct JoinRequest {
    addr: String,
}

/// POST /join
///
/// Body is `{"addr": "<raft address>"}`. Adds the node as a voter.
pub async fn join<B>(req: Request<B>, state: Arc<AppState>) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let JoinRequest { addr } = match request::read_json(req).await {
        Ok(join) => join,
        Err(e) => return e.into_response(),
    };

    match state.membership.join(&addr).await {
        Ok(()) => response::ok_empty(),
        Err(e) => {
            tracing::error!(peer = %addr, error = %e, "failed to add voter");
            ApiError::from(e).into_response()
        }
    }
}
