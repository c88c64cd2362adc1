//! Request body helpers.

use super::error::ApiError;
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::Request;
use hyper::body::Body;
use replikv_cluster::StoreError;
use serde::de::DeserializeOwned;
use std::fmt::Display;

/// Read the whole request body.
pub async fn read_body<B>(req: Request<B>) -> Result<Bytes, ApiError>
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    req.into_body()
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| {
            ApiError::from(StoreError::MalformedRequest(format!(
                "failed to read request body: {e}"
            )))
        })
}

/// Read the request body as JSON.
pub async fn read_json<B, T>(req: Request<B>) -> Result<T, ApiError>
where
    B: Body<Data = Bytes>,
    B::Error: Display,
    T: DeserializeOwned,
{
    let body = read_body(req).await?;
    serde_json::from_slice(&body).map_err(|e| {
        ApiError::from(StoreError::MalformedRequest(format!("invalid JSON: {e}")))
    })
}
