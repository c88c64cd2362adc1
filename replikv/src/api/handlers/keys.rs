//! Key endpoints.

use crate::api::error::ApiError;
use crate::api::request;
use crate::api::response;
use crate::api::state::AppState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Request, Response};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

/// POST /keys
///
/// Body is a JSON object of string keys to string values. Pairs are written
/// one at a time; the first failure ends the request, and pairs written
/// before it stay written.
pub async fn set<B>(req: Request<B>, state: Arc<AppState>) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let pairs: BTreeMap<String, String> = match request::read_json(req).await {
        Ok(pairs) => pairs,
        Err(e) => return e.into_response(),
    };

    for (key, value) in pairs {
        if let Err(e) = state.store.set(key.clone(), value).await {
            tracing::warn!(key = %key, error = %e, "set failed");
            return ApiError::from(e).into_response();
        }
    }

    response::ok_empty()
}

/// GET /keys/{key}
///
/// Reads the local map. A missing key reads as the empty string.
pub async fn get(key: &str, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let value = state.store.get(key).unwrap_or_default();
    let body = BTreeMap::from([(key, value)]);
    response::ok(&body)
}

/// DELETE /keys/{key}
pub async fn delete(key: &str, state: Arc<AppState>) -> Response<Full<Bytes>> {
    match state.store.delete(key).await {
        Ok(()) => response::ok_empty(),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "delete failed");
            ApiError::from(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::testing::test_state;
    use http_body_util::BodyExt;
    use hyper::StatusCode;
    use replikv_cluster::NodeRole;

    fn post(body: &'static str) -> Request<Full<Bytes>> {
        Request::post("/keys")
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    }

    async fn json(response: Response<Full<Bytes>>) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn set_then_get() {
        let (state, _) = test_state(NodeRole::Leader);

        let response = set(post(r#"{"user1":"batman","user2":"robin"}"#), state.clone()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(get("user1", state.clone()).await).await;
        assert_eq!(body, serde_json::json!({"user1": "batman"}));
        assert_eq!(state.store.get("user2").as_deref(), Some("robin"));
    }

    #[tokio::test]
    async fn get_missing_key_is_empty_string() {
        let (state, _) = test_state(NodeRole::Follower);
        let body = json(get("nobody", state).await).await;
        assert_eq!(body, serde_json::json!({"nobody": ""}));
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let (state, _) = test_state(NodeRole::Leader);

        for body in ["not json", r#"["a"]"#, r#"{"k": 1}"#] {
            let response = set(post(body), state.clone()).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
        }
        assert_eq!(state.store.get("k"), None);
    }

    #[tokio::test]
    async fn follower_write_is_not_leader() {
        let (state, _) = test_state(NodeRole::Follower);

        let response = set(post(r#"{"x":"1"}"#), state.clone()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json(response).await;
        assert_eq!(body["error"]["code"], "not_leader");
        assert_eq!(body["error"]["leader"], "127.0.0.1:9000");
        assert_eq!(state.store.get("x"), None);

        let response = delete("x", state).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn first_failure_stops_the_batch() {
        let (state, engine) = test_state(NodeRole::Leader);
        *engine.fail_after.lock() = Some(1);

        // Keys are applied in sorted order: "a" succeeds, "b" fails, "c" is never tried.
        let response = set(post(r#"{"c":"3","a":"1","b":"2"}"#), state.clone()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(state.store.get("a").as_deref(), Some("1"));
        assert_eq!(state.store.get("b"), None);
        assert_eq!(state.store.get("c"), None);
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let (state, _) = test_state(NodeRole::Leader);
        state.store.set("gone", "soon").await.unwrap();

        let response = delete("gone", state.clone()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.store.get("gone"), None);
    }
}
