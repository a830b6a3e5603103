//! Operation handler that forwards to the engine over HTTP
//!
//! Each dispatched request is posted as JSON to
//! `{upstream}/_operations/{action}`; the engine's status and body are
//! relayed back unchanged. A body that is not valid UTF-8 is sent base64
//! encoded with `"body_encoding": "base64"`.

use async_trait::async_trait;
use axum::http::StatusCode;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use sift::config::UpstreamConfig;
use sift::handler::{Action, HandlerError, OperationHandler, OperationRequest, OperationResponse};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

pub struct RelayHandler {
    client: Client,
    url: String,
}

#[derive(Serialize)]
struct RelayedRequest<'a> {
    action: Action,
    method: &'a str,
    params: &'a HashMap<String, String>,
    query: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identity: Option<RelayedIdentity<'a>>,
    body: Cow<'a, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body_encoding: Option<&'static str>,
}

#[derive(Serialize)]
struct RelayedIdentity<'a> {
    name: &'a str,
    roles: &'a [String],
}

impl RelayHandler {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, action: Action) -> String {
        format!("{}/_operations/{}", self.url, action)
    }
}

#[async_trait]
impl OperationHandler for RelayHandler {
    async fn call(&self, request: OperationRequest) -> Result<OperationResponse, HandlerError> {
        let (body, body_encoding) = match std::str::from_utf8(&request.body) {
            Ok(text) => (Cow::Borrowed(text), None),
            Err(_) => (Cow::Owned(STANDARD.encode(&request.body)), Some("base64")),
        };

        let relayed = RelayedRequest {
            action: request.action,
            method: request.method.as_str(),
            params: &request.params,
            query: &request.query,
            targets: request.targets.as_deref(),
            identity: request.identity.as_ref().map(|identity| RelayedIdentity {
                name: &identity.name,
                roles: &identity.roles,
            }),
            body,
            body_encoding,
        };

        let response = self
            .client
            .post(self.endpoint(request.action))
            .json(&relayed)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(action = %request.action, "upstream request failed: {}", e);
                HandlerError::message(StatusCode::BAD_GATEWAY, format!("upstream unavailable: {}", e))
            })?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let bytes = response.bytes().await.map_err(|e| {
            HandlerError::message(StatusCode::BAD_GATEWAY, format!("failed to read upstream response: {}", e))
        })?;

        let body = if bytes.is_empty() {
            None
        } else {
            Some(serde_json::from_slice::<Value>(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            }))
        };

        if status.is_success() || status.is_redirection() {
            Ok(OperationResponse { status, body })
        } else {
            Err(HandlerError::new(status, body.unwrap_or(Value::Null)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::Method;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    fn request(action: Action, body: &'static str) -> OperationRequest {
        request_bytes(action, body.as_bytes())
    }

    fn request_bytes(action: Action, body: &'static [u8]) -> OperationRequest {
        OperationRequest {
            action,
            method: Method::POST,
            params: HashMap::from([("target".to_string(), "logs".to_string())]),
            query: BTreeMap::new(),
            targets: Some(vec!["logs-2025".to_string()]),
            identity: None,
            body: body.to_vec().into(),
        }
    }

    async fn upstream() -> String {
        let app = Router::new().route(
            "/_operations/:action",
            post(|Path(action): Path<String>, Json(relayed): Json<Value>| async move {
                if action == "index.Delete" {
                    return (
                        StatusCode::NOT_FOUND,
                        Json(json!({"error": "index logs-2025 does not exist"})),
                    );
                }
                (StatusCode::OK, Json(json!({"action": action, "relayed": relayed})))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn handler(url: String) -> RelayHandler {
        RelayHandler::new(&UpstreamConfig {
            url,
            timeout_ms: 5000,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_relays_neutral_request() {
        let relay = handler(upstream().await);
        let response = relay
            .call(request(Action::SearchDSL, r#"{"query":{"match_all":{}}}"#))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        let body = response.body.unwrap();
        assert_eq!(body["action"], "search.SearchDSL");
        assert_eq!(body["relayed"]["params"]["target"], "logs");
        assert_eq!(body["relayed"]["targets"], json!(["logs-2025"]));
        assert_eq!(body["relayed"]["body"], r#"{"query":{"match_all":{}}}"#);
    }

    #[tokio::test]
    async fn test_binary_body_is_base64_encoded() {
        let relay = handler(upstream().await);
        let raw: &'static [u8] = &[0xff, 0xfe, b'{', 0x80];
        let response = relay
            .call(request_bytes(Action::Bulk, raw))
            .await
            .unwrap();

        let relayed = &response.body.unwrap()["relayed"];
        assert_eq!(relayed["body_encoding"], "base64");
        let decoded = STANDARD.decode(relayed["body"].as_str().unwrap()).unwrap();
        assert_eq!(decoded, raw);
    }

    #[tokio::test]
    async fn test_text_body_has_no_encoding_marker() {
        let relay = handler(upstream().await);
        let response = relay.call(request(Action::Bulk, "{}\n")).await.unwrap();
        let relayed = &response.body.unwrap()["relayed"];
        assert!(relayed.get("body_encoding").is_none());
        assert_eq!(relayed["body"], "{}\n");
    }

    #[tokio::test]
    async fn test_relays_upstream_error_unchanged() {
        let relay = handler(upstream().await);
        let err = relay.call(request(Action::IndexDelete, "")).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.body, json!({"error": "index logs-2025 does not exist"}));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_bad_gateway() {
        let relay = handler("http://127.0.0.1:9".to_string());
        let err = relay.call(request(Action::IndexList, "")).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }
}
