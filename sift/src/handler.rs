//! Contract between the dispatch layer and the handlers that do the work
//!
//! Index management, document storage and query execution live behind
//! [`OperationHandler`]. The dispatch layer hands it a dialect-neutral
//! [`OperationRequest`] and relays whatever comes back without
//! reinterpreting it.

use crate::security::Identity;
use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Downstream handler a route dispatches to
///
/// Distinct from [`crate::security::Operation`]: several actions can share
/// one permission (`document.Bulkv2` is authorized as `document.Bulk`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Login,
    CreateUpdateUser,
    DeleteUser,
    ListUser,
    ListPermissions,
    ListRole,
    CreateUpdateRole,
    DeleteRole,
    IndexList,
    IndexNameList,
    IndexCreate,
    IndexDelete,
    IndexGet,
    IndexExists,
    IndexRefresh,
    IndexGetMapping,
    IndexSetMapping,
    IndexGetSettings,
    IndexSetSettings,
    IndexAnalyze,
    IndexListTemplate,
    IndexCreateTemplate,
    IndexGetTemplate,
    IndexDeleteTemplate,
    IndexCreateES,
    IndexGetESMapping,
    IndexAddOrRemoveESAlias,
    IndexGetESAliases,
    SearchV1,
    SearchDSL,
    MultipleSearch,
    DeleteByQuery,
    Bulk,
    BulkV2,
    ESBulk,
    Multi,
    DocumentCreateUpdate,
    DocumentGet,
    DocumentUpdate,
    DocumentDelete,
    PutDataStream,
    GetDataStream,
    ApiDocs,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Login => "auth.Login",
            Action::CreateUpdateUser => "auth.CreateUpdateUser",
            Action::DeleteUser => "auth.DeleteUser",
            Action::ListUser => "auth.ListUser",
            Action::ListPermissions => "auth.ListPermissions",
            Action::ListRole => "auth.ListRole",
            Action::CreateUpdateRole => "auth.CreateUpdateRole",
            Action::DeleteRole => "auth.DeleteRole",
            Action::IndexList => "index.List",
            Action::IndexNameList => "index.IndexNameList",
            Action::IndexCreate => "index.Create",
            Action::IndexDelete => "index.Delete",
            Action::IndexGet => "index.Get",
            Action::IndexExists => "index.Exists",
            Action::IndexRefresh => "index.Refresh",
            Action::IndexGetMapping => "index.GetMapping",
            Action::IndexSetMapping => "index.SetMapping",
            Action::IndexGetSettings => "index.GetSettings",
            Action::IndexSetSettings => "index.SetSettings",
            Action::IndexAnalyze => "index.Analyze",
            Action::IndexListTemplate => "index.ListTemplate",
            Action::IndexCreateTemplate => "index.CreateTemplate",
            Action::IndexGetTemplate => "index.GetTemplate",
            Action::IndexDeleteTemplate => "index.DeleteTemplate",
            Action::IndexCreateES => "index.CreateES",
            Action::IndexGetESMapping => "index.GetESMapping",
            Action::IndexAddOrRemoveESAlias => "index.AddOrRemoveESAlias",
            Action::IndexGetESAliases => "index.GetESAliases",
            Action::SearchV1 => "search.SearchV1",
            Action::SearchDSL => "search.SearchDSL",
            Action::MultipleSearch => "search.MultipleSearch",
            Action::DeleteByQuery => "search.DeleteByQuery",
            Action::Bulk => "document.Bulk",
            Action::BulkV2 => "document.Bulkv2",
            Action::ESBulk => "document.ESBulk",
            Action::Multi => "document.Multi",
            Action::DocumentCreateUpdate => "document.CreateUpdate",
            Action::DocumentGet => "document.Get",
            Action::DocumentUpdate => "document.Update",
            Action::DocumentDelete => "document.Delete",
            Action::PutDataStream => "elastic.PutDataStream",
            Action::GetDataStream => "elastic.GetDataStream",
            Action::ApiDocs => "meta.ApiDocs",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Dialect-neutral request handed to an [`OperationHandler`]
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub action: Action,
    pub method: Method,
    /// Named path segments (`target`, `id`, ...)
    pub params: HashMap<String, String>,
    /// Query parameters, already normalized for the compatibility surface
    pub query: BTreeMap<String, String>,
    /// Concrete indices after alias resolution; `None` when the route does
    /// not resolve aliases
    pub targets: Option<Vec<String>>,
    /// `None` when security is disabled or the route is public
    pub identity: Option<Identity>,
    pub body: Bytes,
}

impl OperationRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Indices the request addresses: resolved targets when available,
    /// otherwise the comma-separated `target` segment as written
    pub fn target_indices(&self) -> Vec<String> {
        if let Some(targets) = &self.targets {
            return targets.clone();
        }
        self.param("target")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| HandlerError::message(StatusCode::BAD_REQUEST, e.to_string()))
    }
}

/// Successful handler outcome
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResponse {
    pub status: StatusCode,
    pub body: Option<Value>,
}

impl OperationResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: Some(body),
        }
    }

    pub fn created(body: Value) -> Self {
        Self {
            status: StatusCode::CREATED,
            body: Some(body),
        }
    }

    /// Status-only response (e.g. `HEAD` existence checks)
    pub fn status(status: StatusCode) -> Self {
        Self { status, body: None }
    }
}

impl IntoResponse for OperationResponse {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        }
    }
}

/// Opaque handler failure, relayed to the client unchanged
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("handler failed with status {status}")]
pub struct HandlerError {
    pub status: StatusCode,
    pub body: Value,
}

impl HandlerError {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    /// `{"error": message}` body
    pub fn message(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Executes operations on behalf of the dispatch layer
#[async_trait]
pub trait OperationHandler: Send + Sync {
    async fn call(&self, request: OperationRequest) -> Result<OperationResponse, HandlerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(params: &[(&str, &str)], targets: Option<Vec<&str>>) -> OperationRequest {
        OperationRequest {
            action: Action::SearchDSL,
            method: Method::POST,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            query: BTreeMap::new(),
            targets: targets.map(|t| t.into_iter().map(String::from).collect()),
            identity: None,
            body: Bytes::from_static(br#"{"size": 3}"#),
        }
    }

    #[test]
    fn test_target_indices_prefers_resolved() {
        let req = request(&[("target", "logs")], Some(vec!["logs-2024", "logs-2025"]));
        assert_eq!(req.target_indices(), vec!["logs-2024", "logs-2025"]);
    }

    #[test]
    fn test_target_indices_falls_back_to_segment() {
        let req = request(&[("target", "a, b,,c")], None);
        assert_eq!(req.target_indices(), vec!["a", "b", "c"]);
        assert!(request(&[], None).target_indices().is_empty());
    }

    #[test]
    fn test_resolved_empty_is_not_replaced() {
        let req = request(&[("target", "missing")], Some(vec![]));
        assert!(req.target_indices().is_empty());
    }

    #[test]
    fn test_json_body() {
        #[derive(serde::Deserialize)]
        struct Body {
            size: u32,
        }
        let body: Body = request(&[], None).json().unwrap();
        assert_eq!(body.size, 3);
    }

    #[test]
    fn test_action_serializes_as_token() {
        assert_eq!(
            serde_json::to_value(Action::BulkV2).unwrap(),
            json!("document.Bulkv2")
        );
    }
}
