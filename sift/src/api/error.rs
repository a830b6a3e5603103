//! Request-level error taxonomy and its rendering per dialect

use super::chain::Dialect;
use crate::handler::HandlerError;
use crate::security::Operation;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http_body_util::LengthLimitError;
use serde_json::json;
use sift_es_compat::EsError;

const AUTH_CHALLENGE: &str = "Basic realm=\"sift\"";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or unverifiable credential
    #[error("{0}")]
    Unauthenticated(String),

    /// Valid identity without the operation's permission
    #[error("action [{operation}] is unauthorized for user [{user}]")]
    PermissionDenied { operation: Operation, user: String },

    /// Input malformed in a way only the compatibility dialect defines
    #[error(transparent)]
    BadRequest(EsError),

    /// Target expression resolved to no index on a route that needs one
    #[error("no such index [{0}]")]
    IndexNotFound(String),

    /// Body exceeded `server.max_body_size`
    #[error("request body too large: {0}")]
    PayloadTooLarge(String),

    /// Body could not be read (client went away, broken stream)
    #[error("failed to read request body: {0}")]
    Body(String),

    /// Passed through untouched
    #[error(transparent)]
    Handler(HandlerError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            ApiError::BadRequest(e) => e.status_code(),
            ApiError::IndexNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Body(_) => StatusCode::BAD_REQUEST,
            ApiError::Handler(e) => e.status,
        }
    }

    /// Classify a failure of `axum::body::to_bytes`
    pub fn from_body_error(err: axum::Error) -> Self {
        let inner = err.into_inner();
        let root: &(dyn std::error::Error + 'static) = &*inner;
        let mut source = Some(root);
        while let Some(e) = source {
            if e.is::<LengthLimitError>() {
                return ApiError::PayloadTooLarge(e.to_string());
            }
            source = e.source();
        }
        ApiError::Body(inner.to_string())
    }

    /// Render in the envelope the route's dialect expects
    pub fn render(self, dialect: Dialect) -> Response {
        let challenge = matches!(self, ApiError::Unauthenticated(_));

        let mut response = match (self, dialect) {
            (ApiError::Handler(e), _) => return e.into_response(),
            (err, Dialect::Native) => {
                let status = err.status_code();
                (status, Json(json!({ "error": err.to_string() }))).into_response()
            }
            (err, Dialect::Compat) => err.into_es().into_response(),
        };

        if challenge {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(AUTH_CHALLENGE),
            );
        }
        response
    }

    fn into_es(self) -> EsError {
        match self {
            ApiError::Unauthenticated(reason) => EsError::Unauthenticated(reason),
            err @ ApiError::PermissionDenied { .. } => EsError::Forbidden(err.to_string()),
            ApiError::BadRequest(e) => e,
            ApiError::IndexNotFound(index) => EsError::IndexNotFound(index),
            ApiError::PayloadTooLarge(reason) | ApiError::Body(reason) => EsError::Parse(reason),
            ApiError::Handler(e) => EsError::IllegalArgument(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_native_unauthenticated() {
        let response =
            ApiError::Unauthenticated("missing authentication credentials".into()).render(Dialect::Native);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"sift\""
        );
        let body = body_json(response).await;
        assert_eq!(body["error"], "missing authentication credentials");
    }

    #[tokio::test]
    async fn test_compat_permission_denied() {
        let response = ApiError::PermissionDenied {
            operation: Operation::SearchDSL,
            user: "reader".into(),
        }
        .render(Dialect::Compat);
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());

        let body = body_json(response).await;
        assert_eq!(body["status"], 403);
        assert_eq!(body["error"]["type"], "security_exception");
        assert_eq!(
            body["error"]["reason"],
            "action [search.SearchDSL] is unauthorized for user [reader]"
        );
    }

    #[tokio::test]
    async fn test_handler_error_is_verbatim() {
        let original = json!({"error": {"type": "version_conflict_engine_exception"}, "status": 409});
        let err = ApiError::Handler(HandlerError::new(StatusCode::CONFLICT, original.clone()));

        for dialect in [Dialect::Native, Dialect::Compat] {
            let err = match &err {
                ApiError::Handler(h) => ApiError::Handler(h.clone()),
                _ => unreachable!(),
            };
            let response = err.render(dialect);
            assert_eq!(response.status(), StatusCode::CONFLICT);
            assert_eq!(body_json(response).await, original);
        }
    }

    #[tokio::test]
    async fn test_body_over_limit_is_payload_too_large() {
        let err = axum::body::to_bytes(axum::body::Body::from("0123456789"), 4)
            .await
            .unwrap_err();
        let err = ApiError::from_body_error(err);
        assert!(matches!(err, ApiError::PayloadTooLarge(_)));
        assert_eq!(err.render(Dialect::Native).status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_broken_body_stream_is_bad_request() {
        let err = axum::Error::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset",
        ));
        let err = ApiError::from_body_error(err);
        assert!(matches!(err, ApiError::Body(_)));
        assert_eq!(err.render(Dialect::Native).status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_compat_index_not_found() {
        let response = ApiError::IndexNotFound("logs".into()).render(Dialect::Compat);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "index_not_found_exception");
        assert_eq!(body["error"]["index"], "logs");
    }
}
