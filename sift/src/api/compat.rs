//! Protocol compatibility stage for the `/es` surface
//!
//! Translates the Elasticsearch wire conventions into the neutral form
//! handlers see: vendor media types become plain ones, query parameters are
//! normalized, and the body is checked against what the endpoint expects.
//! On the way out every response carries the product header, and `?pretty`
//! re-indents JSON bodies.

use super::chain::Dialect;
use super::dispatch::NormalizedQuery;
use super::error::ApiError;
use super::routes::Endpoint;
use crate::handler::Action;
use crate::metrics;
use axum::{
    body::{to_bytes, Body},
    extract::{Query, Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use sift_es_compat::{normalize_media_type, normalize_params, EsError, Payload, PRODUCT_HEADER, PRODUCT_NAME};

/// Middleware state for one compatibility route
#[derive(Debug, Clone, Copy)]
pub struct CompatGate {
    pub payload: Payload,
    pub max_body_size: usize,
}

impl CompatGate {
    pub fn new(endpoint: Endpoint, max_body_size: usize) -> Self {
        Self {
            payload: payload_for(endpoint),
            max_body_size,
        }
    }
}

/// Body rules per endpoint
pub fn payload_for(endpoint: Endpoint) -> Payload {
    let Endpoint::Handler(action) = endpoint else {
        return Payload::Ignored;
    };

    match action {
        Action::SearchDSL | Action::IndexCreateES => Payload::JsonObject,
        Action::MultipleSearch => Payload::NdJson("msearch"),
        Action::ESBulk => Payload::NdJson("bulk"),
        Action::DeleteByQuery => Payload::RequiredFields(&["query"]),
        Action::IndexAddOrRemoveESAlias => Payload::RequiredFields(&["actions"]),
        Action::IndexCreateTemplate
        | Action::IndexSetMapping
        | Action::IndexSetSettings
        | Action::IndexAnalyze
        | Action::DocumentCreateUpdate
        | Action::DocumentUpdate => Payload::RequiredJsonObject,
        _ => Payload::Ignored,
    }
}

pub async fn protocol_compat(
    State(gate): State<CompatGate>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let prepared = async {
        normalize_media_headers(&mut parts.headers)?;

        let raw = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|e| EsError::IllegalArgument(format!("failed to parse query string: {}", e)))?;
        let normalized = normalize_params(raw.0)?;

        let bytes = to_bytes(body, gate.max_body_size)
            .await
            .map_err(|e| EsError::Parse(format!("failed to read request body: {}", e)))?;
        gate.payload.validate(&bytes)?;

        Ok::<_, EsError>((normalized, bytes))
    }
    .await;

    let (normalized, bytes) = match prepared {
        Ok(prepared) => prepared,
        Err(err) => {
            tracing::debug!(
                method = %parts.method,
                path = %parts.uri.path(),
                error_type = err.error_type(),
                "compatibility request rejected: {}",
                err
            );
            metrics::record_compat_rejected(err.error_type());
            return with_product_header(ApiError::BadRequest(err).render(Dialect::Compat));
        }
    };

    parts.extensions.insert(NormalizedQuery(normalized.params));
    let response = next.run(Request::from_parts(parts, Body::from(bytes))).await;

    let response = if normalized.pretty {
        prettify(response).await
    } else {
        response
    };
    with_product_header(response)
}

fn normalize_media_headers(headers: &mut HeaderMap) -> Result<(), EsError> {
    for name in [header::CONTENT_TYPE, header::ACCEPT] {
        let Some(value) = headers.get(&name) else {
            continue;
        };
        let Ok(value) = value.to_str() else {
            continue;
        };
        if let Some(plain) = normalize_media_type(value)? {
            headers.insert(name, HeaderValue::from_static(plain));
        }
    }
    Ok(())
}

fn with_product_header(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(PRODUCT_HEADER, HeaderValue::from_static(PRODUCT_NAME));
    response
}

/// Re-indent a JSON response body; anything else is returned as is
async fn prettify(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if !is_json {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("failed to buffer response for pretty printing: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    let pretty = serde_json::from_slice::<Value>(&bytes)
        .ok()
        .and_then(|value| serde_json::to_vec_pretty(&value).ok());

    match pretty {
        Some(mut pretty) => {
            pretty.push(b'\n');
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(pretty))
        }
        None => Response::from_parts(parts, Body::from(bytes)),
    }
}
