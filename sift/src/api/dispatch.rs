//! Route table -> axum router
//!
//! Each declared route becomes a single-method `MethodRouter` whose
//! middleware is taken from its chain's stages, and whose terminal either
//! answers locally or builds an [`OperationRequest`] for the handler.

use super::alias::{resolve_aliases, AliasGate};
use super::chain::{Dialect, Stage};
use super::compat::{protocol_compat, CompatGate};
use super::error::ApiError;
use super::routes::{Endpoint, Route, RouteTable};
use crate::handler::{Action, OperationHandler, OperationRequest};
use crate::metrics;
use crate::registry::IndexRegistry;
use crate::security::{authorize, AuthorizationGate, Identity, SecurityContext};
use crate::{Error, Result};
use axum::{
    body::to_bytes,
    extract::{FromRequestParts, Path, Query, Request},
    http::{header, StatusCode, Uri},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{on, MethodFilter, MethodRouter},
    Json, Router,
};
use serde_json::json;
use sift_es_compat::{xpack_info, ClusterIdentity, EsLicense, EsRootInfo};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

/// Query parameters already normalized by the compatibility stage
#[derive(Debug, Clone)]
pub(crate) struct NormalizedQuery(pub BTreeMap<String, String>);

/// Concrete indices produced by alias resolution
#[derive(Debug, Clone)]
pub(crate) struct ResolvedTargets(pub Vec<String>);

/// Shared, read-only state behind every route
#[derive(Clone)]
pub struct DispatchContext {
    pub handler: Arc<dyn OperationHandler>,
    pub security: SecurityContext,
    pub indices: Arc<dyn IndexRegistry>,
    pub cluster: Arc<ClusterIdentity>,
    pub max_body_size: usize,
}

/// Mount every route in the table.
///
/// Methods declared on the same path share one `MethodRouter`; an
/// undeclared method falls through to the unmatched-route handler (logged
/// `404`), like a path no route matches.
pub fn build_router(table: &RouteTable, ctx: &DispatchContext) -> Result<Router> {
    let mut by_path: BTreeMap<&str, MethodRouter> = BTreeMap::new();
    for route in table.routes() {
        let method_router = method_router(route, ctx)?;
        let merged = match by_path.remove(route.path()) {
            Some(existing) => existing.merge(method_router),
            None => method_router,
        };
        by_path.insert(route.path(), merged);
    }

    let router = by_path
        .into_iter()
        .fold(Router::new(), |router, (path, method_router)| {
            router.route(path, method_router.fallback(sift_ui::fallback))
        });
    Ok(router)
}

fn method_router(route: &Route, ctx: &DispatchContext) -> Result<MethodRouter> {
    let filter = MethodFilter::try_from(route.method().clone()).map_err(|_| {
        Error::Config(format!(
            "unsupported method {} for route {}",
            route.method(),
            route.path()
        ))
    })?;

    let dialect = route.chain().dialect();
    let mut router = terminal(filter, route.endpoint(), dialect, ctx);

    // route_layer wraps outward: the last stage added runs first
    for stage in route.chain().stages().into_iter().rev() {
        router = match stage {
            Stage::Authorization(operation) => router.route_layer(from_fn_with_state(
                AuthorizationGate {
                    security: ctx.security.clone(),
                    operation,
                    dialect,
                },
                authorize,
            )),
            Stage::ProtocolCompatibility => router.route_layer(from_fn_with_state(
                CompatGate::new(route.endpoint(), ctx.max_body_size),
                protocol_compat,
            )),
            Stage::AliasResolution(policy) => router.route_layer(from_fn_with_state(
                AliasGate {
                    indices: ctx.indices.clone(),
                    policy,
                },
                resolve_aliases,
            )),
        };
    }

    Ok(router)
}

fn terminal(filter: MethodFilter, endpoint: Endpoint, dialect: Dialect, ctx: &DispatchContext) -> MethodRouter {
    match endpoint {
        Endpoint::Handler(action) => {
            let ctx = ctx.clone();
            on(filter, move |request: Request| dispatch(ctx, action, dialect, request))
        }
        Endpoint::EsInfo => {
            let cluster = ctx.cluster.clone();
            on(filter, move || async move { Json(EsRootInfo::new(&cluster)) })
        }
        Endpoint::EsLicense => {
            let cluster = ctx.cluster.clone();
            on(filter, move || async move { Json(EsLicense::new(&cluster)) })
        }
        Endpoint::EsXPack => {
            let cluster = ctx.cluster.clone();
            on(filter, move || async move { Json(xpack_info(&cluster)) })
        }
        Endpoint::Version => on(filter, version),
        Endpoint::Healthz => on(filter, healthz),
        Endpoint::Redirect(location) => on(filter, move || async move {
            (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)])
        }),
    }
}

async fn version() -> impl IntoResponse {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Terminal of every handler-backed route
async fn dispatch(ctx: DispatchContext, action: Action, dialect: Dialect, request: Request) -> Response {
    let started = Instant::now();
    let (mut parts, body) = request.into_parts();

    let params = match Path::<HashMap<String, String>>::from_request_parts(&mut parts, &()).await {
        Ok(Path(params)) => params,
        Err(_) => HashMap::new(),
    };
    let query = match parts.extensions.remove::<NormalizedQuery>() {
        Some(NormalizedQuery(query)) => query,
        None => raw_query(&parts.uri),
    };
    let targets = parts
        .extensions
        .remove::<ResolvedTargets>()
        .map(|ResolvedTargets(targets)| targets);
    let identity = parts.extensions.remove::<Identity>();

    let body = match to_bytes(body, ctx.max_body_size).await {
        Ok(body) => body,
        Err(e) => return ApiError::from_body_error(e).render(dialect),
    };

    let request = OperationRequest {
        action,
        method: parts.method,
        params,
        query,
        targets,
        identity,
        body,
    };

    let response = match ctx.handler.call(request).await {
        Ok(response) => response.into_response(),
        Err(err) => ApiError::Handler(err).render(dialect),
    };

    let status = response.status();
    metrics::record_dispatch(action.as_str(), dialect.as_str(), status.as_u16(), started.elapsed());
    if status.is_server_error() {
        tracing::error!(action = %action, dialect = %dialect, status = status.as_u16(), "handler failed");
    } else {
        tracing::debug!(
            action = %action,
            dialect = %dialect,
            status = status.as_u16(),
            took_ms = started.elapsed().as_millis() as u64,
            "dispatched"
        );
    }
    response
}

fn raw_query(uri: &Uri) -> BTreeMap<String, String> {
    Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map(|Query(pairs)| pairs.into_iter().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_query() {
        let uri: Uri = "/api/logs/_search?size=10&q=a%20b".parse().unwrap();
        let query = raw_query(&uri);
        assert_eq!(query.get("size").map(String::as_str), Some("10"));
        assert_eq!(query.get("q").map(String::as_str), Some("a b"));

        let uri: Uri = "/api/index".parse().unwrap();
        assert!(raw_query(&uri).is_empty());
    }
}
