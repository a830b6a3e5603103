use crate::config::{Config, CorsConfig};
use crate::handler::OperationHandler;
use crate::registry::IndexRegistry;
use crate::security::SecurityContext;
use crate::Result;
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::dispatch::{build_router, DispatchContext};
use super::routes::RouteTable;

pub struct ApiServer {
    table: RouteTable,
    ctx: DispatchContext,
    cors_config: CorsConfig,
    request_timeout: Option<Duration>,
    metrics: Option<PrometheusHandle>,
}

impl ApiServer {
    /// Server authenticating against the credentials in `config`
    pub fn new(
        config: &Config,
        handler: Arc<dyn OperationHandler>,
        indices: Arc<dyn IndexRegistry>,
    ) -> Result<Self> {
        let security = SecurityContext::from_config(&config.security)?;
        Self::with_security(config, handler, indices, security)
    }

    pub fn with_security(
        config: &Config,
        handler: Arc<dyn OperationHandler>,
        indices: Arc<dyn IndexRegistry>,
        security: SecurityContext,
    ) -> Result<Self> {
        let table = RouteTable::standard()?;
        let request_timeout = match config.server.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            table,
            ctx: DispatchContext {
                handler,
                security,
                indices,
                cluster: Arc::new(config.compat.identity()),
                max_body_size: config.server.max_body_size,
            },
            cors_config: config.server.cors.clone(),
            request_timeout,
            metrics: None,
        })
    }

    /// Expose the recorder at `GET /metrics`
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.table
    }

    /// Build CORS layer from configuration
    fn build_cors_layer(&self) -> CorsLayer {
        if !self.cors_config.enabled {
            return CorsLayer::new();
        }

        let origins: Vec<HeaderValue> = self
            .cors_config
            .origins
            .iter()
            .filter(|o| o.as_str() != "*")
            .filter_map(|o| o.parse().ok())
            .collect();

        let has_wildcard = self.cors_config.origins.iter().any(|o| o == "*");

        // Credentials rule out `Any`, so a wildcard echoes the caller's origin
        let cors = if has_wildcard {
            CorsLayer::new().allow_origin(AllowOrigin::mirror_request())
        } else if origins.is_empty() {
            return CorsLayer::new();
        } else {
            CorsLayer::new().allow_origin(origins)
        };

        cors.allow_methods([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::PUT,
            Method::HEAD,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::CONTENT_LENGTH])
        .allow_credentials(true)
        .max_age(Duration::from_secs(12 * 60 * 60))
    }

    pub fn router(&self) -> Result<Router> {
        let mut router = build_router(&self.table, &self.ctx)?.merge(sift_ui::ui_router());

        if let Some(handle) = self.metrics.clone() {
            router = router.route(
                "/metrics",
                get(move || std::future::ready(handle.render())).fallback(sift_ui::fallback),
            );
        }

        let mut router = router.fallback(sift_ui::fallback).layer(self.build_cors_layer());
        if let Some(timeout) = self.request_timeout {
            router = router.layer(TimeoutLayer::new(timeout));
        }

        Ok(router.layer(TraceLayer::new_for_http()))
    }

    pub async fn serve(self, addr: &str) -> Result<()> {
        let router = self.router()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(
            routes = self.table.routes().len(),
            security = self.ctx.security.is_enabled(),
            "Server listening on {}",
            addr
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| crate::Error::Server(e.to_string()))?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
