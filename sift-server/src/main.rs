use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod relay;

use relay::RelayHandler;
use sift::api::ApiServer;
use sift::config::{Config, ObservabilityConfig};
use sift::registry::MemoryIndexRegistry;

#[derive(Parser, Debug)]
#[command(name = "sift-server")]
#[command(about = "sift API dispatch and compatibility server")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "sift.toml", env = "SIFT_CONFIG")]
    config: String,

    /// Host to bind to (overrides server.bind_addr)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides server.bind_addr)
    #[arg(short, long)]
    port: Option<u16>,
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&observability.log_level));

    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| observability.log_format.clone());

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// `host`/`port` flags replace the matching half of `bind_addr`
fn bind_addr(config: &Config, host: Option<String>, port: Option<u16>) -> String {
    let configured = &config.server.bind_addr;
    let (default_host, default_port) = configured
        .rsplit_once(':')
        .unwrap_or((configured.as_str(), "4080"));

    format!(
        "{}:{}",
        host.as_deref().unwrap_or(default_host),
        port.map(|p| p.to_string())
            .unwrap_or_else(|| default_port.to_string())
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load_or_create(std::path::Path::new(&args.config))?;
    init_tracing(&config.observability);

    tracing::info!("Config file: {}", args.config);

    let handler = Arc::new(RelayHandler::new(&config.upstream)?);
    let indices = Arc::new(MemoryIndexRegistry::from_config(&config.indices)?);
    tracing::info!(
        upstream = %config.upstream.url,
        indices = config.indices.len(),
        "Relaying operations upstream"
    );

    let mut server = ApiServer::new(&config, handler, indices)?;

    if config.observability.metrics_enabled {
        let handle = PrometheusBuilder::new().install_recorder()?;
        sift::metrics::describe();
        server = server.with_metrics(handle);
        tracing::info!("Prometheus metrics at /metrics");
    }

    if !config.security.enabled {
        tracing::warn!("Security is disabled; every route is open");
    }

    let addr = bind_addr(&config, args.host, args.port);
    server.serve(&addr).await?;

    Ok(())
}
