//! Configuration management for the sift API layer
//!
//! Default config location: ./sift.toml

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use sift_es_compat::ClusterIdentity;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub compat: CompatConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Indices and aliases known at startup
    #[serde(default)]
    pub indices: Vec<IndexConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Maximum request body size in bytes (default: 100MB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    /// Whole-request deadline; 0 disables it
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "127.0.0.1:4080".to_string()
}

fn default_max_body_size() -> usize {
    100 * 1024 * 1024 // 100MB
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cors: CorsConfig::default(),
            max_body_size: default_max_body_size(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Allowed origins. Use "*" to accept any origin.
    #[serde(default = "default_cors_origins")]
    pub origins: Vec<String>,
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            origins: default_cors_origins(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecurityConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub api_keys: Vec<ApiKeyConfig>,
    #[serde(default)]
    pub users: Vec<UserConfig>,
    #[serde(default)]
    pub roles: HashMap<String, RoleConfig>,
    /// Operation token -> permission, overriding the default of the token itself
    #[serde(default)]
    pub operations: HashMap<String, String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_keys: Vec::new(),
            users: Vec::new(),
            roles: HashMap::new(),
            operations: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiKeyConfig {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserConfig {
    pub name: String,
    /// Hex-encoded SHA-256 of the password
    pub password_sha256: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RoleConfig {
    /// Granted permissions; `*` and trailing-`*` patterns are allowed
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// What the compatibility surface reports about itself
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompatConfig {
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,
    #[serde(default = "default_cluster_name")]
    pub node_name: String,
    #[serde(default = "default_cluster_uuid")]
    pub cluster_uuid: String,
    /// Elasticsearch version advertised at `GET /es/`
    #[serde(default = "default_es_version")]
    pub version_number: String,
}

fn default_cluster_name() -> String {
    "sift".to_string()
}

fn default_cluster_uuid() -> String {
    "sift-es-compat".to_string()
}

fn default_es_version() -> String {
    "8.1.0".to_string()
}

impl Default for CompatConfig {
    fn default() -> Self {
        Self {
            cluster_name: default_cluster_name(),
            node_name: default_cluster_name(),
            cluster_uuid: default_cluster_uuid(),
            version_number: default_es_version(),
        }
    }
}

impl CompatConfig {
    pub fn identity(&self) -> ClusterIdentity {
        ClusterIdentity {
            node_name: self.node_name.clone(),
            cluster_name: self.cluster_name.clone(),
            cluster_uuid: self.cluster_uuid.clone(),
            version_number: self.version_number.clone(),
            build_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log output format: "pretty" or "json"
    /// Override with LOG_FORMAT env var
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter string
    /// Override with RUST_LOG env var
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable Prometheus metrics at GET /metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_level() -> String {
    "info,sift=debug".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
            metrics_enabled: true,
        }
    }
}

/// Engine that executes operations on behalf of this layer
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_url")]
    pub url: String,
    /// Request timeout in milliseconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_ms: u64,
}

fn default_upstream_url() -> String {
    "http://127.0.0.1:4081".to_string()
}

fn default_upstream_timeout() -> u64 {
    30000
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            timeout_ms: default_upstream_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load config from file path, or create default
    pub fn load_or_create(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::load(config_path)
        } else {
            let config = Config::default();
            // Try to save default config
            if let Some(parent) = config_path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            let _ = config.save(config_path);
            Ok(config)
        }
    }

    /// Load and validate config from an existing file
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings that would make the server unusable at runtime
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.observability.log_format.as_str(), "pretty" | "json") {
            return Err(anyhow!(
                "observability.log_format must be \"pretty\" or \"json\", got {:?}",
                self.observability.log_format
            ));
        }

        for user in &self.security.users {
            let hash = &user.password_sha256;
            if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(anyhow!(
                    "security.users[{}].password_sha256 must be 64 hex characters",
                    user.name
                ));
            }
        }

        for (name, role) in &self.security.roles {
            if role.permissions.iter().any(|p| p.trim().is_empty()) {
                return Err(anyhow!("security.roles.{} has an empty permission", name));
            }
        }

        Ok(())
    }
}
