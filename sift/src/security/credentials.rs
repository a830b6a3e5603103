//! Credential extraction and verification
//!
//! Verifying a credential is delegated to a [`CredentialVerifier`]; the
//! dispatch layer only extracts the credential from the request and asks.

use super::types::{Credential, Identity, Permission};
use crate::config::SecurityConfig;
use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Resolves a credential to an identity
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// `None` when the credential is unknown or invalid
    async fn verify(&self, credential: &Credential) -> Option<Identity>;
}

/// Read the credential from the `Authorization` header.
///
/// Supports `Bearer <api key>` and `Basic <base64(user:password)>`.
pub fn extract_credential(headers: &HeaderMap) -> Option<Credential> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();

    if let Some(key) = value.strip_prefix("Bearer ") {
        let key = key.trim();
        return (!key.is_empty()).then(|| Credential::ApiKey(key.to_string()));
    }

    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    if user.is_empty() {
        return None;
    }

    Some(Credential::Basic {
        user: user.to_string(),
        password: password.to_string(),
    })
}

/// Verifier backed by the API keys and users in the config file
pub struct StaticCredentials {
    /// API key -> (name, roles)
    keys: HashMap<String, (String, Vec<String>)>,
    /// User name -> (sha256 hex of password, roles)
    users: HashMap<String, (String, Vec<String>)>,
}

impl StaticCredentials {
    pub fn new(config: &SecurityConfig) -> Self {
        let keys = config
            .api_keys
            .iter()
            .map(|ak| (ak.key.clone(), (ak.name.clone(), ak.roles.clone())))
            .collect();

        let users = config
            .users
            .iter()
            .map(|u| {
                (
                    u.name.clone(),
                    (u.password_sha256.to_ascii_lowercase(), u.roles.clone()),
                )
            })
            .collect();

        Self { keys, users }
    }

    fn authenticate_key(&self, api_key: &str) -> Option<Identity> {
        self.keys.get(api_key).map(|(name, roles)| Identity {
            name: name.clone(),
            roles: roles.clone(),
            key_prefix: key_prefix(api_key),
        })
    }

    fn authenticate_user(&self, user: &str, password: &str) -> Option<Identity> {
        let (expected, roles) = self.users.get(user)?;
        if hash_password(password) != *expected {
            return None;
        }
        Some(Identity {
            name: user.to_string(),
            roles: roles.clone(),
            key_prefix: String::new(),
        })
    }
}

#[async_trait]
impl CredentialVerifier for StaticCredentials {
    async fn verify(&self, credential: &Credential) -> Option<Identity> {
        match credential {
            Credential::ApiKey(key) => self.authenticate_key(key),
            Credential::Basic { user, password } => self.authenticate_user(user, password),
        }
    }
}

fn key_prefix(api_key: &str) -> String {
    match api_key.char_indices().nth(13) {
        Some((idx, _)) => format!("{}...", &api_key[..idx]),
        None => api_key.to_string(),
    }
}

/// Hex-encoded SHA-256, the format of `password_sha256` in the config
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Role name -> granted permission patterns
#[derive(Debug, Clone, Default)]
pub struct RoleTable {
    roles: HashMap<String, Vec<String>>,
}

impl RoleTable {
    pub fn new(config: &SecurityConfig) -> Self {
        let roles = config
            .roles
            .iter()
            .map(|(name, role)| (name.clone(), role.permissions.clone()))
            .collect();
        Self { roles }
    }

    /// Whether any of the identity's roles grants `permission`
    pub fn grants(&self, identity: &Identity, permission: &Permission) -> bool {
        identity.roles.iter().any(|role| {
            self.roles.get(role).is_some_and(|patterns| {
                patterns
                    .iter()
                    .any(|pattern| glob_match(pattern, permission.as_str()))
            })
        })
    }
}

/// Simple glob matching: only supports trailing `*` (e.g., `search.*`, `*`)
pub(crate) fn glob_match(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        value.starts_with(prefix)
    } else {
        pattern == value
    }
}
