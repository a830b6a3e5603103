use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::credentials::{extract_credential, CredentialVerifier, RoleTable, StaticCredentials};
use super::operations::{Operation, OperationRegistry};
use super::types::Identity;
use crate::api::chain::Dialect;
use crate::api::error::ApiError;
use crate::config::SecurityConfig;
use crate::metrics;
use crate::Result;

/// Everything authorization needs, shared by every protected route
#[derive(Clone)]
pub struct SecurityContext {
    enabled: bool,
    verifier: Arc<dyn CredentialVerifier>,
    roles: Arc<RoleTable>,
    operations: Arc<OperationRegistry>,
}

impl SecurityContext {
    /// Credentials, roles and operation overrides from the config file
    pub fn from_config(config: &SecurityConfig) -> Result<Self> {
        Self::with_verifier(config, Arc::new(StaticCredentials::new(config)))
    }

    /// Same as [`from_config`](Self::from_config) with an external verifier
    pub fn with_verifier(
        config: &SecurityConfig,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Result<Self> {
        Ok(Self {
            enabled: config.enabled,
            verifier,
            roles: Arc::new(RoleTable::new(config)),
            operations: Arc::new(OperationRegistry::new(&config.operations)?),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn operations(&self) -> &OperationRegistry {
        &self.operations
    }

    /// Decide whether the request may perform `operation`.
    ///
    /// `Ok(None)` when security is disabled.
    pub async fn check(
        &self,
        headers: &HeaderMap,
        operation: Operation,
    ) -> std::result::Result<Option<Identity>, ApiError> {
        if !self.enabled {
            return Ok(None);
        }

        let credential = extract_credential(headers).ok_or_else(|| {
            ApiError::Unauthenticated("missing authentication credentials".to_string())
        })?;

        let identity = self.verifier.verify(&credential).await.ok_or_else(|| {
            ApiError::Unauthenticated("unable to authenticate with provided credentials".to_string())
        })?;

        let permission = self.operations.permission(operation);
        if !self.roles.grants(&identity, permission) {
            return Err(ApiError::PermissionDenied {
                operation,
                user: identity.name,
            });
        }

        Ok(Some(identity))
    }
}

/// Middleware state for one protected route
#[derive(Clone)]
pub struct AuthorizationGate {
    pub security: SecurityContext,
    pub operation: Operation,
    pub dialect: Dialect,
}

/// Authorization stage: runs before anything else on a protected route
pub async fn authorize(
    State(gate): State<AuthorizationGate>,
    mut request: Request,
    next: Next,
) -> Response {
    match gate.security.check(request.headers(), gate.operation).await {
        Ok(Some(identity)) => {
            request.extensions_mut().insert(identity);
        }
        Ok(None) => {}
        Err(err) => {
            let reason = match &err {
                ApiError::PermissionDenied { .. } => "forbidden",
                _ => "unauthenticated",
            };
            tracing::warn!(
                operation = %gate.operation,
                method = %request.method(),
                path = %request.uri().path(),
                reason,
                "request denied: {}",
                err
            );
            metrics::record_auth_denied(gate.operation.as_str(), reason);
            return err.render(gate.dialect);
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKeyConfig, RoleConfig};
    use axum::http::{header, HeaderValue};
    use std::collections::HashMap;

    fn config() -> SecurityConfig {
        SecurityConfig {
            enabled: true,
            api_keys: vec![ApiKeyConfig {
                key: "reader-key".to_string(),
                name: "reader".to_string(),
                roles: vec!["reader".to_string()],
            }],
            users: vec![],
            roles: HashMap::from([(
                "reader".to_string(),
                RoleConfig {
                    permissions: vec!["search.*".to_string()],
                },
            )]),
            operations: HashMap::new(),
        }
    }

    fn bearer(key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {key}")).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_check_grants_matching_permission() {
        let security = SecurityContext::from_config(&config()).unwrap();
        let identity = security
            .check(&bearer("reader-key"), Operation::SearchDSL)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.name, "reader");
    }

    #[tokio::test]
    async fn test_check_denies_other_permission() {
        let security = SecurityContext::from_config(&config()).unwrap();
        let err = security
            .check(&bearer("reader-key"), Operation::IndexDelete)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::PermissionDenied { operation: Operation::IndexDelete, .. }
        ));
    }

    #[tokio::test]
    async fn test_check_rejects_missing_and_unknown_credentials() {
        let security = SecurityContext::from_config(&config()).unwrap();
        assert!(matches!(
            security.check(&HeaderMap::new(), Operation::SearchDSL).await,
            Err(ApiError::Unauthenticated(_))
        ));
        assert!(matches!(
            security.check(&bearer("forged"), Operation::SearchDSL).await,
            Err(ApiError::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn test_permission_override_applies() {
        let mut config = config();
        config
            .operations
            .insert("index.Delete".to_string(), "search.Admin".to_string());
        let security = SecurityContext::from_config(&config).unwrap();
        assert!(security
            .check(&bearer("reader-key"), Operation::IndexDelete)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_disabled_security_passes_through() {
        let mut config = config();
        config.enabled = false;
        let security = SecurityContext::from_config(&config).unwrap();
        assert_eq!(
            security.check(&HeaderMap::new(), Operation::IndexDelete).await.unwrap(),
            None
        );
    }
}
