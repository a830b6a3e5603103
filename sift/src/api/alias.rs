//! Alias resolution stage
//!
//! Expands the `:target` segment of a compatibility route into concrete
//! index names against one registry snapshot, and hands them to the handler
//! as [`ResolvedTargets`]. What an empty result means depends on the route's
//! [`AliasPolicy`].

use super::chain::{AliasPolicy, Dialect};
use super::dispatch::ResolvedTargets;
use super::error::ApiError;
use crate::metrics;
use crate::registry::{split_expression, IndexRegistry, IndexSnapshot};
use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use sift_es_compat::EsError;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Middleware state for one resolving route
#[derive(Clone)]
pub struct AliasGate {
    pub indices: Arc<dyn IndexRegistry>,
    pub policy: AliasPolicy,
}

pub async fn resolve_aliases(
    State(gate): State<AliasGate>,
    params: Option<Path<HashMap<String, String>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(expression) = params.and_then(|Path(mut p)| p.remove("target")) else {
        return next.run(request).await;
    };

    let snapshot = gate.indices.snapshot();
    match apply_policy(&snapshot, &expression, gate.policy) {
        Ok(targets) => {
            let outcome = if targets.is_empty() { "empty" } else { "resolved" };
            metrics::record_alias_resolution(gate.policy.as_str(), outcome);
            tracing::debug!(
                expression = %expression,
                policy = gate.policy.as_str(),
                targets = ?targets,
                "resolved target expression"
            );
            request.extensions_mut().insert(ResolvedTargets(targets));
            next.run(request).await
        }
        Err(err) => {
            metrics::record_alias_resolution(gate.policy.as_str(), "rejected");
            tracing::debug!(
                expression = %expression,
                policy = gate.policy.as_str(),
                "target expression rejected: {}",
                err
            );
            err.render(Dialect::Compat)
        }
    }
}

/// Resolve `expression` under `policy`
pub fn apply_policy(
    snapshot: &IndexSnapshot,
    expression: &str,
    policy: AliasPolicy,
) -> Result<Vec<String>, ApiError> {
    match policy {
        AliasPolicy::Tolerant => Ok(snapshot.resolve(expression)),
        AliasPolicy::Required => {
            let targets = snapshot.resolve(expression);
            if targets.is_empty() {
                return Err(ApiError::IndexNotFound(expression.to_string()));
            }
            Ok(targets)
        }
        AliasPolicy::Create => resolve_write_targets(snapshot, expression),
    }
}

/// Writes may name an index that does not exist yet, but must never fan out:
/// wildcards are rejected and an alias must have exactly one member.
fn resolve_write_targets(snapshot: &IndexSnapshot, expression: &str) -> Result<Vec<String>, ApiError> {
    let mut seen = BTreeSet::new();
    let mut targets = Vec::new();

    for token in split_expression(expression) {
        if token == "_all" || token.contains('*') {
            return Err(ApiError::BadRequest(EsError::InvalidIndexName {
                index: token.to_string(),
                reason: "must not contain the following characters [*]".to_string(),
            }));
        }

        let index = if snapshot.is_index(token) {
            token.to_string()
        } else if snapshot.is_alias(token) {
            let members = snapshot.resolve_token(token);
            match members.as_slice() {
                [single] => single.clone(),
                [] => return Err(ApiError::IndexNotFound(token.to_string())),
                _ => {
                    return Err(ApiError::BadRequest(EsError::IllegalArgument(format!(
                        "no write index is defined for alias [{}]. The write index may be explicitly disabled using is_write_index=false or the alias points to multiple indices without one being designated as a write index",
                        token
                    ))))
                }
            }
        } else {
            token.to_string()
        };

        if seen.insert(index.clone()) {
            targets.push(index);
        }
    }

    if targets.is_empty() {
        return Err(ApiError::BadRequest(EsError::InvalidIndexName {
            index: expression.to_string(),
            reason: "must not be empty".to_string(),
        }));
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::registry::MemoryIndexRegistry;

    fn snapshot() -> Arc<IndexSnapshot> {
        MemoryIndexRegistry::from_config(&[
            IndexConfig {
                name: "logs-2024".to_string(),
                aliases: vec!["logs".to_string()],
            },
            IndexConfig {
                name: "logs-2025".to_string(),
                aliases: vec!["logs".to_string(), "logs-write".to_string()],
            },
        ])
        .unwrap()
        .snapshot()
    }

    #[test]
    fn test_tolerant_allows_empty() {
        let targets = apply_policy(&snapshot(), "missing-*", AliasPolicy::Tolerant).unwrap();
        assert!(targets.is_empty());
    }

    #[test]
    fn test_required_rejects_empty() {
        let err = apply_policy(&snapshot(), "missing", AliasPolicy::Required).unwrap_err();
        assert!(matches!(err, ApiError::IndexNotFound(ref i) if i == "missing"));

        let targets = apply_policy(&snapshot(), "logs", AliasPolicy::Required).unwrap();
        assert_eq!(targets, vec!["logs-2024", "logs-2025"]);
    }

    #[test]
    fn test_create_resolves_single_member_alias() {
        let targets = apply_policy(&snapshot(), "logs-write", AliasPolicy::Create).unwrap();
        assert_eq!(targets, vec!["logs-2025"]);
    }

    #[test]
    fn test_create_passes_unknown_names_through() {
        let targets = apply_policy(&snapshot(), "fresh", AliasPolicy::Create).unwrap();
        assert_eq!(targets, vec!["fresh"]);
    }

    #[test]
    fn test_create_rejects_fan_out() {
        assert!(matches!(
            apply_policy(&snapshot(), "logs", AliasPolicy::Create),
            Err(ApiError::BadRequest(EsError::IllegalArgument(_)))
        ));
        assert!(matches!(
            apply_policy(&snapshot(), "logs-*", AliasPolicy::Create),
            Err(ApiError::BadRequest(EsError::InvalidIndexName { .. }))
        ));
    }
}
