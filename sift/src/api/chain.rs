//! Per-route middleware chains
//!
//! A [`Chain`] can only be created by the surface builders in
//! [`crate::api::routes`], and [`Chain::stages`] is the single place that
//! decides stage order. Authorization therefore always runs first, and
//! alias resolution can only be attached to compatibility routes.

use crate::security::Operation;
use std::fmt;

/// Wire dialect a route belongs to, decided by the prefix it is declared under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Native,
    Compat,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Native => "native",
            Dialect::Compat => "compat",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What alias resolution does when a target expression matches no index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AliasPolicy {
    /// Multi-target reads: an empty target set is a valid (empty) result
    Tolerant,
    /// Operations on existing indices: an empty target set is `404`
    Required,
    /// Writes that may create an index: unknown names pass through, an
    /// alias must name exactly one index
    Create,
}

impl AliasPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AliasPolicy::Tolerant => "tolerant",
            AliasPolicy::Required => "required",
            AliasPolicy::Create => "create",
        }
    }
}

/// Named middleware stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Authorization(Operation),
    ProtocolCompatibility,
    AliasResolution(AliasPolicy),
}

/// Middleware composition for one route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chain {
    dialect: Dialect,
    operation: Option<Operation>,
    alias: Option<AliasPolicy>,
}

impl Chain {
    /// No authorization; informational and credential-exchange routes
    pub(crate) fn public(dialect: Dialect) -> Self {
        Self {
            dialect,
            operation: None,
            alias: None,
        }
    }

    pub(crate) fn protected(dialect: Dialect, operation: Operation) -> Self {
        Self {
            dialect,
            operation: Some(operation),
            alias: None,
        }
    }

    /// Compatibility route whose `:target` is resolved against aliases
    pub(crate) fn resolving(operation: Operation, policy: AliasPolicy) -> Self {
        Self {
            dialect: Dialect::Compat,
            operation: Some(operation),
            alias: Some(policy),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    pub fn alias_policy(&self) -> Option<AliasPolicy> {
        self.alias
    }

    pub fn is_public(&self) -> bool {
        self.operation.is_none()
    }

    /// Stages in execution order, handler excluded
    pub fn stages(&self) -> Vec<Stage> {
        let mut stages = Vec::with_capacity(3);
        if let Some(operation) = self.operation {
            stages.push(Stage::Authorization(operation));
        }
        if self.dialect == Dialect::Compat {
            stages.push(Stage::ProtocolCompatibility);
        }
        if let Some(policy) = self.alias {
            stages.push(Stage::AliasResolution(policy));
        }
        stages
    }
}
