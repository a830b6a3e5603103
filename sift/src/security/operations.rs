//! Operation identifiers and the permission each one requires
//!
//! An [`Operation`] is the join key between a route and the permission a
//! caller's role must hold. Routes only carry the operation; the permission
//! is owned by the [`OperationRegistry`], which is built and validated once
//! at startup.

use super::types::Permission;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

macro_rules! operations {
    ($($variant:ident => $token:literal,)+) => {
        /// A protected logical action, decoupled from any wire route
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Operation {
            $($variant,)+
        }

        impl Operation {
            pub const ALL: &'static [Operation] = &[$(Operation::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Operation::$variant => $token,)+
                }
            }
        }

        impl FromStr for Operation {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($token => Ok(Operation::$variant),)+
                    other => Err(Error::UnknownOperation(other.to_string())),
                }
            }
        }
    };
}

operations! {
    AuthCreateUpdateUser => "auth.CreateUpdateUser",
    AuthDeleteUser => "auth.DeleteUser",
    AuthListUser => "auth.ListUser",
    AuthListPermissions => "auth.ListPermissions",
    AuthListRole => "auth.ListRole",
    AuthCreateUpdateRole => "auth.CreateUpdateRole",
    AuthDeleteRole => "auth.DeleteRole",
    IndexList => "index.List",
    IndexNameList => "index.IndexNameList",
    IndexCreate => "index.Create",
    IndexDelete => "index.Delete",
    IndexGet => "index.Get",
    IndexExists => "index.Exists",
    IndexRefresh => "index.Refresh",
    IndexGetMapping => "index.GetMapping",
    IndexSetMapping => "index.SetMapping",
    IndexGetSettings => "index.GetSettings",
    IndexSetSettings => "index.SetSettings",
    IndexAnalyze => "index.Analyze",
    IndexListTemplate => "index.ListTemplate",
    IndexCreateTemplate => "index.CreateTemplate",
    IndexGetTemplate => "index.GetTemplate",
    IndexDeleteTemplate => "index.DeleteTemplate",
    IndexCreateES => "index.CreateES",
    IndexGetESMapping => "index.GetESMapping",
    IndexAddOrRemoveESAlias => "index.AddOrRemoveESAlias",
    IndexGetESAliases => "index.GetESAliases",
    SearchV1 => "search.SearchV1",
    SearchDSL => "search.SearchDSL",
    SearchMultipleSearch => "search.MultipleSearch",
    SearchDeleteByQuery => "search.DeleteByQuery",
    DocumentBulk => "document.Bulk",
    DocumentESBulk => "document.ESBulk",
    DocumentMulti => "document.Multi",
    DocumentCreate => "document.Create",
    DocumentCreateUpdate => "document.CreateUpdate",
    DocumentGet => "document.Get",
    DocumentUpdate => "document.Update",
    DocumentDelete => "document.Delete",
    ElasticPutDataStream => "elastic.PutDataStream",
    ElasticGetDataStream => "elastic.GetDataStream",
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only mapping from every [`Operation`] to its required [`Permission`]
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    permissions: HashMap<Operation, Permission>,
}

impl OperationRegistry {
    /// Build the registry from configured overrides.
    ///
    /// Every operation defaults to a permission named after its own token.
    /// Overrides are keyed by operation token; an unknown token or an empty
    /// permission fails startup.
    pub fn new(overrides: &HashMap<String, String>) -> Result<Self> {
        let mut permissions: HashMap<Operation, Permission> = Operation::ALL
            .iter()
            .map(|op| (*op, Permission::new(op.as_str())))
            .collect();

        for (token, permission) in overrides {
            let operation: Operation = token.parse()?;
            if permission.trim().is_empty() {
                return Err(Error::Config(format!(
                    "empty permission for operation {}",
                    operation
                )));
            }
            permissions.insert(operation, Permission::new(permission.trim()));
        }

        let registry = Self { permissions };
        registry.validate()?;
        Ok(registry)
    }

    fn validate(&self) -> Result<()> {
        for op in Operation::ALL {
            match self.permissions.get(op) {
                Some(p) if !p.as_str().is_empty() => {}
                _ => return Err(Error::UnmappedOperation(op.to_string())),
            }
        }
        Ok(())
    }

    pub fn permission(&self, operation: Operation) -> &Permission {
        // validate() guarantees an entry for every variant
        &self.permissions[&operation]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_round_trip_through_from_str() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), *op);
        }
    }

    #[test]
    fn test_tokens_are_unique_and_namespaced() {
        let mut tokens: Vec<&str> = Operation::ALL.iter().map(|op| op.as_str()).collect();
        let total = tokens.len();
        tokens.sort();
        tokens.dedup();
        assert_eq!(tokens.len(), total);
        assert!(tokens.iter().all(|t| t.split_once('.').is_some()));
    }

    #[test]
    fn test_default_permission_is_operation_token() {
        let registry = OperationRegistry::new(&HashMap::new()).unwrap();
        assert_eq!(
            registry.permission(Operation::DocumentBulk).as_str(),
            "document.Bulk"
        );
    }

    #[test]
    fn test_override_permission() {
        let overrides = HashMap::from([
            ("search.SearchDSL".to_string(), "search".to_string()),
            ("search.SearchV1".to_string(), " search ".to_string()),
        ]);
        let registry = OperationRegistry::new(&overrides).unwrap();
        assert_eq!(registry.permission(Operation::SearchDSL).as_str(), "search");
        assert_eq!(registry.permission(Operation::SearchV1).as_str(), "search");
    }

    #[test]
    fn test_unknown_operation_fails_startup() {
        let overrides = HashMap::from([("search.Telepathy".to_string(), "x".to_string())]);
        let err = OperationRegistry::new(&overrides).unwrap_err();
        assert!(matches!(err, Error::UnknownOperation(t) if t == "search.Telepathy"));
    }

    #[test]
    fn test_empty_permission_fails_startup() {
        let overrides = HashMap::from([("index.Delete".to_string(), "  ".to_string())]);
        assert!(matches!(
            OperationRegistry::new(&overrides),
            Err(Error::Config(_))
        ));
    }
}
