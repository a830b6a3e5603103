//! Index and alias registry consulted by alias resolution
//!
//! Readers take an immutable [`IndexSnapshot`] per request; writers replace
//! the snapshot wholesale. An index deleted after a request took its
//! snapshot still appears in that request's targets, and the handler
//! reports it missing.

use crate::config::IndexConfig;
use crate::security::credentials::glob_match;
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Point-in-time view of indices and aliases
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSnapshot {
    indices: BTreeSet<String>,
    /// Alias name -> member indices
    aliases: BTreeMap<String, BTreeSet<String>>,
}

impl IndexSnapshot {
    pub fn is_index(&self, name: &str) -> bool {
        self.indices.contains(name)
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Resolve one token to concrete indices.
    ///
    /// `_all` and `*` select every index, a trailing `*` matches index and
    /// alias names by prefix, an alias expands to its members. Unknown
    /// names resolve to nothing.
    pub fn resolve_token(&self, token: &str) -> Vec<String> {
        if token == "_all" || token == "*" {
            return self.indices.iter().cloned().collect();
        }

        if token.ends_with('*') {
            let mut matched: Vec<String> = self
                .indices
                .iter()
                .filter(|index| glob_match(token, index))
                .cloned()
                .collect();
            for (alias, members) in &self.aliases {
                if glob_match(token, alias) {
                    matched.extend(self.existing(members));
                }
            }
            return matched;
        }

        if self.indices.contains(token) {
            return vec![token.to_string()];
        }

        self.aliases
            .get(token)
            .map(|members| self.existing(members).collect())
            .unwrap_or_default()
    }

    /// Resolve a comma-separated expression, de-duplicated in first-seen order
    pub fn resolve(&self, expression: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut resolved = Vec::new();
        for token in split_expression(expression) {
            for index in self.resolve_token(token) {
                if seen.insert(index.clone()) {
                    resolved.push(index);
                }
            }
        }
        resolved
    }

    fn existing<'a>(&'a self, members: &'a BTreeSet<String>) -> impl Iterator<Item = String> + 'a {
        members
            .iter()
            .filter(|m| self.indices.contains(*m))
            .cloned()
    }
}

/// Split `a, b,,c` into `["a", "b", "c"]`
pub fn split_expression(expression: &str) -> impl Iterator<Item = &str> {
    expression.split(',').map(str::trim).filter(|t| !t.is_empty())
}

/// Source of index snapshots
pub trait IndexRegistry: Send + Sync {
    fn snapshot(&self) -> Arc<IndexSnapshot>;
}

/// In-process registry with copy-on-write updates
#[derive(Debug, Default)]
pub struct MemoryIndexRegistry {
    current: RwLock<Arc<IndexSnapshot>>,
}

impl MemoryIndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from `[[indices]]` in the config file
    pub fn from_config(indices: &[IndexConfig]) -> Result<Self> {
        let registry = Self::new();
        for index in indices {
            registry.create_index(&index.name)?;
        }
        for index in indices {
            for alias in &index.aliases {
                registry.put_alias(alias, &index.name)?;
            }
        }
        Ok(registry)
    }

    pub fn create_index(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        self.update(|snapshot| {
            if snapshot.aliases.contains_key(name) {
                return Err(Error::InvalidIndexName(format!(
                    "{} already exists as an alias",
                    name
                )));
            }
            snapshot.indices.insert(name.to_string());
            Ok(())
        })
    }

    /// Remove an index and its alias memberships; aliases left empty are dropped
    pub fn delete_index(&self, name: &str) -> Result<()> {
        self.update(|snapshot| {
            if !snapshot.indices.remove(name) {
                return Err(Error::IndexNotFound(name.to_string()));
            }
            for members in snapshot.aliases.values_mut() {
                members.remove(name);
            }
            snapshot.aliases.retain(|_, members| !members.is_empty());
            Ok(())
        })
    }

    pub fn put_alias(&self, alias: &str, index: &str) -> Result<()> {
        validate_name(alias)?;
        self.update(|snapshot| {
            if !snapshot.indices.contains(index) {
                return Err(Error::IndexNotFound(index.to_string()));
            }
            if snapshot.indices.contains(alias) {
                return Err(Error::InvalidIndexName(format!(
                    "{} already exists as an index",
                    alias
                )));
            }
            snapshot
                .aliases
                .entry(alias.to_string())
                .or_default()
                .insert(index.to_string());
            Ok(())
        })
    }

    pub fn remove_alias(&self, alias: &str, index: &str) -> Result<()> {
        self.update(|snapshot| {
            let members = snapshot
                .aliases
                .get_mut(alias)
                .ok_or_else(|| Error::AliasNotFound(alias.to_string()))?;
            if !members.remove(index) {
                return Err(Error::AliasNotFound(format!("{} -> {}", alias, index)));
            }
            if members.is_empty() {
                snapshot.aliases.remove(alias);
            }
            Ok(())
        })
    }

    fn update<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut IndexSnapshot) -> Result<()>,
    {
        let mut current = self.current.write();
        let mut next = IndexSnapshot::clone(&current);
        apply(&mut next)?;
        *current = Arc::new(next);
        Ok(())
    }
}

impl IndexRegistry for MemoryIndexRegistry {
    fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current.read().clone()
    }
}

/// Names an index or alias may not take
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| -> Result<()> {
        Err(Error::InvalidIndexName(format!("[{}] {}", name, reason)))
    };

    if name.is_empty() {
        return invalid("must not be empty");
    }
    if name.starts_with('_') || name.starts_with('-') || name.starts_with('+') {
        return invalid("must not start with '_', '-', or '+'");
    }
    if name
        .chars()
        .any(|c| matches!(c, '*' | ',' | '/' | '\\' | '?' | '"' | '<' | '>' | '|' | ' ' | '#'))
    {
        return invalid("must not contain wildcards, commas, or path separators");
    }
    if name.chars().any(|c| c.is_ascii_uppercase()) {
        return invalid("must be lowercase");
    }
    Ok(())
}
