//! Resolved permission set - the cacheable output of permission resolution.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an effective permission came from. Override-derived entries keep
/// their expiry so consumers can display remaining validity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum PermissionProvenance {
    Role { role_code: String },
    Override { expires_utc: Option<DateTime<Utc>> },
}

/// Deduplicated effective permissions for one principal, keyed by code.
///
/// Serializable so it can live in a shared cache between requests; it is
/// never persisted beyond the cache lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPermissionSet {
    entries: HashMap<String, PermissionProvenance>,
}

impl ResolvedPermissionSet {
    pub fn contains(&self, perm_code: &str) -> bool {
        self.entries.contains_key(perm_code)
    }

    pub fn provenance(&self, perm_code: &str) -> Option<&PermissionProvenance> {
        self.entries.get(perm_code)
    }

    /// The effective codes as a plain set, for the matcher and the
    /// request context.
    pub fn codes(&self) -> HashSet<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn insert(&mut self, perm_code: String, provenance: PermissionProvenance) {
        self.entries.insert(perm_code, provenance);
    }

    pub(crate) fn remove(&mut self, perm_code: &str) {
        self.entries.remove(perm_code);
    }
}
