//! Template key generation.
//!
//! Keys in the exported document are derived from entity names, never from ids:
//! [`sanitize`] turns a human-readable name into a key fragment and
//! [`KeyManager`] makes those fragments unique within one template namespace.
//! Composite keys for links, deployment mappings and request traces live in
//! [`derive`].
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::errors::ExportError;
use crate::model::EntityId;

pub mod derive;

struct SanitizePatterns {
    whitespace: Regex,
    separators: Regex,
    underscores: Regex,
}

fn patterns() -> &'static SanitizePatterns {
    static PATTERNS: OnceLock<SanitizePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| SanitizePatterns {
        whitespace: Regex::new(r"\s+").expect("valid whitespace pattern"),
        separators: Regex::new(r"[#>\-.]").expect("valid separator pattern"),
        underscores: Regex::new(r"_{2,}").expect("valid underscore pattern"),
    })
}

/// Normalize `name` into a key fragment.
///
/// Trims, turns whitespace runs and each of `#`, `>`, `-`, `.` into `_`,
/// collapses repeated underscores and lower-cases the result. Idempotent.
/// Blank input yields an empty string; see [`sanitize_key`].
#[must_use]
pub fn sanitize(name: &str) -> String {
    let p = patterns();
    let s = p.whitespace.replace_all(name.trim(), "_");
    let s = p.separators.replace_all(&s, "_");
    let s = p.underscores.replace_all(&s, "_");
    s.to_lowercase()
}

/// [`sanitize`] that refuses to produce an empty key.
///
/// # Errors
/// `ExportError::EmptyKey` when `name` is blank.
pub fn sanitize_key(name: &str) -> Result<String, ExportError> {
    let key = sanitize(name);
    if key.is_empty() {
        return Err(ExportError::EmptyKey { name: name.to_string() });
    }
    Ok(key)
}

/// Collision-free key allocator for one template namespace of one export.
#[derive(Debug, Default)]
pub struct KeyManager {
    issued: HashSet<String>,
    owners: HashMap<String, EntityId>,
    by_entity: HashMap<EntityId, String>,
    // candidate -> next suffix worth trying; every smaller suffix is taken
    next_suffix: HashMap<String, u32>,
}

impl KeyManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `candidate` if unused, otherwise the first free `candidate_N` (N ≥ 2).
    /// The returned key is recorded as issued.
    ///
    /// # Errors
    /// `EmptyKey` for an empty candidate; `KeyCollisionExhausted` if no suffix is free.
    pub fn ensure_uniqueness(&mut self, candidate: &str) -> Result<String, ExportError> {
        if candidate.is_empty() {
            return Err(ExportError::EmptyKey { name: String::new() });
        }
        if self.issued.insert(candidate.to_string()) {
            return Ok(candidate.to_string());
        }
        let start = self.next_suffix.get(candidate).copied().unwrap_or(2);
        for n in start..=u32::MAX {
            let key = format!("{candidate}_{n}");
            if self.issued.insert(key.clone()) {
                self.next_suffix.insert(candidate.to_string(), n.saturating_add(1));
                return Ok(key);
            }
        }
        Err(ExportError::KeyCollisionExhausted(candidate.to_string()))
    }

    /// Issue a unique key for `entity` and remember the association both ways.
    ///
    /// # Errors
    /// See [`KeyManager::ensure_uniqueness`].
    pub fn issue(&mut self, entity: &EntityId, candidate: &str) -> Result<String, ExportError> {
        let key = self.ensure_uniqueness(candidate)?;
        self.owners.insert(key.clone(), entity.clone());
        self.by_entity.entry(entity.clone()).or_insert_with(|| key.clone());
        Ok(key)
    }

    /// The entity a key was issued for. Builders go through [`KeyManager::key_for`];
    /// this direction serves key listings.
    #[must_use]
    pub fn entity_for(&self, key: &str) -> Option<&EntityId> {
        self.owners.get(key)
    }

    /// The key issued for an entity.
    #[must_use]
    pub fn key_for(&self, entity: &EntityId) -> Option<&str> {
        self.by_entity.get(entity).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.issued.contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.issued.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}
