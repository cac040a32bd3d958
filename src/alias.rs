// Username canonicalization: one person, several accounts across machines.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Canonical identity for processes with no resolvable owner.
pub const UNKNOWN_USER: &str = "unknown";

/// Case-insensitive alias table: lower-cased raw username -> canonical
/// username. A missing table behaves as the identity mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AliasMap(HashMap<String, String>);

impl AliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (raw, canonical) pairs; raw keys are lower-cased.
    pub fn from_pairs<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(raw, canonical)| (raw.into().to_lowercase(), canonical.into()))
                .collect(),
        )
    }

    /// Load from a JSON key->value file. Missing file is an empty map;
    /// keys are normalized to lower case on load.
    pub fn load(path: &Path) -> Self {
        let map: HashMap<String, String> = crate::store::load_or_default(path);
        Self(
            map.into_iter()
                .map(|(raw, canonical)| (raw.to_lowercase(), canonical))
                .collect(),
        )
    }

    /// Resolve a raw username to its canonical identity. Empty input yields
    /// [`UNKNOWN_USER`]; unmapped names pass through with casing preserved.
    pub fn canonicalize(&self, raw: &str) -> String {
        if raw.is_empty() {
            return UNKNOWN_USER.to_string();
        }
        match self.0.get(&raw.to_lowercase()) {
            Some(canonical) => canonical.clone(),
            None => raw.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
