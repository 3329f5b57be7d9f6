//! Canonicalization of raw entity names and types

use crate::config::MergeConfig;
use crate::graph::EntityType;
use std::collections::HashMap;

/// Punctuation with biomedical meaning, kept during normalization.
/// Everything else outside letters, digits and whitespace is stripped.
const KEPT_PUNCTUATION: &[char] = &['-', '+', '(', ')', '[', ']', ',', '.', '/', '\''];

/// Produce the canonical form of a raw entity name: trimmed, Unicode
/// lowercased, inner whitespace collapsed to single spaces, decorative
/// symbols stripped.
///
/// Chemistry-relevant punctuation survives, so "(S)-warfarin" and
/// "1,25-dihydroxyvitamin D" keep their identity.
pub fn canonical_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.trim().chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if !ch.is_alphanumeric() && !KEPT_PUNCTUATION.contains(&ch) {
            continue;
        }
        if pending_space {
            if !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
        }
        for lower in ch.to_lowercase() {
            out.push(lower);
        }
    }
    out
}

/// Maps raw entity-type strings onto the closed type set.
///
/// Lookups are case-insensitive. Anything outside the table is
/// unmapped; the coordinator turns that into a rejection rather than
/// inventing a type.
pub struct Normalizer {
    aliases: HashMap<String, EntityType>,
}

impl Normalizer {
    pub fn new(config: &MergeConfig) -> Self {
        Self {
            aliases: config.entity_aliases.clone(),
        }
    }

    /// Map a raw type string onto the closed set, if it is known.
    pub fn entity_type(&self, raw: &str) -> Option<EntityType> {
        self.aliases.get(raw.trim().to_lowercase().as_str()).copied()
    }

    /// Canonicalize a raw (name, type) pair.
    pub fn normalize(&self, raw_name: &str, raw_type: &str) -> Option<(String, EntityType)> {
        let entity_type = self.entity_type(raw_type)?;
        Some((canonical_name(raw_name), entity_type))
    }
}
