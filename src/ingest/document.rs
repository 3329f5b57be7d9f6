//! Decoding of extraction batches into candidate facts
//!
//! A batch is a JSON array of documents, each carrying a `document_id`
//! and an `analysis` payload. The payload is either a JSON object or a
//! string of JSON as the extraction model returned it, possibly still
//! wrapped in markdown code fences. Inside, entities live in known
//! section arrays and relationships in any `*_relationships` section.

use super::{DocumentFacts, EndpointRef, EntityCandidate, RelationCandidate};
use crate::config::MergeConfig;
use crate::graph::{ExternalId, ProvenanceRecord, SourceTier};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that make a whole batch undecodable
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON array of documents")]
    NotAnArray,
}

/// One document that could not be decoded
#[derive(Debug, Clone)]
pub struct DecodeFailure {
    pub document_id: String,
    pub error: String,
}

/// Decoded batch: per-document candidate facts plus decode failures
#[derive(Debug, Default)]
pub struct BatchDecode {
    pub documents: Vec<DocumentFacts>,
    pub failures: Vec<DecodeFailure>,
}

/// Entity section names and the raw type their members carry
const ENTITY_SECTIONS: &[(&str, &str)] = &[
    ("medications", "drug"),
    ("medication_entities", "drug"),
    ("diseases", "disease"),
    ("disease_entities", "disease"),
    ("genes", "gene"),
    ("genes_proteins", "gene"),
    ("gene_protein_entities", "gene"),
];

/// Endpoint key pairs checked in order, with the raw type each key implies
const PAIR_PATTERNS: &[(&str, &str)] = &[
    ("drug", "disease"),
    ("drug", "gene"),
    ("gene", "disease"),
    ("protein", "disease"),
    ("drug", "protein"),
];

/// Identifier values that mean "no identifier"
const ABSENT_ID_MARKERS: &[&str] = &["", "-", "Not specified"];

/// Decode a batch of extraction documents.
///
/// Per-document problems (unparseable analysis payloads) become
/// [`DecodeFailure`] entries; only a malformed batch container is an
/// error.
pub fn decode_batch(
    json: &str,
    tier: SourceTier,
    config: &MergeConfig,
) -> Result<BatchDecode, DecodeError> {
    let batch: Value = serde_json::from_str(json)?;
    let Value::Array(raw_documents) = batch else {
        return Err(DecodeError::NotAnArray);
    };

    let mut decoded = BatchDecode::default();
    for raw in raw_documents {
        let document_id = raw
            .get("document_id")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();
        match decode_document(&document_id, raw.get("analysis"), tier, config) {
            Ok(facts) => decoded.documents.push(facts),
            Err(error) => {
                warn!(document = %document_id, %error, "failed to decode document");
                decoded.failures.push(DecodeFailure { document_id, error });
            }
        }
    }
    Ok(decoded)
}

fn decode_document(
    document_id: &str,
    analysis: Option<&Value>,
    tier: SourceTier,
    config: &MergeConfig,
) -> Result<DocumentFacts, String> {
    let mut facts = DocumentFacts::new(document_id);

    let data = match analysis {
        None | Some(Value::Null) => {
            warn!(document = document_id, "document has no analysis payload");
            return Ok(facts);
        }
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(raw)) => {
            let cleaned = strip_code_fences(raw);
            if cleaned.is_empty() {
                warn!(document = document_id, "document has an empty analysis payload");
                return Ok(facts);
            }
            match serde_json::from_str::<Value>(&cleaned) {
                Ok(Value::Object(map)) => map,
                Ok(_) => return Err("analysis is not a JSON object".to_string()),
                Err(e) => return Err(format!("analysis is not valid JSON: {e}")),
            }
        }
        Some(other) => {
            return Err(format!(
                "analysis has unsupported type {}",
                json_type_name(other)
            ));
        }
    };

    let provenance = ProvenanceRecord::new(config.default_origin.clone(), tier)
        .with_document(document_id.to_string());

    for (section, raw_type) in ENTITY_SECTIONS {
        let Some(Value::Array(items)) = data.get(*section) else {
            continue;
        };
        for item in items {
            let Value::Object(obj) = item else { continue };
            let Some(name) = field_str(obj, "name") else {
                continue;
            };
            if name == "Unknown" {
                continue;
            }
            let raw_type = field_str(obj, "type")
                .filter(|t| t != "Not specified")
                .unwrap_or_else(|| raw_type.to_string());
            let mut candidate = EntityCandidate::new(name, raw_type, provenance.clone());
            if let Some(id) = field_str(obj, "id")
                .and_then(|raw| parse_external_id(&raw, &config.default_namespace))
            {
                candidate = candidate.with_external_id(id);
            }
            facts.entities.push(candidate);
        }
    }

    for (section, value) in &data {
        if !is_relationship_section(section) {
            continue;
        }
        let Value::Array(items) = value else { continue };
        debug!(
            document = document_id,
            section = section.as_str(),
            count = items.len(),
            "decoding relationship section"
        );
        for item in items {
            let Value::Object(obj) = item else { continue };
            let raw_kind = match field_str(obj, "kg_relation_type") {
                Some(explicit) if explicit != "Not specified" => explicit,
                _ => section.clone(),
            };
            match extract_endpoints(obj, &config.default_namespace) {
                Some((source, target)) => {
                    facts.relations.push(RelationCandidate::new(
                        raw_kind,
                        source,
                        target,
                        provenance.clone(),
                    ));
                }
                None => {
                    warn!(
                        document = document_id,
                        section = section.as_str(),
                        "could not extract endpoints from relationship entry"
                    );
                }
            }
        }
    }

    Ok(facts)
}

/// Remove the markdown code fences extraction models wrap JSON in.
fn strip_code_fences(raw: &str) -> String {
    raw.trim().replace("```json\n", "").replace("\n```", "")
}

fn is_relationship_section(key: &str) -> bool {
    key.ends_with("_relationships") || key.to_lowercase().contains("relationship")
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A trimmed, non-empty string field
fn field_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    let text = obj.get(key)?.as_str()?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Parse a raw identifier like "MESH:D001241" into a namespaced id.
///
/// Known prefixes map onto their vocabulary namespace, unknown prefixes
/// are lowercased, and a bare identifier falls into `default_namespace`.
fn parse_external_id(raw: &str, default_namespace: &str) -> Option<ExternalId> {
    let raw = raw.trim();
    if ABSENT_ID_MARKERS.contains(&raw) {
        return None;
    }
    match raw.split_once(':') {
        Some((prefix, id)) => {
            let prefix = prefix.trim();
            let id = id.trim();
            if prefix.is_empty() || id.is_empty() {
                return None;
            }
            let namespace = match prefix.to_uppercase().as_str() {
                "MESH" => "ncbi_mesh".to_string(),
                "CHEBI" => "chebi".to_string(),
                other => other.to_lowercase(),
            };
            Some(ExternalId::new(namespace, id))
        }
        None => Some(ExternalId::new(default_namespace, raw)),
    }
}

/// Pull the two endpoints out of a relationship entry.
///
/// Entries name their endpoints by entity-type keys ("drug", then
/// "disease"), by numbered keys for interactions ("drug1"/"drug2"), or
/// pathway-first for pathway memberships. Anything else falls back to
/// protein-pair detection and finally to the first two values present.
fn extract_endpoints(
    rel: &Map<String, Value>,
    default_namespace: &str,
) -> Option<(EndpointRef, EndpointRef)> {
    for (a, b) in PAIR_PATTERNS {
        if rel.contains_key(*a) && rel.contains_key(*b) {
            let source = endpoint_from(rel.get(*a)?, a, default_namespace)?;
            let target = endpoint_from(rel.get(*b)?, b, default_namespace)?;
            return Some((source, target));
        }
    }

    if rel.contains_key("drug1") && rel.contains_key("drug2") {
        let source = endpoint_from(rel.get("drug1")?, "drug", default_namespace)?;
        let target = endpoint_from(rel.get("drug2")?, "drug", default_namespace)?;
        return Some((source, target));
    }

    if let Some(pathway) = rel.get("pathway") {
        let other = rel
            .iter()
            .find(|(k, v)| *k != "pathway" && *k != "kg_relation_type" && !v.is_null());
        if let Some((other_key, other_value)) = other {
            let source = endpoint_from(pathway, "pathway", default_namespace)?;
            let target = endpoint_from(other_value, other_key, default_namespace)?;
            return Some((source, target));
        }
        return None;
    }

    let protein_keys: Vec<&String> = rel
        .keys()
        .filter(|k| k.to_lowercase().contains("protein") && *k != "kg_relation_type")
        .collect();
    if protein_keys.len() >= 2 {
        let source = endpoint_from(rel.get(protein_keys[0])?, "protein", default_namespace)?;
        let target = endpoint_from(rel.get(protein_keys[1])?, "protein", default_namespace)?;
        return Some((source, target));
    }

    let mut found = rel
        .iter()
        .filter(|(k, v)| *k != "kg_relation_type" && !v.is_null());
    let (first_key, first_value) = found.next()?;
    let (second_key, second_value) = found.next()?;
    let source = endpoint_from(first_value, first_key, default_namespace)?;
    let target = endpoint_from(second_value, second_key, default_namespace)?;
    Some((source, target))
}

fn endpoint_from(
    value: &Value,
    raw_type: &str,
    default_namespace: &str,
) -> Option<EndpointRef> {
    match value {
        Value::String(s) => {
            let name = s.trim();
            (!name.is_empty()).then(|| EndpointRef::new(name, raw_type))
        }
        Value::Object(obj) => {
            let name = field_str(obj, "name")?;
            let mut endpoint = EndpointRef::new(name, raw_type);
            if let Some(id) =
                field_str(obj, "id").and_then(|raw| parse_external_id(&raw, default_namespace))
            {
                endpoint = endpoint.with_external_id(id);
            }
            Some(endpoint)
        }
        _ => None,
    }
}
