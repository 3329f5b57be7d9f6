//! Engine configuration: alias tables, evidence weights, store-boundary policy
//!
//! Configuration is loaded from YAML and overlaid onto built-in defaults.
//! The built-in alias tables cover the vocabularies our extraction
//! pipelines emit today; deployments extend them through the config file
//! instead of patching the closed type enums.

use crate::graph::{EntityType, RelationKind, SourceTier};
use crate::store::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Base evidence weight per source tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierWeights {
    pub curated: f64,
    pub ai_extracted: f64,
    pub unverified: f64,
}

impl Default for TierWeights {
    fn default() -> Self {
        Self {
            curated: 0.95,
            ai_extracted: 0.60,
            unverified: 0.30,
        }
    }
}

impl TierWeights {
    /// The base weight a candidate from this tier contributes.
    pub fn weight(&self, tier: SourceTier) -> f64 {
        match tier {
            SourceTier::Curated => self.curated,
            SourceTier::AiExtracted => self.ai_extracted,
            SourceTier::Unverified => self.unverified,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Raw entity-type string (lowercased) to canonical type.
    /// Entries here extend the built-in table; built-ins are not removed.
    pub entity_aliases: HashMap<String, EntityType>,
    /// Raw relationship-kind string (lowercased) to canonical kind.
    /// Entries here extend the built-in table; built-ins are not removed.
    pub relation_aliases: HashMap<String, RelationKind>,
    /// Base evidence weight per source tier
    pub tier_weights: TierWeights,
    /// Origin recorded on provenance when the input names none
    pub default_origin: String,
    /// Namespace assumed for external identifiers without a prefix
    pub default_namespace: String,
    /// Per-call store timeout in milliseconds
    pub store_timeout_ms: u64,
    /// Timed-out store calls are retried this many times in total
    pub retry_attempts: u32,
    /// Base delay between store retries; doubles per attempt
    pub retry_backoff_ms: u64,
    /// Upper bound on the retry delay
    pub retry_backoff_cap_ms: u64,
    /// Create missing relationship endpoints as minimal entities instead
    /// of rejecting the candidate
    pub create_missing_endpoints: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            entity_aliases: builtin_entity_aliases(),
            relation_aliases: builtin_relation_aliases(),
            tier_weights: TierWeights::default(),
            default_origin: "pubtator_extraction".to_string(),
            default_namespace: "raw".to_string(),
            store_timeout_ms: 5_000,
            retry_attempts: 3,
            retry_backoff_ms: 250,
            retry_backoff_cap_ms: 5_000,
            create_missing_endpoints: false,
        }
    }
}

impl MergeConfig {
    /// Load configuration from a YAML file, overlaying it onto defaults.
    ///
    /// Alias tables in the file extend the built-in tables; a file entry
    /// for an existing raw string overrides the built-in mapping.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Parse configuration from a YAML string. See [`Self::from_yaml_file`].
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let mut config: MergeConfig = serde_yaml::from_str(text)?;
        config.normalize_aliases();
        config.extend_with_builtins();
        Ok(config)
    }

    /// Deadline and backoff settings for the store wrapper
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(self.store_timeout_ms),
            attempts: self.retry_attempts,
            backoff: Duration::from_millis(self.retry_backoff_ms),
            backoff_cap: Duration::from_millis(self.retry_backoff_cap_ms),
        }
    }

    /// Lowercase alias keys so lookups are case-insensitive.
    fn normalize_aliases(&mut self) {
        self.entity_aliases = self
            .entity_aliases
            .drain()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        self.relation_aliases = self
            .relation_aliases
            .drain()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
    }

    /// Add built-in alias entries the file did not override.
    fn extend_with_builtins(&mut self) {
        for (k, v) in builtin_entity_aliases() {
            self.entity_aliases.entry(k).or_insert(v);
        }
        for (k, v) in builtin_relation_aliases() {
            self.relation_aliases.entry(k).or_insert(v);
        }
    }
}

/// Raw entity-type strings our extraction pipelines emit, mapped to
/// canonical types. Keys are lowercase.
fn builtin_entity_aliases() -> HashMap<String, EntityType> {
    let entries = [
        ("drug", EntityType::Drug),
        ("medication", EntityType::Drug),
        ("chemical", EntityType::Drug),
        ("disease", EntityType::Disease),
        ("gene", EntityType::Gene),
        ("gene_protein", EntityType::Gene),
        ("protein", EntityType::Protein),
        ("pathway", EntityType::Pathway),
        ("complex", EntityType::Complex),
        ("genetic_disorder", EntityType::GeneticDisorder),
        ("genetic disorder", EntityType::GeneticDisorder),
    ];
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Raw relationship-kind strings mapped to canonical kinds: the document
/// section names plus the canonical labels themselves. Keys are lowercase.
fn builtin_relation_aliases() -> HashMap<String, RelationKind> {
    let sections = [
        ("drug_disease_relationships", RelationKind::DrugDiseaseAssociation),
        ("drug_gene_relationships", RelationKind::Dpi),
        ("gene_disease_relationships", RelationKind::ProteinDiseaseAssociation),
        ("protein_disease_relationships", RelationKind::ProteinDiseaseAssociation),
        ("drug_drug_relationships", RelationKind::Ddi),
        ("drug_interaction_relationships", RelationKind::Ddi),
        ("protein_protein_relationships", RelationKind::Ppi),
        ("gene_gene_relationships", RelationKind::Ppi),
        ("drug_target_relationships", RelationKind::DrugTarget),
        ("drug_carrier_relationships", RelationKind::DrugCarrier),
        ("drug_enzyme_relationships", RelationKind::DrugEnzyme),
        ("drug_transporter_relationships", RelationKind::DrugTransporter),
        ("drug_pathway_relationships", RelationKind::DrugPathwayAssociation),
        ("disease_pathway_relationships", RelationKind::DiseasePathwayAssociation),
        ("protein_pathway_relationships", RelationKind::ProteinPathwayAssociation),
        ("genetic_disorder_relationships", RelationKind::RelatedGeneticDisorder),
        ("disease_genetic_relationships", RelationKind::DiseaseGeneticDisorder),
        ("pathway_complex_relationships", RelationKind::ComplexInPathway),
        ("top_level_pathway_relationships", RelationKind::ComplexTopLevelPathway),
    ];
    let mut table: HashMap<String, RelationKind> = sections
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    for kind in RelationKind::ALL {
        table.insert(kind.as_label().to_lowercase(), kind);
    }
    table
}
