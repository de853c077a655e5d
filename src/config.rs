// Copyright 2025 Cowboy AI, LLC.

//! Configuration for the linking pass and compound composition

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::{LinkingError, LinkingResult};

/// Words stripped from a question before spans are generated
const DEFAULT_QUESTION_WORDS: &[&str] = &[
    "list", "give", "show", "who", "when", "were", "what", "why", "whose", "how", "where",
    "which", "is", "are", "did", "was", "does", "a",
];

/// Thresholds and batch sizes used by every linking stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LinkingConfig {
    /// A span of length `y` starting at `i` is emitted while `y - i` stays below this bound
    pub max_span_offset: usize,

    /// Candidate sets larger than this are flagged ambiguous
    pub ambiguity_threshold: usize,

    /// Number of distinct candidates sampled for majority-type detection
    pub type_sample_size: usize,

    /// A type must occur in more than this many sampled resources to win
    pub majority_type_threshold: usize,

    /// Ratio ceiling a lookup hit must not exceed to be retained
    pub max_lookup_ratio: f64,

    /// Ratio ceiling for properties discovered while composing compound triples
    pub property_filter_ratio: f64,

    /// Identifiers per batched record fetch
    pub id_batch_size: usize,

    /// Upper bound on identifiers fetched for a single expansion
    pub max_batched_ids: usize,

    /// Capacity of the per-question adjacency cache
    pub adjacency_cache_size: usize,

    /// Lowercase words removed from the token sequence before span generation
    pub question_words: Vec<String>,
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            max_span_offset: 6,
            ambiguity_threshold: 50,
            type_sample_size: 10,
            majority_type_threshold: 8,
            max_lookup_ratio: 0.4,
            property_filter_ratio: 0.2,
            id_batch_size: 10,
            max_batched_ids: 1000,
            adjacency_cache_size: 10_000,
            question_words: DEFAULT_QUESTION_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl LinkingConfig {
    /// Parse a configuration from JSON, filling missing fields with defaults
    pub fn from_json(json: &str) -> LinkingResult<Self> {
        let config: LinkingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// JSON schema describing the configuration
    pub fn json_schema() -> LinkingResult<serde_json::Value> {
        let schema = schemars::schema_for!(LinkingConfig);
        Ok(serde_json::to_value(schema)?)
    }

    /// Reject sizes of zero and ratios outside `[0, 1]`
    pub fn validate(&self) -> LinkingResult<()> {
        let sizes = [
            ("type_sample_size", self.type_sample_size),
            ("id_batch_size", self.id_batch_size),
            ("max_batched_ids", self.max_batched_ids),
            ("adjacency_cache_size", self.adjacency_cache_size),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(LinkingError::InvalidConfiguration(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        let ratios = [
            ("max_lookup_ratio", self.max_lookup_ratio),
            ("property_filter_ratio", self.property_filter_ratio),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(LinkingError::InvalidConfiguration(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if self.majority_type_threshold >= self.type_sample_size {
            return Err(LinkingError::InvalidConfiguration(format!(
                "majority_type_threshold ({}) must be below type_sample_size ({})",
                self.majority_type_threshold, self.type_sample_size
            )));
        }

        Ok(())
    }

    /// Check whether a word is stripped before span generation
    pub fn is_question_word(&self, word: &str) -> bool {
        let lower = word.to_lowercase();
        self.question_words.iter().any(|w| *w == lower)
    }
}
