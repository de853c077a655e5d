// Copyright 2025 Cowboy AI, LLC.

//! Per-question linking pass
//!
//! ```text
//! tokens -> spans -> candidates -> ambiguity -> scores -> mapping -> LinkedQuestion
//! ```
//!
//! Every stage is a public method over explicit state, so a caller whose
//! index failed mid-pass can retry that one stage.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::ambiguity::{AmbiguityOutcome, AmbiguityResolver};
use crate::config::LinkingConfig;
use crate::errors::LinkingResult;
use crate::index::{fetch_records, KnowledgeIndex};
use crate::interlinking::{AdjacencyCache, InterlinkingScorer, LinkingScores};
use crate::lookup::{CandidateLookup, CandidateTable};
use crate::mapping::{MappingAssembler, SpanResourceMapping};
use crate::resource::{ResourceCandidate, ResourceKind, ResourceRecord, Token};
use crate::span::{Span, SpanGenerator};

/// A candidate together with the span it was linked from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedResource {
    /// The candidate
    pub candidate: ResourceCandidate,
    /// Surface string of the span
    pub span: String,
    /// `1 - ratio` of the candidate's set
    pub similarity: f64,
    /// Full index record, when fetched
    pub record: Option<ResourceRecord>,
}

impl LinkedResource {
    /// Link a candidate to a span
    pub fn new(candidate: ResourceCandidate, span: impl Into<String>, similarity: f64) -> Self {
        Self {
            candidate,
            span: span.into(),
            similarity,
            record: None,
        }
    }

    /// A literal value found in the question
    pub fn literal(value: impl Into<String>, span: impl Into<String>) -> Self {
        let value = value.into();
        Self::new(
            ResourceCandidate::new(value.clone(), value, ResourceKind::Entity),
            span,
            1.0,
        )
    }

    /// Attach the full record
    pub fn with_record(mut self, record: ResourceRecord) -> Self {
        self.record = Some(record);
        self
    }

    /// Resource identifier
    pub fn id(&self) -> &str {
        &self.candidate.id
    }

    /// Predicates where the resource is the subject
    pub fn connected_properties_subject(&self) -> &[String] {
        self.record
            .as_ref()
            .map(|r| r.connected_properties_subject.as_slice())
            .unwrap_or_default()
    }

    /// Predicates where the resource is the object
    pub fn connected_properties_object(&self) -> &[String] {
        self.record
            .as_ref()
            .map(|r| r.connected_properties_object.as_slice())
            .unwrap_or_default()
    }

    /// Objects of triples where the resource is the subject
    pub fn connected_resources_subject(&self) -> &[String] {
        self.record
            .as_ref()
            .map(|r| r.connected_resources_subject.as_slice())
            .unwrap_or_default()
    }

    /// Subjects of triples where the resource is the object
    pub fn connected_resources_object(&self) -> &[String] {
        self.record
            .as_ref()
            .map(|r| r.connected_resources_object.as_slice())
            .unwrap_or_default()
    }

    /// `rdf:type` objects of the resource
    pub fn types(&self) -> &[String] {
        self.record
            .as_ref()
            .map(|r| r.types.as_slice())
            .unwrap_or_default()
    }
}

/// Summary of one linking pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkingStats {
    /// Identifier correlating the log lines of the pass
    pub session_id: Uuid,
    /// When the pass started
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Tokens left after question-word stripping
    pub token_count: usize,
    /// Spans generated
    pub span_count: usize,
    /// Index label searches issued
    pub lookups: usize,
    /// Candidate sets flagged ambiguous after lookup
    pub ambiguous_spans: usize,
    /// Ambiguous spans rebuilt around a majority type
    pub resolved_spans: usize,
    /// Ambiguous spans removed
    pub abandoned_spans: usize,
    /// Identifiers in the final mapping
    pub bound: usize,
}

/// Bound resources of a question, by kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundResources {
    /// Bound entities, with records
    pub entities: Vec<LinkedResource>,
    /// Bound properties
    pub properties: Vec<LinkedResource>,
    /// Every candidate of a settled property set
    pub property_candidates: Vec<LinkedResource>,
    /// Bound classes
    pub classes: Vec<LinkedResource>,
}

/// Everything the linking pass learned about one question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkedQuestion {
    /// Tokens after question-word stripping
    pub tokens: Vec<Token>,
    /// Generated spans
    pub spans: Vec<Span>,
    /// Candidate sets after ambiguity resolution
    pub candidates: CandidateTable,
    /// Interlinking scores
    pub scores: LinkingScores,
    /// Final bindings
    pub mapping: SpanResourceMapping,
    /// Bound entities
    pub entities: Vec<LinkedResource>,
    /// Bound properties
    pub properties: Vec<LinkedResource>,
    /// Every candidate of a settled property set
    pub property_candidates: Vec<LinkedResource>,
    /// Bound classes
    pub classes: Vec<LinkedResource>,
    /// Literal values supplied by the caller
    pub literals: Vec<LinkedResource>,
    /// Pass summary
    pub stats: LinkingStats,
}

impl LinkedQuestion {
    /// Add a literal value
    pub fn with_literal(mut self, literal: LinkedResource) -> Self {
        self.literals.push(literal);
        self
    }

    /// Distinct span surface strings, in generation order
    pub fn span_texts(&self) -> IndexSet<&str> {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// Bound entity by identifier, ignoring case
    pub fn entity(&self, id: &str) -> Option<&LinkedResource> {
        self.entities
            .iter()
            .find(|e| e.candidate.id.eq_ignore_ascii_case(id))
    }

    /// Span a resource came from, ignoring case
    ///
    /// Entities are searched first, then literals, property candidates and
    /// classes.
    pub fn span_of(&self, id: &str) -> Option<&str> {
        self.entities
            .iter()
            .chain(&self.literals)
            .chain(&self.property_candidates)
            .chain(&self.classes)
            .find(|r| r.candidate.id.eq_ignore_ascii_case(id))
            .map(|r| r.span.as_str())
    }
}

/// Runs the linking pass against a shared index
#[derive(Debug)]
pub struct ResourceLinker<I: ?Sized> {
    index: Arc<I>,
    config: LinkingConfig,
}

impl<I> ResourceLinker<I>
where
    I: KnowledgeIndex + ?Sized,
{
    /// Create a linker, rejecting invalid configuration
    pub fn new(index: Arc<I>, config: LinkingConfig) -> LinkingResult<Self> {
        config.validate()?;
        Ok(Self { index, config })
    }

    /// Create a linker with default configuration
    pub fn with_defaults(index: Arc<I>) -> Self {
        Self {
            index,
            config: LinkingConfig::default(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &LinkingConfig {
        &self.config
    }

    /// Shared index handle
    pub fn index(&self) -> &Arc<I> {
        &self.index
    }

    /// Drop question and auxiliary words
    pub fn strip_question_words(&self, tokens: &[Token]) -> Vec<Token> {
        tokens
            .iter()
            .filter(|t| !self.config.is_question_word(&t.word))
            .cloned()
            .collect()
    }

    /// Generate spans for already stripped tokens
    pub fn spans(&self, tokens: &[Token]) -> Vec<Span> {
        SpanGenerator::new(self.config.max_span_offset).generate(tokens)
    }

    /// Look up every span for every kind
    pub async fn lookup(&self, spans: &[Span]) -> LinkingResult<CandidateTable> {
        CandidateLookup::new(Arc::clone(&self.index), &self.config)
            .lookup_all(spans)
            .await
    }

    /// Fresh adjacency cache sized by configuration
    pub fn adjacency_cache(&self) -> AdjacencyCache {
        AdjacencyCache::new(self.config.adjacency_cache_size)
    }

    /// Resolve or abandon ambiguous entity spans
    pub async fn resolve_ambiguity<R>(
        &self,
        table: &mut CandidateTable,
        cache: &mut AdjacencyCache,
        rng: &mut R,
    ) -> LinkingResult<AmbiguityOutcome>
    where
        R: Rng + ?Sized,
    {
        AmbiguityResolver::new(Arc::clone(&self.index), &self.config)
            .resolve(table, cache, rng)
            .await
    }

    /// Interlinking scores for the settled candidate sets
    pub async fn score(
        &self,
        table: &CandidateTable,
        cache: &mut AdjacencyCache,
    ) -> LinkingResult<LinkingScores> {
        InterlinkingScorer::new(Arc::clone(&self.index))
            .score(table, cache)
            .await
    }

    /// Final bindings
    pub fn assemble(
        &self,
        table: &CandidateTable,
        scores: &LinkingScores,
        cache: &AdjacencyCache,
    ) -> SpanResourceMapping {
        MappingAssembler::new().assemble_all(table, scores, cache)
    }

    /// Resolve bindings back to candidates and fetch entity records in batches
    pub async fn materialise(
        &self,
        table: &CandidateTable,
        mapping: &SpanResourceMapping,
    ) -> LinkingResult<BoundResources> {
        let mut bound = BoundResources::default();

        for (id, span) in mapping.iter() {
            for kind in ResourceKind::ALL {
                let Some(set) = table.by_kind(kind).get(span) else {
                    continue;
                };
                let Some(candidate) = set.candidates.iter().find(|c| c.id == id) else {
                    continue;
                };
                let linked = LinkedResource::new(candidate.clone(), span, set.similarity());
                match kind {
                    ResourceKind::Entity => bound.entities.push(linked),
                    ResourceKind::Property => bound.properties.push(linked),
                    ResourceKind::Class => bound.classes.push(linked),
                }
            }
        }

        let mut seen = IndexSet::new();
        for set in table.properties.values().filter(|s| !s.ambiguous) {
            for candidate in &set.candidates {
                if seen.insert(candidate.id.clone()) {
                    bound.property_candidates.push(LinkedResource::new(
                        candidate.clone(),
                        &set.span,
                        set.similarity(),
                    ));
                }
            }
        }

        let ids: Vec<String> = bound.entities.iter().map(|e| e.candidate.id.clone()).collect();
        let records: IndexMap<String, ResourceRecord> = fetch_records(
            self.index.as_ref(),
            &ids,
            ResourceKind::Entity,
            self.config.id_batch_size,
            self.config.max_batched_ids,
        )
        .await?
        .into_iter()
        .map(|r| (r.id.clone(), r))
        .collect();
        for entity in &mut bound.entities {
            if let Some(record) = records.get(&entity.candidate.id) {
                entity.record = Some(record.clone());
            }
        }

        Ok(bound)
    }

    /// Run every stage for one question
    pub async fn link<R>(&self, tokens: &[Token], rng: &mut R) -> LinkingResult<LinkedQuestion>
    where
        R: Rng + ?Sized,
    {
        let session_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        info!("Linking session {} started for {} tokens", session_id, tokens.len());

        let tokens = self.strip_question_words(tokens);
        let spans = self.spans(&tokens);
        debug!("Session {}: {} spans from {} tokens", session_id, spans.len(), tokens.len());

        let mut candidates = self.lookup(&spans).await?;
        let ambiguous_spans = ResourceKind::ALL
            .iter()
            .map(|kind| candidates.ambiguous_spans(*kind).len())
            .sum();

        let mut cache = self.adjacency_cache();
        let outcome = self
            .resolve_ambiguity(&mut candidates, &mut cache, rng)
            .await?;
        let scores = self.score(&candidates, &mut cache).await?;
        let mapping = self.assemble(&candidates, &scores, &cache);
        let bound = self.materialise(&candidates, &mapping).await?;

        let stats = LinkingStats {
            session_id,
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            token_count: tokens.len(),
            span_count: spans.len(),
            lookups: CandidateLookup::<I>::lookup_count(&spans),
            ambiguous_spans,
            resolved_spans: outcome.resolved.len(),
            abandoned_spans: outcome.abandoned.len(),
            bound: mapping.len(),
        };
        info!(
            "Linking session {} finished in {} ms: {} entities, {} properties, {} classes bound",
            session_id,
            stats.duration_ms,
            bound.entities.len(),
            bound.properties.len(),
            bound.classes.len()
        );

        Ok(LinkedQuestion {
            tokens,
            spans,
            candidates,
            scores,
            mapping,
            entities: bound.entities,
            properties: bound.properties,
            property_candidates: bound.property_candidates,
            classes: bound.classes,
            literals: Vec::new(),
            stats,
        })
    }
}
