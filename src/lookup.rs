// Copyright 2025 Cowboy AI, LLC.

//! Similarity-ranked candidate lookup per span and resource kind

use std::sync::Arc;

use futures::future::try_join_all;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::LinkingConfig;
use crate::errors::LinkingResult;
use crate::index::KnowledgeIndex;
use crate::resource::{ResourceCandidate, ResourceKind};
use crate::similarity::{rank_by_ratio, RankedCandidates};
use crate::span::Span;

/// The closest candidates found for one span and kind
///
/// Rebuilt wholesale when re-resolved, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanCandidateSet {
    /// Surface string of the span
    pub span: String,
    /// Kind of every candidate in the set
    pub kind: ResourceKind,
    /// Candidates sharing the minimum ratio, in index order
    pub candidates: Vec<ResourceCandidate>,
    /// The shared ratio
    pub ratio: f64,
    /// Set when the candidate count exceeds the ambiguity threshold
    pub ambiguous: bool,
}

impl SpanCandidateSet {
    /// Build a set from a ranking, flagging it against `ambiguity_threshold`
    pub fn from_ranked(
        span: impl Into<String>,
        kind: ResourceKind,
        ranked: RankedCandidates,
        ambiguity_threshold: usize,
    ) -> Self {
        let ambiguous = ranked.candidates.len() > ambiguity_threshold;
        Self {
            span: span.into(),
            kind,
            candidates: ranked.candidates,
            ratio: ranked.ratio,
            ambiguous,
        }
    }

    /// Number of candidates
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Check whether the set has no candidates
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// `1 - ratio`
    pub fn similarity(&self) -> f64 {
        1.0 - self.ratio
    }

    /// Check whether `id` is one of the candidates
    pub fn contains(&self, id: &str) -> bool {
        self.candidates.iter().any(|c| c.id == id)
    }

    /// Candidate identifiers in order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.candidates.iter().map(|c| c.id.as_str())
    }
}

/// Candidate sets of one question, keyed by span per kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateTable {
    /// Entity candidate sets
    pub entities: IndexMap<String, SpanCandidateSet>,
    /// Property candidate sets
    pub properties: IndexMap<String, SpanCandidateSet>,
    /// Class candidate sets
    pub classes: IndexMap<String, SpanCandidateSet>,
}

impl CandidateTable {
    /// Sets of one kind
    pub fn by_kind(&self, kind: ResourceKind) -> &IndexMap<String, SpanCandidateSet> {
        match kind {
            ResourceKind::Entity => &self.entities,
            ResourceKind::Property => &self.properties,
            ResourceKind::Class => &self.classes,
        }
    }

    /// Mutable sets of one kind
    pub fn by_kind_mut(&mut self, kind: ResourceKind) -> &mut IndexMap<String, SpanCandidateSet> {
        match kind {
            ResourceKind::Entity => &mut self.entities,
            ResourceKind::Property => &mut self.properties,
            ResourceKind::Class => &mut self.classes,
        }
    }

    /// Insert or replace a set under its span
    pub fn insert(&mut self, set: SpanCandidateSet) {
        self.by_kind_mut(set.kind).insert(set.span.clone(), set);
    }

    /// Remove the set of `span` for `kind`, keeping the order of the rest
    pub fn remove(&mut self, kind: ResourceKind, span: &str) -> Option<SpanCandidateSet> {
        self.by_kind_mut(kind).shift_remove(span)
    }

    /// Spans currently flagged ambiguous for `kind`
    pub fn ambiguous_spans(&self, kind: ResourceKind) -> Vec<String> {
        self.by_kind(kind)
            .values()
            .filter(|s| s.ambiguous)
            .map(|s| s.span.clone())
            .collect()
    }

    /// Distinct candidates of non-ambiguous sets of `kind`
    pub fn accepted(&self, kind: ResourceKind) -> Vec<&ResourceCandidate> {
        let mut seen = IndexSet::new();
        self.by_kind(kind)
            .values()
            .filter(|s| !s.ambiguous)
            .flat_map(|s| s.candidates.iter())
            .filter(|c| seen.insert(c.id.as_str()))
            .collect()
    }

    /// First set of any kind holding `id`, compared case-insensitively
    pub fn find(&self, id: &str) -> Option<(&SpanCandidateSet, &ResourceCandidate)> {
        ResourceKind::ALL.iter().find_map(|kind| {
            self.by_kind(*kind).values().find_map(|set| {
                set.candidates
                    .iter()
                    .find(|c| c.id.eq_ignore_ascii_case(id))
                    .map(|c| (set, c))
            })
        })
    }

    /// Total number of sets across kinds
    pub fn len(&self) -> usize {
        self.entities.len() + self.properties.len() + self.classes.len()
    }

    /// Check whether no kind has any set
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Queries the index for a span and keeps the best-ratio hits
#[derive(Debug)]
pub struct CandidateLookup<I: ?Sized> {
    index: Arc<I>,
    max_ratio: f64,
    ambiguity_threshold: usize,
}

impl<I: ?Sized> Clone for CandidateLookup<I> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
            max_ratio: self.max_ratio,
            ambiguity_threshold: self.ambiguity_threshold,
        }
    }
}

impl<I> CandidateLookup<I>
where
    I: KnowledgeIndex + ?Sized,
{
    /// Create a lookup over a shared index
    pub fn new(index: Arc<I>, config: &LinkingConfig) -> Self {
        Self {
            index,
            max_ratio: config.max_lookup_ratio,
            ambiguity_threshold: config.ambiguity_threshold,
        }
    }

    /// Ranked candidates of one kind for a span
    ///
    /// Returns `None` when no hit reaches the ratio ceiling.
    pub async fn lookup(
        &self,
        span: &str,
        kind: ResourceKind,
    ) -> LinkingResult<Option<SpanCandidateSet>> {
        let hits = self.index.search(span, kind).await?;
        let hit_count = hits.len();
        let ranked = rank_by_ratio(
            span,
            hits.into_iter().map(|h| ResourceCandidate::from_hit(h, kind)),
            Some(self.max_ratio),
        );

        let set = ranked
            .map(|r| SpanCandidateSet::from_ranked(span, kind, r, self.ambiguity_threshold));
        if let Some(set) = &set {
            trace!(
                "Lookup '{}' ({}): kept {} of {} hits at ratio {:.3}{}",
                span,
                kind,
                set.len(),
                hit_count,
                set.ratio,
                if set.ambiguous { ", ambiguous" } else { "" }
            );
        }
        Ok(set)
    }

    /// Look up every distinct span for every kind concurrently
    pub async fn lookup_all(&self, spans: &[Span]) -> LinkingResult<CandidateTable> {
        let texts: IndexSet<&str> = spans.iter().map(|s| s.text.as_str()).collect();
        let lookups = texts.iter().flat_map(|text| {
            ResourceKind::ALL
                .into_iter()
                .map(move |kind| self.lookup(text, kind))
        });

        let results = try_join_all(lookups).await?;

        let mut table = CandidateTable::default();
        for set in results.into_iter().flatten() {
            table.insert(set);
        }
        debug!(
            "Looked up {} spans: {} entity, {} property, {} class sets",
            texts.len(),
            table.entities.len(),
            table.properties.len(),
            table.classes.len()
        );
        Ok(table)
    }

    /// Number of index calls `lookup_all` makes for `spans`
    pub fn lookup_count(spans: &[Span]) -> usize {
        let texts: IndexSet<&str> = spans.iter().map(|s| s.text.as_str()).collect();
        texts.len() * ResourceKind::ALL.len()
    }
}
