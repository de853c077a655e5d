// Copyright 2025 Cowboy AI, LLC.

//! Final span-to-resource bindings with tie and conflict resolution

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::interlinking::{AdjacencyCache, LinkingScores};
use crate::lookup::{CandidateTable, SpanCandidateSet};
use crate::resource::ResourceKind;

/// Bound candidate identifiers and the span each was bound from
///
/// A bound span is never a strict substring of another bound span once
/// [`SpanResourceMapping::prune_nested_spans`] has run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanResourceMapping {
    bindings: IndexMap<String, String>,
}

impl SpanResourceMapping {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `id` to `span` unless it is already bound to a span at least as long
    ///
    /// Returns whether the binding changed.
    pub fn bind(&mut self, id: &str, span: &str) -> bool {
        match self.bindings.get(id) {
            Some(existing) if existing.chars().count() >= span.chars().count() => false,
            _ => {
                self.bindings.insert(id.to_string(), span.to_string());
                true
            }
        }
    }

    /// Span `id` is bound to
    pub fn span_of(&self, id: &str) -> Option<&str> {
        self.bindings.get(id).map(String::as_str)
    }

    /// Identifiers bound to `span`, in binding order
    pub fn ids_for(&self, span: &str) -> Vec<&str> {
        self.bindings
            .iter()
            .filter(|(_, s)| s.as_str() == span)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Distinct bound spans
    pub fn spans(&self) -> IndexSet<&str> {
        self.bindings.values().map(String::as_str).collect()
    }

    /// Check whether `id` is bound
    pub fn contains_id(&self, id: &str) -> bool {
        self.bindings.contains_key(id)
    }

    /// `(id, span)` pairs in binding order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(id, span)| (id.as_str(), span.as_str()))
    }

    /// Number of bound identifiers
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check whether nothing is bound
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Take every binding of `other`, replacing ones for the same identifier
    pub fn merge(&mut self, other: SpanResourceMapping) {
        self.bindings.extend(other.bindings);
    }

    /// Drop bindings whose span is a strict substring of another bound span
    ///
    /// Returns the number of bindings removed.
    pub fn prune_nested_spans(&mut self) -> usize {
        let spans: Vec<String> = self.spans().into_iter().map(str::to_string).collect();
        let before = self.bindings.len();
        self.bindings.retain(|_, span| {
            !spans
                .iter()
                .any(|other| other != span && other.contains(span.as_str()))
        });
        before - self.bindings.len()
    }
}

/// Builds the span-to-resource mapping from scored candidate sets
#[derive(Debug, Default, Clone, Copy)]
pub struct MappingAssembler;

impl MappingAssembler {
    /// Create an assembler
    pub fn new() -> Self {
        Self
    }

    /// Bind one kind's candidate sets using per-candidate scores
    ///
    /// Ambiguous sets contribute nothing. A multi-candidate set binds its
    /// single best-scored candidate; a tie is deferred and bound in full only
    /// if no bound span contains it and none of its tied candidates is bound
    /// yet. Deferred spans are checked in order against the mapping as it
    /// grows.
    pub fn assemble(
        &self,
        sets: &IndexMap<String, SpanCandidateSet>,
        scores: &IndexMap<String, f64>,
    ) -> SpanResourceMapping {
        let mut mapping = SpanResourceMapping::new();
        let mut deferred: Vec<(&str, Vec<&str>)> = Vec::new();

        for set in sets.values().filter(|s| !s.ambiguous) {
            let ids: IndexSet<&str> = set.ids().collect();
            match ids.len() {
                0 => {}
                1 => {
                    mapping.bind(ids[0], &set.span);
                }
                _ => {
                    let score = |id: &str| scores.get(id).copied().unwrap_or(0.0);
                    let best = ids.iter().map(|id| score(id)).fold(f64::MIN, f64::max);
                    let tied: Vec<&str> = ids.into_iter().filter(|id| score(id) == best).collect();
                    if let [winner] = tied.as_slice() {
                        mapping.bind(winner, &set.span);
                    } else {
                        trace!("Deferring '{}' with {} tied candidates", set.span, tied.len());
                        deferred.push((set.span.as_str(), tied));
                    }
                }
            }
        }

        for (span, tied) in deferred {
            let covered = mapping.spans().iter().any(|bound| bound.contains(span));
            let claimed = tied.iter().any(|id| mapping.contains_id(id));
            if covered || claimed {
                trace!("Dropping deferred '{}'", span);
                continue;
            }
            for id in tied {
                mapping.bind(id, span);
            }
        }

        mapping
    }

    /// Bind class sets, scoring each class by how many cached neighbourhoods link to it
    pub fn assemble_classes(
        &self,
        sets: &IndexMap<String, SpanCandidateSet>,
        cache: &AdjacencyCache,
    ) -> SpanResourceMapping {
        let scores: IndexMap<String, f64> = sets
            .values()
            .flat_map(|s| s.ids())
            .map(|id| (id.to_string(), cache.count_linking_to(id) as f64))
            .collect();
        self.assemble(sets, &scores)
    }

    /// Assemble entities, then properties, then classes, and prune nested spans
    pub fn assemble_all(
        &self,
        table: &CandidateTable,
        scores: &LinkingScores,
        cache: &AdjacencyCache,
    ) -> SpanResourceMapping {
        let mut mapping = self.assemble(table.by_kind(ResourceKind::Entity), &scores.entities);
        mapping.merge(self.assemble(table.by_kind(ResourceKind::Property), &scores.properties));
        mapping.merge(self.assemble_classes(table.by_kind(ResourceKind::Class), cache));

        let pruned = mapping.prune_nested_spans();
        debug!(
            "Mapping: {} bindings over {} spans, {} pruned",
            mapping.len(),
            mapping.spans().len(),
            pruned
        );
        mapping
    }
}
