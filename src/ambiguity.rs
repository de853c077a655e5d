// Copyright 2025 Cowboy AI, LLC.

//! Re-resolution of entity spans with too many equally close candidates
//!
//! A random sample of the candidates is typed through the triple store. When
//! one type dominates the sample, the span is re-ranked against resources of
//! that type found one hop from the question's settled candidates, never
//! admitting a worse ratio than the span had. Otherwise the span is abandoned.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::try_join_all;
use indexmap::{IndexMap, IndexSet};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::LinkingConfig;
use crate::errors::LinkingResult;
use crate::index::{fetch_records, KnowledgeIndex, TriplePattern};
use crate::interlinking::AdjacencyCache;
use crate::lookup::{CandidateTable, SpanCandidateSet};
use crate::resource::{ResourceCandidate, ResourceKind};
use crate::similarity::{rank_by_ratio, RankedCandidates};

/// What happened to the ambiguous spans of one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguityOutcome {
    /// Spans rebuilt around a majority type
    pub resolved: Vec<String>,
    /// Spans removed from the table
    pub abandoned: Vec<String>,
}

/// The type carried by more than `threshold` of the sampled resources
///
/// Each inner list holds the types of one resource. With several qualifying
/// types the most frequent wins, the first seen on ties.
pub fn majority_type(sampled_types: &[Vec<String>], threshold: usize) -> Option<String> {
    let mut tally: IndexMap<&str, usize> = IndexMap::new();
    for types in sampled_types {
        let distinct: IndexSet<&str> = types.iter().map(String::as_str).collect();
        for type_id in distinct {
            *tally.entry(type_id).or_insert(0) += 1;
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (type_id, count) in tally {
        if count > threshold && best.map_or(true, |(_, c)| count > c) {
            best = Some((type_id, count));
        }
    }
    best.map(|(type_id, _)| type_id.to_string())
}

/// Demotes and re-resolves ambiguous entity spans
#[derive(Debug)]
pub struct AmbiguityResolver<I: ?Sized> {
    index: Arc<I>,
    sample_size: usize,
    majority_threshold: usize,
    id_batch_size: usize,
    max_batched_ids: usize,
}

impl<I> AmbiguityResolver<I>
where
    I: KnowledgeIndex + ?Sized,
{
    /// Create a resolver over a shared index
    pub fn new(index: Arc<I>, config: &LinkingConfig) -> Self {
        Self {
            index,
            sample_size: config.type_sample_size,
            majority_threshold: config.majority_type_threshold,
            id_batch_size: config.id_batch_size,
            max_batched_ids: config.max_batched_ids,
        }
    }

    /// Resolve or abandon every ambiguous entity span in the table
    ///
    /// The settled entity and property candidates used for rebuilding are
    /// taken once, before any span changes. Sets that are not ambiguous are
    /// left untouched.
    pub async fn resolve<R>(
        &self,
        table: &mut CandidateTable,
        cache: &mut AdjacencyCache,
        rng: &mut R,
    ) -> LinkingResult<AmbiguityOutcome>
    where
        R: Rng + ?Sized,
    {
        let mut outcome = AmbiguityOutcome::default();
        let spans = table.ambiguous_spans(ResourceKind::Entity);
        if spans.is_empty() {
            return Ok(outcome);
        }

        let entities: Vec<String> = table
            .accepted(ResourceKind::Entity)
            .into_iter()
            .map(|c| c.id.clone())
            .collect();
        let properties: Vec<String> = table
            .accepted(ResourceKind::Property)
            .into_iter()
            .map(|c| c.id.clone())
            .collect();

        for span in spans {
            let Some(set) = table.entities.get(&span).cloned() else {
                continue;
            };

            let Some(type_id) = self.sample_majority_type(&set, rng).await? else {
                debug!("No majority type for '{}', abandoning span", span);
                table.remove(ResourceKind::Entity, &span);
                outcome.abandoned.push(span);
                continue;
            };

            match self
                .rebuild(&set, &type_id, &entities, &properties, cache)
                .await?
            {
                Some(ranked) => {
                    debug!(
                        "Rebuilt '{}' around {}: {} candidates at ratio {:.3}",
                        span,
                        type_id,
                        ranked.candidates.len(),
                        ranked.ratio
                    );
                    table.insert(SpanCandidateSet {
                        span: span.clone(),
                        kind: ResourceKind::Entity,
                        candidates: ranked.candidates,
                        ratio: ranked.ratio,
                        ambiguous: false,
                    });
                    outcome.resolved.push(span);
                }
                None => {
                    debug!(
                        "Nothing of type {} within ratio {:.3} of '{}', abandoning span",
                        type_id, set.ratio, span
                    );
                    table.remove(ResourceKind::Entity, &span);
                    outcome.abandoned.push(span);
                }
            }
        }

        info!(
            "Ambiguity pass: {} resolved, {} abandoned",
            outcome.resolved.len(),
            outcome.abandoned.len()
        );
        Ok(outcome)
    }

    /// Sample distinct candidates and return their majority type, if any
    pub async fn sample_majority_type<R>(
        &self,
        set: &SpanCandidateSet,
        rng: &mut R,
    ) -> LinkingResult<Option<String>>
    where
        R: Rng + ?Sized,
    {
        let distinct: Vec<&str> = set.ids().collect::<IndexSet<_>>().into_iter().collect();
        let sample: Vec<String> = distinct
            .choose_multiple(rng, self.sample_size)
            .map(|id| id.to_string())
            .collect();

        let patterns: Vec<TriplePattern> = sample.iter().map(|id| TriplePattern::types_of(id.clone())).collect();
        let typed = try_join_all(patterns.iter().map(|p| self.index.search_triples(p))).await?;
        let sampled_types: Vec<Vec<String>> = typed
            .into_iter()
            .map(|triples| triples.into_iter().map(|t| t.object).collect())
            .collect();

        Ok(majority_type(&sampled_types, self.majority_threshold))
    }

    /// Re-rank `set` against resources of `type_id` next to the settled candidates
    ///
    /// Candidates come only from the one-hop neighbourhoods of the settled
    /// entities. A neighbour is kept when it carries `type_id` and is either
    /// listed in an entity's record or touches one of the settled properties.
    /// The set's prior ratio is the ceiling. Returns `None` when no kept
    /// neighbour is at least that close to the span.
    pub async fn rebuild(
        &self,
        set: &SpanCandidateSet,
        type_id: &str,
        entities: &[String],
        properties: &[String],
        cache: &mut AdjacencyCache,
    ) -> LinkingResult<Option<RankedCandidates>> {
        if entities.is_empty() {
            return Ok(None);
        }

        let records = fetch_records(
            self.index.as_ref(),
            entities,
            ResourceKind::Entity,
            self.id_batch_size,
            self.max_batched_ids,
        )
        .await?;
        let listed: IndexSet<String> = records
            .iter()
            .flat_map(|r| {
                r.connected_resources_subject
                    .iter()
                    .chain(r.connected_resources_object.iter())
            })
            .cloned()
            .collect();

        let mut neighbours = listed.clone();
        if !properties.is_empty() {
            cache
                .prefetch(self.index.as_ref(), entities.iter().map(String::as_str))
                .await?;
            let mut adjacent: Vec<String> = cache
                .union_of(entities.iter().map(String::as_str))
                .into_iter()
                .filter(|id| !listed.contains(id))
                .collect();
            adjacent.sort_unstable();
            neighbours.extend(adjacent);
        }
        if neighbours.is_empty() {
            return Ok(None);
        }

        let ids: Vec<String> = neighbours.into_iter().collect();
        let neighbour_records = fetch_records(
            self.index.as_ref(),
            &ids,
            ResourceKind::Entity,
            self.id_batch_size,
            self.max_batched_ids,
        )
        .await?;

        let settled: HashSet<&str> = properties.iter().map(String::as_str).collect();
        let candidates: Vec<ResourceCandidate> = neighbour_records
            .into_iter()
            .filter(|r| r.types.iter().any(|t| t == type_id))
            .filter(|r| {
                listed.contains(&r.id)
                    || r.connected_properties_subject
                        .iter()
                        .chain(r.connected_properties_object.iter())
                        .any(|p| settled.contains(p.as_str()))
            })
            .map(|r| ResourceCandidate::new(r.id, r.label, ResourceKind::Entity))
            .collect();
        debug!(
            "{} of {} neighbours of the settled entities carry {}",
            candidates.len(),
            ids.len(),
            type_id
        );

        Ok(rank_by_ratio(&set.span, candidates, Some(set.ratio)))
    }
}
