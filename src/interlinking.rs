// Copyright 2025 Cowboy AI, LLC.

//! Graph-adjacency evidence between candidates of independent spans
//!
//! Two candidates are interlinked when one appears in the other's one-hop
//! neighbourhood. Neighbourhoods are fetched once per question into an
//! [`AdjacencyCache`] before any score is written.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::future::try_join_all;
use indexmap::{IndexMap, IndexSet};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::LinkingResult;
use crate::index::{adjacent_resources, KnowledgeIndex};
use crate::lookup::{CandidateTable, SpanCandidateSet};
use crate::resource::ResourceKind;

/// One-hop neighbourhoods of resources, bounded and per question
pub struct AdjacencyCache {
    entries: LruCache<String, Arc<HashSet<String>>>,
}

impl std::fmt::Debug for AdjacencyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdjacencyCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.entries.cap())
            .finish()
    }
}

impl AdjacencyCache {
    /// Create a cache holding at most `capacity` neighbourhoods
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Neighbourhood of `id`, if cached
    pub fn get(&self, id: &str) -> Option<Arc<HashSet<String>>> {
        self.entries.peek(id).cloned()
    }

    /// Store a neighbourhood
    pub fn insert(&mut self, id: impl Into<String>, linked: HashSet<String>) {
        self.entries.put(id.into(), Arc::new(linked));
    }

    /// Check whether `id` has a cached neighbourhood
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains(id)
    }

    /// Number of cached neighbourhoods
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fetch the neighbourhoods not yet cached, concurrently
    ///
    /// Every requested neighbourhood is cached on return. When the request
    /// outgrows the capacity the cache is enlarged to hold it, so nothing
    /// requested is evicted by the entries fetched alongside it. Returns how
    /// many were fetched.
    pub async fn prefetch<'a, I, T>(&mut self, index: &I, ids: T) -> LinkingResult<usize>
    where
        I: KnowledgeIndex + ?Sized,
        T: IntoIterator<Item = &'a str>,
    {
        let requested: IndexSet<&str> = ids.into_iter().collect();
        if let Some(needed) = NonZeroUsize::new(requested.len()) {
            if needed > self.entries.cap() {
                warn!(
                    "Adjacency cache holds {} neighbourhoods, growing to {} for one request",
                    self.entries.cap(),
                    needed
                );
                self.entries.resize(needed);
            }
        }

        // Touch cached entries first so fresh inserts evict other ids
        let missing: Vec<&str> = requested
            .into_iter()
            .filter(|id| self.entries.get(*id).is_none())
            .collect();
        let fetched = try_join_all(missing.iter().map(|id| adjacent_resources(index, id))).await?;
        let count = missing.len();
        for (id, linked) in missing.into_iter().zip(fetched) {
            self.insert(id, linked);
        }
        Ok(count)
    }

    /// Maximum number of cached neighbourhoods
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Check whether either resource lists the other as a neighbour
    pub fn links(&self, a: &str, b: &str) -> bool {
        self.neighbour_of(a, b) || self.neighbour_of(b, a)
    }

    /// Check whether `candidate` lists `linked` as a neighbour
    pub fn neighbour_of(&self, candidate: &str, linked: &str) -> bool {
        self.entries
            .peek(candidate)
            .is_some_and(|set| set.contains(linked))
    }

    /// Number of cached neighbourhoods containing `id`
    pub fn count_linking_to(&self, id: &str) -> usize {
        self.entries.iter().filter(|(_, set)| set.contains(id)).count()
    }

    /// Union of the cached neighbourhoods of `ids`
    pub fn union_of<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
        let mut union = HashSet::new();
        for id in ids {
            if let Some(set) = self.entries.peek(id) {
                union.extend(set.iter().cloned());
            }
        }
        union
    }
}

/// Accumulated interlinking scores of one question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkingScores {
    /// Scores of entity candidates
    pub entities: IndexMap<String, f64>,
    /// Scores of property candidates
    pub properties: IndexMap<String, f64>,
}

impl LinkingScores {
    /// Scores of one kind; classes are not scored by interlinking
    pub fn by_kind(&self, kind: ResourceKind) -> Option<&IndexMap<String, f64>> {
        match kind {
            ResourceKind::Entity => Some(&self.entities),
            ResourceKind::Property => Some(&self.properties),
            ResourceKind::Class => None,
        }
    }

    /// Score of a candidate, zero when never scored
    pub fn score(&self, kind: ResourceKind, id: &str) -> f64 {
        self.by_kind(kind)
            .and_then(|scores| scores.get(id))
            .copied()
            .unwrap_or(0.0)
    }

    fn add(&mut self, kind: ResourceKind, id: &str, amount: f64) {
        let scores = match kind {
            ResourceKind::Entity => &mut self.entities,
            ResourceKind::Property => &mut self.properties,
            ResourceKind::Class => return,
        };
        *scores.entry(id.to_string()).or_insert(0.0) += amount;
    }
}

/// Candidate pairs already scored this question, order-insensitive
#[derive(Debug, Default)]
struct ScoredPairs(HashSet<(String, String)>);

impl ScoredPairs {
    /// Record a pair, returning `false` if it was already scored
    fn insert(&mut self, a: &str, b: &str) -> bool {
        let key = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        self.0.insert(key)
    }
}

/// Scores entity-entity and property-entity candidate pairs by adjacency
#[derive(Debug)]
pub struct InterlinkingScorer<I: ?Sized> {
    index: Arc<I>,
}

impl<I> InterlinkingScorer<I>
where
    I: KnowledgeIndex + ?Sized,
{
    /// Create a scorer over a shared index
    pub fn new(index: Arc<I>) -> Self {
        Self { index }
    }

    /// Score every comparable pair in the table
    ///
    /// Only non-ambiguous sets of independent spans are compared. Each
    /// unordered candidate pair contributes at most once, to both sides.
    pub async fn score(
        &self,
        table: &CandidateTable,
        cache: &mut AdjacencyCache,
    ) -> LinkingResult<LinkingScores> {
        let mut scores = LinkingScores::default();
        for set in settled(&table.entities) {
            for id in set.ids() {
                scores.entities.insert(id.to_string(), 0.0);
            }
        }
        for set in settled(&table.properties) {
            for id in set.ids() {
                scores.properties.insert(id.to_string(), 0.0);
            }
        }

        let entity_pairs = comparable_pairs(&table.entities, &table.entities);
        let property_pairs = comparable_pairs(&table.properties, &table.entities);

        let mut needed: IndexSet<&str> = IndexSet::new();
        for (first, second) in &entity_pairs {
            needed.extend(first.ids());
            needed.extend(second.ids());
        }
        for (_, entities) in &property_pairs {
            needed.extend(entities.ids());
        }
        let fetched = cache.prefetch(self.index.as_ref(), needed.iter().copied()).await?;

        let mut scored = ScoredPairs::default();
        let mut linked_pairs = 0usize;

        for (first, second) in &entity_pairs {
            for a in first.ids() {
                for b in second.ids() {
                    if !scored.insert(a, b) {
                        continue;
                    }
                    let score = if cache.links(a, b) { 1.0 } else { 0.0 };
                    if score > 0.0 {
                        linked_pairs += 1;
                    }
                    scores.add(ResourceKind::Entity, a, score);
                    scores.add(ResourceKind::Entity, b, score);
                }
            }
        }

        for (properties, entities) in &property_pairs {
            for property in properties.ids() {
                for entity in entities.ids() {
                    if !scored.insert(property, entity) {
                        continue;
                    }
                    let score = if cache.neighbour_of(entity, property) { 1.0 } else { 0.0 };
                    if score > 0.0 {
                        linked_pairs += 1;
                    }
                    scores.add(ResourceKind::Property, property, score);
                    scores.add(ResourceKind::Entity, entity, score);
                }
            }
        }

        debug!(
            "Interlinking: {} entity pairs, {} property pairs, {} linked, {} neighbourhoods fetched",
            entity_pairs.len(),
            property_pairs.len(),
            linked_pairs,
            fetched
        );
        Ok(scores)
    }
}

fn settled(sets: &IndexMap<String, SpanCandidateSet>) -> impl Iterator<Item = &SpanCandidateSet> {
    sets.values().filter(|s| !s.ambiguous)
}

/// Ordered pairs of settled sets over independent spans
fn comparable_pairs<'a>(
    left: &'a IndexMap<String, SpanCandidateSet>,
    right: &'a IndexMap<String, SpanCandidateSet>,
) -> Vec<(&'a SpanCandidateSet, &'a SpanCandidateSet)> {
    let mut pairs = Vec::new();
    for a in settled(left) {
        for b in settled(right) {
            if crate::span::independent(&a.span, &b.span) {
                pairs.push((a, b));
            }
        }
    }
    pairs
}
