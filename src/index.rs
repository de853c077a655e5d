// Copyright 2025 Cowboy AI, LLC.

//! Collaborator contract for the typed search index and triple store

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use futures::future::try_join_all;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::errors::{LinkingError, LinkingResult};
use crate::resource::{GraphTriple, IndexHit, ResourceKind, ResourceRecord, RDF_TYPE};

/// Identifiers per call used by the default `search_entities`
const DEFAULT_ID_BATCH: usize = 10;

/// A triple pattern; `None` leaves the position unbound
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriplePattern {
    /// Subject constraint
    pub subject: Option<String>,
    /// Predicate constraint
    pub predicate: Option<String>,
    /// Object constraint
    pub object: Option<String>,
}

impl TriplePattern {
    /// Triples whose subject is `resource`
    pub fn with_subject(resource: impl Into<String>) -> Self {
        Self {
            subject: Some(resource.into()),
            ..Default::default()
        }
    }

    /// Triples whose object is `resource`
    pub fn with_object(resource: impl Into<String>) -> Self {
        Self {
            object: Some(resource.into()),
            ..Default::default()
        }
    }

    /// Triples whose predicate is `property`
    pub fn with_predicate(property: impl Into<String>) -> Self {
        Self {
            predicate: Some(property.into()),
            ..Default::default()
        }
    }

    /// `rdf:type` facts of `resource`
    pub fn types_of(resource: impl Into<String>) -> Self {
        Self {
            subject: Some(resource.into()),
            predicate: Some(RDF_TYPE.to_string()),
            object: None,
        }
    }

    /// Resources typed `type_id`
    pub fn instances_of(type_id: impl Into<String>) -> Self {
        Self {
            subject: None,
            predicate: Some(RDF_TYPE.to_string()),
            object: Some(type_id.into()),
        }
    }

    /// Check whether a fact satisfies every bound position
    pub fn matches(&self, triple: &GraphTriple) -> bool {
        self.subject.as_ref().map_or(true, |s| *s == triple.subject)
            && self.predicate.as_ref().map_or(true, |p| *p == triple.predicate)
            && self.object.as_ref().map_or(true, |o| *o == triple.object)
    }
}

/// Filter for entity record searches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFilter {
    /// Entities must touch a triple with this predicate
    pub connected_property: Option<String>,
    /// Entities must carry this `rdf:type`
    pub type_id: Option<String>,
}

/// The external typed index and triple store
///
/// Implementations are shared, read-only and reentrant. Every failure is
/// reported per call so a caller can retry the single call.
#[async_trait]
pub trait KnowledgeIndex: Send + Sync {
    /// Label search restricted to one kind; ranking is left to the caller
    async fn search(&self, query: &str, kind: ResourceKind) -> LinkingResult<Vec<IndexHit>>;

    /// Facts matching a pattern
    async fn search_triples(&self, pattern: &TriplePattern) -> LinkingResult<Vec<GraphTriple>>;

    /// Full records for a bounded batch of identifiers
    async fn search_by_ids(
        &self,
        ids: &[String],
        kind: ResourceKind,
    ) -> LinkingResult<Vec<ResourceRecord>>;

    /// Entity records matching a filter
    ///
    /// The default answers from the triple primitives: endpoints of triples
    /// using the property, intersected with instances of the type.
    async fn search_entities(&self, filter: &EntityFilter) -> LinkingResult<Vec<ResourceRecord>> {
        let mut ids: Option<IndexSet<String>> = None;

        if let Some(property) = &filter.connected_property {
            let triples = self
                .search_triples(&TriplePattern::with_predicate(property.clone()))
                .await?;
            let endpoints: IndexSet<String> = triples
                .into_iter()
                .flat_map(|t| [t.subject, t.object])
                .collect();
            ids = Some(endpoints);
        }

        if let Some(type_id) = &filter.type_id {
            let instances: IndexSet<String> = self
                .search_triples(&TriplePattern::instances_of(type_id.clone()))
                .await?
                .into_iter()
                .map(|t| t.subject)
                .collect();
            ids = Some(match ids {
                Some(current) => current.intersection(&instances).cloned().collect(),
                None => instances,
            });
        }

        let ids: Vec<String> = ids.unwrap_or_default().into_iter().collect();
        fetch_records(self, &ids, ResourceKind::Entity, DEFAULT_ID_BATCH, usize::MAX).await
    }
}

/// Fetch records in chunks of `batch_size`, stopping after `max_ids` identifiers
pub async fn fetch_records<I>(
    index: &I,
    ids: &[String],
    kind: ResourceKind,
    batch_size: usize,
    max_ids: usize,
) -> LinkingResult<Vec<ResourceRecord>>
where
    I: KnowledgeIndex + ?Sized,
{
    if batch_size == 0 {
        return Err(LinkingError::InvalidConfiguration(
            "batch size must be greater than zero".to_string(),
        ));
    }
    if ids.len() > max_ids {
        warn!("Fetching only {} of {} {} records", max_ids, ids.len(), kind);
    }
    let bounded = &ids[..ids.len().min(max_ids)];
    let batches = bounded.chunks(batch_size).map(|chunk| index.search_by_ids(chunk, kind));
    let records = try_join_all(batches).await?;
    trace!(
        "Fetched {} {} records in {} batches",
        bounded.len(),
        kind,
        bounded.len().div_ceil(batch_size)
    );
    Ok(records.into_iter().flatten().collect())
}

/// Resources one hop away from `resource`, plus the predicates linking them
pub async fn adjacent_resources<I>(index: &I, resource: &str) -> LinkingResult<HashSet<String>>
where
    I: KnowledgeIndex + ?Sized,
{
    let forward = TriplePattern::with_subject(resource);
    let backward = TriplePattern::with_object(resource);
    let (outgoing, incoming) = futures::try_join!(
        index.search_triples(&forward),
        index.search_triples(&backward),
    )?;

    let mut linked = HashSet::new();
    for triple in outgoing {
        linked.insert(triple.object);
        linked.insert(triple.predicate);
    }
    for triple in incoming {
        linked.insert(triple.subject);
        linked.insert(triple.predicate);
    }
    Ok(linked)
}

#[derive(Debug, Clone)]
struct IndexedResource {
    hit: IndexHit,
    kind: ResourceKind,
}

/// In-memory index for testing and demos
///
/// Label search returns every resource of the kind whose label shares a word
/// with the query. Records are derived from the stored triples.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    resources: RwLock<Vec<IndexedResource>>,
    triples: RwLock<Vec<GraphTriple>>,
    unavailable: AtomicBool,
    id_batches: AtomicUsize,
}

impl InMemoryIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a searchable resource
    pub fn add_resource(&self, kind: ResourceKind, id: impl Into<String>, label: impl Into<String>) {
        let mut resources = self.resources.write().unwrap_or_else(|e| e.into_inner());
        resources.push(IndexedResource {
            hit: IndexHit::new(id, label),
            kind,
        });
    }

    /// Register a fact
    pub fn add_triple(
        &self,
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) {
        let mut triples = self.triples.write().unwrap_or_else(|e| e.into_inner());
        triples.push(GraphTriple::new(subject, predicate, object));
    }

    /// Register an entity and its `rdf:type`
    pub fn add_typed_entity(&self, id: &str, label: &str, type_id: &str) {
        self.add_resource(ResourceKind::Entity, id, label);
        self.add_triple(id, RDF_TYPE, type_id);
    }

    /// Make every subsequent call fail until re-enabled
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `search_by_ids` calls served so far
    pub fn id_batch_calls(&self) -> usize {
        self.id_batches.load(Ordering::SeqCst)
    }

    fn check_available(&self, operation: &str) -> LinkingResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(LinkingError::index_unavailable(operation, "index marked unavailable"))
        } else {
            Ok(())
        }
    }

    fn read_triples(&self) -> LinkingResult<Vec<GraphTriple>> {
        self.triples
            .read()
            .map(|t| t.clone())
            .map_err(|e| LinkingError::Internal(e.to_string()))
    }

    fn label_of(&self, id: &str) -> String {
        let resources = self.resources.read().unwrap_or_else(|e| e.into_inner());
        resources
            .iter()
            .find(|r| r.hit.id == id)
            .map(|r| r.hit.label.clone())
            .unwrap_or_default()
    }

    fn record_for(&self, id: &str, triples: &[GraphTriple]) -> ResourceRecord {
        let mut record = ResourceRecord::new(id, self.label_of(id));
        for triple in triples {
            if triple.subject == id {
                if triple.predicate == RDF_TYPE {
                    record.types.push(triple.object.clone());
                }
                push_unique(&mut record.connected_properties_subject, &triple.predicate);
                push_unique(&mut record.connected_resources_subject, &triple.object);
            }
            if triple.object == id {
                push_unique(&mut record.connected_properties_object, &triple.predicate);
                push_unique(&mut record.connected_resources_object, &triple.subject);
            }
        }
        record
    }
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

#[async_trait]
impl KnowledgeIndex for InMemoryIndex {
    async fn search(&self, query: &str, kind: ResourceKind) -> LinkingResult<Vec<IndexHit>> {
        self.check_available("search")?;
        let words: Vec<String> = query.split_whitespace().map(|w| w.to_lowercase()).collect();
        let resources = self
            .resources
            .read()
            .map_err(|e| LinkingError::Internal(e.to_string()))?;
        Ok(resources
            .iter()
            .filter(|r| r.kind == kind)
            .filter(|r| {
                let label = r.hit.label.to_lowercase();
                label.split_whitespace().any(|lw| words.iter().any(|w| w == lw))
            })
            .map(|r| r.hit.clone())
            .collect())
    }

    async fn search_triples(&self, pattern: &TriplePattern) -> LinkingResult<Vec<GraphTriple>> {
        self.check_available("search_triples")?;
        Ok(self
            .read_triples()?
            .into_iter()
            .filter(|t| pattern.matches(t))
            .collect())
    }

    async fn search_by_ids(
        &self,
        ids: &[String],
        _kind: ResourceKind,
    ) -> LinkingResult<Vec<ResourceRecord>> {
        self.check_available("search_by_ids")?;
        self.id_batches.fetch_add(1, Ordering::SeqCst);
        let triples = self.read_triples()?;
        Ok(ids.iter().map(|id| self.record_for(id, &triples)).collect())
    }
}
