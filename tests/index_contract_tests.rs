// Copyright 2025 Cowboy AI, LLC.

//! Collaborator failures and batching against the index contract

use std::sync::Arc;

use async_trait::async_trait;
use kg_linking::{
    fetch_records, AdjacencyCache, AmbiguityResolver, CandidateTable, EntityFilter, GraphTriple,
    InMemoryIndex, IndexHit, KnowledgeIndex, LinkingConfig, LinkingError, LinkingResult,
    ResourceCandidate, ResourceKind, ResourceLinker, ResourceRecord, SpanCandidateSet, Token,
    TriplePattern, RDF_TYPE,
};
use mockall::mock;
use rand::rngs::StdRng;
use rand::SeedableRng;

mock! {
    pub Index {}

    #[async_trait]
    impl KnowledgeIndex for Index {
        async fn search(&self, query: &str, kind: ResourceKind) -> LinkingResult<Vec<IndexHit>>;
        async fn search_triples(&self, pattern: &TriplePattern) -> LinkingResult<Vec<GraphTriple>>;
        async fn search_by_ids(
            &self,
            ids: &[String],
            kind: ResourceKind,
        ) -> LinkingResult<Vec<ResourceRecord>>;
    }
}

fn tokens(text: &str) -> Vec<Token> {
    text.split_whitespace().map(Token::word).collect()
}

fn label_search(query: &str, kind: ResourceKind) -> LinkingResult<Vec<IndexHit>> {
    match (query, kind) {
        ("Berlin", ResourceKind::Entity) => Ok(vec![IndexHit::new("http://x/Berlin", "Berlin")]),
        ("Paris", ResourceKind::Entity) => Ok(vec![IndexHit::new("http://x/Paris", "Paris")]),
        _ => Ok(Vec::new()),
    }
}

#[tokio::test]
async fn test_lookup_failure_is_reported_and_retryable() {
    let mut index = MockIndex::new();
    index
        .expect_search()
        .returning(|_, _| Err(LinkingError::index_unavailable("search", "connection reset")));

    let linker = ResourceLinker::with_defaults(Arc::new(index));
    let mut rng = StdRng::seed_from_u64(0);
    let err = linker.link(&tokens("Berlin"), &mut rng).await.unwrap_err();

    assert!(err.is_retryable());
    assert!(matches!(err, LinkingError::IndexUnavailable { ref operation, .. } if operation == "search"));
}

#[tokio::test]
async fn test_adjacency_failure_aborts_scoring() {
    let mut index = MockIndex::new();
    index.expect_search().returning(|q, k| label_search(q, k));
    index
        .expect_search_triples()
        .returning(|_| Err(LinkingError::index_unavailable("search_triples", "timeout")));
    index.expect_search_by_ids().never();

    let linker = ResourceLinker::with_defaults(Arc::new(index));
    let spans = linker.spans(&tokens("Berlin Paris"));
    let table = linker.lookup(&spans).await.unwrap();
    assert_eq!(table.entities.len(), 2);

    let mut cache = linker.adjacency_cache();
    let err = linker.score(&table, &mut cache).await.unwrap_err();
    assert!(matches!(err, LinkingError::IndexUnavailable { ref operation, .. } if operation == "search_triples"));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_scoring_can_be_retried_after_failure() {
    let index = InMemoryIndex::new();
    index.add_resource(ResourceKind::Entity, "http://x/Berlin", "Berlin");
    index.add_resource(ResourceKind::Entity, "http://x/Germany", "Germany");
    index.add_triple("http://x/Berlin", "http://x/country", "http://x/Germany");
    let index = Arc::new(index);

    let linker = ResourceLinker::with_defaults(Arc::clone(&index));
    let spans = linker.spans(&tokens("Berlin Germany"));
    let table = linker.lookup(&spans).await.unwrap();

    let mut cache = linker.adjacency_cache();
    index.set_unavailable(true);
    assert!(linker.score(&table, &mut cache).await.is_err());

    index.set_unavailable(false);
    let scores = linker.score(&table, &mut cache).await.unwrap();
    assert_eq!(scores.score(ResourceKind::Entity, "http://x/Berlin"), 1.0);
    assert_eq!(scores.score(ResourceKind::Entity, "http://x/Germany"), 1.0);
}

#[tokio::test]
async fn test_record_fetches_use_batches_of_ten() {
    let mut index = MockIndex::new();
    index
        .expect_search_by_ids()
        .withf(|ids, _| ids.len() <= 10)
        .times(3)
        .returning(|ids, _| Ok(ids.iter().map(|id| ResourceRecord::new(id.clone(), "")).collect()));

    let ids: Vec<String> = (0..25).map(|i| format!("http://x/R{i}")).collect();
    let records = fetch_records(&index, &ids, ResourceKind::Entity, 10, 1000)
        .await
        .unwrap();
    assert_eq!(records.len(), 25);
    assert_eq!(records[24].id, "http://x/R24");
}

#[tokio::test]
async fn test_filtered_entity_search_batches_record_fetches() {
    let index = InMemoryIndex::new();
    for i in 0..25 {
        let id = format!("http://x/Book_{i}");
        index.add_triple(&id, RDF_TYPE, "http://x/Book");
        index.add_triple(&id, "http://x/author", "http://x/Someone");
    }
    index.add_triple("http://x/Film", "http://x/author", "http://x/Someone");

    let records = index
        .search_entities(&EntityFilter {
            connected_property: Some("http://x/author".to_string()),
            type_id: Some("http://x/Book".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(records.len(), 25);
    assert!(records.iter().all(|r| r.types == vec!["http://x/Book".to_string()]));
    assert_eq!(index.id_batch_calls(), 3);
}

/// Patterns that match every instance of a type or every use of a predicate
fn scans_whole_graph(pattern: &TriplePattern) -> bool {
    pattern.subject.is_none() && (pattern.object.is_none() || pattern.predicate.is_some())
}

fn candidate_set(span: &str, kind: ResourceKind, ids: &[String], ambiguous: bool) -> SpanCandidateSet {
    SpanCandidateSet {
        span: span.to_string(),
        kind,
        candidates: ids
            .iter()
            .map(|id| ResourceCandidate::new(id.clone(), span, kind))
            .collect(),
        ratio: 0.0,
        ambiguous,
    }
}

#[tokio::test]
async fn test_ambiguity_rebuild_reads_only_settled_neighbourhoods() {
    let mut index = MockIndex::new();
    index
        .expect_search_triples()
        .withf(|p| scans_whole_graph(p))
        .never();
    index
        .expect_search_triples()
        .withf(|p| !scans_whole_graph(p))
        .returning(|p| {
            let subject = p.subject.clone().unwrap_or_default();
            if p.predicate.as_deref() == Some(RDF_TYPE) {
                Ok(vec![GraphTriple::new(subject, RDF_TYPE, "http://x/Person")])
            } else if subject == "http://x/Hilton" {
                Ok(vec![GraphTriple::new(subject, "http://x/sibling", "http://x/Paris_7")])
            } else {
                Ok(Vec::new())
            }
        });
    index.expect_search_by_ids().returning(|ids, _| {
        Ok(ids
            .iter()
            .map(|id| match id.as_str() {
                "http://x/Hilton" => ResourceRecord {
                    connected_properties_subject: vec!["http://x/sibling".to_string()],
                    connected_resources_subject: vec!["http://x/Paris_7".to_string()],
                    ..ResourceRecord::new(id.clone(), "Hilton")
                },
                "http://x/Paris_7" => ResourceRecord {
                    types: vec!["http://x/Person".to_string()],
                    ..ResourceRecord::new(id.clone(), "Paris")
                },
                _ => ResourceRecord::new(id.clone(), ""),
            })
            .collect())
    });

    let crowd: Vec<String> = (0..60).map(|i| format!("http://x/Paris_{i}")).collect();
    let mut table = CandidateTable::default();
    table.insert(candidate_set("Paris", ResourceKind::Entity, &crowd, true));
    table.insert(candidate_set("Hilton", ResourceKind::Entity, &["http://x/Hilton".to_string()], false));
    table.insert(candidate_set(
        "sibling",
        ResourceKind::Property,
        &["http://x/sibling".to_string()],
        false,
    ));

    let resolver = AmbiguityResolver::new(Arc::new(index), &LinkingConfig::default());
    let mut cache = AdjacencyCache::new(16);
    let mut rng = StdRng::seed_from_u64(4);
    let outcome = resolver.resolve(&mut table, &mut cache, &mut rng).await.unwrap();

    assert_eq!(outcome.resolved, vec!["Paris".to_string()]);
    assert_eq!(
        table.entities["Paris"].ids().collect::<Vec<_>>(),
        vec!["http://x/Paris_7"]
    );
}
