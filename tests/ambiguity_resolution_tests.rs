// Copyright 2025 Cowboy AI, LLC.

//! Majority-type resolution of crowded entity spans

use std::sync::Arc;

use kg_linking::{
    AmbiguityResolver, InMemoryIndex, LinkingConfig, ResourceKind, ResourceLinker, Token,
};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use test_case::test_case;

const CROWD: usize = 60;

fn tokens(text: &str) -> Vec<Token> {
    text.split_whitespace().map(Token::word).collect()
}

/// `size` resources labelled "Paris", typed by `type_of`, and one "Hilton"
fn crowd(size: usize, type_of: impl Fn(usize) -> String) -> InMemoryIndex {
    let index = InMemoryIndex::new();
    for i in 0..size {
        index.add_typed_entity(&format!("http://x/Paris_{i}"), "Paris", &type_of(i));
    }
    index.add_resource(ResourceKind::Entity, "http://x/Hilton", "Hilton");
    index
}

/// Sixty "Paris" resources with "Hilton" linked to the eighth of them
fn crowded_index(type_of: impl Fn(usize) -> String) -> Arc<InMemoryIndex> {
    let index = crowd(CROWD, type_of);
    index.add_triple("http://x/Hilton", "http://x/sibling", "http://x/Paris_7");
    Arc::new(index)
}

#[tokio::test]
async fn test_majority_type_rebuilds_span_around_neighbours() {
    let index = crowded_index(|_| "http://x/Person".to_string());
    let linker = ResourceLinker::with_defaults(index);
    let spans = linker.spans(&tokens("Paris Hilton"));

    let mut table = linker.lookup(&spans).await.unwrap();
    assert_eq!(table.ambiguous_spans(ResourceKind::Entity), vec!["Paris".to_string()]);
    assert_eq!(table.entities["Paris"].len(), CROWD);

    let mut cache = linker.adjacency_cache();
    let mut rng = StdRng::seed_from_u64(42);
    let outcome = linker
        .resolve_ambiguity(&mut table, &mut cache, &mut rng)
        .await
        .unwrap();

    assert_eq!(outcome.resolved, vec!["Paris".to_string()]);
    assert!(outcome.abandoned.is_empty());
    let rebuilt = &table.entities["Paris"];
    assert!(!rebuilt.ambiguous);
    assert_eq!(rebuilt.ids().collect::<Vec<_>>(), vec!["http://x/Paris_7"]);
    assert_eq!(rebuilt.ratio, 0.0);
}

#[tokio::test]
async fn test_resolved_span_is_bound_by_full_pass() {
    let index = crowded_index(|_| "http://x/Person".to_string());
    let linker = ResourceLinker::with_defaults(index);
    let mut rng = StdRng::seed_from_u64(42);
    let question = linker.link(&tokens("Paris Hilton"), &mut rng).await.unwrap();

    assert_eq!(question.stats.ambiguous_spans, 1);
    assert_eq!(question.stats.resolved_spans, 1);
    assert_eq!(question.mapping.span_of("http://x/Paris_7"), Some("Paris"));
    assert_eq!(question.mapping.span_of("http://x/Hilton"), Some("Hilton"));
    assert_eq!(question.mapping.len(), 2);
}

#[tokio::test]
async fn test_span_without_majority_is_abandoned() {
    // At most six resources share a type, so no sample of ten exceeds eight
    let index = crowded_index(|i| {
        if i < 6 {
            "http://x/Person".to_string()
        } else {
            format!("http://x/Type_{i}")
        }
    });
    let linker = ResourceLinker::with_defaults(index);
    let spans = linker.spans(&tokens("Paris Hilton"));
    let mut table = linker.lookup(&spans).await.unwrap();

    let mut cache = linker.adjacency_cache();
    let mut rng = StdRng::seed_from_u64(9);
    let outcome = linker
        .resolve_ambiguity(&mut table, &mut cache, &mut rng)
        .await
        .unwrap();

    assert_eq!(outcome.abandoned, vec!["Paris".to_string()]);
    assert!(!table.entities.contains_key("Paris"));
    assert!(table.entities.contains_key("Hilton"));
}

#[tokio::test]
async fn test_majority_with_no_typed_neighbour_is_abandoned() {
    let index = crowded_index(|_| "http://x/Person".to_string());
    let linker = ResourceLinker::with_defaults(index);
    let spans = linker.spans(&tokens("Paris"));
    let mut table = linker.lookup(&spans).await.unwrap();

    let mut cache = linker.adjacency_cache();
    let mut rng = StdRng::seed_from_u64(5);
    let outcome = linker
        .resolve_ambiguity(&mut table, &mut cache, &mut rng)
        .await
        .unwrap();

    assert_eq!(outcome.abandoned, vec!["Paris".to_string()]);
    assert!(table.is_empty());
}

#[tokio::test]
async fn test_second_resolution_pass_changes_nothing() {
    let index = crowded_index(|_| "http://x/Person".to_string());
    let config = LinkingConfig::default();
    let resolver = AmbiguityResolver::new(Arc::clone(&index), &config);
    let linker = ResourceLinker::with_defaults(index);
    let spans = linker.spans(&tokens("Paris Hilton"));
    let mut table = linker.lookup(&spans).await.unwrap();

    let mut cache = linker.adjacency_cache();
    let mut rng = StdRng::seed_from_u64(11);
    resolver.resolve(&mut table, &mut cache, &mut rng).await.unwrap();
    let settled = table.clone();

    let again = resolver.resolve(&mut table, &mut cache, &mut rng).await.unwrap();
    assert!(again.resolved.is_empty());
    assert!(again.abandoned.is_empty());
    assert_eq!(table, settled);
}

#[tokio::test]
async fn test_distant_neighbour_never_replaces_crowded_span() {
    let index = crowd(CROWD, |_| "http://x/Person".to_string());
    index.add_typed_entity("http://x/Zeno", "Zenobia Quartermaine", "http://x/Person");
    index.add_triple("http://x/Hilton", "http://x/sibling", "http://x/Zeno");

    let linker = ResourceLinker::with_defaults(Arc::new(index));
    let mut rng = StdRng::seed_from_u64(42);
    let question = linker.link(&tokens("Paris Hilton"), &mut rng).await.unwrap();

    assert_eq!(question.stats.ambiguous_spans, 1);
    assert_eq!(question.stats.resolved_spans, 0);
    assert_eq!(question.stats.abandoned_spans, 1);
    assert!(!question.mapping.contains_id("http://x/Zeno"));
    let bound: Vec<(&str, &str)> = question.mapping.iter().collect();
    assert_eq!(bound, vec![("http://x/Hilton", "Hilton")]);
}

/// Ten candidates are all sampled, so the typed share is exact
#[test_case(9, true ; "nine of ten is a majority")]
#[test_case(8, false ; "eight of ten is not")]
#[tokio::test]
async fn test_majority_boundary_over_whole_sample(persons: usize, resolved: bool) {
    let index = crowd(10, |i| {
        if i < persons {
            "http://x/Person".to_string()
        } else {
            "http://x/Place".to_string()
        }
    });
    index.add_triple("http://x/Hilton", "http://x/sibling", "http://x/Paris_0");
    let config = LinkingConfig {
        ambiguity_threshold: 5,
        ..Default::default()
    };
    let linker = ResourceLinker::new(Arc::new(index), config).unwrap();
    let spans = linker.spans(&tokens("Paris Hilton"));
    let mut table = linker.lookup(&spans).await.unwrap();
    assert_eq!(table.ambiguous_spans(ResourceKind::Entity), vec!["Paris".to_string()]);

    let mut cache = linker.adjacency_cache();
    let mut rng = StdRng::seed_from_u64(13);
    let outcome = linker
        .resolve_ambiguity(&mut table, &mut cache, &mut rng)
        .await
        .unwrap();

    if resolved {
        assert_eq!(outcome.resolved, vec!["Paris".to_string()]);
        assert_eq!(
            table.entities["Paris"].ids().collect::<Vec<_>>(),
            vec!["http://x/Paris_0"]
        );
    } else {
        assert_eq!(outcome.abandoned, vec!["Paris".to_string()]);
        assert!(!table.entities.contains_key("Paris"));
    }
}
