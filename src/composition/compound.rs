// Copyright 2025 Cowboy AI, LLC.

//! Two-hop patterns from a known triple and a one-resource template

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::try_join_all;
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use crate::composition::gates::{has_disjoint_provenance, is_valid_compound};
use crate::config::LinkingConfig;
use crate::errors::LinkingResult;
use crate::index::{fetch_records, EntityFilter, KnowledgeIndex};
use crate::linker::LinkedQuestion;
use crate::resource::{is_resource_term, ResourceCandidate, ResourceKind};
use crate::similarity::rank_by_ratio;
use crate::template::{TemplatePattern, TripleTemplate};
use crate::triple::{CompoundTriple, Triple};

/// A property found while expanding, with its similarity to a question span
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedProperty {
    /// The property
    pub candidate: ResourceCandidate,
    /// `1 - ratio` against the best matching span
    pub similarity: f64,
}

/// Joins known triples with triples built for a one-resource template
pub struct CompoundTripleComposer<'q, I: ?Sized> {
    index: Arc<I>,
    question: &'q LinkedQuestion,
    id_batch_size: usize,
    max_batched_ids: usize,
    property_filter_ratio: f64,
}

impl<'q, I> CompoundTripleComposer<'q, I>
where
    I: KnowledgeIndex + ?Sized,
{
    /// Create a composer for one linked question
    pub fn new(index: Arc<I>, question: &'q LinkedQuestion, config: &LinkingConfig) -> Self {
        Self {
            index,
            question,
            id_batch_size: config.id_batch_size,
            max_batched_ids: config.max_batched_ids,
            property_filter_ratio: config.property_filter_ratio,
        }
    }

    /// Compound triples passing both gates
    ///
    /// `known` holds triples bound from `two_resource`; each is expanded
    /// concurrently against `one_resource`.
    pub async fn compose(
        &self,
        two_resource: &TripleTemplate,
        one_resource: &TripleTemplate,
        known: &[Triple],
    ) -> LinkingResult<Vec<CompoundTriple>> {
        let expansions =
            try_join_all(known.iter().map(|triple| self.expand(triple, one_resource))).await?;

        let mut compounds = Vec::new();
        let mut rejected = 0usize;
        for (triple, candidates) in known.iter().zip(expansions) {
            for new in candidates {
                let compound = CompoundTriple::new(triple.clone(), new);
                if !is_valid_compound(&compound, two_resource, one_resource)
                    || !has_disjoint_provenance(self.question, &[&compound.known, &compound.new])
                {
                    trace!("Excluded compound '{}'", compound);
                    rejected += 1;
                    continue;
                }
                compounds.push(compound);
            }
        }

        debug!(
            "Composed {} compound triples from {} known ({} rejected)",
            compounds.len(),
            known.len(),
            rejected
        );
        Ok(compounds)
    }

    /// Candidate triples for `pending` given one known triple
    pub async fn expand(&self, known: &Triple, pending: &TripleTemplate) -> LinkingResult<Vec<Triple>> {
        match pending.pattern() {
            TemplatePattern::Vrv if known.has_type_predicate() => {
                self.type_property_triples(known, pending).await
            }
            TemplatePattern::Vrv => self.connected_property_triples(known, pending).await,
            TemplatePattern::Vvr => Ok(self.free_variable_triples(known, pending)),
            _ => Ok(Vec::new()),
        }
    }

    /// Properties carried by instances of the known triple's type
    ///
    /// The known triple is `?x a <Type>`. A property candidate qualifies when
    /// some instance of the type lists it on the side `pending` joins on.
    pub async fn type_property_triples(
        &self,
        known: &Triple,
        pending: &TripleTemplate,
    ) -> LinkingResult<Vec<Triple>> {
        let properties = &self.question.property_candidates;
        let filters: Vec<EntityFilter> = properties
            .iter()
            .map(|p| EntityFilter {
                connected_property: Some(p.id().to_string()),
                type_id: Some(known.object.clone()),
            })
            .collect();
        let found = try_join_all(filters.iter().map(|f| self.index.search_entities(f))).await?;

        let subject_side = joins_on_subject(known, pending);
        let mut triples: IndexSet<Triple> = IndexSet::new();
        for (property, records) in properties.iter().zip(found) {
            let carried = records.iter().any(|r| {
                let side = if subject_side {
                    &r.connected_properties_subject
                } else {
                    &r.connected_properties_object
                };
                side.iter().any(|p| p == property.id())
            });
            if carried {
                triples.insert(
                    Triple::new(&pending.subject, property.id(), &pending.object)
                        .rated(property.similarity),
                );
            }
        }
        Ok(triples.into_iter().collect())
    }

    /// `?s ?p <o>` triples: every other bound entity and literal as the object
    pub fn free_variable_triples(&self, known: &Triple, pending: &TripleTemplate) -> Vec<Triple> {
        let mut triples: IndexSet<Triple> = IndexSet::new();
        for entity in &self.question.entities {
            if entity.id() != known.object {
                triples.insert(
                    Triple::new(&pending.subject, &pending.predicate, entity.id())
                        .rated(entity.similarity),
                );
            }
        }
        for literal in &self.question.literals {
            if literal.id() != known.subject && literal.id() != known.object {
                triples.insert(
                    Triple::new(&pending.subject, &pending.predicate, literal.id())
                        .with_literal()
                        .rated(literal.similarity),
                );
            }
        }
        triples.into_iter().collect()
    }

    /// `?s <p> ?o` triples from properties around the known triple's resource
    ///
    /// Resources connected to the known endpoint are fetched in batches; their
    /// properties on the joining side are kept when they closely match some
    /// question span.
    pub async fn connected_property_triples(
        &self,
        known: &Triple,
        pending: &TripleTemplate,
    ) -> LinkingResult<Vec<Triple>> {
        let related: IndexSet<String> = if is_resource_term(&known.subject) {
            self.question
                .entity(&known.subject)
                .map(|e| e.connected_resources_subject().to_vec())
                .unwrap_or_default()
                .into_iter()
                .collect()
        } else if is_resource_term(&known.object) {
            self.question
                .entity(&known.object)
                .map(|e| e.connected_resources_object().to_vec())
                .unwrap_or_default()
                .into_iter()
                .collect()
        } else {
            IndexSet::new()
        };
        if related.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = related.into_iter().collect();
        let records = fetch_records(
            self.index.as_ref(),
            &ids,
            ResourceKind::Entity,
            self.id_batch_size,
            self.max_batched_ids,
        )
        .await?;

        let subject_side = joins_on_subject(known, pending);
        let wanted: IndexSet<String> = records
            .iter()
            .flat_map(|r| {
                if subject_side {
                    r.connected_properties_subject.iter()
                } else {
                    r.connected_properties_object.iter()
                }
            })
            .cloned()
            .collect();

        let properties = self.find_properties(&wanted).await?;
        Ok(properties
            .into_iter()
            .map(|p| {
                Triple::new(&pending.subject, &p.candidate.id, &pending.object).rated(p.similarity)
            })
            .collect())
    }

    /// Properties among `wanted` that best match some question span
    ///
    /// Known property candidates are reused; the rest are fetched in batches.
    pub async fn find_properties(
        &self,
        wanted: &IndexSet<String>,
    ) -> LinkingResult<Vec<MatchedProperty>> {
        let known_ids: HashSet<&str> = self
            .question
            .property_candidates
            .iter()
            .map(|p| p.id())
            .collect();
        let mut pool: Vec<ResourceCandidate> = self
            .question
            .property_candidates
            .iter()
            .filter(|p| wanted.contains(p.id()))
            .map(|p| p.candidate.clone())
            .collect();

        let missing: Vec<String> = wanted
            .iter()
            .filter(|id| !known_ids.contains(id.as_str()))
            .cloned()
            .collect();
        let fetched = fetch_records(
            self.index.as_ref(),
            &missing,
            ResourceKind::Property,
            self.id_batch_size,
            usize::MAX,
        )
        .await?;
        pool.extend(
            fetched
                .into_iter()
                .map(|r| ResourceCandidate::new(r.id, r.label, ResourceKind::Property)),
        );

        let mut matched: IndexMap<String, MatchedProperty> = IndexMap::new();
        for span in self.question.span_texts() {
            let Some(ranked) =
                rank_by_ratio(span, pool.iter().cloned(), Some(self.property_filter_ratio))
            else {
                continue;
            };
            let similarity = 1.0 - ranked.ratio;
            for candidate in ranked.candidates {
                matched
                    .entry(candidate.id.clone())
                    .or_insert(MatchedProperty {
                        candidate,
                        similarity,
                    });
            }
        }
        trace!(
            "Kept {} of {} connected properties",
            matched.len(),
            wanted.len()
        );
        Ok(matched.into_values().collect())
    }
}

/// Check whether the pending template joins on the known triple's subject or object
fn joins_on_subject(known: &Triple, pending: &TripleTemplate) -> bool {
    pending.subject == known.subject || pending.subject == known.object
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::InMemoryIndex;
    use crate::linker::LinkedResource;
    use crate::resource::{ResourceRecord, RDF_TYPE};
    use crate::span::Span;

    fn linked(id: &str, span: &str, kind: ResourceKind, similarity: f64) -> LinkedResource {
        LinkedResource::new(ResourceCandidate::new(id, span, kind), span, similarity)
    }

    fn span(text: &str) -> Span {
        Span {
            start: 0,
            len: text.split_whitespace().count(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_type_branch_selects_carried_properties() {
        let index = InMemoryIndex::new();
        index.add_triple("http://x/GEB", RDF_TYPE, "http://x/Book");
        index.add_triple("http://x/GEB", "http://x/author", "http://x/Hofstadter");

        let question = LinkedQuestion {
            property_candidates: vec![
                linked("http://x/author", "written", ResourceKind::Property, 0.9),
                linked("http://x/director", "directed", ResourceKind::Property, 1.0),
            ],
            ..Default::default()
        };
        let composer = CompoundTripleComposer::new(Arc::new(index), &question, &LinkingConfig::default());

        let known = Triple::new("?uri", "a", "http://x/Book");
        let pending = TripleTemplate::parse("?uri <^VAR_1^> ?x").unwrap();
        let triples = composer.expand(&known, &pending).await.unwrap();

        assert_eq!(triples, vec![Triple::new("?uri", "http://x/author", "?x")]);
        assert!((triples[0].rating - 0.9).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_vvr_excludes_known_resources() {
        let question = LinkedQuestion {
            entities: vec![
                linked("http://x/A", "alpha", ResourceKind::Entity, 1.0),
                linked("http://x/B", "beta", ResourceKind::Entity, 1.0),
            ],
            literals: vec![LinkedResource::literal("1979", "1979")],
            ..Default::default()
        };
        let composer = CompoundTripleComposer::new(
            Arc::new(InMemoryIndex::new()),
            &question,
            &LinkingConfig::default(),
        );

        let known = Triple::new("?uri", "http://x/p", "http://x/A");
        let pending = TripleTemplate::parse("?uri ?p <^VAR_1^>").unwrap();
        let triples = composer.expand(&known, &pending).await.unwrap();

        assert_eq!(
            triples,
            vec![
                Triple::new("?uri", "?p", "http://x/B"),
                Triple::new("?uri", "?p", "1979").with_literal(),
            ]
        );
    }

    #[tokio::test]
    async fn test_vrv_expansion_filters_properties_by_span() {
        let index = InMemoryIndex::new();
        index.add_resource(ResourceKind::Property, "http://x/publisher", "publisher");
        index.add_resource(ResourceKind::Property, "http://x/isbn", "isbn");
        index.add_triple("http://x/GEB", "http://x/author", "http://x/Hofstadter");
        index.add_triple("http://x/GEB", "http://x/publisher", "http://x/BasicBooks");
        index.add_triple("http://x/GEB", "http://x/isbn", "http://x/isbn-1");

        let mut record = ResourceRecord::new("http://x/Hofstadter", "Douglas Hofstadter");
        record.connected_resources_object = vec!["http://x/GEB".to_string()];
        let question = LinkedQuestion {
            spans: vec![span("Douglas Hofstadter"), span("publisher")],
            entities: vec![
                linked("http://x/Hofstadter", "Douglas Hofstadter", ResourceKind::Entity, 1.0)
                    .with_record(record),
            ],
            ..Default::default()
        };
        let composer = CompoundTripleComposer::new(Arc::new(index), &question, &LinkingConfig::default());

        let known = Triple::new("?uri", "http://x/author", "http://x/Hofstadter");
        let pending = TripleTemplate::parse("?uri <^VAR_2^> ?x").unwrap();
        let triples = composer.expand(&known, &pending).await.unwrap();

        assert_eq!(triples, vec![Triple::new("?uri", "http://x/publisher", "?x")]);
    }

    #[tokio::test]
    async fn test_compose_applies_gates() {
        let index = InMemoryIndex::new();
        index.add_triple("http://x/GEB", RDF_TYPE, "http://x/Book");
        index.add_triple("http://x/GEB", "http://x/author", "http://x/Hofstadter");

        let question = LinkedQuestion {
            property_candidates: vec![linked("http://x/author", "written", ResourceKind::Property, 1.0)],
            classes: vec![linked("http://x/Book", "book", ResourceKind::Class, 1.0)],
            ..Default::default()
        };
        let composer = CompoundTripleComposer::new(Arc::new(index), &question, &LinkingConfig::default());

        let outer = TripleTemplate::parse("?uri a <^VAR_0^>").unwrap();
        let inner = TripleTemplate::parse("?uri <^VAR_1^> ?x").unwrap();
        let known = vec![Triple::new("?uri", "a", "http://x/Book")];
        let compounds = composer.compose(&outer, &inner, &known).await.unwrap();

        assert_eq!(compounds.len(), 1);
        assert_eq!(
            compounds[0].to_string(),
            "?uri a <http://x/Book> . ?uri <http://x/author> ?x ."
        );
    }

    #[tokio::test]
    async fn test_other_patterns_expand_to_nothing() {
        let question = LinkedQuestion::default();
        let composer = CompoundTripleComposer::new(
            Arc::new(InMemoryIndex::new()),
            &question,
            &LinkingConfig::default(),
        );
        let known = Triple::new("?uri", "http://x/p", "http://x/o");
        let pending = TripleTemplate::parse("<^VAR_0^> <^VAR_1^> ?x").unwrap();
        assert!(composer.expand(&known, &pending).await.unwrap().is_empty());
    }
}
