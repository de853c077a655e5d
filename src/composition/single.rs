// Copyright 2025 Cowboy AI, LLC.

//! One-hop triples instantiated from two-resource templates
//!
//! These are the `known` triples the compound composer extends.

use indexmap::IndexSet;
use tracing::debug;

use crate::linker::{LinkedQuestion, LinkedResource};
use crate::resource::{DCT_SUBJECT, SKOS_CONCEPT};
use crate::span::independent;
use crate::template::{TemplatePattern, TripleTemplate};
use crate::triple::Triple;

/// Builds single triples from a linked question
#[derive(Debug, Clone, Copy)]
pub struct SingleTripleGenerator<'q> {
    question: &'q LinkedQuestion,
}

impl<'q> SingleTripleGenerator<'q> {
    /// Create a generator over a linked question
    pub fn new(question: &'q LinkedQuestion) -> Self {
        Self { question }
    }

    /// Bound property candidates, or every property candidate when none is bound
    pub fn important_properties(&self) -> Vec<&'q LinkedResource> {
        let bound: IndexSet<&str> = self.question.properties.iter().map(|p| p.id()).collect();
        let important: Vec<&LinkedResource> = self
            .question
            .property_candidates
            .iter()
            .filter(|p| bound.contains(p.id()))
            .collect();
        if important.is_empty() {
            self.question.property_candidates.iter().collect()
        } else {
            important
        }
    }

    /// Triples for a `?s <p> <o>` or `<s> <p> ?o` template
    ///
    /// An entity pairs with every important property it is connected to on
    /// the side the template leaves open, provided the two came from
    /// independent spans. `?s <p> <o>` templates also get `rdf:type` triples
    /// for bound classes and `dct:subject` triples for `skos:Concept`
    /// entities. Ratings multiply the similarities used.
    pub fn generate(&self, template: &TripleTemplate) -> Vec<Triple> {
        let properties = self.important_properties();
        let mut triples: IndexSet<Triple> = IndexSet::new();

        match template.pattern() {
            TemplatePattern::Vrr => {
                for entity in &self.question.entities {
                    for property in connected(&properties, entity, entity.connected_properties_object()) {
                        triples.insert(
                            Triple::new(&template.subject, property.id(), entity.id())
                                .rated(property.similarity * entity.similarity),
                        );
                    }
                }
                for literal in &self.question.literals {
                    for property in connected(&properties, literal, literal.connected_properties_object()) {
                        triples.insert(
                            Triple::new(&template.subject, property.id(), literal.id())
                                .with_literal()
                                .rated(property.similarity * literal.similarity),
                        );
                    }
                }

                for entity in &self.question.entities {
                    if entity.types().iter().any(|t| t == SKOS_CONCEPT) {
                        triples.insert(
                            Triple::new(&template.subject, DCT_SUBJECT, entity.id())
                                .rated(entity.similarity),
                        );
                    }
                }
                for class in &self.question.classes {
                    triples.insert(
                        Triple::new(&template.subject, "a", class.id()).rated(class.similarity),
                    );
                }
            }
            TemplatePattern::Rrv => {
                for entity in &self.question.entities {
                    for property in connected(&properties, entity, entity.connected_properties_subject()) {
                        triples.insert(
                            Triple::new(entity.id(), property.id(), &template.object)
                                .rated(property.similarity * entity.similarity),
                        );
                    }
                }
            }
            _ => {}
        }

        debug!("Template '{}' produced {} single triples", template, triples.len());
        triples.into_iter().collect()
    }
}

/// Important properties the resource touches, from spans independent of its own
fn connected<'a>(
    properties: &'a [&'a LinkedResource],
    resource: &'a LinkedResource,
    touching: &'a [String],
) -> impl Iterator<Item = &'a LinkedResource> + 'a {
    touching.iter().filter_map(move |id| {
        properties
            .iter()
            .find(|p| p.id() == id && independent(&p.span, &resource.span))
            .copied()
    })
}
