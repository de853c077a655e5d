// Copyright 2025 Cowboy AI, LLC.

//! Instantiated triples and two-hop compound patterns

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::resource::{is_resource_term, RDF_TYPE};
use crate::template::is_variable;

/// Check whether a predicate is `a` or `rdf:type`, ignoring case
pub fn is_type_predicate(predicate: &str) -> bool {
    predicate.eq_ignore_ascii_case("a") || predicate.eq_ignore_ascii_case(RDF_TYPE)
}

/// A template with its resource slots bound
///
/// Equality and hashing ignore the rating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Triple {
    /// Subject term
    pub subject: String,
    /// Predicate term
    pub predicate: String,
    /// Object term
    pub object: String,
    /// Product of the similarities of the resources used
    pub rating: f64,
    /// Set when the object is a literal value
    pub literal: bool,
}

impl Triple {
    /// Create a triple rated `1.0`
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            rating: 1.0,
            literal: false,
        }
    }

    /// Mark the object as a literal
    pub fn with_literal(mut self) -> Self {
        self.literal = true;
        self
    }

    /// Multiply the rating by `factor`
    pub fn rated(mut self, factor: f64) -> Self {
        self.rating *= factor;
        self
    }

    /// Terms in subject, predicate, object order
    pub fn slots(&self) -> [&str; 3] {
        [&self.subject, &self.predicate, &self.object]
    }

    /// Check whether the predicate is `a` or `rdf:type`
    pub fn has_type_predicate(&self) -> bool {
        is_type_predicate(&self.predicate)
    }

    /// URI-valued terms
    pub fn resource_terms(&self) -> impl Iterator<Item = &str> {
        self.slots().into_iter().filter(|t| is_resource_term(t))
    }
}

impl PartialEq for Triple {
    fn eq(&self, other: &Self) -> bool {
        self.subject == other.subject
            && self.predicate == other.predicate
            && self.object == other.object
            && self.literal == other.literal
    }
}

impl Eq for Triple {}

impl Hash for Triple {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.subject.hash(state);
        self.predicate.hash(state);
        self.object.hash(state);
        self.literal.hash(state);
    }
}

fn write_term(f: &mut fmt::Formatter<'_>, term: &str, literal: bool) -> fmt::Result {
    if literal {
        write!(f, "\"{}\"", term.replace('"', "\\\""))
    } else if is_variable(term) || term == "a" || !is_resource_term(term) {
        write!(f, "{term}")
    } else {
        write!(f, "<{term}>")
    }
}

impl fmt::Display for Triple {
    /// Render as a SPARQL triple pattern
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_term(f, &self.subject, false)?;
        write!(f, " ")?;
        write_term(f, &self.predicate, false)?;
        write!(f, " ")?;
        write_term(f, &self.object, self.literal)?;
        write!(f, " .")
    }
}

/// A known two-resource triple joined with a triple from a one-resource template
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompoundTriple {
    /// The triple bound from the two-resource template
    pub known: Triple,
    /// The triple built for the one-resource template
    pub new: Triple,
}

impl CompoundTriple {
    /// Pair two triples
    pub fn new(known: Triple, new: Triple) -> Self {
        Self { known, new }
    }

    /// Product of both ratings
    pub fn rating(&self) -> f64 {
        self.known.rating * self.new.rating
    }
}

impl fmt::Display for CompoundTriple {
    /// Render as a two-pattern SPARQL basic graph pattern
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.known, self.new)
    }
}
