// Copyright 2025 Cowboy AI, LLC.

//! Value objects shared by every linking stage
//!
//! Tokens come from the external preprocessor; candidates, records and graph
//! triples come from the external index. None of them are mutated here.

use std::fmt;

use serde::{Deserialize, Serialize};

/// `rdf:type`
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// `skos:Concept`
pub const SKOS_CONCEPT: &str = "http://www.w3.org/2004/02/skos/core#Concept";

/// `dct:subject`
pub const DCT_SUBJECT: &str = "http://purl.org/dc/terms/subject";

/// A word from the question with its part-of-speech tag and lemma
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    /// Surface form
    pub word: String,
    /// Part-of-speech tag
    pub pos: String,
    /// Lemma
    pub lemma: String,
}

impl Token {
    /// Create a new token
    pub fn new(word: impl Into<String>, pos: impl Into<String>, lemma: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            pos: pos.into(),
            lemma: lemma.into(),
        }
    }

    /// Token whose tag and lemma are unknown
    pub fn word(word: impl Into<String>) -> Self {
        let word = word.into();
        let lemma = word.to_lowercase();
        Self {
            word,
            pos: String::new(),
            lemma,
        }
    }
}

/// The three kinds of resource the index distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Named things (`dbr:Douglas_Hofstadter`)
    Entity,
    /// Relations (`dbo:author`)
    Property,
    /// Ontology classes (`dbo:Book`)
    Class,
}

impl ResourceKind {
    /// All kinds in lookup order
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Entity,
        ResourceKind::Property,
        ResourceKind::Class,
    ];
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Entity => write!(f, "entity"),
            ResourceKind::Property => write!(f, "property"),
            ResourceKind::Class => write!(f, "class"),
        }
    }
}

/// A raw `(identifier, label)` pair returned by a label search
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexHit {
    /// Resource identifier (URI)
    pub id: String,
    /// Human readable label
    pub label: String,
}

impl IndexHit {
    /// Create a new hit
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// A resource proposed as the referent of a span
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceCandidate {
    /// Resource identifier (URI)
    pub id: String,
    /// Label the similarity ratio was computed against
    pub label: String,
    /// Kind of resource
    pub kind: ResourceKind,
}

impl ResourceCandidate {
    /// Create a new candidate
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
        }
    }

    /// Lift an index hit into a candidate of the given kind
    pub fn from_hit(hit: IndexHit, kind: ResourceKind) -> Self {
        Self {
            id: hit.id,
            label: hit.label,
            kind,
        }
    }
}

/// Full index record of a resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Resource identifier (URI)
    pub id: String,
    /// Human readable label
    pub label: String,
    /// Objects of the resource's `rdf:type` facts
    pub types: Vec<String>,
    /// Predicates of triples where the resource is the subject
    pub connected_properties_subject: Vec<String>,
    /// Predicates of triples where the resource is the object
    pub connected_properties_object: Vec<String>,
    /// Objects of triples where the resource is the subject
    pub connected_resources_subject: Vec<String>,
    /// Subjects of triples where the resource is the object
    pub connected_resources_object: Vec<String>,
}

impl ResourceRecord {
    /// Record with only identity filled in
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            ..Default::default()
        }
    }
}

/// A concrete fact from the triple store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphTriple {
    /// Subject
    pub subject: String,
    /// Predicate
    pub predicate: String,
    /// Object
    pub object: String,
}

impl GraphTriple {
    /// Create a new fact
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

/// Check whether a term starts with a URI scheme (`http://`, `urn:`, ...)
///
/// Variables (`?uri`), the `a` keyword and template placeholders are not
/// resource terms.
pub fn is_resource_term(term: &str) -> bool {
    let Some((scheme, rest)) = term.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    starts_alpha
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && !rest.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_kind_display_and_serde() {
        assert_eq!(ResourceKind::Entity.to_string(), "entity");
        assert_eq!(ResourceKind::Class.to_string(), "class");

        let json = serde_json::to_string(&ResourceKind::Property).unwrap();
        assert_eq!(json, "\"property\"");
        let back: ResourceKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ResourceKind::Property);
    }

    #[test]
    fn test_is_resource_term() {
        assert!(is_resource_term("http://dbpedia.org/resource/Berlin"));
        assert!(is_resource_term("https://example.org/x"));
        assert!(is_resource_term("urn:isbn:0451450523"));
        assert!(!is_resource_term("?uri"));
        assert!(!is_resource_term("a"));
        assert!(!is_resource_term("<^VAR_0^>"));
        assert!(!is_resource_term("1:"));
    }

    #[test]
    fn test_candidate_from_hit() {
        let hit = IndexHit::new("http://dbpedia.org/resource/Berlin", "Berlin");
        let candidate = ResourceCandidate::from_hit(hit, ResourceKind::Entity);
        assert_eq!(candidate.label, "Berlin");
        assert_eq!(candidate.kind, ResourceKind::Entity);
    }
}
