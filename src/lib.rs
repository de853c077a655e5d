//! # KG Linking
//!
//! Maps fragments of a natural-language question onto knowledge-graph
//! resources and assembles the resolved resources into two-hop query patterns.
//!
//! The per-question pass runs in stages, each a public operation:
//! - **Spans**: contiguous token runs of the question ([`SpanGenerator`])
//! - **Lookup**: closest index hits per span and kind ([`CandidateLookup`])
//! - **Ambiguity**: majority-type re-resolution of crowded spans ([`AmbiguityResolver`])
//! - **Interlinking**: adjacency evidence between candidates ([`InterlinkingScorer`])
//! - **Mapping**: final span-to-resource bindings ([`MappingAssembler`])
//! - **Composition**: single and compound triples ([`SingleTripleGenerator`],
//!   [`CompoundTripleComposer`])
//!
//! [`ResourceLinker`] drives the linking stages end to end. The index and triple
//! store are reached only through the [`KnowledgeIndex`] trait; an in-memory
//! implementation is included.
//!
//! ## Design Principles
//!
//! 1. **Per-question state**: nothing is cached across questions
//! 2. **Explicit collaborators**: the index is passed as `Arc<I>`, never global
//! 3. **Reproducible sampling**: the random source is injected
//! 4. **Fan-out, then merge**: index calls run concurrently, writes happen after the join

#![warn(missing_docs)]

mod ambiguity;
mod config;
mod errors;
mod index;
mod interlinking;
mod linker;
mod lookup;
mod mapping;
mod resource;
mod similarity;
mod span;
mod template;
mod triple;
pub mod composition;

pub use ambiguity::{majority_type, AmbiguityOutcome, AmbiguityResolver};
pub use composition::{
    has_disjoint_provenance, is_valid_compound, CompoundTripleComposer, MatchedProperty,
    SingleTripleGenerator,
};
pub use config::LinkingConfig;
pub use errors::{LinkingError, LinkingResult};
pub use index::{
    adjacent_resources, fetch_records, EntityFilter, InMemoryIndex, KnowledgeIndex,
    TriplePattern,
};
pub use interlinking::{AdjacencyCache, InterlinkingScorer, LinkingScores};
pub use linker::{BoundResources, LinkedQuestion, LinkedResource, LinkingStats, ResourceLinker};
pub use lookup::{CandidateLookup, CandidateTable, SpanCandidateSet};
pub use mapping::{MappingAssembler, SpanResourceMapping};
pub use resource::{
    is_resource_term, GraphTriple, IndexHit, ResourceCandidate, ResourceKind, ResourceRecord,
    Token, DCT_SUBJECT, RDF_TYPE, SKOS_CONCEPT,
};
pub use similarity::{rank_by_ratio, similarity_ratio, RankedCandidates};
pub use span::{independent, Span, SpanGenerator};
pub use template::{is_variable, TemplatePattern, TripleTemplate};
pub use triple::{is_type_predicate, CompoundTriple, Triple};
