// Copyright 2025 Cowboy AI, LLC.

//! Acceptance checks for compound triples

use indexmap::IndexSet;
use tracing::trace;

use crate::linker::LinkedQuestion;
use crate::span::independent;
use crate::template::TripleTemplate;
use crate::triple::{CompoundTriple, Triple};

const SLOT_NAMES: [&str; 3] = ["subject", "predicate", "object"];

/// Check that resolved slots agree exactly where the templates agree
///
/// For every slot `i` of the two-resource template and slot `j` of the
/// one-resource template, equal template texts require equal resolved terms
/// and distinct template texts require distinct resolved terms.
pub fn is_valid_compound(
    compound: &CompoundTriple,
    two_resource: &TripleTemplate,
    one_resource: &TripleTemplate,
) -> bool {
    let known = compound.known.slots();
    let new = compound.new.slots();
    let outer = two_resource.slots();
    let inner = one_resource.slots();

    for i in 0..3 {
        for j in 0..3 {
            let templates_agree = outer[i] == inner[j];
            let terms_agree = known[i] == new[j];
            if templates_agree != terms_agree {
                trace!(
                    "Rejecting '{}': known {} vs new {} breaks template agreement",
                    compound,
                    SLOT_NAMES[i],
                    SLOT_NAMES[j]
                );
                return false;
            }
        }
    }
    true
}

/// Check that no two distinct resources in `triples` come from overlapping spans
///
/// A resource repeated across the triples is checked once, compared
/// case-insensitively. Resources the question cannot trace to a span are
/// ignored.
pub fn has_disjoint_provenance(question: &LinkedQuestion, triples: &[&Triple]) -> bool {
    let mut seen: IndexSet<String> = IndexSet::new();
    let mut spans: Vec<&str> = Vec::new();

    for term in triples.iter().flat_map(|t| t.resource_terms()) {
        if !seen.insert(term.to_lowercase()) {
            continue;
        }
        let Some(span) = question.span_of(term) else {
            continue;
        };
        if let Some(clash) = spans.iter().find(|s| !independent(s, span)) {
            trace!("Resource {} from '{}' overlaps span '{}'", term, span, clash);
            return false;
        }
        spans.push(span);
    }
    true
}
