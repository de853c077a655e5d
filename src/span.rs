// Copyright 2025 Cowboy AI, LLC.

//! Candidate spans over a tokenized question

use serde::{Deserialize, Serialize};

use crate::resource::Token;

/// A contiguous run of tokens
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Index of the first token
    pub start: usize,
    /// Number of tokens
    pub len: usize,
    /// Token words joined by single spaces
    pub text: String,
}

impl Span {
    /// Check whether neither span's text contains the other's
    pub fn is_independent_of(&self, other: &Span) -> bool {
        independent(&self.text, &other.text)
    }
}

/// Check whether neither surface string is a substring of the other
///
/// Equal strings are never independent.
pub fn independent(a: &str, b: &str) -> bool {
    !a.contains(b) && !b.contains(a)
}

/// Produces the spans looked up for a question
///
/// For start `i` and length `y`, a span is emitted while `y - i` stays below
/// `max_offset`. The bound is relative to the start index, so later starts
/// admit longer spans than early ones.
#[derive(Debug, Clone, Copy)]
pub struct SpanGenerator {
    max_offset: usize,
}

impl Default for SpanGenerator {
    fn default() -> Self {
        Self { max_offset: 6 }
    }
}

impl SpanGenerator {
    /// Create a generator with the given offset bound
    pub fn new(max_offset: usize) -> Self {
        Self { max_offset }
    }

    /// Generate spans in `(start, length)` order
    pub fn generate(&self, tokens: &[Token]) -> Vec<Span> {
        let n = tokens.len();
        let mut spans = Vec::new();
        for i in 0..=n {
            for y in 1..=(n - i) {
                // y - i < max_offset, kept in unsigned arithmetic
                if y < self.max_offset + i {
                    let text = tokens[i..i + y]
                        .iter()
                        .map(|t| t.word.as_str())
                        .collect::<Vec<_>>()
                        .join(" ");
                    spans.push(Span { start: i, len: y, text });
                }
            }
        }
        spans
    }
}
