// Copyright 2025 Cowboy AI, LLC.

//! Abstract triple templates and their variable/resource shape

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{LinkingError, LinkingResult};

/// Check whether a template slot holds a variable (`?name`)
pub fn is_variable(term: &str) -> bool {
    term.starts_with('?')
}

/// Variable/resource shape of a template, subject first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplatePattern {
    /// `?s <p> <o>`
    Vrr,
    /// `<s> <p> ?o`
    Rrv,
    /// `?s <p> ?o`
    Vrv,
    /// `?s ?p <o>`
    Vvr,
    /// Any other shape
    Other,
}

impl TemplatePattern {
    /// Classify three slots
    pub fn classify(subject: &str, predicate: &str, object: &str) -> Self {
        match (is_variable(subject), is_variable(predicate), is_variable(object)) {
            (true, false, false) => TemplatePattern::Vrr,
            (false, false, true) => TemplatePattern::Rrv,
            (true, false, true) => TemplatePattern::Vrv,
            (true, true, false) => TemplatePattern::Vvr,
            _ => TemplatePattern::Other,
        }
    }

    /// Number of resource slots
    pub fn resource_count(&self) -> Option<usize> {
        match self {
            TemplatePattern::Vrr | TemplatePattern::Rrv => Some(2),
            TemplatePattern::Vrv | TemplatePattern::Vvr => Some(1),
            TemplatePattern::Other => None,
        }
    }
}

/// Three slots of an abstract triple pattern
///
/// Two templates agree on a slot pair iff the slot texts are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripleTemplate {
    /// Subject slot
    pub subject: String,
    /// Predicate slot
    pub predicate: String,
    /// Object slot
    pub object: String,
}

impl TripleTemplate {
    /// Create a template from its slots
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

    /// Parse `subject predicate object`, with an optional trailing `.`
    pub fn parse(text: &str) -> LinkingResult<Self> {
        let trimmed = text.trim().trim_end_matches('.').trim_end();
        let slots: Vec<&str> = trimmed.split_whitespace().collect();
        match slots.as_slice() {
            [subject, predicate, object] => Ok(Self::new(*subject, *predicate, *object)),
            _ => Err(LinkingError::InvalidTemplate(format!(
                "expected three slots, found {} in '{}'",
                slots.len(),
                text
            ))),
        }
    }

    /// Variable/resource shape
    pub fn pattern(&self) -> TemplatePattern {
        TemplatePattern::classify(&self.subject, &self.predicate, &self.object)
    }

    /// Slots in subject, predicate, object order
    pub fn slots(&self) -> [&str; 3] {
        [&self.subject, &self.predicate, &self.object]
    }
}

impl fmt::Display for TripleTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}
