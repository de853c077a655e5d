// Copyright 2025 Cowboy AI, LLC.

//! Triple instantiation and compound composition
//!
//! Single triples bind two-resource templates from a linked question. The
//! compound composer then joins each of them with a one-resource template,
//! keeping only joins that respect template slot agreement and come from
//! non-overlapping spans.

pub mod compound;
pub mod gates;
pub mod single;

pub use compound::{CompoundTripleComposer, MatchedProperty};
pub use gates::{has_disjoint_provenance, is_valid_compound};
pub use single::SingleTripleGenerator;
