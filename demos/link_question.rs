// Copyright 2025 Cowboy AI, LLC.

//! Link a question against a small in-memory graph and compose two-hop patterns
//!
//! Run with `RUST_LOG=kg_linking=debug cargo run --example link_question` to
//! see each stage.

use std::sync::Arc;

use kg_linking::{
    CompoundTripleComposer, InMemoryIndex, LinkingConfig, LinkingResult, ResourceKind,
    ResourceLinker, SingleTripleGenerator, Token, TripleTemplate, RDF_TYPE,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

fn library() -> InMemoryIndex {
    let index = InMemoryIndex::new();
    index.add_typed_entity(
        "http://dbpedia.org/resource/Douglas_Hofstadter",
        "Douglas Hofstadter",
        "http://dbpedia.org/ontology/Person",
    );
    index.add_resource(ResourceKind::Property, "http://dbpedia.org/ontology/author", "author");
    index.add_resource(
        ResourceKind::Property,
        "http://dbpedia.org/ontology/publisher",
        "publisher",
    );
    index.add_resource(ResourceKind::Class, "http://dbpedia.org/ontology/Book", "book");

    let geb = "http://dbpedia.org/resource/Gödel,_Escher,_Bach";
    index.add_triple(geb, RDF_TYPE, "http://dbpedia.org/ontology/Book");
    index.add_triple(
        geb,
        "http://dbpedia.org/ontology/author",
        "http://dbpedia.org/resource/Douglas_Hofstadter",
    );
    index.add_triple(
        geb,
        "http://dbpedia.org/ontology/publisher",
        "http://dbpedia.org/resource/Basic_Books",
    );
    index
}

#[tokio::main]
async fn main() -> LinkingResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Resource Linking Demo ===\n");

    let index = Arc::new(library());
    let config = LinkingConfig {
        max_lookup_ratio: 0.1,
        ..Default::default()
    };
    let linker = ResourceLinker::new(Arc::clone(&index), config.clone())?;

    let question = "Which book has the author Douglas Hofstadter publisher";
    let tokens: Vec<Token> = question.split_whitespace().map(Token::word).collect();
    let mut rng = StdRng::seed_from_u64(2025);
    let linked = linker.link(&tokens, &mut rng).await?;

    println!("Question: {question}");
    println!(
        "  {} spans, {} lookups, {} bindings\n",
        linked.stats.span_count, linked.stats.lookups, linked.stats.bound
    );

    println!("1. Bindings:");
    for (id, span) in linked.mapping.iter() {
        println!("   '{span}' -> {id}");
    }

    let two_resource = TripleTemplate::parse("?uri <^VAR_0^> <^VAR_1^> .")?;
    let one_resource = TripleTemplate::parse("?uri <^VAR_2^> ?x .")?;

    println!("\n2. Single triples for '{two_resource}':");
    let known = SingleTripleGenerator::new(&linked).generate(&two_resource);
    for triple in &known {
        println!("   {triple}  (rating {:.2})", triple.rating);
    }

    println!("\n3. Compound triples with '{one_resource}':");
    let compounds = CompoundTripleComposer::new(index, &linked, &config)
        .compose(&two_resource, &one_resource, &known)
        .await?;
    for compound in &compounds {
        println!("   {compound}  (rating {:.2})", compound.rating());
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
