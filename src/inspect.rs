//! Offline inspection commands: `search`, `corpus`, and `prompts`.
//!
//! None of these talk to the provider, so they run without credentials.

use anyhow::{bail, Result};

use kb_chat_core::corpus::Corpus;
use kb_chat_core::persona::AgentType;
use kb_chat_core::rank::{format_context, rank_fragments};

use crate::config::Config;
use crate::loader::build_corpus;
use crate::templates::{load_registry, TemplateRegistry};

/// Ranks the configured knowledge base against `query` and prints the
/// ranked fragments followed by the context block a chat request would get.
pub fn run_search(
    config: &Config,
    query: &str,
    agent_type: Option<&str>,
    top_k: Option<usize>,
) -> Result<()> {
    let corpus = build_corpus(&config.knowledge_base)?;
    let top_k = top_k.unwrap_or(config.knowledge_base.top_k);
    print_search(&corpus, query, agent_type, top_k);
    Ok(())
}

fn print_search(corpus: &Corpus, query: &str, agent_type: Option<&str>, top_k: usize) {
    let ranked = rank_fragments(query, corpus, agent_type);
    if ranked.is_empty() {
        println!("No matching fragments.");
        return;
    }

    println!(
        "agent: {}  matches: {}  top_k: {}",
        AgentType::parse(agent_type).as_str(),
        ranked.len(),
        top_k
    );
    println!();
    for (i, s) in ranked.iter().enumerate() {
        let marker = if i < top_k { "*" } else { " " };
        println!(
            "{} {}. [{:>2}] {} ({} p.{})",
            marker,
            i + 1,
            s.score,
            s.fragment.topic,
            s.fragment.source,
            s.fragment.page
        );
    }

    println!();
    println!("--- Context ---");
    println!("{}", format_context(ranked.iter().take(top_k).map(|s| s.fragment)));
}

/// One row per fragment of the configured corpus.
pub fn run_corpus(config: &Config) -> Result<()> {
    let corpus = build_corpus(&config.knowledge_base)?;
    if corpus.is_default() {
        println!("(default corpus: no documents loaded from {})", config.knowledge_base.dir.display());
    }
    println!("{:<32} {:<40} {:>5} {:>8}", "TOPIC", "SOURCE", "PAGE", "CHARS");
    for f in &corpus {
        println!(
            "{:<32} {:<40} {:>5} {:>8}",
            f.topic,
            f.source,
            f.page,
            f.content.chars().count()
        );
    }
    println!();
    println!("{} fragments", corpus.len());
    Ok(())
}

pub fn run_prompts_list(config: &Config) -> Result<()> {
    let registry = load_registry(&config.templates);
    if registry.is_empty() {
        println!("No prompt templates loaded.");
        return Ok(());
    }
    println!("{:<32} {:<10} SOURCE", "NAME", "TYPE");
    for info in registry.list() {
        println!("{:<32} {:<10} {}", info.name, info.kind.as_str(), info.source);
    }
    Ok(())
}

pub fn run_prompts_get(config: &Config, name: &str) -> Result<()> {
    let registry = load_registry(&config.templates);
    println!("{}", template_or_err(&registry, name)?);
    Ok(())
}

fn template_or_err<'a>(registry: &'a TemplateRegistry, name: &str) -> Result<&'a str> {
    match registry.content(name) {
        Some(content) => Ok(content),
        None => bail!("prompt template '{}' not found", name),
    }
}
