//! # kb-chat core
//!
//! I/O-free logic for kb-chat: the fragment and template data model, the
//! in-memory corpus with its default fallback, the keyword ranker, the
//! built-in personas, prompt assembly, and markdown normalization.
//!
//! This crate contains no tokio, HTTP, or filesystem code. The root crate
//! loads documents and templates, calls the provider, and serves HTTP.
//!
//! ```
//! use kb_chat_core::corpus::Corpus;
//! use kb_chat_core::rank::{rank, DEFAULT_TOP_K};
//!
//! let corpus = Corpus::default_corpus();
//! let retrieval = rank("professional plan pricing", &corpus, DEFAULT_TOP_K, None);
//! assert!(retrieval.matched);
//! assert!(retrieval.context.contains("[Pricing]"));
//! ```

pub mod corpus;
pub mod markdown;
pub mod models;
pub mod persona;
pub mod prompt;
pub mod rank;
