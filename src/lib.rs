//! # kb-chat
//!
//! Chat completion over a hosted LLM, with a prompt-template registry and
//! keyword retrieval from a local knowledge base.
//!
//! ## Architecture
//!
//! ```text
//! PDFs / text ──▶ loader ──▶ Corpus ──▶ rank ──┐
//!                                              ▼
//! .ipynb / .prompt.md ──▶ templates ──▶ ChatService ──▶ LlmClient
//!                                              ▲
//!                              HTTP (axum) ────┘
//! ```
//!
//! Corpus and registry are built once at start-up and shared read-only.
//! The pure pieces (ranking, prompt assembly, markdown cleanup) live in
//! [`kb_chat_core`].
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment credentials |
//! | [`extract`] | PDF page text extraction |
//! | [`loader`] | Knowledge-base loading and default-corpus fallback |
//! | [`templates`] | Notebook and `*.prompt.md` template registry |
//! | [`llm`] | Provider client trait and Azure OpenAI implementation |
//! | [`chat`] | Plain, templated, and RAG chat flows |
//! | [`server`] | HTTP API |
//! | [`inspect`] | Offline CLI views |

pub mod chat;
pub mod config;
pub mod extract;
pub mod inspect;
pub mod llm;
pub mod loader;
pub mod server;
pub mod templates;
