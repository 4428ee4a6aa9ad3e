//! Retrieval-augmented question answering over a fixed corpus of research
//! papers.
//!
//! A query is embedded, matched against a prebuilt flat vector index,
//! resolved to documents in a SQLite store, reduced to keyword-scored
//! snippets, and handed to an OpenAI-compatible chat model for a cited
//! answer.

pub mod core;
pub mod index;
pub mod llm;
pub mod rag;
pub mod server;
pub mod state;
pub mod store;
