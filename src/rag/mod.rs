//! Retrieval-augmented generation pipeline.
//!
//! - `retriever`: query → ranked, content-bearing context items
//! - `snippet`: bounded keyword-window excerpt selection
//! - `prompt`: context formatting for the generation model

pub mod prompt;
mod retriever;
mod snippet;

pub use retriever::{ContextItem, ContextRetriever};
pub use snippet::{extract_snippet, SNIPPET_MAX_LEN};
