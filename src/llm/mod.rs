//! LLM provider abstraction.
//!
//! The retrieval pipeline consumes two opaque capabilities from here:
//! query embedding and grounded answer generation.

mod openai;
mod provider;
mod types;

pub use openai::OpenAiProvider;
pub use provider::LlmProvider;
pub use types::{ChatMessage, ChatRequest};
