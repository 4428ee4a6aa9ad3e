//! Prompt assembly for grounded answer generation.
//!
//! Formats retrieved context items into numbered, citable document blocks
//! and wraps them in the research-assistant instructions.

use super::retriever::ContextItem;
use crate::llm::ChatMessage;

pub const SYSTEM_PROMPT: &str = "You are a research assistant specializing in criminology and recidivism studies. \
Your answers should be factual, nuanced, and based exclusively on the provided research context. \
Always cite your sources. When the research is inconclusive, acknowledge this clearly.";

/// Fixed reply when retrieval produced no context at all.
pub const NO_CONTEXT_ANSWER: &str = "I don't have any relevant research material to answer this \
question. Please try rephrasing it, or ask about another topic covered by the corpus.";

/// Build the user prompt from the query, retrieved context, and optional
/// prior conversation turns.
pub fn build_prompt(query: &str, context_items: &[ContextItem], history: &[ChatMessage]) -> String {
    let mut context_text = String::new();
    for (idx, item) in context_items.iter().enumerate() {
        context_text.push_str(&format!(
            "[Document {}: {}]\n{}\n\n",
            idx + 1,
            readable_name(&item.filename),
            item.content
        ));
    }

    let mut history_text = String::new();
    if !history.is_empty() {
        history_text.push_str("Previous conversation:\n");
        for msg in history {
            let role = if msg.role == "user" { "User" } else { "Assistant" };
            history_text.push_str(&format!("{}: {}\n", role, msg.content));
        }
        history_text.push('\n');
    }

    format!(
        "You are a research specialist in criminology and recidivism studies analyzing academic literature.
Answer the following question based ONLY on the provided research contexts.
If the answer cannot be determined from the provided context, say \"I don't have enough information to answer this question based on the provided research papers.\"

{history_text}
Important instructions:
1. Always cite your sources using document numbers (e.g., \"According to Document 3...\")
2. If studies contradict each other, acknowledge these differences
3. Include relevant statistics and figures when available
4. If the question asks for solutions or recommendations, prioritize evidence-based approaches
5. Be objective and present multiple perspectives when the research shows diverse viewpoints

RESEARCH CONTEXTS:
{context_text}
QUESTION: {query}

Think step by step before providing your final answer:
1. Identify which documents contain relevant information
2. Analyze what each source says about the specific question
3. Synthesize the information to provide a comprehensive answer
4. Ensure all claims are properly cited

ANSWER:"
    )
}

/// Human-readable citation label for a stored filename.
fn readable_name(filename: &str) -> String {
    filename.replace('_', " ").replace(".pdf", "")
}
