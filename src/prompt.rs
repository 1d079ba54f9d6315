//! Grounded prompt assembly.
//!
//! The prompt template is fixed: it directs the model to answer only from
//! the retrieved context, to fall back to an exact phrase when the answer
//! is absent, and to frame the answer as a business insight.

use crate::index::ChunkRecord;

/// The exact phrase models must emit when the context lacks an answer.
pub const FALLBACK_PHRASE: &str = "Not found in provided data.";

/// Separator between context chunks.
const CONTEXT_SEPARATOR: &str = "\n\n";

/// Prompt templates used by the harness.
pub struct Prompts;

impl Prompts {
    /// Template for a context-grounded business answer.
    pub fn grounded_answer() -> &'static str {
        r#"You are a business analyst. Answer the question using ONLY the context below.

Context:
{context}

Question: {question}

Rules:
- Use only facts present in the context. Do not rely on outside knowledge.
- If the context does not contain the answer, reply exactly: "Not found in provided data."
- Where the context supports it, state the business insight behind the answer (trends, comparisons, likely causes).

Answer:"#
    }
}

/// Assemble a grounded prompt from a question and retrieved chunk records.
///
/// Pure function: identical inputs always produce the identical string.
pub fn build_prompt(question: &str, context_chunks: &[ChunkRecord]) -> String {
    let texts: Vec<&str> = context_chunks.iter().map(|c| c.text.as_str()).collect();
    render(question, &texts)
}

/// Assemble a grounded prompt from raw context texts.
pub fn build_prompt_from_texts(question: &str, context_texts: &[String]) -> String {
    let texts: Vec<&str> = context_texts.iter().map(|t| t.as_str()).collect();
    render(question, &texts)
}

fn render(question: &str, context_texts: &[&str]) -> String {
    let context = context_texts.join(CONTEXT_SEPARATOR);
    Prompts::grounded_answer()
        .replace("{context}", &context)
        .replace("{question}", question)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str, chunk_id: usize) -> ChunkRecord {
        ChunkRecord {
            text: text.to_string(),
            chunk_id,
            row: None,
        }
    }

    #[test]
    fn test_prompt_contains_question_and_context() {
        let chunks = vec![record("sales rose in Q1", 0), record("costs fell in Q2", 1)];
        let prompt = build_prompt("What happened to sales?", &chunks);

        assert!(prompt.contains("What happened to sales?"));
        assert!(prompt.contains("sales rose in Q1"));
        assert!(prompt.contains("costs fell in Q2"));
        assert!(prompt.contains(FALLBACK_PHRASE));
    }

    #[test]
    fn test_context_joined_with_blank_line() {
        let chunks = vec![record("first", 0), record("second", 1)];
        let prompt = build_prompt("q", &chunks);
        assert!(prompt.contains("first\n\nsecond"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let chunks = vec![record("alpha", 0), record("beta", 1)];
        let a = build_prompt("same question", &chunks);
        let b = build_prompt("same question", &chunks);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_context() {
        let prompt = build_prompt("q", &[]);
        assert!(prompt.contains("Context:\n\n"));
        assert!(prompt.contains("Question: q"));
    }

    #[test]
    fn test_texts_and_records_render_identically() {
        let chunks = vec![record("alpha", 0), record("beta", 1)];
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        assert_eq!(
            build_prompt("q", &chunks),
            build_prompt_from_texts("q", &texts)
        );
    }
}
