//! Context assembly and prompt construction.

use crate::vectorstore::SearchResult;

/// System message: answer only from the sources, admit when they don't
/// cover the question.
pub const SYSTEM_PROMPT: &str = "You are a knowledge-base assistant. Answer the user's \
question using only the numbered sources provided. If the sources do not contain the \
answer, reply that the information is not available. Cite facts from the sources rather \
than prior knowledge.";

/// Concatenates chunk contents in retrieved order, each prefixed with its
/// source tag, truncating to `max_chars` by dropping trailing sources
/// whole. A first source that alone exceeds `max_chars` is kept but cut.
pub fn assemble_context(results: &[SearchResult], max_chars: usize) -> String {
    let mut context = String::new();

    for (i, result) in results.iter().enumerate() {
        let name = result.document_name().unwrap_or("unknown");
        let block = format!("[Source {}: {}]\n{}", i + 1, name, result.content.trim());

        let separator = if context.is_empty() { 0 } else { 2 };
        let used = context.chars().count();
        let needed = block.chars().count() + separator;

        if used + needed > max_chars {
            if context.is_empty() {
                // Nothing fits whole; keep a truncated first source rather
                // than answering with no context at all.
                context = block.chars().take(max_chars).collect();
            }
            break;
        }

        if !context.is_empty() {
            context.push_str("\n\n");
        }
        context.push_str(&block);
    }

    context
}

/// User message: the question followed by the assembled context.
pub fn build_user_prompt(question: &str, context: &str) -> String {
    format!("Question: {question}\n\nSources:\n{context}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use uuid::Uuid;

    fn result(name: &str, content: &str) -> SearchResult {
        let mut metadata = Map::new();
        metadata.insert(
            "document_name".to_string(),
            serde_json::Value::String(name.to_string()),
        );
        SearchResult {
            chunk_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            content: content.to_string(),
            similarity_score: 0.9,
            metadata,
        }
    }

    #[test]
    fn sources_are_numbered_in_retrieved_order() {
        let context = assemble_context(
            &[result("a.txt", "alpha content"), result("b.txt", "beta content")],
            10_000,
        );
        assert!(context.starts_with("[Source 1: a.txt]\nalpha content"));
        assert!(context.contains("[Source 2: b.txt]\nbeta content"));
    }

    #[test]
    fn trailing_sources_are_dropped_whole() {
        let results = vec![
            result("a.txt", &"x".repeat(100)),
            result("b.txt", &"y".repeat(100)),
        ];
        let context = assemble_context(&results, 150);

        assert!(context.contains("[Source 1: a.txt]"));
        assert!(!context.contains("[Source 2"));
        // The kept source is intact, not clipped.
        assert!(context.contains(&"x".repeat(100)));
    }

    #[test]
    fn an_oversized_first_source_is_clipped_not_dropped() {
        let results = vec![result("a.txt", &"z".repeat(500))];
        let context = assemble_context(&results, 100);
        assert_eq!(context.chars().count(), 100);
        assert!(context.starts_with("[Source 1: a.txt]"));
    }

    #[test]
    fn empty_results_assemble_to_nothing() {
        assert_eq!(assemble_context(&[], 1000), "");
    }
}
