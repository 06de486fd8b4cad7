//! Reduce canonical message content to plain text fragments.
//!
//! Used wherever a provider needs flattened text (system prompts, tool-role
//! messages). Never fails: unexpected shapes yield no fragments.

use super::openai_types::{ContentBlock, MessageContent};

/// Ordered text fragments of `content`. Empty strings and non-text blocks are skipped.
pub fn text_fragments(content: Option<&MessageContent>) -> Vec<&str> {
    match content {
        Some(MessageContent::Text(text)) if !text.is_empty() => vec![text.as_str()],
        Some(MessageContent::Blocks(blocks)) => blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } if !text.is_empty() => Some(text.as_str()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// All text fragments joined with `separator`.
pub fn joined_text(content: Option<&MessageContent>, separator: &str) -> String {
    text_fragments(content).join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_string() {
        let content = MessageContent::Text("hi".to_string());
        assert_eq!(text_fragments(Some(&content)), vec!["hi"]);

        let empty = MessageContent::Text(String::new());
        assert!(text_fragments(Some(&empty)).is_empty());
        assert!(text_fragments(None).is_empty());
    }

    #[test]
    fn test_blocks_keep_order_and_skip_non_text() {
        let content = MessageContent::Blocks(vec![
            ContentBlock::text("a"),
            ContentBlock::image_url("https://x.test/i.png"),
            ContentBlock::text(""),
            ContentBlock::text("b"),
        ]);
        assert_eq!(text_fragments(Some(&content)), vec!["a", "b"]);
        assert_eq!(joined_text(Some(&content), "\n"), "a\nb");
    }

    #[test]
    fn test_other_shapes_yield_nothing() {
        let content = MessageContent::Other(json!({"text": "hidden"}));
        assert!(text_fragments(Some(&content)).is_empty());
    }
}
