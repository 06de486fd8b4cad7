//! Translate canonical Chat Completions requests into Anthropic Messages requests.
//!
//! System and developer messages are lifted into the top-level `system` field,
//! one text block per message in order. Tool-role messages are sent as plain
//! user text: no `tool_result` blocks are produced here.

use serde_json::json;
use tracing::debug;

use super::types::{
    ContentBlock, MediaSource, Message, MessagesRequest, Metadata, Role, SystemBlock, Tool,
};
use crate::error::{parse_payload, Payload, Result};
use crate::translate::content::{joined_text, text_fragments};
use crate::translate::helpers::{parse_arguments, target_model};
use crate::translate::media::{classify_url, file_mime_type, MediaSource as Source};
use crate::translate::openai_types::{
    ChatCompletionRequest, ChatMessage, ChatTool, ContentBlock as CanonicalBlock, FileData,
    MessageContent, Role as CanonicalRole,
};

/// Used when the canonical request sets neither `max_completion_tokens` nor `max_tokens`.
pub const DEFAULT_MAX_TOKENS: u64 = 4096;

/// Convert a canonical request body into an Anthropic Messages request body.
///
/// # Errors
/// Returns [`TranslateError::Parse`](crate::TranslateError::Parse) if `body`
/// is not a valid canonical request.
pub fn request_to_anthropic(body: &[u8], model: &str) -> Result<Vec<u8>> {
    let req: ChatCompletionRequest = parse_payload(body, Payload::CanonicalRequest)?;
    let translated = openai_to_anthropic(&req, model);
    Ok(serde_json::to_vec(&translated)?)
}

/// Pure function: canonical request in, Anthropic request out.
pub fn openai_to_anthropic(req: &ChatCompletionRequest, model: &str) -> MessagesRequest {
    let mut system = Vec::new();
    let mut messages = Vec::new();

    for msg in &req.messages {
        if msg.role.is_instruction() {
            let text = joined_text(msg.content.as_ref(), "\n");
            if !text.is_empty() {
                system.push(SystemBlock::Text { text });
            }
            continue;
        }
        if let Some(translated) = translate_message(msg) {
            messages.push(translated);
        }
    }

    // Anthropic rejects temperature and top_p together.
    let (temperature, top_p) = match req.temperature {
        Some(t) => (Some(t), None),
        None => (None, req.top_p),
    };

    let tools = req
        .tools
        .as_ref()
        .map(|tools| tools.iter().map(translate_tool).collect());

    MessagesRequest {
        model: target_model(model, &req.model),
        max_tokens: req
            .max_completion_tokens
            .or(req.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS),
        messages,
        system,
        stream: req.stream,
        temperature,
        top_p,
        tools,
        tool_choice: req.tool_choice.clone(),
        stop_sequences: req.stop.as_ref().map(|s| s.to_vec()),
        metadata: req.user.as_ref().map(|user| Metadata {
            user_id: Some(user.clone()),
        }),
    }
}

fn translate_message(msg: &ChatMessage) -> Option<Message> {
    let role = match msg.role {
        CanonicalRole::Assistant => Role::Assistant,
        _ => Role::User,
    };

    let mut content = match msg.role {
        CanonicalRole::Tool => text_fragments(msg.content.as_ref())
            .into_iter()
            .map(|text| ContentBlock::Text {
                text: text.to_string(),
            })
            .collect(),
        _ => translate_content(msg.content.as_ref()),
    };

    if msg.role == CanonicalRole::Assistant {
        for call in msg.tool_calls.iter().flatten() {
            content.push(ContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.function.name.clone(),
                input: parse_arguments(&call.function.arguments),
            });
        }
    }

    if content.is_empty() {
        debug!(role = ?msg.role, "dropping message with no translatable content");
        return None;
    }

    Some(Message { role, content })
}

fn translate_content(content: Option<&MessageContent>) -> Vec<ContentBlock> {
    match content {
        Some(MessageContent::Text(text)) if !text.is_empty() => {
            vec![ContentBlock::Text { text: text.clone() }]
        }
        Some(MessageContent::Blocks(blocks)) => blocks.iter().filter_map(translate_block).collect(),
        _ => Vec::new(),
    }
}

fn translate_block(block: &CanonicalBlock) -> Option<ContentBlock> {
    match block {
        CanonicalBlock::Text { text } if !text.is_empty() => {
            Some(ContentBlock::Text { text: text.clone() })
        }
        CanonicalBlock::ImageUrl { image_url } => {
            media_source(&image_url.url).map(|source| ContentBlock::Image { source })
        }
        CanonicalBlock::File { file } => document_block(file),
        other => {
            debug!(block = ?other, "content block has no Anthropic representation");
            None
        }
    }
}

/// Anthropic accepts base64 data and `http(s)` URLs.
fn media_source(url: &str) -> Option<MediaSource> {
    match classify_url(url) {
        Source::Inline(data) => Some(MediaSource::Base64 {
            media_type: data.mime_type.to_string(),
            data: data.data.to_string(),
        }),
        Source::Remote(remote) if !remote.to_ascii_lowercase().starts_with("file://") => {
            Some(MediaSource::Url {
                url: remote.to_string(),
            })
        }
        _ => {
            debug!(url = %truncate(url, 64), "dropping unsupported media URL");
            None
        }
    }
}

fn document_block(file: &FileData) -> Option<ContentBlock> {
    let url = file.url()?;
    let mime = match classify_url(url) {
        Source::Inline(data) => data.mime_type.to_string(),
        _ => file_mime_type(url, file.format.as_deref()),
    };
    if mime != "application/pdf" {
        debug!(mime = %mime, "only PDF files map to Anthropic documents");
        return None;
    }
    media_source(url).map(|source| ContentBlock::Document { source })
}

fn translate_tool(tool: &ChatTool) -> Tool {
    Tool {
        name: tool.function.name.clone(),
        description: tool.function.description.clone(),
        input_schema: tool
            .function
            .parameters
            .clone()
            .unwrap_or_else(|| json!({"type": "object", "properties": {}})),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::openai_types::{FunctionDefinition, StopSequences, ToolCall};

    fn request(messages: Vec<ChatMessage>) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "claude-sonnet-4-20250514".to_string(),
            messages,
            ..ChatCompletionRequest::default()
        }
    }

    #[test]
    fn test_simple_text_request() {
        let req = request(vec![
            ChatMessage::text(CanonicalRole::System, "You are helpful"),
            ChatMessage::text(CanonicalRole::User, "Hello"),
        ]);

        let result = openai_to_anthropic(&req, "");

        assert_eq!(result.model, "claude-sonnet-4-20250514");
        assert_eq!(result.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(
            result.system,
            vec![SystemBlock::Text {
                text: "You are helpful".to_string()
            }]
        );
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].role, Role::User);
        assert_eq!(
            result.messages[0].content,
            vec![ContentBlock::Text {
                text: "Hello".to_string()
            }]
        );
    }

    #[test]
    fn test_system_and_developer_are_concatenated_in_order() {
        let req = request(vec![
            ChatMessage::text(CanonicalRole::System, "first"),
            ChatMessage::text(CanonicalRole::User, "hi"),
            ChatMessage::text(CanonicalRole::Developer, "second"),
        ]);

        let result = openai_to_anthropic(&req, "claude-x");

        assert_eq!(result.model, "claude-x");
        assert_eq!(result.system.len(), 2);
        assert_eq!(
            result.system[1],
            SystemBlock::Text {
                text: "second".to_string()
            }
        );
        assert_eq!(result.messages.len(), 1);
    }

    #[test]
    fn test_tool_role_becomes_user_text() {
        let mut tool_msg = ChatMessage::text(CanonicalRole::Tool, "22 degrees");
        tool_msg.tool_call_id = Some("call_1".to_string());
        let req = request(vec![tool_msg]);

        let result = openai_to_anthropic(&req, "m");

        assert_eq!(result.messages[0].role, Role::User);
        assert_eq!(
            result.messages[0].content,
            vec![ContentBlock::Text {
                text: "22 degrees".to_string()
            }]
        );
    }

    #[test]
    fn test_images_by_data_url_and_http_url() {
        let req = request(vec![ChatMessage::blocks(
            CanonicalRole::User,
            vec![
                CanonicalBlock::text("what is this?"),
                CanonicalBlock::image_url("data:image/png;base64,iVBORw0KGgo="),
                CanonicalBlock::image_url("https://x.test/cat.jpg"),
                CanonicalBlock::image_url("data:image/png,not-base64"),
                CanonicalBlock::image_url("relative/cat.jpg"),
            ],
        )]);

        let result = openai_to_anthropic(&req, "m");
        let content = &result.messages[0].content;

        assert_eq!(content.len(), 3);
        assert_eq!(
            content[1],
            ContentBlock::Image {
                source: MediaSource::Base64 {
                    media_type: "image/png".to_string(),
                    data: "iVBORw0KGgo=".to_string(),
                }
            }
        );
        assert_eq!(
            content[2],
            ContentBlock::Image {
                source: MediaSource::Url {
                    url: "https://x.test/cat.jpg".to_string()
                }
            }
        );
    }

    #[test]
    fn test_pdf_file_becomes_document() {
        let req = request(vec![ChatMessage::blocks(
            CanonicalRole::User,
            vec![CanonicalBlock::File {
                file: FileData {
                    file_data: Some("data:application/pdf;base64,JVBERi0=".to_string()),
                    ..FileData::default()
                },
            }],
        )]);

        let result = openai_to_anthropic(&req, "m");

        assert!(matches!(
            result.messages[0].content[0],
            ContentBlock::Document {
                source: MediaSource::Base64 { .. }
            }
        ));
    }

    #[test]
    fn test_assistant_tool_calls_follow_text() {
        let mut assistant = ChatMessage::text(CanonicalRole::Assistant, "Checking.");
        assistant.tool_calls = Some(vec![ToolCall::function(
            "toolu_1",
            "get_weather",
            r#"{"location":"London"}"#.to_string(),
        )]);
        let req = request(vec![ChatMessage::text(CanonicalRole::User, "Weather?"), assistant]);

        let result = openai_to_anthropic(&req, "m");
        let content = &result.messages[1].content;

        assert_eq!(result.messages[1].role, Role::Assistant);
        assert_eq!(content.len(), 2);
        assert_eq!(
            content[1],
            ContentBlock::ToolUse {
                id: "toolu_1".to_string(),
                name: "get_weather".to_string(),
                input: json!({"location": "London"}),
            }
        );
    }

    #[test]
    fn test_generation_parameters() {
        let mut req = request(vec![ChatMessage::text(CanonicalRole::User, "hi")]);
        req.temperature = Some(0.2);
        req.top_p = Some(0.9);
        req.max_tokens = Some(100);
        req.max_completion_tokens = Some(200);
        req.stop = Some(StopSequences::Single("END".to_string()));
        req.user = Some("user-7".to_string());

        let result = openai_to_anthropic(&req, "m");

        assert_eq!(result.temperature, Some(0.2));
        assert_eq!(result.top_p, None);
        assert_eq!(result.max_tokens, 200);
        assert_eq!(result.stop_sequences, Some(vec!["END".to_string()]));
        assert_eq!(
            result.metadata.and_then(|m| m.user_id),
            Some("user-7".to_string())
        );

        req.temperature = None;
        let result = openai_to_anthropic(&req, "m");
        assert_eq!(result.top_p, Some(0.9));
    }

    #[test]
    fn test_tools_pass_schema_and_choice_through() {
        let schema = json!({
            "type": "object",
            "properties": {"location": {"type": "string"}},
            "required": ["location"]
        });
        let mut req = request(vec![ChatMessage::text(CanonicalRole::User, "hi")]);
        req.tools = Some(vec![ChatTool {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: "get_weather".to_string(),
                description: Some("Weather lookup".to_string()),
                parameters: Some(schema.clone()),
                strict: None,
            },
        }]);
        req.tool_choice = Some(json!({"type": "auto"}));

        let result = openai_to_anthropic(&req, "m");
        let tools = result.tools.unwrap();

        assert_eq!(tools[0].name, "get_weather");
        assert_eq!(tools[0].input_schema, schema);
        assert_eq!(result.tool_choice, Some(json!({"type": "auto"})));
    }

    #[test]
    fn test_bytes_entry_point_reports_parse_errors() {
        let err = request_to_anthropic(b"{\"messages\": 5}", "m").unwrap_err();
        assert!(err.to_string().contains("canonical chat request"));

        let body = br#"{"model":"m","messages":[{"role":"user","content":"Hello"}]}"#;
        let out: serde_json::Value =
            serde_json::from_slice(&request_to_anthropic(body, "claude-3").unwrap()).unwrap();
        assert_eq!(out["model"], "claude-3");
        assert_eq!(out["max_tokens"], 4096);
        assert_eq!(out["messages"][0]["content"][0]["text"], "Hello");
        assert!(out.get("system").is_none());
    }
}
