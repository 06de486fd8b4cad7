use super::types::{MessagesResponse, ResponseContentBlock, Usage as AnthropicUsage};
use crate::error::{parse_payload, Payload, Result};
use crate::translate::helpers::{stringify_arguments, target_model, Clock, SystemClock};
use crate::translate::openai_types::{
    ChatCompletionResponse, Choice, FinishReason, PromptTokensDetails, ResponseMessage, ToolCall,
    Usage,
};

/// Convert an Anthropic Messages response body into a canonical response body.
///
/// # Errors
/// Returns [`TranslateError::Parse`](crate::TranslateError::Parse) if `body`
/// is not a valid Anthropic response.
pub fn response_from_anthropic(body: &[u8], model: &str) -> Result<Vec<u8>> {
    let resp: MessagesResponse = parse_payload(body, Payload::AnthropicResponse)?;
    let translated = anthropic_to_openai(&resp, model, &SystemClock);
    Ok(serde_json::to_vec(&translated)?)
}

/// Translate an Anthropic Messages response into a canonical response.
/// Pure apart from the injected clock.
pub fn anthropic_to_openai(
    resp: &MessagesResponse,
    model: &str,
    clock: &dyn Clock,
) -> ChatCompletionResponse {
    let mut text = String::new();
    let mut reasoning = String::new();
    let mut tool_calls = Vec::new();

    for block in &resp.content {
        match block {
            ResponseContentBlock::Text { text: t } => text.push_str(t),
            ResponseContentBlock::Thinking { thinking } => reasoning.push_str(thinking),
            ResponseContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall::function(
                    id.clone(),
                    name.clone(),
                    stringify_arguments(input),
                ));
            }
            ResponseContentBlock::Unsupported => {}
        }
    }

    let finish_reason = resp
        .stop_reason
        .as_deref()
        .map_or(FinishReason::Stop, map_stop_reason);

    let message = ResponseMessage {
        role: "assistant".to_string(),
        content: Some(text),
        reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
        images: None,
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
    };

    ChatCompletionResponse {
        id: resp.id.clone(),
        object: "chat.completion".to_string(),
        created: clock.now(),
        model: target_model(model, &resp.model),
        choices: vec![Choice {
            index: 0,
            message,
            finish_reason: Some(finish_reason),
        }],
        usage: Some(convert_usage(&resp.usage)),
    }
}

/// Map an Anthropic `stop_reason` to the canonical finish reason.
pub fn map_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

pub(crate) fn convert_usage(usage: &AnthropicUsage) -> Usage {
    Usage {
        prompt_tokens: usage.input_tokens,
        completion_tokens: usage.output_tokens,
        total_tokens: usage.input_tokens + usage.output_tokens,
        prompt_tokens_details: usage
            .cache_read_input_tokens
            .map(|cached| PromptTokensDetails {
                cached_tokens: Some(cached),
                audio_tokens: None,
            }),
        completion_tokens_details: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::helpers::FixedClock;
    use serde_json::json;

    fn make_response(value: serde_json::Value) -> MessagesResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_simple_text_response() {
        let resp = make_response(json!({
            "id": "msg_123",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-20250514",
            "content": [{"type": "text", "text": "Hello"}, {"type": "text", "text": " there"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 20}
        }));

        let result = anthropic_to_openai(&resp, "", &FixedClock(1_700_000_000));

        assert_eq!(result.id, "msg_123");
        assert_eq!(result.created, 1_700_000_000);
        assert_eq!(result.model, "claude-sonnet-4-20250514");
        let choice = &result.choices[0];
        assert_eq!(choice.message.content.as_deref(), Some("Hello there"));
        assert_eq!(choice.finish_reason, Some(FinishReason::Stop));
        assert!(choice.message.tool_calls.is_none());

        let usage = result.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.completion_tokens, 20);
        assert_eq!(usage.total_tokens, 30);
    }

    #[test]
    fn test_tool_use_response() {
        let resp = make_response(json!({
            "id": "msg_abc",
            "content": [
                {"type": "thinking", "thinking": "need weather", "signature": "sig"},
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"location": "London"}},
                {"type": "server_tool_use", "id": "x"}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 5, "output_tokens": 7, "cache_read_input_tokens": 3}
        }));

        let result = anthropic_to_openai(&resp, "claude-x", &FixedClock(0));
        let message = &result.choices[0].message;

        assert_eq!(result.choices[0].finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(message.content.as_deref(), Some("Let me check."));
        assert_eq!(message.reasoning_content.as_deref(), Some("need weather"));

        let calls = message.tool_calls.as_ref().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "toolu_1");
        let args: serde_json::Value = serde_json::from_str(&calls[0].function.arguments).unwrap();
        assert_eq!(args, json!({"location": "London"}));

        let usage = result.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 5);
        assert_eq!(
            usage.prompt_tokens_details.and_then(|d| d.cached_tokens),
            Some(3)
        );
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(map_stop_reason("end_turn"), FinishReason::Stop);
        assert_eq!(map_stop_reason("max_tokens"), FinishReason::Length);
        assert_eq!(map_stop_reason("stop_sequence"), FinishReason::Stop);
        assert_eq!(map_stop_reason("tool_use"), FinishReason::ToolCalls);
        assert_eq!(map_stop_reason("pause_turn"), FinishReason::Stop);
        assert_eq!(map_stop_reason(""), FinishReason::Stop);
    }

    #[test]
    fn test_malformed_body_is_a_parse_error() {
        let err = response_from_anthropic(b"<html>", "m").unwrap_err();
        assert!(err.to_string().contains("Anthropic messages response"));
    }
}
