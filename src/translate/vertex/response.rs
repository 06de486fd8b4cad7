//! Translate Vertex `generateContent` responses into canonical responses.

use tracing::debug;

use super::types::{
    Blob, Candidate, GenerateContentResponse, ModalityTokenCount, Part, UsageMetadata,
};
use crate::error::{parse_payload, Payload, Result};
use crate::translate::helpers::{
    stringify_arguments, target_model, Clock, IdSource, SystemClock, UuidIds,
};
use crate::translate::media::normalize_base64;
use crate::translate::openai_types::{
    ChatCompletionResponse, Choice, CompletionTokensDetails, FinishReason, ImageData,
    PromptTokensDetails, ResponseMessage, ToolCall, Usage,
};

pub const TRUNCATED_PLACEHOLDER: &str = "[Response truncated due to max tokens limit]";
pub const EMPTY_PLACEHOLDER: &str = "[No content generated]";

/// Convert a Vertex `generateContent` response body into a canonical response body.
///
/// # Errors
/// Returns [`TranslateError::Parse`](crate::TranslateError::Parse) if `body`
/// is not a valid Vertex response.
pub fn response_from_vertex(body: &[u8], model: &str) -> Result<Vec<u8>> {
    let resp: GenerateContentResponse = parse_payload(body, Payload::VertexResponse)?;
    let translated = vertex_to_openai(&resp, model, &SystemClock, &UuidIds);
    Ok(serde_json::to_vec(&translated)?)
}

pub fn vertex_to_openai(
    resp: &GenerateContentResponse,
    model: &str,
    clock: &dyn Clock,
    ids: &dyn IdSource,
) -> ChatCompletionResponse {
    let id = resp.response_id.clone().unwrap_or_else(|| ids.new_id());
    let mut choices: Vec<Choice> = resp
        .candidates
        .iter()
        .enumerate()
        .map(|(position, candidate)| translate_candidate(candidate, position, ids))
        .collect();

    if choices.is_empty() {
        let block_reason = resp
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref());
        if let Some(reason) = block_reason {
            debug!(reason, "prompt blocked by Vertex");
        }
        choices.push(Choice {
            index: 0,
            message: ResponseMessage {
                role: "assistant".to_string(),
                content: Some(EMPTY_PLACEHOLDER.to_string()),
                ..Default::default()
            },
            finish_reason: Some(if block_reason.is_some() {
                FinishReason::ContentFilter
            } else {
                FinishReason::Stop
            }),
        });
    }

    ChatCompletionResponse {
        id,
        object: "chat.completion".to_string(),
        created: clock.now(),
        model: target_model(model, resp.model_version.as_deref().unwrap_or_default()),
        choices,
        usage: resp.usage_metadata.as_ref().map(convert_usage),
    }
}

fn translate_candidate(candidate: &Candidate, position: usize, ids: &dyn IdSource) -> Choice {
    let mut text = String::new();
    let mut reasoning = String::new();
    let mut images = Vec::new();
    let mut tool_calls = Vec::new();

    for part in candidate.parts() {
        collect_part(part, &mut text, &mut reasoning, &mut images);
        if let Some(call) = &part.function_call {
            tool_calls.push(ToolCall::function(
                ids.new_tool_call_id(),
                call.name.clone(),
                stringify_arguments(&call.args),
            ));
        }
    }

    let finish_reason = candidate
        .finish_reason
        .as_deref()
        .map_or(FinishReason::Stop, map_finish_reason);

    if text.is_empty() && images.is_empty() && tool_calls.is_empty() {
        text = placeholder(finish_reason).to_string();
    }

    Choice {
        index: candidate.index.unwrap_or(position as u32),
        message: ResponseMessage {
            role: "assistant".to_string(),
            content: Some(text),
            reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
            images: (!images.is_empty()).then_some(images),
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        },
        finish_reason: Some(finish_reason),
    }
}

/// Route a part's text, thought, or image payload into the matching buffer.
pub(crate) fn collect_part(
    part: &Part,
    text: &mut String,
    reasoning: &mut String,
    images: &mut Vec<ImageData>,
) {
    if let Some(t) = &part.text {
        if part.is_thought() {
            reasoning.push_str(t);
        } else {
            text.push_str(t);
        }
    }
    if let Some(image) = part.inline_data.as_ref().and_then(inline_image) {
        images.push(image);
    }
    if let Some(file) = &part.file_data {
        images.push(ImageData {
            url: Some(file.file_uri.clone()),
            mime_type: Some(file.mime_type.clone()).filter(|m| !m.is_empty()),
            ..Default::default()
        });
    }
}

fn inline_image(blob: &Blob) -> Option<ImageData> {
    let Some(data) = normalize_base64(&blob.data) else {
        debug!(mime = %blob.mime_type, "dropping inline data with invalid base64");
        return None;
    };
    Some(ImageData::base64(
        data,
        Some(blob.mime_type.clone()).filter(|m| !m.is_empty()),
    ))
}

pub fn placeholder(finish_reason: FinishReason) -> &'static str {
    match finish_reason {
        FinishReason::Length => TRUNCATED_PLACEHOLDER,
        _ => EMPTY_PLACEHOLDER,
    }
}

/// Map a Vertex `finishReason` to the canonical finish reason.
pub fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII"
        | "IMAGE_SAFETY" | "IMAGE_PROHIBITED_CONTENT" => FinishReason::ContentFilter,
        "TOOL_CALL" => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

/// Thoughts are billed as output, so they fold into `completion_tokens` and are
/// also reported on their own as reasoning tokens.
pub fn convert_usage(usage: &UsageMetadata) -> Usage {
    let thoughts = usage.thoughts_token_count.unwrap_or_default();
    let prompt = usage.prompt_token_count;
    let completion = usage.candidates_token_count + thoughts;

    let prompt_audio = modality_tokens(&usage.prompt_tokens_details, "AUDIO");
    let prompt_tokens_details = (usage.cached_content_token_count.is_some()
        || prompt_audio.is_some())
    .then(|| PromptTokensDetails {
        cached_tokens: usage.cached_content_token_count,
        audio_tokens: prompt_audio,
    });

    let completion_audio = modality_tokens(&usage.candidates_tokens_details, "AUDIO");
    let completion_image = modality_tokens(&usage.candidates_tokens_details, "IMAGE");
    let completion_tokens_details = (usage.thoughts_token_count.is_some()
        || completion_audio.is_some()
        || completion_image.is_some())
    .then(|| CompletionTokensDetails {
        reasoning_tokens: usage.thoughts_token_count,
        audio_tokens: completion_audio,
        image_tokens: completion_image,
    });

    Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: usage.total_token_count.unwrap_or(prompt + completion),
        prompt_tokens_details,
        completion_tokens_details,
    }
}

fn modality_tokens(details: &[ModalityTokenCount], modality: &str) -> Option<u64> {
    details
        .iter()
        .filter(|d| d.modality.eq_ignore_ascii_case(modality))
        .map(|d| d.token_count)
        .reduce(|a, b| a + b)
}
