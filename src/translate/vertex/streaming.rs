//! Translate a Vertex `streamGenerateContent?alt=sse` stream into canonical chunks.
//!
//! Every provider chunk has the shape of a full `generateContent` response,
//! so each one maps to at most one canonical chunk with one choice per
//! candidate.

use std::sync::Arc;

use super::response::{collect_part, convert_usage, map_finish_reason};
use super::types::{Candidate, GenerateContentResponse};
use crate::translate::helpers::{stringify_arguments, Clock, IdSource};
use crate::translate::openai_types::{
    ChatCompletionChunk, ChunkChoice, ChunkDelta, ChunkToolCall, ChunkToolCallFunction,
    FinishReason,
};
use crate::translate::streaming::{ChunkTranslator, StreamStep};

const UNSPECIFIED: &str = "FINISH_REASON_UNSPECIFIED";

pub struct VertexStreamTranslator {
    model: String,
    id: String,
    created: i64,
    ids: Arc<dyn IdSource>,
    emitted_any: bool,
    role_sent: bool,
}

impl VertexStreamTranslator {
    pub fn new(model: &str, clock: &dyn Clock, ids: Arc<dyn IdSource>) -> Self {
        Self {
            model: model.to_string(),
            id: ids.new_id(),
            created: clock.now(),
            ids,
            emitted_any: false,
            role_sent: false,
        }
    }

    pub fn process_response(&mut self, resp: GenerateContentResponse) -> StreamStep {
        if !self.emitted_any {
            if let Some(id) = resp.response_id.as_ref().filter(|id| !id.is_empty()) {
                self.id = id.clone();
            }
            if self.model.is_empty() {
                self.model = resp.model_version.clone().unwrap_or_default();
            }
        }

        let mut choices: Vec<ChunkChoice> = resp
            .candidates
            .iter()
            .enumerate()
            .filter_map(|(position, candidate)| self.translate_candidate(candidate, position))
            .collect();

        let blocked = resp
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref());
        if choices.is_empty() && resp.candidates.is_empty() {
            if let Some(reason) = blocked {
                tracing::debug!(reason, "prompt blocked by Vertex");
                choices.push(ChunkChoice {
                    index: 0,
                    delta: ChunkDelta::default(),
                    finish_reason: Some(FinishReason::ContentFilter),
                });
            }
        }

        let usage = resp.usage_metadata.as_ref().map(convert_usage);
        if choices.is_empty() && usage.is_none() {
            return StreamStep::skip();
        }

        if !self.role_sent && !choices.is_empty() {
            for choice in &mut choices {
                choice.delta.role = Some("assistant".to_string());
            }
            self.role_sent = true;
        }

        self.emitted_any = true;
        let mut chunk = ChatCompletionChunk::new(&self.id, self.created, &self.model, choices);
        chunk.usage = usage;
        StreamStep::one(chunk)
    }

    fn translate_candidate(&self, candidate: &Candidate, position: usize) -> Option<ChunkChoice> {
        let mut text = String::new();
        let mut reasoning = String::new();
        let mut images = Vec::new();
        let mut tool_calls = Vec::new();

        for part in candidate.parts() {
            collect_part(part, &mut text, &mut reasoning, &mut images);
            if let Some(call) = &part.function_call {
                tool_calls.push(ChunkToolCall {
                    index: tool_calls.len() as u32,
                    id: Some(self.ids.new_tool_call_id()),
                    call_type: Some("function".to_string()),
                    function: Some(ChunkToolCallFunction {
                        name: Some(call.name.clone()),
                        arguments: Some(stringify_arguments(&call.args)),
                    }),
                });
            }
        }

        let finish_reason = candidate
            .finish_reason
            .as_deref()
            .filter(|r| *r != UNSPECIFIED)
            .map(map_finish_reason);

        let delta = ChunkDelta {
            role: None,
            content: (!text.is_empty()).then_some(text),
            reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            images: (!images.is_empty()).then_some(images),
        };

        if delta == ChunkDelta::default() && finish_reason.is_none() {
            return None;
        }

        Some(ChunkChoice {
            index: candidate.index.unwrap_or(position as u32),
            delta,
            finish_reason,
        })
    }
}

impl ChunkTranslator for VertexStreamTranslator {
    fn translate(&mut self, data: &str) -> StreamStep {
        if data == "[DONE]" {
            return StreamStep::Done;
        }
        match serde_json::from_str::<GenerateContentResponse>(data) {
            Ok(resp) => self.process_response(resp),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable Vertex chunk");
                StreamStep::skip()
            }
        }
    }
}
