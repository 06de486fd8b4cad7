//! State machine for translating Anthropic SSE events into canonical chunks.
//!
//! [`AnthropicStreamTranslator`] is fed one `data:` payload at a time. It
//! remembers the message id from `message_start`, whether the assistant role
//! has been announced yet, and which Anthropic content blocks are tool calls,
//! so fragments of one call always carry the same canonical tool index.

use std::collections::HashMap;
use std::sync::Arc;

use super::response::map_stop_reason;
use super::types::{Delta, DeltaUsage, StreamContentBlock, StreamEvent, Usage as AnthropicUsage};
use crate::translate::helpers::{Clock, IdSource};
use crate::translate::openai_types::{
    ChatCompletionChunk, ChunkChoice, ChunkDelta, ChunkToolCall, ChunkToolCallFunction,
    FinishReason, PromptTokensDetails, Usage,
};
use crate::translate::streaming::{ChunkTranslator, StreamStep};

pub struct AnthropicStreamTranslator {
    model: String,
    id: String,
    created: i64,
    ids: Arc<dyn IdSource>,
    processed_any: bool,
    role_sent: bool,
    /// Anthropic content block index -> canonical tool call index.
    tool_blocks: HashMap<usize, u32>,
    next_tool_index: u32,
    start_usage: Option<AnthropicUsage>,
}

impl AnthropicStreamTranslator {
    pub fn new(model: &str, clock: &dyn Clock, ids: Arc<dyn IdSource>) -> Self {
        Self {
            model: model.to_string(),
            id: ids.new_id(),
            created: clock.now(),
            ids,
            processed_any: false,
            role_sent: false,
            tool_blocks: HashMap::new(),
            next_tool_index: 0,
            start_usage: None,
        }
    }

    /// Handle one parsed event.
    pub fn process_event(&mut self, event: StreamEvent) -> StreamStep {
        let first_event = !self.processed_any;
        self.processed_any = true;

        match event {
            StreamEvent::MessageStart { message } => {
                if !message.id.is_empty() {
                    self.id = message.id;
                }
                if self.model.is_empty() {
                    self.model = message.model;
                }
                self.start_usage = message.usage;
                if first_event {
                    let delta = ChunkDelta {
                        content: Some(String::new()),
                        ..Default::default()
                    };
                    return StreamStep::one(self.chunk(delta, None));
                }
                StreamStep::skip()
            }
            StreamEvent::ContentBlockStart {
                index,
                content_block: StreamContentBlock::ToolUse { id, name },
            } => {
                let tool_index = self.next_tool_index;
                self.next_tool_index += 1;
                self.tool_blocks.insert(index, tool_index);
                let id = if id.is_empty() {
                    self.ids.new_tool_call_id()
                } else {
                    id
                };
                let delta = ChunkDelta {
                    tool_calls: Some(vec![ChunkToolCall {
                        index: tool_index,
                        id: Some(id),
                        call_type: Some("function".to_string()),
                        function: Some(ChunkToolCallFunction {
                            name: Some(name),
                            arguments: Some(String::new()),
                        }),
                    }]),
                    ..Default::default()
                };
                StreamStep::one(self.chunk(delta, None))
            }
            StreamEvent::ContentBlockDelta { index, delta } => match delta {
                Delta::TextDelta { text } => {
                    let delta = ChunkDelta {
                        content: Some(text),
                        ..Default::default()
                    };
                    StreamStep::one(self.chunk(delta, None))
                }
                Delta::ThinkingDelta { thinking } => {
                    let delta = ChunkDelta {
                        reasoning_content: Some(thinking),
                        ..Default::default()
                    };
                    StreamStep::one(self.chunk(delta, None))
                }
                Delta::InputJsonDelta { partial_json } => {
                    let Some(&tool_index) = self.tool_blocks.get(&index) else {
                        tracing::debug!(index, "input_json_delta for unknown content block");
                        return StreamStep::skip();
                    };
                    let delta = ChunkDelta {
                        tool_calls: Some(vec![ChunkToolCall {
                            index: tool_index,
                            id: None,
                            call_type: None,
                            function: Some(ChunkToolCallFunction {
                                name: None,
                                arguments: Some(partial_json),
                            }),
                        }]),
                        ..Default::default()
                    };
                    StreamStep::one(self.chunk(delta, None))
                }
                Delta::Other => StreamStep::skip(),
            },
            StreamEvent::MessageDelta { delta, usage } => {
                let Some(reason) = delta.stop_reason.as_deref() else {
                    return StreamStep::skip();
                };
                let mut chunk = self.chunk(ChunkDelta::default(), Some(map_stop_reason(reason)));
                chunk.usage = usage.map(|u| self.stream_usage(&u));
                StreamStep::one(chunk)
            }
            StreamEvent::MessageStop => StreamStep::Done,
            other => {
                tracing::trace!(event = other.event_name(), "skipping anthropic event");
                StreamStep::skip()
            }
        }
    }

    fn chunk(
        &mut self,
        mut delta: ChunkDelta,
        finish_reason: Option<FinishReason>,
    ) -> ChatCompletionChunk {
        if !self.role_sent {
            delta.role = Some("assistant".to_string());
            self.role_sent = true;
        }
        ChatCompletionChunk::new(
            &self.id,
            self.created,
            &self.model,
            vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        )
    }

    /// `message_delta` usage carries the output count; the input side comes
    /// from `message_start` unless the delta repeats it.
    fn stream_usage(&self, usage: &DeltaUsage) -> Usage {
        let start = self.start_usage.as_ref();
        let prompt = usage
            .input_tokens
            .or_else(|| start.map(|s| s.input_tokens))
            .unwrap_or_default();
        let cached = usage
            .cache_read_input_tokens
            .or_else(|| start.and_then(|s| s.cache_read_input_tokens));
        Usage {
            prompt_tokens: prompt,
            completion_tokens: usage.output_tokens,
            total_tokens: prompt + usage.output_tokens,
            prompt_tokens_details: cached.map(|cached| PromptTokensDetails {
                cached_tokens: Some(cached),
                audio_tokens: None,
            }),
            completion_tokens_details: None,
        }
    }
}

impl ChunkTranslator for AnthropicStreamTranslator {
    fn translate(&mut self, data: &str) -> StreamStep {
        match serde_json::from_str::<StreamEvent>(data) {
            Ok(event) => self.process_event(event),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable anthropic event");
                StreamStep::skip()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::helpers::{FixedClock, SequentialIds};

    fn translator() -> AnthropicStreamTranslator {
        AnthropicStreamTranslator::new(
            "claude-test",
            &FixedClock(1_000),
            Arc::new(SequentialIds::new("chatcmpl-test")),
        )
    }

    fn chunks(step: StreamStep) -> Vec<ChatCompletionChunk> {
        match step {
            StreamStep::Chunks(chunks) => chunks,
            StreamStep::Done => panic!("unexpected end of stream"),
        }
    }

    #[test]
    fn test_text_then_stop() {
        let mut t = translator();

        let first = chunks(t.translate(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
        ));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].choices[0].delta.role.as_deref(), Some("assistant"));
        assert_eq!(first[0].choices[0].delta.content.as_deref(), Some("Hi"));
        assert_eq!(first[0].id, "chatcmpl-test-0");
        assert_eq!(first[0].created, 1_000);

        let last = chunks(t.translate(
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":4}}"#,
        ));
        assert_eq!(last.len(), 1);
        assert!(last[0].choices[0].delta.role.is_none());
        assert_eq!(last[0].choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(last[0].usage.as_ref().map(|u| u.completion_tokens), Some(4));
    }

    #[test]
    fn test_message_start_seeds_role_and_id() {
        let mut t = translator();

        let seed = chunks(t.translate(
            r#"{"type":"message_start","message":{"id":"msg_1","model":"claude-x","usage":{"input_tokens":12,"output_tokens":1}}}"#,
        ));
        assert_eq!(seed.len(), 1);
        assert_eq!(seed[0].id, "msg_1");
        assert_eq!(seed[0].choices[0].delta.role.as_deref(), Some("assistant"));
        assert_eq!(seed[0].choices[0].delta.content.as_deref(), Some(""));

        let text = chunks(t.translate(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"ok"}}"#,
        ));
        assert_eq!(text[0].id, "msg_1");
        assert!(text[0].choices[0].delta.role.is_none());

        let done = chunks(t.translate(
            r#"{"type":"message_delta","delta":{"stop_reason":"max_tokens"},"usage":{"output_tokens":9}}"#,
        ));
        assert_eq!(done[0].choices[0].finish_reason, Some(FinishReason::Length));
        let usage = done[0].usage.as_ref().unwrap();
        assert_eq!(usage.prompt_tokens, 12);
        assert_eq!(usage.completion_tokens, 9);
        assert_eq!(usage.total_tokens, 21);
    }

    #[test]
    fn test_message_start_after_other_events_emits_nothing() {
        let mut t = translator();
        let _ = t.translate(r#"{"type":"ping"}"#);
        let step = chunks(t.translate(r#"{"type":"message_start","message":{"id":"msg_2"}}"#));
        assert!(step.is_empty());

        let text = chunks(t.translate(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"a"}}"#,
        ));
        assert_eq!(text[0].id, "msg_2");
        assert_eq!(text[0].choices[0].delta.role.as_deref(), Some("assistant"));
    }

    #[test]
    fn test_tool_use_fragments() {
        let mut t = translator();
        let _ = t.translate(r#"{"type":"message_start","message":{"id":"msg_3"}}"#);

        let start = chunks(t.translate(
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_9","name":"search","input":{}}}"#,
        ));
        let call = &start[0].choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(call.index, 0);
        assert_eq!(call.id.as_deref(), Some("toolu_9"));
        assert_eq!(call.call_type.as_deref(), Some("function"));
        assert_eq!(call.function.as_ref().unwrap().name.as_deref(), Some("search"));

        let args = chunks(t.translate(
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"q\":"}}"#,
        ));
        let call = &args[0].choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(call.index, 0);
        assert!(call.id.is_none());
        assert_eq!(
            call.function.as_ref().unwrap().arguments.as_deref(),
            Some("{\"q\":")
        );

        let stray = chunks(t.translate(
            r#"{"type":"content_block_delta","index":5,"delta":{"type":"input_json_delta","partial_json":"x"}}"#,
        ));
        assert!(stray.is_empty());

        let finish = chunks(t.translate(
            r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"}}"#,
        ));
        assert_eq!(finish[0].choices[0].finish_reason, Some(FinishReason::ToolCalls));
        assert!(finish[0].usage.is_none());
    }

    #[test]
    fn test_thinking_delta_becomes_reasoning() {
        let mut t = translator();
        let out = chunks(t.translate(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"hmm"}}"#,
        ));
        assert_eq!(out[0].choices[0].delta.reasoning_content.as_deref(), Some("hmm"));
        assert!(out[0].choices[0].delta.content.is_none());
    }

    #[test]
    fn test_skips_noise_and_stops() {
        let mut t = translator();
        assert!(chunks(t.translate("{not json")).is_empty());
        assert!(chunks(t.translate(r#"{"type":"ping"}"#)).is_empty());
        assert!(chunks(t.translate(r#"{"type":"content_block_stop","index":0}"#)).is_empty());
        assert!(chunks(t.translate(r#"{"type":"brand_new_event"}"#)).is_empty());
        assert!(chunks(t.translate(r#"{"type":"message_delta","delta":{}}"#)).is_empty());
        assert!(matches!(
            t.translate(r#"{"type":"message_stop"}"#),
            StreamStep::Done
        ));
    }
}
