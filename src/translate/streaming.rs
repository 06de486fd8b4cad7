//! The provider-agnostic half of stream translation.
//!
//! Each adapter implements [`ChunkTranslator`]: it is fed the payload of one
//! SSE `data:` line at a time and answers with zero or more canonical chunks,
//! or with [`StreamStep::Done`] once the provider signals the end of the
//! stream. Framing, flushing and the `[DONE]` terminator live in
//! [`crate::sse`].

use super::openai_types::ChatCompletionChunk;

/// The SSE line prefix every provider uses for payload lines.
pub const DATA_PREFIX: &str = "data:";

/// Literal terminator written once at the end of every canonical stream.
pub const DONE_LINE: &[u8] = b"data: [DONE]\n\n";

#[derive(Debug, Clone)]
pub enum StreamStep {
    /// Chunks to emit, in order. Empty when the payload was skipped.
    Chunks(Vec<ChatCompletionChunk>),
    /// The provider finished the stream; stop reading.
    Done,
}

impl StreamStep {
    pub fn skip() -> Self {
        StreamStep::Chunks(Vec::new())
    }

    pub fn one(chunk: ChatCompletionChunk) -> Self {
        StreamStep::Chunks(vec![chunk])
    }
}

/// A per-stream state machine turning provider SSE payloads into canonical chunks.
///
/// Implementations must never fail: a payload they cannot understand yields
/// [`StreamStep::skip`].
pub trait ChunkTranslator: Send {
    fn translate(&mut self, data: &str) -> StreamStep;
}

/// Extract the payload of an SSE `data:` line, or `None` for any other line.
pub fn data_payload(line: &str) -> Option<&str> {
    let line = line.trim();
    line.strip_prefix(DATA_PREFIX).map(str::trim)
}

/// Frame a chunk as one SSE event: `data: <json>\n\n`.
pub fn frame_chunk(chunk: &ChatCompletionChunk) -> serde_json::Result<Vec<u8>> {
    let json = serde_json::to_vec(chunk)?;
    let mut framed = Vec::with_capacity(json.len() + 8);
    framed.extend_from_slice(b"data: ");
    framed.extend_from_slice(&json);
    framed.extend_from_slice(b"\n\n");
    Ok(framed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_payload() {
        assert_eq!(data_payload("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(data_payload("data:{\"a\":1}\r"), Some("{\"a\":1}"));
        assert_eq!(data_payload("data: [DONE]"), Some("[DONE]"));
        assert_eq!(data_payload("event: message_start"), None);
        assert_eq!(data_payload(": keep-alive"), None);
        assert_eq!(data_payload(""), None);
    }

    #[test]
    fn test_frame_chunk() {
        let chunk = ChatCompletionChunk::new("id-1", 7, "m", Vec::new());
        let framed = String::from_utf8(frame_chunk(&chunk).unwrap()).unwrap();
        assert!(framed.starts_with("data: {"));
        assert!(framed.ends_with("}\n\n"));
        assert!(framed.contains("\"object\":\"chat.completion.chunk\""));
    }
}
