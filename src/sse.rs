//! SSE plumbing shared by every stream translation.
//!
//! Two drivers feed a [`ChunkTranslator`]: [`translate_sse`] reads lines from
//! an `AsyncBufRead` and writes framed chunks to an `AsyncWrite`, flushing
//! after each one; [`translate_byte_stream`] adapts a stream of byte buffers
//! (as an HTTP client hands them out) into a stream of framed events. Both
//! skip anything that is not a usable `data:` line and end the output with a
//! single `data: [DONE]` terminator.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::StreamConfig;
use crate::error::{Result, TranslateError};
use crate::translate::streaming::{
    data_payload, frame_chunk, ChunkTranslator, StreamStep, DONE_LINE,
};

/// What one input line turned into.
enum LineOutcome {
    Events(Vec<Vec<u8>>),
    Done,
}

fn handle_line(
    line: &str,
    translator: &mut dyn ChunkTranslator,
    config: &StreamConfig,
) -> LineOutcome {
    let Some(data) = data_payload(line) else {
        if config.log_skipped && !line.trim().is_empty() {
            tracing::debug!(line = %line.trim(), "skipping non-data SSE line");
        }
        return LineOutcome::Events(Vec::new());
    };
    if data.is_empty() {
        return LineOutcome::Events(Vec::new());
    }

    match translator.translate(data) {
        StreamStep::Done => LineOutcome::Done,
        StreamStep::Chunks(chunks) => {
            let mut events = Vec::with_capacity(chunks.len());
            for chunk in &chunks {
                match frame_chunk(chunk) {
                    Ok(framed) => {
                        tracing::trace!(id = %chunk.id, "emitting chunk");
                        events.push(framed);
                    }
                    Err(e) => tracing::debug!(error = %e, "failed to serialize chunk"),
                }
            }
            if config.log_skipped && events.is_empty() {
                tracing::debug!("SSE payload produced no chunks");
            }
            LineOutcome::Events(events)
        }
    }
}

/// Translate a provider SSE stream read from `reader` into a canonical SSE
/// stream written to `writer`. Returns the number of chunks written.
///
/// Each chunk is flushed before the next line is read. Malformed lines are
/// skipped; only a failing reader or writer ends the loop early, and that
/// error is returned without writing the terminator.
///
/// # Errors
/// Returns [`TranslateError::Io`](crate::TranslateError::Io) when reading or
/// writing fails.
pub async fn translate_sse<R, W>(
    mut reader: R,
    writer: &mut W,
    translator: &mut dyn ChunkTranslator,
    config: &StreamConfig,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = Vec::new();
    let mut written = 0;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&line);
        match handle_line(&text, translator, config) {
            LineOutcome::Done => break,
            LineOutcome::Events(events) => {
                for event in events {
                    writer.write_all(&event).await?;
                    writer.flush().await?;
                    written += 1;
                }
            }
        }
    }

    writer.write_all(DONE_LINE).await?;
    writer.flush().await?;
    tracing::info!(chunks = written, "stream translation complete");
    Ok(written)
}

/// Translate a stream of raw byte buffers into a stream of framed canonical
/// SSE events, ending with the `[DONE]` terminator.
///
/// Lines may be split across buffers. An upstream error is yielded once as
/// an `Io` error and ends the stream without a terminator.
pub fn translate_byte_stream<S, E>(
    byte_stream: S,
    mut translator: Box<dyn ChunkTranslator>,
    config: StreamConfig,
) -> impl Stream<Item = Result<Bytes>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        let mut written = 0usize;
        let mut done = false;

        futures::pin_mut!(byte_stream);

        'outer: while let Some(next) = byte_stream.next().await {
            let chunk = match next {
                Ok(c) => c,
                Err(e) => {
                    tracing::debug!(error = %e, "upstream byte stream failed");
                    yield Err(TranslateError::from(std::io::Error::other(e)));
                    return;
                }
            };
            buffer.extend_from_slice(&chunk);

            while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                let text = String::from_utf8_lossy(&line);
                match handle_line(&text, translator.as_mut(), &config) {
                    LineOutcome::Done => {
                        done = true;
                        break 'outer;
                    }
                    LineOutcome::Events(events) => {
                        for event in events {
                            written += 1;
                            yield Ok(Bytes::from(event));
                        }
                    }
                }
            }
        }

        // A final line without a trailing newline still counts.
        if !done && !buffer.is_empty() {
            let text = String::from_utf8_lossy(&buffer).into_owned();
            if let LineOutcome::Events(events) = handle_line(&text, translator.as_mut(), &config) {
                for event in events {
                    written += 1;
                    yield Ok(Bytes::from(event));
                }
            }
        }

        yield Ok(Bytes::from_static(DONE_LINE));
        tracing::info!(chunks = written, "stream translation complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::anthropic::AnthropicStreamTranslator;
    use crate::translate::helpers::{FixedClock, SequentialIds};
    use crate::translate::vertex::VertexStreamTranslator;
    use std::sync::Arc;

    fn anthropic() -> AnthropicStreamTranslator {
        AnthropicStreamTranslator::new(
            "claude-test",
            &FixedClock(1),
            Arc::new(SequentialIds::new("chatcmpl-test")),
        )
    }

    fn data_lines(output: &[u8]) -> Vec<String> {
        String::from_utf8_lossy(output)
            .split("\n\n")
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_two_events_then_done() {
        let input = concat!(
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n",
            "\n",
            "event: message_delta\n",
            "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}\n",
            "\n",
        );
        let mut out = Vec::new();
        let written = translate_sse(
            input.as_bytes(),
            &mut out,
            &mut anthropic(),
            &StreamConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(written, 2);
        let lines = data_lines(&out);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\"content\":\"Hi\""));
        assert!(lines[0].contains("\"role\":\"assistant\""));
        assert!(lines[1].contains("\"finish_reason\":\"stop\""));
        assert_eq!(lines[2], "data: [DONE]");
    }

    #[tokio::test]
    async fn test_message_stop_ends_reading() {
        let input = concat!(
            "data: {\"type\":\"message_stop\"}\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"late\"}}\n",
        );
        let mut out = Vec::new();
        translate_sse(input.as_bytes(), &mut out, &mut anthropic(), &StreamConfig::default())
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "data: [DONE]\n\n");
    }

    #[tokio::test]
    async fn test_vertex_done_is_written_once() {
        let input = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"ok\"}]},\"finishReason\":\"STOP\"}]}\r\n",
            "\r\n",
            "data: [DONE]\n",
        );
        let mut translator = VertexStreamTranslator::new(
            "gemini-test",
            &FixedClock(1),
            Arc::new(SequentialIds::new("chatcmpl-test")),
        );
        let mut out = Vec::new();
        translate_sse(input.as_bytes(), &mut out, &mut translator, &StreamConfig::default())
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("[DONE]").count(), 1);
        assert!(text.ends_with("data: [DONE]\n\n"));
    }

    #[tokio::test]
    async fn test_reader_failure_is_propagated() {
        let mock = tokio_test::io::Builder::new()
            .read(b"data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"a\"}}\n")
            .read_error(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "closed"))
            .build();
        let reader = tokio::io::BufReader::new(mock);
        let mut out = Vec::new();

        let err = translate_sse(reader, &mut out, &mut anthropic(), &StreamConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, crate::TranslateError::Io(_)));
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"content\":\"a\""));
        assert!(!text.contains("[DONE]"));
    }

    #[tokio::test]
    async fn test_byte_stream_handles_split_lines() {
        let parts: Vec<std::result::Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"type\":\"content_block_delta\",\"index\":0,")),
            Ok(Bytes::from_static(b"\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\ndata: {bad json\n")),
            Ok(Bytes::from_static(b"data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"tool_use\"}}")),
        ];
        let events: Vec<Bytes> = translate_byte_stream(
            futures::stream::iter(parts),
            Box::new(anthropic()),
            StreamConfig::default(),
        )
        .map(|r| r.unwrap())
        .collect()
        .await;

        assert_eq!(events.len(), 3);
        assert!(String::from_utf8_lossy(&events[0]).contains("\"content\":\"Hi\""));
        assert!(String::from_utf8_lossy(&events[1]).contains("\"finish_reason\":\"tool_calls\""));
        assert_eq!(&events[2][..], DONE_LINE);
    }

    #[tokio::test]
    async fn test_byte_stream_error_ends_stream() {
        let parts: Vec<std::result::Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b": ping\n")),
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone")),
        ];
        let results: Vec<Result<Bytes>> = translate_byte_stream(
            futures::stream::iter(parts),
            Box::new(anthropic()),
            StreamConfig::default(),
        )
        .collect()
        .await;

        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
