//! Provider dispatch.
//!
//! Each target dialect is a [`Provider`]. A small preset table maps the
//! names users type (in config or on the command line) to a provider, and
//! the functions below route a payload to the matching adapter.

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::config::StreamConfig;
use crate::error::{Result, TranslateError};
use crate::sse::translate_sse;
use crate::translate::anthropic::{self, AnthropicStreamTranslator};
use crate::translate::helpers::{SystemClock, UuidIds};
use crate::translate::streaming::ChunkTranslator;
use crate::translate::vertex::{self, VertexStreamTranslator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Anthropic,
    Vertex,
}

/// A name (plus aliases) a provider can be selected by.
#[derive(Debug, Clone)]
pub struct ProviderPreset {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub provider: Provider,
    pub supports_images: bool,
}

const PRESETS: &[ProviderPreset] = &[
    ProviderPreset {
        name: "anthropic",
        aliases: &["claude"],
        provider: Provider::Anthropic,
        supports_images: false,
    },
    ProviderPreset {
        name: "vertex",
        aliases: &["vertex_ai", "gemini", "google"],
        provider: Provider::Vertex,
        supports_images: true,
    },
];

impl ProviderPreset {
    #[must_use]
    pub fn from_name(name: &str) -> Option<&'static ProviderPreset> {
        let name = name.trim().to_lowercase();
        PRESETS
            .iter()
            .find(|p| p.name == name || p.aliases.contains(&name.as_str()))
    }

    #[must_use]
    pub fn all() -> &'static [ProviderPreset] {
        PRESETS
    }
}

impl Provider {
    /// Case-insensitive lookup by preset name or alias.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Provider> {
        ProviderPreset::from_name(name).map(|p| p.provider)
    }

    pub fn preset(self) -> &'static ProviderPreset {
        match self {
            Provider::Anthropic => &PRESETS[0],
            Provider::Vertex => &PRESETS[1],
        }
    }

    pub fn name(self) -> &'static str {
        self.preset().name
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Provider {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self> {
        Provider::from_name(s).ok_or_else(|| TranslateError::UnknownProvider(s.to_string()))
    }
}

/// Convert a canonical chat request body into `provider`'s request body.
pub fn request_to_provider(provider: Provider, body: &[u8], model: &str) -> Result<Vec<u8>> {
    tracing::debug!(%provider, model, bytes = body.len(), "translating request");
    match provider {
        Provider::Anthropic => anthropic::request_to_anthropic(body, model),
        Provider::Vertex => vertex::request_to_vertex(body, model),
    }
}

/// Convert `provider`'s response body into a canonical chat completion body.
pub fn response_from_provider(provider: Provider, body: &[u8], model: &str) -> Result<Vec<u8>> {
    tracing::debug!(%provider, model, bytes = body.len(), "translating response");
    match provider {
        Provider::Anthropic => anthropic::response_from_anthropic(body, model),
        Provider::Vertex => vertex::response_from_vertex(body, model),
    }
}

/// A fresh stream translator for one response stream from `provider`.
pub fn stream_translator(provider: Provider, model: &str) -> Box<dyn ChunkTranslator> {
    let ids = Arc::new(UuidIds);
    match provider {
        Provider::Anthropic => Box::new(AnthropicStreamTranslator::new(model, &SystemClock, ids)),
        Provider::Vertex => Box::new(VertexStreamTranslator::new(model, &SystemClock, ids)),
    }
}

/// Translate `provider`'s SSE stream from `reader` into canonical SSE on `writer`.
///
/// Returns the number of chunks written, not counting the terminator.
pub async fn stream_from_provider<R, W>(
    provider: Provider,
    reader: R,
    writer: &mut W,
    model: &str,
    config: &StreamConfig,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tracing::debug!(%provider, model, "translating stream");
    let mut translator = stream_translator(provider, model);
    translate_sse(reader, writer, translator.as_mut(), config).await
}

/// Convert a canonical image-generation body into `provider`'s request body.
pub fn image_request_to_provider(provider: Provider, body: &[u8], model: &str) -> Result<Vec<u8>> {
    match provider {
        Provider::Vertex => vertex::image_request_to_vertex(body, model),
        Provider::Anthropic => Err(images_unsupported(provider)),
    }
}

/// Convert `provider`'s image-generation reply into a canonical images response.
pub fn image_response_from_provider(
    provider: Provider,
    body: &[u8],
    model: &str,
) -> Result<Vec<u8>> {
    match provider {
        Provider::Vertex => vertex::image_response_from_vertex(body, model),
        Provider::Anthropic => Err(images_unsupported(provider)),
    }
}

fn images_unsupported(provider: Provider) -> TranslateError {
    TranslateError::unsupported(format!("{provider} does not generate images"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_providers() {
        assert_eq!(Provider::from_name("anthropic"), Some(Provider::Anthropic));
        assert_eq!(Provider::from_name("Claude"), Some(Provider::Anthropic));
        assert_eq!(Provider::from_name("VERTEX"), Some(Provider::Vertex)); // case-insensitive
        assert_eq!(Provider::from_name("vertex_ai"), Some(Provider::Vertex));
        assert_eq!(Provider::from_name("gemini"), Some(Provider::Vertex));
        assert_eq!(Provider::from_name("openai"), None);
    }

    #[test]
    fn test_from_str_reports_unknown_provider() {
        let err = "bedrock".parse::<Provider>().unwrap_err();
        assert!(matches!(err, TranslateError::UnknownProvider(ref n) if n == "bedrock"));
        assert_eq!(err.to_string(), "Unknown provider 'bedrock'");
    }

    #[test]
    fn test_preset_round_trip() {
        for preset in ProviderPreset::all() {
            assert_eq!(preset.provider.name(), preset.name);
            assert_eq!(Provider::from_name(preset.name), Some(preset.provider));
        }
        assert!(Provider::Vertex.preset().supports_images);
        assert!(!Provider::Anthropic.preset().supports_images);
    }

    #[test]
    fn test_request_dispatch() {
        let body = br#"{"model":"m","messages":[{"role":"user","content":"Hello"}]}"#;

        let anthropic: serde_json::Value =
            serde_json::from_slice(&request_to_provider(Provider::Anthropic, body, "claude-x").unwrap())
                .unwrap();
        assert_eq!(anthropic["model"], "claude-x");
        assert_eq!(anthropic["messages"][0]["content"][0]["text"], "Hello");

        let vertex: serde_json::Value =
            serde_json::from_slice(&request_to_provider(Provider::Vertex, body, "gemini-x").unwrap())
                .unwrap();
        assert_eq!(vertex["contents"][0]["role"], "user");
        assert_eq!(vertex["contents"][0]["parts"][0]["text"], "Hello");
    }

    #[test]
    fn test_anthropic_images_are_unsupported() {
        let err = image_request_to_provider(Provider::Anthropic, b"{}", "m").unwrap_err();
        assert!(matches!(err, TranslateError::Unsupported { .. }));
        let err = image_response_from_provider(Provider::Anthropic, b"{}", "m").unwrap_err();
        assert!(matches!(err, TranslateError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_stream_dispatch() {
        let input = b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"hi\"}]}}]}\n\n";
        let mut out = Vec::new();
        let n = stream_from_provider(
            Provider::Vertex,
            &input[..],
            &mut out,
            "gemini-x",
            &StreamConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(n, 1);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"content\":\"hi\""));
        assert!(text.ends_with("data: [DONE]\n\n"));
    }
}
