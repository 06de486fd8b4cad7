//! Error types for the translation core.

use std::fmt;

use thiserror::Error;

/// Which whole payload a conversion was reading when parsing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    CanonicalRequest,
    CanonicalImageRequest,
    AnthropicResponse,
    VertexResponse,
    VertexImageResponse,
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Payload::CanonicalRequest => "canonical chat request",
            Payload::CanonicalImageRequest => "canonical image request",
            Payload::AnthropicResponse => "Anthropic messages response",
            Payload::VertexResponse => "Vertex generateContent response",
            Payload::VertexImageResponse => "Vertex image prediction response",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TranslateError {
    #[error("Failed to parse {payload}: {source}")]
    Parse {
        payload: Payload,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("Unsupported conversion: {message}")]
    Unsupported { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl TranslateError {
    pub fn parse(payload: Payload, source: serde_json::Error) -> Self {
        Self::Parse { payload, source }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TranslateError>;

/// Deserialize a whole payload, tagging any failure with the payload kind.
pub(crate) fn parse_payload<T: serde::de::DeserializeOwned>(
    body: &[u8],
    payload: Payload,
) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| TranslateError::parse(payload, e))
}
