//! Canonical <-> Anthropic Messages adapter.

pub mod request;
pub mod response;
pub mod streaming;
pub mod types;

pub use request::{openai_to_anthropic, request_to_anthropic};
pub use response::{anthropic_to_openai, map_stop_reason, response_from_anthropic};
pub use streaming::AnthropicStreamTranslator;
