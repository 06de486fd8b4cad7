pub mod config;
pub mod error;
pub mod providers;
pub mod sse;
pub mod translate;

pub use config::{StreamConfig, TranslatorConfig};
pub use error::{Payload, Result, TranslateError};
pub use providers::{
    image_request_to_provider, image_response_from_provider, request_to_provider,
    response_from_provider, stream_from_provider, stream_translator, Provider,
};
pub use sse::{translate_byte_stream, translate_sse};
