//! Translation between the canonical (OpenAI-shaped) dialect and the
//! Anthropic Messages and Vertex `generateContent` dialects.
//!
//! Whole-payload conversions are pure functions over byte buffers. Stream
//! conversions are [`streaming::ChunkTranslator`] state machines driven by
//! [`crate::sse`].

pub mod anthropic;
pub mod content;
pub mod helpers;
pub mod media;
pub mod openai_types;
pub mod streaming;
pub mod vertex;
