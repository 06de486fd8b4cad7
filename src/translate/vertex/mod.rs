//! Canonical <-> Vertex `generateContent` adapter, plus Imagen.

pub mod imagen;
pub mod request;
pub mod response;
pub mod schema;
pub mod streaming;
pub mod types;

pub use imagen::{image_request_to_vertex, image_response_from_vertex};
pub use request::{openai_to_vertex, request_to_vertex};
pub use response::{map_finish_reason, response_from_vertex, vertex_to_openai};
pub use streaming::VertexStreamTranslator;
