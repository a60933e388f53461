//! REST + SSE transport to the Polylogue backend.
//!
//! [`rest::BackendClient`] covers the plain request/response surface
//! (conversations, entities, memories, export/import) with retry on
//! transient failures.  [`stream`] opens the streaming send/regenerate
//! endpoints and decodes their SSE payloads into
//! [`pl_domain::stream::StreamEvent`]s.

pub mod rest;
pub mod sse;
pub mod stream;
pub mod types;

pub use rest::BackendClient;
