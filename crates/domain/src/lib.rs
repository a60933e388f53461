//! Shared domain types for Polylogue.
//!
//! Everything here is plain data: the error enum, client configuration,
//! the stream event sum type, the chat data model, and structured trace
//! events.  No I/O lives in this crate.

pub mod chat;
pub mod config;
pub mod error;
pub mod stream;
pub mod trace;
