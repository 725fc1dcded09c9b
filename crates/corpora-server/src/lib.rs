//! HTTP API for the corpora RAG core.
//!
//! The router, handlers, and error mapping live in [`api`]; the binary in
//! `main.rs` assembles the core components and serves them.

pub mod api;

pub use api::{ApiError, AppState, create_router};
