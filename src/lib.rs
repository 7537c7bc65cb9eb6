//! Story QA: a dual-encoder LSTM question-answering service.
//!
//! Given a short narrative and a yes/no question about it, the service
//! returns a binary answer with confidence scores over HTTP. The model and
//! tokenizer are trained offline and shipped as artifacts; this crate loads
//! them once at startup and serves predictions from shared read-only state.

pub mod artifact;
pub mod config;
pub mod inference;
pub mod server;
