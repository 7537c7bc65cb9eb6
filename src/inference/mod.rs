//! # Inference Module
//!
//! The core of the service: converting raw story/question text into padded
//! token-index sequences, running the dual-encoder LSTM forward pass, and
//! mapping the scalar output to a discrete answer with confidence scores.
//!
//! ## Key Components
//!
//! - `QaEngine`: the explicit inference context — tokenizer and model loaded
//!   together at startup, shared read-only across requests
//! - `WordTokenizer`: replays the fitted vocabulary and cleaning policy
//! - `DualLstmModel`: the trained weights and the forward pass
//!
//! All state is immutable after construction, so the engine needs no
//! locking no matter how many requests run concurrently.

mod engine;
mod lstm;
mod model;
mod padding;
mod tokenizer;

pub use engine::{Answer, Prediction, QaEngine};
pub use lstm::Lstm;
pub use model::{DualLstmModel, Embedding, ModelParams, ARCHITECTURE};
pub use padding::{pad_to, PAD_INDEX};
pub use tokenizer::WordTokenizer;
