//! gec-decode: beam-search decoding for sequence-to-sequence correction.
//!
//! Generates output token sequences from an autoregressive encoder-decoder
//! model one token at a time, tracking several hypotheses in parallel, then
//! optionally reranks the finished hypotheses with an external LM.
//!
//! # Collaborators
//!
//! The sequence model, tokenizer and rescoring LM are never owned by this
//! crate. They are plugged into a [`DecodeSession`] through the
//! [`engine::ModelStep`], [`engine::Tokenizer`] and [`engine::LanguageModel`]
//! traits and shared read-only between concurrent requests.
//!
//! # Example
//!
//! ```ignore
//! let session = DecodeSession::new(model, tokenizer).with_language_model(lm);
//! let fixed = session.correct("the cat sat on mat", &DecodeConfig::default()).await?;
//! println!("{}", fixed.text);
//! ```

pub mod cli;
pub mod config;
pub mod correct;
pub mod engine;
pub mod telemetry;

pub use correct::{correct_file, correct_lines, CorrectionStats};
pub use engine::{Beam, DecodeConfig, DecodeError, DecodeOutcome, DecodeSession, FinishReason};
