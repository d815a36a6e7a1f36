//! Beam-search decoding engine.
//!
//! Mask construction, beam state transitions, backpointer reconstruction,
//! the step driver and LM reranking. The sequence model, tokenizer and
//! rescoring LM are external and reached only through the traits exported
//! here.

pub mod backpointer;
pub mod beam;
pub mod config;
pub mod decode;
pub mod error;
pub mod mask;
pub mod model;
pub mod rerank;
pub mod session;
pub mod tokenizer;

pub use backpointer::{Backpointer, BackpointerTree};
pub use beam::{
    length_penalty, log_softmax, penalized_score, top_k, BeamSearchConfig, BeamSearchOutput, BeamSearchState,
    CandidateSelector, SelectionStrategy,
};
pub use config::DecodeConfig;
pub use decode::{Beam, DecodeOutcome, DriverState, FinishReason, StepDriver};
pub use error::DecodeError;
pub use mask::{build_masks, causal_mask, padding_mask, AttentionMasks, Mask};
pub use model::{
    ModelStep, PlainEncoder, PretrainedEncoderAdapter, SegmentedSeq2SeqModel, Seq2SeqModel,
    StepInput, StepLogits,
};
pub use rerank::{LanguageModel, LmReranker, RerankedCandidate};
pub use session::{Correction, DecodeSession};
pub use tokenizer::{Tokenizer, TokenizerError, PAD_TOKEN_ID};
