//! Decode error types.
//!
//! Every failure is scoped to a single decode request. Nothing here is retried.

use thiserror::Error;

use super::tokenizer::TokenizerError;

/// Errors that can occur while decoding or reranking.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid decode configuration: {0}")]
    Config(String),

    #[error("Model step failed: {0}")]
    ModelStep(String),

    #[error("Backpointer reconstruction failed at step {step}, slot {slot}: parent {parent} out of range for beam width {beam_width}")]
    Reconstruction {
        step: usize,
        slot: usize,
        parent: usize,
        beam_width: usize,
    },

    #[error("All beam candidates have -inf score")]
    AllBeamsDegenerate,

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),

    #[error("Language model scoring failed: {0}")]
    LanguageModel(String),

    #[error("No candidates to rerank")]
    NoCandidates,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// Returns true if this error signals a bug in the decoder itself rather
    /// than bad input or a failing collaborator.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Reconstruction { .. } | Self::ShapeMismatch(_))
    }

    /// Short, stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::ModelStep(_) => "model_step",
            Self::Reconstruction { .. } => "reconstruction",
            Self::AllBeamsDegenerate => "degenerate",
            Self::ShapeMismatch(_) => "shape_mismatch",
            Self::Tokenizer(_) => "tokenizer",
            Self::LanguageModel(_) => "language_model",
            Self::NoCandidates => "no_candidates",
            Self::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconstruction_is_internal() {
        let err = DecodeError::Reconstruction { step: 3, slot: 1, parent: 7, beam_width: 4 };
        assert!(err.is_internal());
        assert!(err.to_string().contains("parent 7"));
    }

    #[test]
    fn model_step_is_not_internal() {
        let err = DecodeError::ModelStep("device lost".into());
        assert!(!err.is_internal());
        assert_eq!(err.kind(), "model_step");
        assert_eq!(err.to_string(), "Model step failed: device lost");
    }
}
