//! Tokenizer capability and reserved token ids.
//!
//! The tokenizer is an external collaborator. Its own vocabulary occupies
//! ids `0..vocab_size`, and the decoder reserves two ids past the end of it:
//! `start = vocab_size` and `end = vocab_size + 1`. Id 0 doubles as padding.

use thiserror::Error;

/// Padding id. Masked in attention, and emitted by finished beams.
pub const PAD_TOKEN_ID: u32 = 0;

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Invalid token ID: {0}")]
    InvalidToken(u32),
}

/// Text ↔ id conversion, shared read-only across decode requests.
pub trait Tokenizer: Send + Sync {
    /// Encode text to vocabulary ids (no reserved ids).
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError>;

    /// Decode vocabulary ids to text. Reserved ids must be stripped first.
    fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError>;

    /// Size of the tokenizer's own vocabulary.
    fn vocab_size(&self) -> u32;

    fn start_token(&self) -> u32 {
        self.vocab_size()
    }

    fn end_token(&self) -> u32 {
        self.vocab_size() + 1
    }

    /// Width of a model logit row: vocabulary plus the two reserved ids.
    fn model_vocab_size(&self) -> usize {
        self.vocab_size() as usize + 2
    }

    /// Wrap encoded text in start/end ids, as fed to the encoder.
    fn frame(&self, text: &str) -> Result<Vec<u32>, TokenizerError> {
        let body = self.encode(text)?;
        let mut ids = Vec::with_capacity(body.len() + 2);
        ids.push(self.start_token());
        ids.extend(body);
        ids.push(self.end_token());
        Ok(ids)
    }

    /// Decode a generated sequence, dropping start/end and padding ids.
    fn decode_generated(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        let vocab = self.vocab_size();
        let body: Vec<u32> = ids
            .iter()
            .copied()
            .filter(|&id| id < vocab && id != PAD_TOKEN_ID)
            .collect();
        self.decode(&body)
    }
}
