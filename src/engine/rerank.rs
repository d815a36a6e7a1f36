//! Second-pass reranking of finished beams with an external language model.

use async_trait::async_trait;

use super::config::DecodeConfig;
use super::decode::Beam;
use super::error::DecodeError;
use super::tokenizer::Tokenizer;
use crate::telemetry;

/// External LM exposing a single text-scoring call.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Log-probability of `text` under the model.
    async fn score(&self, text: &str) -> Result<f32, DecodeError>;
}

/// Per-beam reranking detail.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankedCandidate {
    /// Index into the reranked beam slice.
    pub slot: usize,
    pub text: String,
    pub lm_score: f32,
    pub combined: f32,
}

/// Combines beam scores with LM scores and picks the winner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmReranker {
    lm_weight: f32,
    normalize_by_length: bool,
}

impl LmReranker {
    pub fn new(lm_weight: f32, normalize_by_length: bool) -> Self {
        Self { lm_weight, normalize_by_length }
    }

    pub fn from_config(config: &DecodeConfig) -> Self {
        Self::new(config.lm_weight, config.normalize_by_length)
    }

    /// `log_prob + lm_weight * lm_score * (1/length if normalizing else 1)`.
    pub fn combine(&self, beam: &Beam, lm_score: f32) -> f32 {
        let scale = if self.normalize_by_length {
            1.0 / beam.length.max(1) as f32
        } else {
            1.0
        };
        beam.log_prob + self.lm_weight * lm_score * scale
    }

    /// Score every beam, in slot order.
    pub async fn score_all(
        &self,
        beams: &[Beam],
        tokenizer: &dyn Tokenizer,
        lm: &dyn LanguageModel,
    ) -> Result<Vec<RerankedCandidate>, DecodeError> {
        let mut scored = Vec::with_capacity(beams.len());
        for (slot, beam) in beams.iter().enumerate() {
            let text = tokenizer.decode_generated(&beam.token_ids)?;
            let lm_score = lm.score(&text).await?;
            if lm_score.is_nan() {
                return Err(DecodeError::LanguageModel(format!("NaN score for beam {slot}")));
            }
            let combined = self.combine(beam, lm_score);
            tracing::debug!(slot, lm_score, combined, "reranked beam");
            scored.push(RerankedCandidate { slot, text, lm_score, combined });
        }
        telemetry::record_rerank(scored.len());
        Ok(scored)
    }

    /// Pick the beam with the highest combined score; ties go to the lower slot.
    pub async fn rerank(
        &self,
        beams: &[Beam],
        tokenizer: &dyn Tokenizer,
        lm: &dyn LanguageModel,
    ) -> Result<RerankedCandidate, DecodeError> {
        if beams.is_empty() {
            return Err(DecodeError::NoCandidates);
        }
        self.score_all(beams, tokenizer, lm)
            .await?
            .into_iter()
            .reduce(|best, c| if c.combined > best.combined { c } else { best })
            .ok_or(DecodeError::NoCandidates)
    }
}
