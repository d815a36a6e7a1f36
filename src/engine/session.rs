//! Decode session: the explicit owner of the external collaborators.
//!
//! A session holds shared read-only handles to the model, tokenizer and
//! optional rescoring LM. Each call builds its own beam state and tree, so a
//! single session can serve concurrent requests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::beam::BeamSearchConfig;
use super::config::DecodeConfig;
use super::decode::{Beam, DecodeOutcome, FinishReason, StepDriver};
use super::error::DecodeError;
use super::model::ModelStep;
use super::rerank::{LanguageModel, LmReranker};
use super::tokenizer::Tokenizer;

/// Final output of [`DecodeSession::correct`].
#[derive(Debug, Clone)]
pub struct Correction {
    pub text: String,
    pub beam: Beam,
    pub finish_reason: FinishReason,
    /// Combined score from the LM reranker, if it ran.
    pub combined_score: Option<f32>,
}

pub struct DecodeSession {
    model: Arc<dyn ModelStep>,
    tokenizer: Arc<dyn Tokenizer>,
    language_model: Option<Arc<dyn LanguageModel>>,
}

impl DecodeSession {
    pub fn new(model: Arc<dyn ModelStep>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { model, tokenizer, language_model: None }
    }

    pub fn with_language_model(mut self, lm: Arc<dyn LanguageModel>) -> Self {
        self.language_model = Some(lm);
        self
    }

    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    /// Beam parameters for a request, with vocabulary and end id taken from
    /// the tokenizer.
    pub fn beam_config(&self, config: &DecodeConfig) -> BeamSearchConfig {
        BeamSearchConfig::new(
            config.beam_width,
            self.tokenizer.model_vocab_size(),
            self.tokenizer.end_token(),
        )
        .with_length_penalty(config.length_penalty_weight)
    }

    /// Beam-search decode from already-framed encoder ids.
    pub async fn decode_ids(
        &self,
        encoder_input: &[u32],
        config: &DecodeConfig,
        cancel: Option<CancellationToken>,
    ) -> Result<DecodeOutcome, DecodeError> {
        config.validate()?;
        let mut driver = StepDriver::new(
            self.model.as_ref(),
            self.beam_config(config),
            config.max_decode_steps,
            self.tokenizer.start_token(),
        );
        if let Some(ms) = config.timeout_ms {
            driver = driver.with_deadline(Instant::now() + Duration::from_millis(ms));
        }
        if let Some(token) = cancel {
            driver = driver.with_cancellation(token);
        }
        driver.run(encoder_input).await
    }

    /// Correct one sentence: frame, decode, select, detokenize.
    pub async fn correct(&self, text: &str, config: &DecodeConfig) -> Result<Correction, DecodeError> {
        self.correct_cancellable(text, config, None).await
    }

    pub async fn correct_cancellable(
        &self,
        text: &str,
        config: &DecodeConfig,
        cancel: Option<CancellationToken>,
    ) -> Result<Correction, DecodeError> {
        let framed = self.tokenizer.frame(text)?;
        let outcome = self.decode_ids(&framed, config, cancel).await?;

        let (beam, combined_score) = match &self.language_model {
            Some(lm) if config.lm_weight != 0.0 => {
                let winner = LmReranker::from_config(config)
                    .rerank(&outcome.beams, self.tokenizer.as_ref(), lm.as_ref())
                    .await?;
                (outcome.beams[winner.slot].clone(), Some(winner.combined))
            }
            _ => {
                let best = outcome
                    .best(config.length_penalty_weight)
                    .ok_or(DecodeError::NoCandidates)?;
                (best.clone(), None)
            }
        };

        let text = self.tokenizer.decode_generated(&beam.token_ids)?;
        Ok(Correction { text, beam, finish_reason: outcome.finish_reason, combined_score })
    }
}
