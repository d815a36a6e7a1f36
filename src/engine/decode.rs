//! Beam-search step driver.
//!
//! Runs the decode loop for one request: masks → model step → beam selection
//! → backpointer row → prefix reorder, until every beam has finished, the step
//! budget runs out, or the request is cancelled. Steps are strictly sequential.

use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::backpointer::BackpointerTree;
use super::beam::{penalized_score, BeamSearchConfig, BeamSearchState};
use super::error::DecodeError;
use super::mask::build_masks;
use super::model::{ModelStep, StepInput, StepLogits};
use crate::telemetry::{self, DecodeSpan, SpanExt};

/// One finalized hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Beam {
    /// Raw cumulative log-probability.
    pub log_prob: f32,
    /// Full sequence, starting with the start token.
    pub token_ids: Vec<u32>,
    /// Tokens counted toward the score, start token included.
    pub length: usize,
    pub finished: bool,
}

/// Why the decode loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Every beam emitted the end token.
    AllFinished,
    /// Hit `max_decode_steps`.
    MaxSteps,
    /// Deadline passed or the caller cancelled; beams are partial.
    Cancelled,
    /// Every candidate scored -inf; beams are best-effort.
    Degenerate,
}

impl FinishReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllFinished => "all_finished",
            Self::MaxSteps => "max_steps",
            Self::Cancelled => "cancelled",
            Self::Degenerate => "degenerate",
        }
    }
}

/// Result of one decode request, one beam per slot.
#[derive(Debug, Clone, Serialize)]
pub struct DecodeOutcome {
    pub beams: Vec<Beam>,
    pub finish_reason: FinishReason,
    /// Number of model steps executed.
    pub steps: usize,
    /// Attention weights from the last model step, if the model returned any.
    #[serde(skip)]
    pub attention: Option<Vec<f32>>,
}

impl DecodeOutcome {
    pub fn is_partial(&self) -> bool {
        self.finish_reason == FinishReason::Cancelled
    }

    /// Highest length-penalized beam; ties go to the lower slot.
    pub fn best(&self, length_penalty_weight: f32) -> Option<&Beam> {
        let ranked = |beam: &Beam| penalized_score(beam.log_prob, beam.length, length_penalty_weight);
        self.beams
            .iter()
            .reduce(|best, beam| if ranked(beam) > ranked(best) { beam } else { best })
    }
}

/// Lifecycle of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Init,
    Active,
    Terminated,
    Cancelled,
}

/// Drives one decode request against a [`ModelStep`].
pub struct StepDriver<'a> {
    model: &'a dyn ModelStep,
    config: BeamSearchConfig,
    max_decode_steps: usize,
    start_token: u32,
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
    state: DriverState,
}

impl<'a> StepDriver<'a> {
    pub fn new(
        model: &'a dyn ModelStep,
        config: BeamSearchConfig,
        max_decode_steps: usize,
        start_token: u32,
    ) -> Self {
        Self {
            model,
            config,
            max_decode_steps,
            start_token,
            deadline: None,
            cancel: None,
            state: DriverState::Init,
        }
    }

    /// Stop at the first step boundary after `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Stop at the first step boundary after `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Decode from a single source sequence (replicated across beams).
    pub async fn run(&mut self, encoder_input: &[u32]) -> Result<DecodeOutcome, DecodeError> {
        let span = DecodeSpan::new(&Uuid::new_v4().to_string(), self.config.beam_width);
        let start = Instant::now();

        let result = self.run_loop(encoder_input).instrument(span.clone()).await;

        let latency_ms = start.elapsed().as_millis() as u64;
        span.record_result(&result);
        span.record("latency_ms", latency_ms);
        match &result {
            Ok(outcome) => {
                span.record("steps", outcome.steps);
                span.record("finish_reason", outcome.finish_reason.as_str());
                telemetry::record_decode_success(outcome.finish_reason.as_str(), outcome.steps, latency_ms);
            }
            Err(e) => telemetry::record_decode_failure(e.kind()),
        }
        result
    }

    async fn run_loop(&mut self, encoder_input: &[u32]) -> Result<DecodeOutcome, DecodeError> {
        self.init()?;

        let width = self.config.beam_width;
        let vocab = self.config.vocab_size;
        let encoder_batch = vec![encoder_input.to_vec(); width];
        let mut prefixes = vec![vec![self.start_token]; width];
        let mut beams = BeamSearchState::new(width);
        let mut tree = BackpointerTree::new(width);
        let mut finish_reason = FinishReason::MaxSteps;
        let mut last_attention = None;

        self.state = DriverState::Active;
        for step in 0..self.max_decode_steps {
            let masks = build_masks(&encoder_batch, &prefixes)?;
            let input = StepInput {
                encoder_input: &encoder_batch,
                decoder_prefix: &prefixes,
                masks: &masks,
            };
            let StepLogits { logits, attention } = self.model.step(input).await?;
            if logits.len() != width * vocab {
                return Err(DecodeError::ModelStep(format!(
                    "model returned {} logits at step {}, expected {} ({} beams x {} vocab)",
                    logits.len(),
                    step,
                    width * vocab,
                    width,
                    vocab
                )));
            }

            let selected = match beams.advance(&self.config, &logits) {
                Ok(selected) => selected,
                Err(DecodeError::AllBeamsDegenerate) => {
                    tracing::warn!(step, "all candidates scored -inf, returning best-effort beams");
                    finish_reason = FinishReason::Degenerate;
                    break;
                }
                Err(e) => return Err(e),
            };
            tree.push(&selected)?;
            last_attention = attention;

            prefixes = selected
                .parent_ids
                .iter()
                .zip(&selected.predicted_ids)
                .map(|(&parent, &token)| {
                    let mut row = prefixes[parent].clone();
                    row.push(token);
                    row
                })
                .collect();

            tracing::debug!(
                step,
                finished = beams.finished.iter().filter(|&&f| f).count(),
                best_log_prob = beams.log_probs[0],
                "decode step"
            );

            if self.cancellation_requested() {
                tracing::warn!(step, "decode cancelled at step boundary, returning partial beams");
                self.state = DriverState::Cancelled;
                finish_reason = FinishReason::Cancelled;
                break;
            }
            if beams.all_finished() {
                finish_reason = FinishReason::AllFinished;
                break;
            }
        }
        if self.state == DriverState::Active {
            self.state = DriverState::Terminated;
        }

        let sequences = tree.reconstruct(self.start_token)?;
        let beams: Vec<Beam> = sequences
            .into_iter()
            .enumerate()
            .map(|(slot, token_ids)| Beam {
                log_prob: beams.log_probs[slot],
                token_ids,
                length: beams.lengths[slot],
                finished: beams.finished[slot],
            })
            .collect();

        tracing::info!(
            steps = tree.steps(),
            finish_reason = finish_reason.as_str(),
            "decode finished"
        );
        Ok(DecodeOutcome {
            beams,
            finish_reason,
            steps: tree.steps(),
            attention: last_attention,
        })
    }

    fn init(&mut self) -> Result<(), DecodeError> {
        if self.state != DriverState::Init {
            return Err(DecodeError::Config("step driver has already run".into()));
        }
        if self.max_decode_steps == 0 {
            return Err(DecodeError::Config("max_decode_steps must be >= 1".into()));
        }
        self.config.validate()
    }

    fn cancellation_requested(&self) -> bool {
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        let cancelled = self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled);
        expired || cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns the same logits row for every beam at every step.
    struct Fixed {
        row: Vec<f32>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelStep for Fixed {
        async fn step(&self, input: StepInput<'_>) -> Result<StepLogits, DecodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(StepLogits::new(self.row.repeat(input.batch())))
        }
    }

    struct Failing;

    #[async_trait]
    impl ModelStep for Failing {
        async fn step(&self, _input: StepInput<'_>) -> Result<StepLogits, DecodeError> {
            Err(DecodeError::ModelStep("accelerator unavailable".into()))
        }
    }

    #[tokio::test]
    async fn runs_to_max_steps_without_eos() {
        let model = Fixed { row: vec![0.0, 5.0, 0.0, 0.0], calls: AtomicUsize::new(0) };
        let mut driver = StepDriver::new(&model, BeamSearchConfig::new(1, 4, 3), 4, 2);

        let outcome = driver.run(&[1, 1]).await.unwrap();

        assert_eq!(outcome.finish_reason, FinishReason::MaxSteps);
        assert_eq!(outcome.steps, 4);
        assert_eq!(outcome.beams[0].token_ids, vec![2, 1, 1, 1, 1]);
        assert_eq!(outcome.beams[0].length, 5);
        assert!(!outcome.beams[0].finished);
        assert_eq!(driver.state(), DriverState::Terminated);
    }

    #[tokio::test]
    async fn model_errors_propagate_verbatim() {
        let mut driver = StepDriver::new(&Failing, BeamSearchConfig::new(2, 4, 3), 4, 2);
        let err = driver.run(&[1]).await.unwrap_err();
        assert_eq!(err.to_string(), "Model step failed: accelerator unavailable");
    }

    #[tokio::test]
    async fn misshaped_logits_are_model_step_errors() {
        let model = Fixed { row: vec![0.0; 3], calls: AtomicUsize::new(0) };
        let mut driver = StepDriver::new(&model, BeamSearchConfig::new(2, 4, 3), 4, 2);
        assert!(matches!(driver.run(&[1]).await, Err(DecodeError::ModelStep(_))));
    }

    #[tokio::test]
    async fn invalid_config_fails_before_model_call() {
        let model = Fixed { row: vec![0.0; 4], calls: AtomicUsize::new(0) };
        let mut driver = StepDriver::new(&model, BeamSearchConfig::new(0, 4, 3), 4, 2);
        assert!(matches!(driver.run(&[1]).await, Err(DecodeError::Config(_))));

        let mut driver = StepDriver::new(&model, BeamSearchConfig::new(1, 4, 3), 0, 2);
        assert!(matches!(driver.run(&[1]).await, Err(DecodeError::Config(_))));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn driver_runs_only_once() {
        let model = Fixed { row: vec![0.0, 0.0, 0.0, 9.0], calls: AtomicUsize::new(0) };
        let mut driver = StepDriver::new(&model, BeamSearchConfig::new(1, 4, 3), 4, 2);
        driver.run(&[1]).await.unwrap();
        assert!(matches!(driver.run(&[1]).await, Err(DecodeError::Config(_))));
    }

    struct WithAttention;

    #[async_trait]
    impl ModelStep for WithAttention {
        async fn step(&self, input: StepInput<'_>) -> Result<StepLogits, DecodeError> {
            let len = input.decoder_prefix[0].len();
            Ok(StepLogits {
                logits: vec![0.0, 1.0, 0.0, 0.0].repeat(input.batch()),
                attention: Some(vec![len as f32]),
            })
        }
    }

    #[tokio::test]
    async fn last_step_attention_is_passed_through() {
        let mut driver = StepDriver::new(&WithAttention, BeamSearchConfig::new(1, 4, 3), 3, 2);
        let outcome = driver.run(&[1]).await.unwrap();
        assert_eq!(outcome.attention, Some(vec![3.0]));
    }

    #[tokio::test]
    async fn degenerate_logits_return_best_effort() {
        let model = Fixed { row: vec![f32::NEG_INFINITY; 4], calls: AtomicUsize::new(0) };
        let mut driver = StepDriver::new(&model, BeamSearchConfig::new(2, 4, 3), 10, 2);

        let outcome = driver.run(&[1]).await.unwrap();

        assert_eq!(outcome.finish_reason, FinishReason::Degenerate);
        assert_eq!(outcome.steps, 0);
        assert_eq!(outcome.beams.len(), 2);
        assert!(outcome.beams.iter().all(|b| b.token_ids == vec![2]));
    }

    #[test]
    fn best_prefers_lower_slot_on_tie() {
        let beam = |log_prob: f32, length: usize| Beam {
            log_prob,
            token_ids: vec![0; length],
            length,
            finished: true,
        };
        let outcome = DecodeOutcome {
            beams: vec![beam(-2.0, 3), beam(-1.0, 3), beam(-1.0, 3)],
            finish_reason: FinishReason::AllFinished,
            steps: 2,
            attention: None,
        };
        let best = outcome.best(0.0).unwrap();
        assert!(std::ptr::eq(best, &outcome.beams[1]));
    }
}
