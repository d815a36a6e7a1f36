//! Next-token scoring capability.
//!
//! The decoder only ever sees [`ModelStep`]. Concrete encoder-decoder models
//! plug in through one of two adapters: [`PlainEncoder`] for models that take
//! raw source ids, and [`PretrainedEncoderAdapter`] for models whose encoder
//! is a pretrained network that also expects segment ids.

use async_trait::async_trait;

use super::error::DecodeError;
use super::mask::AttentionMasks;

/// Inputs for one decode step. Every field holds one row per beam.
#[derive(Debug, Clone, Copy)]
pub struct StepInput<'a> {
    pub encoder_input: &'a [Vec<u32>],
    pub decoder_prefix: &'a [Vec<u32>],
    pub masks: &'a AttentionMasks,
}

impl StepInput<'_> {
    pub fn batch(&self) -> usize {
        self.decoder_prefix.len()
    }
}

/// Last-position scores for every beam.
#[derive(Debug, Clone, Default)]
pub struct StepLogits {
    /// Row-major `[beam_width × vocab]` raw scores.
    pub logits: Vec<f32>,
    /// Opaque attention weights, passed through untouched when present.
    pub attention: Option<Vec<f32>>,
}

impl StepLogits {
    pub fn new(logits: Vec<f32>) -> Self {
        Self { logits, attention: None }
    }
}

/// Scores the next token for every beam in a single batched call.
#[async_trait]
pub trait ModelStep: Send + Sync {
    async fn step(&self, input: StepInput<'_>) -> Result<StepLogits, DecodeError>;
}

/// Encoder-decoder model fed with raw source ids.
#[async_trait]
pub trait Seq2SeqModel: Send + Sync {
    async fn forward(
        &self,
        encoder_input: &[Vec<u32>],
        decoder_prefix: &[Vec<u32>],
        masks: &AttentionMasks,
    ) -> Result<StepLogits, DecodeError>;
}

/// Encoder-decoder model whose encoder additionally takes segment ids.
#[async_trait]
pub trait SegmentedSeq2SeqModel: Send + Sync {
    async fn forward(
        &self,
        encoder_input: &[Vec<u32>],
        segment_ids: &[Vec<u32>],
        decoder_prefix: &[Vec<u32>],
        masks: &AttentionMasks,
    ) -> Result<StepLogits, DecodeError>;
}

/// Adapter for a plain transformer encoder.
#[derive(Debug)]
pub struct PlainEncoder<M> {
    model: M,
}

impl<M: Seq2SeqModel> PlainEncoder<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn inner(&self) -> &M {
        &self.model
    }
}

#[async_trait]
impl<M: Seq2SeqModel> ModelStep for PlainEncoder<M> {
    async fn step(&self, input: StepInput<'_>) -> Result<StepLogits, DecodeError> {
        self.model
            .forward(input.encoder_input, input.decoder_prefix, input.masks)
            .await
    }
}

/// Adapter for a pretrained encoder; supplies single-segment (all zero) ids.
#[derive(Debug)]
pub struct PretrainedEncoderAdapter<M> {
    model: M,
}

impl<M: SegmentedSeq2SeqModel> PretrainedEncoderAdapter<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn inner(&self) -> &M {
        &self.model
    }
}

#[async_trait]
impl<M: SegmentedSeq2SeqModel> ModelStep for PretrainedEncoderAdapter<M> {
    async fn step(&self, input: StepInput<'_>) -> Result<StepLogits, DecodeError> {
        let segment_ids: Vec<Vec<u32>> = input
            .encoder_input
            .iter()
            .map(|row| vec![0; row.len()])
            .collect();
        self.model
            .forward(input.encoder_input, &segment_ids, input.decoder_prefix, input.masks)
            .await
    }
}
