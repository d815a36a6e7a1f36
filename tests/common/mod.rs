//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use gec_decode::engine::{
    AttentionMasks, DecodeError, LanguageModel, ModelStep, SegmentedSeq2SeqModel, Seq2SeqModel,
    StepInput, StepLogits, Tokenizer, TokenizerError,
};

/// Model whose logits depend only on the step index (prefix length - 1).
///
/// Each script entry is either one row broadcast to every beam, or a full
/// `[beams x vocab]` matrix. Steps past the end of the script repeat the last
/// entry.
pub struct ScriptedModel {
    pub vocab: usize,
    pub script: Vec<Vec<f32>>,
    pub calls: AtomicUsize,
    /// Cancelled when the model is called for this step index.
    pub cancel_at: Option<(usize, CancellationToken)>,
    pub segments_seen: Mutex<Vec<Vec<u32>>>,
}

impl ScriptedModel {
    pub fn new(vocab: usize, script: Vec<Vec<f32>>) -> Self {
        Self {
            vocab,
            script,
            calls: AtomicUsize::new(0),
            cancel_at: None,
            segments_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn cancel_at(mut self, step: usize, token: CancellationToken) -> Self {
        self.cancel_at = Some((step, token));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn logits(&self, prefix: &[Vec<u32>], masks: &AttentionMasks) -> Result<StepLogits, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let batch = prefix.len();
        let len = prefix.first().map(Vec::len).unwrap_or(0);
        if masks.look_ahead.rows != len || masks.look_ahead.batch != batch {
            return Err(DecodeError::ModelStep(format!(
                "look-ahead mask is {}x{}, prefix is {}x{}",
                masks.look_ahead.batch, masks.look_ahead.rows, batch, len
            )));
        }
        let step = len - 1;
        if let Some((at, token)) = &self.cancel_at {
            if *at == step {
                token.cancel();
            }
        }
        let entry = self
            .script
            .get(step)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or_default();
        let logits = if entry.len() == self.vocab {
            entry.repeat(batch)
        } else {
            entry
        };
        Ok(StepLogits::new(logits))
    }
}

#[async_trait]
impl Seq2SeqModel for ScriptedModel {
    async fn forward(
        &self,
        _encoder_input: &[Vec<u32>],
        decoder_prefix: &[Vec<u32>],
        masks: &AttentionMasks,
    ) -> Result<StepLogits, DecodeError> {
        self.logits(decoder_prefix, masks)
    }
}

#[async_trait]
impl SegmentedSeq2SeqModel for ScriptedModel {
    async fn forward(
        &self,
        _encoder_input: &[Vec<u32>],
        segment_ids: &[Vec<u32>],
        decoder_prefix: &[Vec<u32>],
        masks: &AttentionMasks,
    ) -> Result<StepLogits, DecodeError> {
        self.segments_seen.lock().unwrap().extend(segment_ids.iter().cloned());
        self.logits(decoder_prefix, masks)
    }
}

#[async_trait]
impl ModelStep for ScriptedModel {
    async fn step(&self, input: StepInput<'_>) -> Result<StepLogits, DecodeError> {
        self.logits(input.decoder_prefix, input.masks)
    }
}

/// Row of `width` zeros with `token` set to `value`.
pub fn peak(width: usize, token: u32, value: f32) -> Vec<f32> {
    let mut row = vec![0.0; width];
    row[token as usize] = value;
    row
}

/// Whitespace tokenizer over a fixed word list. Index 0 is padding.
pub struct WordTokenizer {
    words: Vec<&'static str>,
}

impl WordTokenizer {
    pub fn new(words: &[&'static str]) -> Self {
        let mut all = vec!["<pad>"];
        all.extend_from_slice(words);
        Self { words: all }
    }

    pub fn id(&self, word: &str) -> u32 {
        self.words.iter().position(|w| *w == word).unwrap() as u32
    }
}

impl Tokenizer for WordTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError> {
        text.split_whitespace()
            .map(|w| {
                self.words
                    .iter()
                    .position(|known| *known == w)
                    .map(|i| i as u32)
                    .ok_or_else(|| TokenizerError::EncodingFailed(format!("unknown word {w:?}")))
            })
            .collect()
    }

    fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        let words: Result<Vec<&str>, _> = ids
            .iter()
            .map(|&id| self.words.get(id as usize).copied().ok_or(TokenizerError::InvalidToken(id)))
            .collect();
        Ok(words?.join(" "))
    }

    fn vocab_size(&self) -> u32 {
        self.words.len() as u32
    }
}

/// LM returning a fixed score per sentence and counting calls.
pub struct TableLm {
    scores: HashMap<String, f32>,
    pub calls: AtomicUsize,
}

impl TableLm {
    pub fn new(entries: &[(&str, f32)]) -> Self {
        Self {
            scores: entries.iter().map(|(t, s)| (t.to_string(), *s)).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LanguageModel for TableLm {
    async fn score(&self, text: &str) -> Result<f32, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.scores
            .get(text)
            .copied()
            .ok_or_else(|| DecodeError::LanguageModel(format!("no score for {text:?}")))
    }
}
