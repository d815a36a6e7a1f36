//! Beam state tracking and per-step candidate selection.
//!
//! One call to [`BeamSearchState::advance`] consumes a `[beam_width × vocab]`
//! logit matrix and re-binds every beam slot to the candidate that won it.
//! Scores stored in the state are always raw cumulative log-probabilities;
//! the length penalty only affects ranking.

use std::fmt;
use std::sync::Arc;

use super::error::DecodeError;
use super::tokenizer::PAD_TOKEN_ID;

/// Custom ranking policy over the flattened candidate scores.
pub trait CandidateSelector: Send + Sync {
    /// Return `k` distinct flattened indices into `ranking`, best first.
    fn select(&self, ranking: &[f32], k: usize) -> Vec<usize>;
}

/// How the top `beam_width` candidates are chosen each step.
#[derive(Clone, Default)]
pub enum SelectionStrategy {
    /// Highest ranking score wins; ties go to the lower flattened index.
    #[default]
    TopK,
    Custom(Arc<dyn CandidateSelector>),
}

impl fmt::Debug for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TopK => f.write_str("TopK"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl SelectionStrategy {
    fn select(&self, ranking: &[f32], k: usize) -> Result<Vec<usize>, DecodeError> {
        let picked = match self {
            Self::TopK => return Ok(top_k(ranking, k)),
            Self::Custom(selector) => selector.select(ranking, k),
        };
        if picked.len() != k {
            return Err(DecodeError::ShapeMismatch(format!(
                "selector returned {} candidates, expected {}",
                picked.len(),
                k
            )));
        }
        let mut seen = vec![false; ranking.len()];
        for &idx in &picked {
            if idx >= ranking.len() || seen[idx] {
                return Err(DecodeError::ShapeMismatch(format!(
                    "selector returned invalid or duplicate index {idx}"
                )));
            }
            seen[idx] = true;
        }
        Ok(picked)
    }
}

/// Indices of the `k` largest scores, best first. Ties prefer the lower index.
pub fn top_k(ranking: &[f32], k: usize) -> Vec<usize> {
    let k = k.min(ranking.len());
    if k == 0 {
        return Vec::new();
    }
    let order = |a: &usize, b: &usize| ranking[*b].total_cmp(&ranking[*a]).then(a.cmp(b));
    let mut indices: Vec<usize> = (0..ranking.len()).collect();
    if k < indices.len() {
        indices.select_nth_unstable_by(k - 1, order);
        indices.truncate(k);
    }
    indices.sort_unstable_by(order);
    indices
}

/// GNMT length penalty: `((5 + len) / 6) ^ weight`.
pub fn length_penalty(length: usize, weight: f32) -> f32 {
    ((5.0 + length as f32) / 6.0).powf(weight)
}

/// Ranking score of a hypothesis: `log_prob / length_penalty` when the
/// weight is positive, the raw score otherwise.
pub fn penalized_score(log_prob: f32, length: usize, weight: f32) -> f32 {
    if weight > 0.0 {
        log_prob / length_penalty(length, weight)
    } else {
        log_prob
    }
}

/// Numerically stable log-softmax over one logit row.
///
/// A row that is entirely `-inf` stays `-inf`. NaN or `+inf` logits are
/// rejected as a malformed model response.
pub fn log_softmax(row: &[f32]) -> Result<Vec<f32>, DecodeError> {
    if let Some(bad) = row.iter().find(|x| x.is_nan() || **x == f32::INFINITY) {
        return Err(DecodeError::ModelStep(format!("non-finite logit {bad}")));
    }
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return Ok(vec![f32::NEG_INFINITY; row.len()]);
    }
    let sum: f32 = row.iter().map(|x| (x - max).exp()).sum();
    let log_z = max + sum.ln();
    Ok(row.iter().map(|x| x - log_z).collect())
}

/// Search parameters fixed for one decode request.
#[derive(Debug, Clone)]
pub struct BeamSearchConfig {
    pub beam_width: usize,
    /// Width of one logit row.
    pub vocab_size: usize,
    pub eos_token_id: u32,
    /// Token emitted by finished beams.
    pub pad_token_id: u32,
    pub length_penalty_weight: f32,
    pub selection_strategy: SelectionStrategy,
}

impl BeamSearchConfig {
    pub fn new(beam_width: usize, vocab_size: usize, eos_token_id: u32) -> Self {
        Self {
            beam_width,
            vocab_size,
            eos_token_id,
            pad_token_id: PAD_TOKEN_ID,
            length_penalty_weight: 0.0,
            selection_strategy: SelectionStrategy::TopK,
        }
    }

    pub fn with_length_penalty(mut self, weight: f32) -> Self {
        self.length_penalty_weight = weight;
        self
    }

    pub fn with_selection(mut self, strategy: SelectionStrategy) -> Self {
        self.selection_strategy = strategy;
        self
    }

    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.beam_width == 0 {
            return Err(DecodeError::Config("beam_width must be >= 1".into()));
        }
        if self.vocab_size == 0 {
            return Err(DecodeError::Config("vocab_size must be >= 1".into()));
        }
        if self.eos_token_id as usize >= self.vocab_size || self.pad_token_id as usize >= self.vocab_size {
            return Err(DecodeError::Config(format!(
                "eos ({}) and pad ({}) must be < vocab_size ({})",
                self.eos_token_id, self.pad_token_id, self.vocab_size
            )));
        }
        if !self.length_penalty_weight.is_finite() || self.length_penalty_weight < 0.0 {
            return Err(DecodeError::Config(
                "length_penalty_weight must be finite and >= 0".into(),
            ));
        }
        Ok(())
    }
}

/// Per-step selection result, one entry per beam slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeamSearchOutput {
    pub predicted_ids: Vec<u32>,
    pub parent_ids: Vec<usize>,
}

/// Positional per-slot beam state.
#[derive(Debug, Clone, PartialEq)]
pub struct BeamSearchState {
    pub log_probs: Vec<f32>,
    pub lengths: Vec<usize>,
    pub finished: Vec<bool>,
}

impl BeamSearchState {
    /// Every slot holds just the start token: score 0, length 1, alive.
    pub fn new(beam_width: usize) -> Self {
        Self {
            log_probs: vec![0.0; beam_width],
            lengths: vec![1; beam_width],
            finished: vec![false; beam_width],
        }
    }

    pub fn beam_width(&self) -> usize {
        self.log_probs.len()
    }

    pub fn all_finished(&self) -> bool {
        self.finished.iter().all(|&f| f)
    }

    /// Consume one step of logits and select the next beams.
    ///
    /// Live slots of length 1 all hold the bare start prefix; only the lowest
    /// of them is expanded, so the first step branches instead of filling
    /// every slot with the same hypothesis.
    ///
    /// On error the state is left unchanged.
    pub fn advance(
        &mut self,
        config: &BeamSearchConfig,
        logits: &[f32],
    ) -> Result<BeamSearchOutput, DecodeError> {
        config.validate()?;
        let width = config.beam_width;
        let vocab = config.vocab_size;
        if self.beam_width() != width || self.lengths.len() != width || self.finished.len() != width {
            return Err(DecodeError::ShapeMismatch(format!(
                "state holds {} beams, config expects {}",
                self.beam_width(),
                width
            )));
        }
        if logits.len() != width * vocab {
            return Err(DecodeError::ShapeMismatch(format!(
                "expected {} logits ({} x {}), got {}",
                width * vocab,
                width,
                vocab,
                logits.len()
            )));
        }

        if let Some((idx, bad)) = logits
            .iter()
            .enumerate()
            .find(|(_, x)| x.is_nan() || **x == f32::INFINITY)
        {
            return Err(DecodeError::ModelStep(format!(
                "non-finite logit {bad} for beam {} token {}",
                idx / vocab,
                idx % vocab
            )));
        }

        let weight = config.length_penalty_weight;
        let pad = config.pad_token_id as usize;
        let seed = (0..width).find(|&i| self.lengths[i] == 1 && !self.finished[i]);
        let mut scores = Vec::with_capacity(width * vocab);
        let mut ranking = Vec::with_capacity(width * vocab);

        for (beam, row) in logits.chunks_exact(vocab).enumerate() {
            let base = self.log_probs[beam];
            let (row_scores, candidate_len) = if self.finished[beam] {
                let frozen = (0..vocab)
                    .map(|tok| if tok == pad { base } else { f32::NEG_INFINITY })
                    .collect::<Vec<_>>();
                (frozen, self.lengths[beam])
            } else if self.lengths[beam] == 1 && seed != Some(beam) {
                (vec![f32::NEG_INFINITY; vocab], 2)
            } else {
                let extended = log_softmax(row)?.into_iter().map(|lp| lp + base).collect();
                (extended, self.lengths[beam] + 1)
            };
            ranking.extend(row_scores.iter().map(|&s| penalized_score(s, candidate_len, weight)));
            scores.extend(row_scores);
        }

        if ranking.iter().all(|&r| r == f32::NEG_INFINITY) {
            return Err(DecodeError::AllBeamsDegenerate);
        }

        let picked = config.selection_strategy.select(&ranking, width)?;

        let mut output = BeamSearchOutput {
            predicted_ids: Vec::with_capacity(width),
            parent_ids: Vec::with_capacity(width),
        };
        let mut next = BeamSearchState {
            log_probs: Vec::with_capacity(width),
            lengths: Vec::with_capacity(width),
            finished: Vec::with_capacity(width),
        };
        for idx in picked {
            let parent = idx / vocab;
            let token = (idx % vocab) as u32;
            let parent_finished = self.finished[parent];

            output.parent_ids.push(parent);
            output.predicted_ids.push(token);
            next.log_probs.push(scores[idx]);
            next.lengths.push(self.lengths[parent] + usize::from(!parent_finished));
            next.finished.push(parent_finished || token == config.eos_token_id);
        }

        *self = next;
        Ok(output)
    }
}
