//! Append-only backpointer tree for sequence reconstruction.
//!
//! Row `t` records, for every beam slot, the token chosen at step `t` and the
//! slot at step `t - 1` it was expanded from. Reconstruction walks parents
//! back to step 0.

use super::beam::BeamSearchOutput;
use super::error::DecodeError;

/// One recorded choice: the emitted token and the slot it extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backpointer {
    pub token_id: u32,
    pub parent_slot: usize,
}

/// Per-step `(token, parent)` rows for a fixed beam width.
#[derive(Debug, Clone)]
pub struct BackpointerTree {
    beam_width: usize,
    rows: Vec<Vec<Backpointer>>,
}

impl BackpointerTree {
    pub fn new(beam_width: usize) -> Self {
        Self { beam_width, rows: Vec::new() }
    }

    /// Append one step's selections.
    pub fn push(&mut self, output: &BeamSearchOutput) -> Result<(), DecodeError> {
        if output.predicted_ids.len() != self.beam_width || output.parent_ids.len() != self.beam_width {
            return Err(DecodeError::ShapeMismatch(format!(
                "step row has {} tokens and {} parents, expected {}",
                output.predicted_ids.len(),
                output.parent_ids.len(),
                self.beam_width
            )));
        }
        let row = output
            .predicted_ids
            .iter()
            .zip(&output.parent_ids)
            .map(|(&token_id, &parent_slot)| Backpointer { token_id, parent_slot })
            .collect();
        self.rows.push(row);
        Ok(())
    }

    /// Number of recorded steps.
    pub fn steps(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rebuild every final slot's full sequence, prefixed with `start_token`.
    ///
    /// An out-of-range parent is an internal invariant violation and is
    /// reported, never clamped.
    pub fn reconstruct(&self, start_token: u32) -> Result<Vec<Vec<u32>>, DecodeError> {
        (0..self.beam_width)
            .map(|slot| self.reconstruct_slot(slot, start_token))
            .collect()
    }

    fn reconstruct_slot(&self, final_slot: usize, start_token: u32) -> Result<Vec<u32>, DecodeError> {
        let mut tokens = Vec::with_capacity(self.rows.len() + 1);
        let mut slot = final_slot;
        for (step, row) in self.rows.iter().enumerate().rev() {
            let entry = row.get(slot).ok_or(DecodeError::Reconstruction {
                step,
                slot: final_slot,
                parent: slot,
                beam_width: self.beam_width,
            })?;
            tokens.push(entry.token_id);
            if entry.parent_slot >= self.beam_width {
                return Err(DecodeError::Reconstruction {
                    step,
                    slot: final_slot,
                    parent: entry.parent_slot,
                    beam_width: self.beam_width,
                });
            }
            slot = entry.parent_slot;
        }
        tokens.push(start_token);
        tokens.reverse();
        Ok(tokens)
    }
}
