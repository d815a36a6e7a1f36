//! Attention mask construction for autoregressive decoding.
//!
//! Masks are flat `f32` buffers with an explicit `[batch, rows, cols]` shape.
//! A value of 1.0 marks a position that must not be attended to.

use super::error::DecodeError;
use super::tokenizer::PAD_TOKEN_ID;

/// Dense 3-D mask, row-major over `[batch, rows, cols]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pub batch: usize,
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl Mask {
    fn zeros(batch: usize, rows: usize, cols: usize) -> Self {
        Self { batch, rows, cols, data: vec![0.0; batch * rows * cols] }
    }

    #[inline]
    fn offset(&self, b: usize, i: usize, j: usize) -> usize {
        (b * self.rows + i) * self.cols + j
    }

    /// Value at `[b, i, j]`.
    pub fn get(&self, b: usize, i: usize, j: usize) -> f32 {
        self.data[self.offset(b, i, j)]
    }

    /// True if `[b, i, j]` is masked out.
    pub fn is_masked(&self, b: usize, i: usize, j: usize) -> bool {
        self.get(b, i, j) > 0.0
    }
}

/// The three masks consumed by an encoder-decoder step.
#[derive(Debug, Clone, PartialEq)]
pub struct AttentionMasks {
    /// `[batch, 1, src_len]`: source padding for encoder self-attention.
    pub encoder_padding: Mask,
    /// `[batch, tgt_len, tgt_len]`: target padding combined with the causal mask.
    pub look_ahead: Mask,
    /// `[batch, 1, src_len]`: source padding reused for cross-attention.
    pub decoder_padding: Mask,
}

/// Build all masks for one decode step.
pub fn build_masks(source: &[Vec<u32>], target: &[Vec<u32>]) -> Result<AttentionMasks, DecodeError> {
    if source.len() != target.len() {
        return Err(DecodeError::ShapeMismatch(format!(
            "source batch {} != target batch {}",
            source.len(),
            target.len()
        )));
    }
    let encoder_padding = padding_mask(source)?;
    let target_padding = padding_mask(target)?;
    let look_ahead = combine_look_ahead(&target_padding);
    let decoder_padding = encoder_padding.clone();

    Ok(AttentionMasks { encoder_padding, look_ahead, decoder_padding })
}

/// `[batch, 1, len]` mask with 1.0 wherever the id is padding.
pub fn padding_mask(rows: &[Vec<u32>]) -> Result<Mask, DecodeError> {
    let len = uniform_len(rows)?;
    let mut mask = Mask::zeros(rows.len(), 1, len);
    for (b, row) in rows.iter().enumerate() {
        for (j, &id) in row.iter().enumerate() {
            if id == PAD_TOKEN_ID {
                let at = mask.offset(b, 0, j);
                mask.data[at] = 1.0;
            }
        }
    }
    Ok(mask)
}

/// `[len, len]` mask with 1.0 strictly above the diagonal.
pub fn causal_mask(len: usize) -> Vec<f32> {
    let mut mask = vec![0.0; len * len];
    for i in 0..len {
        for j in (i + 1)..len {
            mask[i * len + j] = 1.0;
        }
    }
    mask
}

fn combine_look_ahead(target_padding: &Mask) -> Mask {
    let len = target_padding.cols;
    let causal = causal_mask(len);
    let mut mask = Mask::zeros(target_padding.batch, len, len);
    for b in 0..target_padding.batch {
        for i in 0..len {
            for j in 0..len {
                let value = causal[i * len + j].max(target_padding.get(b, 0, j));
                let at = mask.offset(b, i, j);
                mask.data[at] = value;
            }
        }
    }
    mask
}

fn uniform_len(rows: &[Vec<u32>]) -> Result<usize, DecodeError> {
    let first = rows
        .first()
        .ok_or_else(|| DecodeError::ShapeMismatch("empty batch".into()))?
        .len();
    if let Some((b, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != first) {
        return Err(DecodeError::ShapeMismatch(format!(
            "row {} has length {}, expected {}",
            b,
            row.len(),
            first
        )));
    }
    Ok(first)
}
