// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Similarity Pipeline
// ─────────────────────────────────────────────────────────────────────
//! Shared normalise → batch-mean cosine → [0, 1] remap pipeline used by
//! all three trajectory metrics.
//!
//! Cosine similarity is averaged across the batch *before* it is mapped
//! into [0, 1]; the remap is applied once to the batch mean.
//!
//! A non-zero row compared with an identical row has cosine exactly 1,
//! independent of rounding in the normalisation.

use std::borrow::Cow;

use ndarray::{Array2, Axis};

use trajectory_types::config::{CIS_SHARPEN_LINEAR, CIS_SHARPEN_QUADRATIC, NORM_EPSILON};
use trajectory_types::{clamp_score, TrajectoryError, TrajectoryResult};

/// Map a cosine similarity from [-1, 1] to [0, 1] via `0.5 * (cos + 1)`.
///
/// Zero similarity lands on exactly 0.5. Values pushed slightly outside
/// [-1, 1] by rounding are clamped back.
#[inline]
pub fn cos_to_unit(cos_sim: f64) -> f64 {
    clamp_score(0.5 * (cos_sim + 1.0), 0.0, 1.0)
}

/// Final stage applied to the [0, 1] similarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remap {
    /// Identity: high = similar.
    Linear,
    /// `0.4x + 0.6x²`: pushes weak alignment toward 0 faster than linear.
    Sharpened,
    /// `1 - x`: high = directions disagree.
    Inverted,
}

impl Remap {
    pub fn apply(self, unit: f64) -> f64 {
        let unit = clamp_score(unit, 0.0, 1.0);
        let y = match self {
            Remap::Linear => unit,
            Remap::Sharpened => CIS_SHARPEN_LINEAR * unit + CIS_SHARPEN_QUADRATIC * unit * unit,
            Remap::Inverted => 1.0 - unit,
        };
        clamp_score(y, 0.0, 1.0)
    }
}

pub(crate) fn ensure_same_shape(
    what: &str,
    a: &Array2<f64>,
    b: &Array2<f64>,
) -> TrajectoryResult<()> {
    if a.dim() != b.dim() {
        return Err(TrajectoryError::Shape(format!(
            "{what}: shape {:?} does not match {:?}",
            a.dim(),
            b.dim()
        )));
    }
    Ok(())
}

/// Stretch a single-row `operand` across the batch of `target`.
///
/// An operand already shaped like `target` is borrowed as is. A `(1, D)`
/// operand against a `(B, D)` target is repeated `B` times. Anything
/// else is a shape error.
pub(crate) fn broadcast_rows<'a>(
    what: &str,
    target: &Array2<f64>,
    operand: &'a Array2<f64>,
) -> TrajectoryResult<Cow<'a, Array2<f64>>> {
    if operand.dim() == target.dim() {
        return Ok(Cow::Borrowed(operand));
    }
    if operand.nrows() == 1 && operand.ncols() == target.ncols() {
        if let Some(view) = operand.broadcast(target.raw_dim()) {
            return Ok(Cow::Owned(view.to_owned()));
        }
    }
    Err(TrajectoryError::Shape(format!(
        "{what}: shape {:?} cannot broadcast to {:?}",
        operand.dim(),
        target.dim()
    )))
}

/// L2-normalise every row, flooring the norm at `NORM_EPSILON`.
///
/// A zero row stays zero rather than becoming NaN.
pub fn normalize_rows(a: &Array2<f64>) -> Array2<f64> {
    let mut out = a.to_owned();
    for mut row in out.rows_mut() {
        let norm = row.dot(&row).sqrt().max(NORM_EPSILON);
        row /= norm;
    }
    out
}

/// Batch-mean cosine similarity between matching rows of `a` and `b`.
pub fn mean_cosine(a: &Array2<f64>, b: &Array2<f64>) -> TrajectoryResult<f64> {
    ensure_same_shape("cosine operands", a, b)?;
    let mut cos = (&normalize_rows(a) * &normalize_rows(b)).sum_axis(Axis(1));
    for ((c, row_a), row_b) in cos.iter_mut().zip(a.rows()).zip(b.rows()) {
        if row_a == row_b && row_a.dot(&row_a).sqrt() > NORM_EPSILON {
            *c = 1.0;
        }
    }
    cos.mean()
        .ok_or_else(|| TrajectoryError::shape("cosine operands: empty batch"))
}

/// The full metric pipeline: normalise, batch-mean cosine, map to
/// [0, 1], then apply `remap`.
pub fn remapped_similarity(a: &Array2<f64>, b: &Array2<f64>, remap: Remap) -> TrajectoryResult<f64> {
    let cos = mean_cosine(a, b)?;
    Ok(remap.apply(cos_to_unit(cos)))
}
