// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Trajectory Metrics (SDS / CIS / TC)
// ─────────────────────────────────────────────────────────────────────
//! Scalar diagnostics over the hidden-state trajectory of a generator.
//!
//! - **SDS** (semantic drift score): similarity of the current step to the
//!   previous one. 1.0 = stable, 0.0 = drift.
//! - **CIS** (context influence score): similarity of the current step to
//!   a fixed anchor embedding, optionally sharpened. 1.0 = anchored.
//! - **TC** (trajectory curvature): disagreement between consecutive
//!   displacement vectors. 0.0 = smooth, 1.0 = reversal.
//!
//! Each metric returns its `prior`, clamped to [0, 1], when the history
//! or context it needs is absent. The prior is "unknown so far", not a
//! measured 0.5.
//!
//! A `(1, hidden_dim)` context is a shared anchor: it is compared with
//! every row of a larger batch.
//!
//! The `*_from_pooled` variants take already-pooled (batch, hidden_dim)
//! vectors so that callers retaining pooled history pool each step once.

use ndarray::{Array2, ArrayD};

use trajectory_types::{clamp_score, PoolMode, TrajectoryResult};

use crate::pooling::pool_hidden;
use crate::similarity::{broadcast_rows, ensure_same_shape, remapped_similarity, Remap};

#[inline]
fn fallback(prior: f64) -> TrajectoryResult<f64> {
    Ok(clamp_score(prior, 0.0, 1.0))
}

/// SDS from pooled vectors.
pub fn stability_from_pooled(
    current: &Array2<f64>,
    previous: Option<&Array2<f64>>,
    prior: f64,
) -> TrajectoryResult<f64> {
    match previous {
        None => fallback(prior),
        Some(previous) => remapped_similarity(current, previous, Remap::Linear),
    }
}

/// CIS from a pooled vector.
pub fn alignment_from_pooled(
    current: &Array2<f64>,
    context_emb: Option<&Array2<f64>>,
    prior: f64,
    sharpen: bool,
) -> TrajectoryResult<f64> {
    let Some(context_emb) = context_emb else {
        return fallback(prior);
    };
    let context_emb = broadcast_rows("context embedding", current, context_emb)?;
    let remap = if sharpen { Remap::Sharpened } else { Remap::Linear };
    remapped_similarity(current, &context_emb, remap)
}

/// TC from pooled vectors.
pub fn curvature_from_pooled(
    current: &Array2<f64>,
    previous: Option<&Array2<f64>>,
    previous_previous: Option<&Array2<f64>>,
    prior: f64,
) -> TrajectoryResult<f64> {
    let (Some(previous), Some(previous_previous)) = (previous, previous_previous) else {
        return fallback(prior);
    };
    ensure_same_shape("curvature step t-1", current, previous)?;
    ensure_same_shape("curvature step t-2", previous, previous_previous)?;

    let v1 = current - previous;
    let v0 = previous - previous_previous;
    remapped_similarity(&v1, &v0, Remap::Inverted)
}

/// Semantic drift score (local stability) in [0, 1].
///
/// Returns `prior` when `hidden_prev` is `None` (first step).
pub fn semantic_drift_score(
    hidden_t: &[ArrayD<f64>],
    hidden_prev: Option<&[ArrayD<f64>]>,
    pool: PoolMode,
    prior: f64,
) -> TrajectoryResult<f64> {
    let Some(hidden_prev) = hidden_prev else {
        return fallback(prior);
    };
    let current = pool_hidden(hidden_t, pool)?;
    let previous = pool_hidden(hidden_prev, pool)?;
    stability_from_pooled(&current, Some(&previous), prior)
}

/// Context influence score (anchoring) in [0, 1].
///
/// `context_emb`: (batch, hidden_dim) or a shared (1, hidden_dim)
/// anchor. Returns `prior` when absent.
pub fn context_influence_score(
    hidden_t: &[ArrayD<f64>],
    context_emb: Option<&Array2<f64>>,
    pool: PoolMode,
    prior: f64,
    sharpen: bool,
) -> TrajectoryResult<f64> {
    let Some(context_emb) = context_emb else {
        return fallback(prior);
    };
    let current = pool_hidden(hidden_t, pool)?;
    alignment_from_pooled(&current, Some(context_emb), prior, sharpen)
}

/// Trajectory curvature in [0, 1].
///
/// `1 - cos_to_unit(cos(h_t - h_{t-1}, h_{t-1} - h_{t-2}))`.
/// Returns `prior` unless both history steps are present.
pub fn trajectory_curvature(
    hidden_t: &[ArrayD<f64>],
    hidden_prev: Option<&[ArrayD<f64>]>,
    hidden_prev_prev: Option<&[ArrayD<f64>]>,
    pool: PoolMode,
    prior: f64,
) -> TrajectoryResult<f64> {
    let (Some(hidden_prev), Some(hidden_prev_prev)) = (hidden_prev, hidden_prev_prev) else {
        return fallback(prior);
    };
    let current = pool_hidden(hidden_t, pool)?;
    let previous = pool_hidden(hidden_prev, pool)?;
    let previous_previous = pool_hidden(hidden_prev_prev, pool)?;
    curvature_from_pooled(&current, Some(&previous), Some(&previous_previous), prior)
}
