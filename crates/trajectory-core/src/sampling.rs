// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Trajectory-Regularized Sampling
// ─────────────────────────────────────────────────────────────────────
//! Temperature-scaled softmax with an optional leash toward the
//! previous step's distribution.
//!
//! The sampler never fails on numerically degenerate input: a
//! non-positive temperature degrades to 1.0, a vanishing one tends to
//! argmax rather than overflowing, the mixing weight is
//! clamped to [0, 1], and distribution sums are floored before
//! renormalisation. Only shape violations are errors.

use ndarray::{Array2, ArrayD, ArrayView2, Axis, Ix2};

use trajectory_types::config::PROB_EPSILON;
use trajectory_types::{clamp_score, TrajectoryError, TrajectoryResult};

use crate::similarity::broadcast_rows;

/// Row-wise softmax with the row maximum subtracted before `exp`.
///
/// A row whose exponentials do not sum to a positive finite value
/// (all `-inf`, or containing NaN) becomes uniform.
pub fn stable_softmax(logits: &Array2<f64>) -> Array2<f64> {
    tempered_softmax(logits.view(), 1.0)
}

/// `softmax(logits / temperature)` for a positive `temperature`.
///
/// The row maximum is subtracted *before* dividing, so a tiny
/// temperature drives every non-maximal entry to `-inf` instead of
/// overflowing the maximum to `+inf`. Rows holding `+inf` split all
/// mass evenly among those entries.
fn tempered_softmax(logits: ArrayView2<'_, f64>, temperature: f64) -> Array2<f64> {
    let mut probs = logits.to_owned();
    for mut row in probs.axis_iter_mut(Axis(0)) {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max == f64::INFINITY {
            let ties = row.iter().filter(|v| **v == f64::INFINITY).count() as f64;
            row.mapv_inplace(|v| if v == f64::INFINITY { 1.0 / ties } else { 0.0 });
            continue;
        }
        row.mapv_inplace(|v| ((v - max) / temperature).exp());
        let sum = row.sum();
        if sum > 0.0 && sum.is_finite() {
            row /= sum;
        } else {
            let width = row.len() as f64;
            row.fill(1.0 / width);
        }
    }
    probs
}

/// `(1 - lambda) * p + lambda * q`, renormalised row-wise.
///
/// `lambda` is clamped to [0, 1] (NaN counts as 0). Each row sum is
/// floored at `PROB_EPSILON` so two all-zero inputs yield zeros, not NaN.
/// A single-row `q` is shared by every row of `p`.
pub fn mix_distributions(
    p: &Array2<f64>,
    q: &Array2<f64>,
    lambda: f64,
) -> TrajectoryResult<Array2<f64>> {
    let q = broadcast_rows("mixed distributions", p, q)?;
    let lambda = clamp_score(lambda, 0.0, 1.0);

    let mut r = p * (1.0 - lambda) + &*q * lambda;
    for mut row in r.axis_iter_mut(Axis(0)) {
        let sum = row.sum().max(PROB_EPSILON);
        row /= sum;
    }
    Ok(r)
}

/// Apply temperature and, when `mix_lambda != 0` and a previous
/// distribution is supplied, mix toward it.
///
/// `logits` must be rank-2 (batch, vocab). Returns
/// `(log_probs, probs)`: `log_probs = ln(max(probs, 1e-12))` for
/// log-probability accounting, `probs` for retention as the next step's
/// prior distribution.
pub fn trajectory_regularized_logits(
    logits: &ArrayD<f64>,
    temperature: f64,
    prev_probs: Option<&Array2<f64>>,
    mix_lambda: f64,
) -> TrajectoryResult<(Array2<f64>, Array2<f64>)> {
    let logits = logits.view().into_dimensionality::<Ix2>().map_err(|_| {
        TrajectoryError::Shape(format!(
            "expected logits shape (batch, vocab); got {:?}",
            logits.shape()
        ))
    })?;

    let temperature = if temperature > 0.0 {
        temperature
    } else {
        log::debug!("non-positive temperature {temperature}, using 1.0");
        1.0
    };

    let mut probs = tempered_softmax(logits, temperature);

    if mix_lambda != 0.0 {
        if let Some(prev_probs) = prev_probs {
            probs = mix_distributions(&probs, prev_probs, mix_lambda)?;
        }
    }

    let log_probs = probs.mapv(|p| p.max(PROB_EPSILON).ln());
    Ok((log_probs, probs))
}
