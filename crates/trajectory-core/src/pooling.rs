// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Layer Pooler
// ─────────────────────────────────────────────────────────────────────
//! Collapses a per-layer set of hidden-state tensors into one
//! (batch, hidden_dim) vector per step.
//!
//! Each layer is pooled over its sequence axis, then the per-layer
//! results are averaged with equal weight.

use ndarray::{Array2, ArrayD, ArrayView3, Axis, Ix3};

use trajectory_types::{PoolMode, TrajectoryError, TrajectoryResult};

/// Pool a single (batch, seq_len, hidden_dim) layer to (batch, hidden_dim).
fn pool_layer(index: usize, layer: &ArrayD<f64>, mode: PoolMode) -> TrajectoryResult<Array2<f64>> {
    let layer: ArrayView3<'_, f64> = layer.view().into_dimensionality::<Ix3>().map_err(|_| {
        TrajectoryError::Shape(format!(
            "layer {index}: expected hidden state with shape (batch, seq, dim); got {:?}",
            layer.shape()
        ))
    })?;
    let (batch, seq_len, _) = layer.dim();
    if batch == 0 {
        return Err(TrajectoryError::Shape(format!("layer {index}: empty batch")));
    }
    if seq_len == 0 {
        return Err(TrajectoryError::Shape(format!(
            "layer {index}: empty sequence axis, nothing to pool"
        )));
    }

    match mode {
        PoolMode::Last => Ok(layer.index_axis(Axis(1), seq_len - 1).to_owned()),
        PoolMode::Mean => layer.mean_axis(Axis(1)).ok_or_else(|| {
            TrajectoryError::Shape(format!("layer {index}: empty sequence axis, nothing to pool"))
        }),
    }
}

/// Pool hidden states across layers.
///
/// `hidden_states`: one tensor per layer, each (batch, seq_len, hidden_dim).
/// Every layer must agree on batch and hidden_dim; seq_len may differ.
/// Returns the equal-weight mean of the per-layer pooled vectors.
pub fn pool_hidden(hidden_states: &[ArrayD<f64>], mode: PoolMode) -> TrajectoryResult<Array2<f64>> {
    let (first, rest) = hidden_states
        .split_first()
        .ok_or_else(|| TrajectoryError::shape("hidden_states must be non-empty"))?;

    let mut sum = pool_layer(0, first, mode)?;
    for (offset, layer) in rest.iter().enumerate() {
        let index = offset + 1;
        let pooled = pool_layer(index, layer, mode)?;
        if pooled.dim() != sum.dim() {
            return Err(TrajectoryError::Shape(format!(
                "layer {index}: pooled shape {:?} does not match layer 0 shape {:?}",
                pooled.dim(),
                sum.dim()
            )));
        }
        sum += &pooled;
    }

    Ok(sum / hidden_states.len() as f64)
}
