// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Boundary Tensor Conversion
// ─────────────────────────────────────────────────────────────────────
//! Builds `ndarray` tensors from the nested lists the generation
//! boundary hands over, and back. Ragged input is a shape violation.

use ndarray::{Array2, Array3, ArrayD};

use trajectory_types::{TrajectoryError, TrajectoryResult};

/// Nested (batch, seq_len, hidden_dim) list → dynamic-rank layer tensor.
pub fn layer_from_nested(data: Vec<Vec<Vec<f64>>>) -> TrajectoryResult<ArrayD<f64>> {
    let batch = data.len();
    let seq_len = data.first().map_or(0, Vec::len);
    let dim = data
        .first()
        .and_then(|rows| rows.first())
        .map_or(0, Vec::len);

    let mut flat = Vec::with_capacity(batch * seq_len * dim);
    for (b, rows) in data.into_iter().enumerate() {
        if rows.len() != seq_len {
            return Err(TrajectoryError::Shape(format!(
                "ragged hidden state: batch {b} has {} positions, expected {seq_len}",
                rows.len()
            )));
        }
        for (s, row) in rows.into_iter().enumerate() {
            if row.len() != dim {
                return Err(TrajectoryError::Shape(format!(
                    "ragged hidden state: [{b}][{s}] has {} values, expected {dim}",
                    row.len()
                )));
            }
            flat.extend(row);
        }
    }

    Array3::from_shape_vec((batch, seq_len, dim), flat)
        .map(|layer| layer.into_dyn())
        .map_err(|e| TrajectoryError::Shape(format!("hidden state: {e}")))
}

/// Nested list of layers → hidden-state set.
pub fn layers_from_nested(layers: Vec<Vec<Vec<Vec<f64>>>>) -> TrajectoryResult<Vec<ArrayD<f64>>> {
    layers.into_iter().map(layer_from_nested).collect()
}

/// Nested (rows, cols) list → matrix. Used for context embeddings,
/// probability distributions, and raw scores.
pub fn matrix_from_nested(rows: Vec<Vec<f64>>) -> TrajectoryResult<Array2<f64>> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    let mut flat = Vec::with_capacity(n_rows * n_cols);
    for (r, row) in rows.into_iter().enumerate() {
        if row.len() != n_cols {
            return Err(TrajectoryError::Shape(format!(
                "ragged matrix: row {r} has {} values, expected {n_cols}",
                row.len()
            )));
        }
        flat.extend(row);
    }
    Array2::from_shape_vec((n_rows, n_cols), flat)
        .map_err(|e| TrajectoryError::Shape(format!("matrix: {e}")))
}

pub fn matrix_to_nested(a: &Array2<f64>) -> Vec<Vec<f64>> {
    a.rows().into_iter().map(|row| row.to_vec()).collect()
}
