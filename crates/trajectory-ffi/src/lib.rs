// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Trajectory Kernel PyO3 FFI Bindings
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
// Note: #[deny(unsafe_code)] not applied — PyO3 proc macros generate
// unsafe blocks internally. All hand-written code in this crate is safe.
//! Python-callable wrappers around the Rust Trajectory Kernel.
//!
//! Hidden states cross the boundary as nested lists:
//! `layers[layer][batch][position][dim]`. Context embeddings, raw
//! scores, and distributions are `[batch][dim]` / `[batch][vocab]`.
//! Shape violations surface as `ValueError`.
//!
//! Usage from Python:
//! ```python
//! from trajectory_kernel import TrajectoryConfig, TrajectoryTracker
//!
//! tracker = TrajectoryTracker(TrajectoryConfig(mix_lambda=0.2), context=ctx)
//! out = tracker.step(hidden_states, logits)
//! out["sds"], out["cis"], out["tc"], out["probs"]
//! ```

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use trajectory_core::tensor::{layers_from_nested, matrix_from_nested, matrix_to_nested};
use trajectory_core::{sampling, TrajectoryTracker};
use trajectory_types::{
    clamp_score, PoolMode, TrajectoryConfig, TrajectoryError, TrajectoryReport,
};

type NestedLayers = Vec<Vec<Vec<Vec<f64>>>>;
type NestedMatrix = Vec<Vec<f64>>;

fn to_py_err(e: TrajectoryError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn parse_pool(pool: &str) -> PyResult<PoolMode> {
    pool.parse::<PoolMode>().map_err(to_py_err)
}

fn report_dict<'py>(py: Python<'py>, report: &TrajectoryReport) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("step", report.step)?;
    dict.set_item("sds", report.scores.sds)?;
    dict.set_item("cis", report.scores.cis)?;
    dict.set_item("tc", report.scores.tc)?;
    dict.set_item("composite", report.composite)?;
    dict.set_item("drifting", report.drifting)?;
    Ok(dict)
}

// ─── PyTrajectoryConfig ─────────────────────────────────────────────

/// Python-visible configuration for the Trajectory Kernel.
#[pyclass(name = "TrajectoryConfig")]
#[derive(Clone)]
struct PyTrajectoryConfig {
    inner: TrajectoryConfig,
}

#[pymethods]
impl PyTrajectoryConfig {
    #[new]
    #[pyo3(signature = (
        pool = "last",
        prior = 0.5,
        sharpen = true,
        temperature = 1.0,
        mix_lambda = 0.0,
        w_stability = 0.4,
        w_alignment = 0.4,
        w_curvature = 0.2,
        drift_threshold = 0.35,
        trace_capacity = 4096,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        pool: &str,
        prior: f64,
        sharpen: bool,
        temperature: f64,
        mix_lambda: f64,
        w_stability: f64,
        w_alignment: f64,
        w_curvature: f64,
        drift_threshold: f64,
        trace_capacity: usize,
    ) -> PyResult<Self> {
        let config = TrajectoryConfig {
            pool: parse_pool(pool)?,
            prior,
            sharpen,
            temperature,
            mix_lambda,
            w_stability,
            w_alignment,
            w_curvature,
            drift_threshold,
            trace_capacity,
        };
        config.validate().map_err(to_py_err)?;
        Ok(Self { inner: config })
    }

    /// Construct from JSON string.
    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let config = TrajectoryConfig::from_json(json).map_err(to_py_err)?;
        config.validate().map_err(to_py_err)?;
        Ok(Self { inner: config })
    }

    fn __repr__(&self) -> String {
        format!(
            "TrajectoryConfig(pool={}, prior={}, temperature={}, mix_lambda={})",
            self.inner.pool, self.inner.prior, self.inner.temperature, self.inner.mix_lambda
        )
    }
}

// ─── Stateless metrics ──────────────────────────────────────────────

/// SDS in [0, 1]; `prior` (clamped) when `hidden_prev` is None.
#[pyfunction]
#[pyo3(signature = (hidden_t, hidden_prev = None, pool = "last", prior = 0.5))]
fn semantic_drift_score(
    hidden_t: NestedLayers,
    hidden_prev: Option<NestedLayers>,
    pool: &str,
    prior: f64,
) -> PyResult<f64> {
    let pool = parse_pool(pool)?;
    let Some(hidden_prev) = hidden_prev else {
        return Ok(clamp_score(prior, 0.0, 1.0));
    };
    let hidden_t = layers_from_nested(hidden_t).map_err(to_py_err)?;
    let hidden_prev = layers_from_nested(hidden_prev).map_err(to_py_err)?;
    trajectory_core::semantic_drift_score(&hidden_t, Some(&hidden_prev), pool, prior)
        .map_err(to_py_err)
}

/// CIS in [0, 1]; `prior` (clamped) when `context_emb` is None.
#[pyfunction]
#[pyo3(signature = (hidden_t, context_emb = None, pool = "last", prior = 0.5, sharpen = true))]
fn context_influence_score(
    hidden_t: NestedLayers,
    context_emb: Option<NestedMatrix>,
    pool: &str,
    prior: f64,
    sharpen: bool,
) -> PyResult<f64> {
    let pool = parse_pool(pool)?;
    let Some(context_emb) = context_emb else {
        return Ok(clamp_score(prior, 0.0, 1.0));
    };
    let hidden_t = layers_from_nested(hidden_t).map_err(to_py_err)?;
    let context_emb = matrix_from_nested(context_emb).map_err(to_py_err)?;
    trajectory_core::context_influence_score(&hidden_t, Some(&context_emb), pool, prior, sharpen)
        .map_err(to_py_err)
}

/// TC in [0, 1]; `prior` (clamped) unless both history steps are given.
#[pyfunction]
#[pyo3(signature = (hidden_t, hidden_prev = None, hidden_prev_prev = None, pool = "last", prior = 0.5))]
fn trajectory_curvature(
    hidden_t: NestedLayers,
    hidden_prev: Option<NestedLayers>,
    hidden_prev_prev: Option<NestedLayers>,
    pool: &str,
    prior: f64,
) -> PyResult<f64> {
    let pool = parse_pool(pool)?;
    let (Some(hidden_prev), Some(hidden_prev_prev)) = (hidden_prev, hidden_prev_prev) else {
        return Ok(clamp_score(prior, 0.0, 1.0));
    };
    let hidden_t = layers_from_nested(hidden_t).map_err(to_py_err)?;
    let hidden_prev = layers_from_nested(hidden_prev).map_err(to_py_err)?;
    let hidden_prev_prev = layers_from_nested(hidden_prev_prev).map_err(to_py_err)?;
    trajectory_core::trajectory_curvature(
        &hidden_t,
        Some(&hidden_prev),
        Some(&hidden_prev_prev),
        pool,
        prior,
    )
    .map_err(to_py_err)
}

// ─── Sampling ───────────────────────────────────────────────────────

/// `(1 - lam) * p + lam * q`, renormalised.
#[pyfunction]
fn mix_distributions(p: NestedMatrix, q: NestedMatrix, lam: f64) -> PyResult<NestedMatrix> {
    let p = matrix_from_nested(p).map_err(to_py_err)?;
    let q = matrix_from_nested(q).map_err(to_py_err)?;
    let r = sampling::mix_distributions(&p, &q, lam).map_err(to_py_err)?;
    Ok(matrix_to_nested(&r))
}

/// Returns `(log_probs, probs)`.
#[pyfunction]
#[pyo3(signature = (logits, temperature, prev_probs = None, mix_lambda = 0.0))]
fn trajectory_regularized_logits(
    logits: NestedMatrix,
    temperature: f64,
    prev_probs: Option<NestedMatrix>,
    mix_lambda: f64,
) -> PyResult<(NestedMatrix, NestedMatrix)> {
    let logits = matrix_from_nested(logits).map_err(to_py_err)?.into_dyn();
    let prev_probs = prev_probs
        .map(matrix_from_nested)
        .transpose()
        .map_err(to_py_err)?;
    let (log_probs, probs) = sampling::trajectory_regularized_logits(
        &logits,
        temperature,
        prev_probs.as_ref(),
        mix_lambda,
    )
    .map_err(to_py_err)?;
    Ok((matrix_to_nested(&log_probs), matrix_to_nested(&probs)))
}

// ─── PyTrajectoryTracker ────────────────────────────────────────────

/// Per-sequence tracker holding pooled history and the previous
/// distribution between steps.
#[pyclass(name = "TrajectoryTracker")]
struct PyTrajectoryTracker {
    inner: TrajectoryTracker,
}

#[pymethods]
impl PyTrajectoryTracker {
    #[new]
    #[pyo3(signature = (config = None, context = None))]
    fn new(config: Option<PyTrajectoryConfig>, context: Option<NestedMatrix>) -> PyResult<Self> {
        let config = config.map(|c| c.inner).unwrap_or_default();
        let mut inner = TrajectoryTracker::new(config).map_err(to_py_err)?;
        let context = context
            .map(matrix_from_nested)
            .transpose()
            .map_err(to_py_err)?;
        inner.set_context(context);
        Ok(Self { inner })
    }

    /// Score hidden states against retained history. Returns
    /// `(sds, cis, tc)`.
    fn observe(&mut self, hidden: NestedLayers) -> PyResult<(f64, f64, f64)> {
        let hidden = layers_from_nested(hidden).map_err(to_py_err)?;
        let s = self.inner.observe(&hidden).map_err(to_py_err)?;
        Ok((s.sds, s.cis, s.tc))
    }

    /// Temperature + mixing. Returns `(log_probs, probs)`.
    fn adjust(&mut self, logits: NestedMatrix) -> PyResult<(NestedMatrix, NestedMatrix)> {
        let logits = matrix_from_nested(logits).map_err(to_py_err)?.into_dyn();
        let (log_probs, probs) = self.inner.adjust(&logits).map_err(to_py_err)?;
        Ok((matrix_to_nested(&log_probs), matrix_to_nested(&probs)))
    }

    /// Full step: report fields plus `log_probs` and `probs`.
    fn step<'py>(
        &mut self,
        py: Python<'py>,
        hidden: NestedLayers,
        logits: NestedMatrix,
    ) -> PyResult<Bound<'py, PyDict>> {
        let hidden = layers_from_nested(hidden).map_err(to_py_err)?;
        let logits = matrix_from_nested(logits).map_err(to_py_err)?.into_dyn();
        let outcome = self.inner.step(&hidden, &logits).map_err(to_py_err)?;
        let dict = report_dict(py, &outcome.report)?;
        dict.set_item("log_probs", matrix_to_nested(&outcome.log_probs))?;
        dict.set_item("probs", matrix_to_nested(&outcome.probs))?;
        Ok(dict)
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    #[getter]
    fn step_index(&self) -> u64 {
        self.inner.step_index()
    }

    fn avg_composite(&self) -> f64 {
        self.inner.trace().avg_composite()
    }

    fn first_drift(&self) -> Option<u64> {
        self.inner.trace().first_drift()
    }

    fn __repr__(&self) -> String {
        format!(
            "TrajectoryTracker(step={}, drift_count={})",
            self.inner.step_index(),
            self.inner.trace().drift_count()
        )
    }
}

#[pymodule]
fn trajectory_kernel(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyTrajectoryConfig>()?;
    m.add_class::<PyTrajectoryTracker>()?;

    m.add_function(wrap_pyfunction!(semantic_drift_score, m)?)?;
    m.add_function(wrap_pyfunction!(context_influence_score, m)?)?;
    m.add_function(wrap_pyfunction!(trajectory_curvature, m)?)?;
    m.add_function(wrap_pyfunction!(mix_distributions, m)?)?;
    m.add_function(wrap_pyfunction!(trajectory_regularized_logits, m)?)?;
    Ok(())
}
