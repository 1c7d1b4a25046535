// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Trajectory Kernel Core
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Hidden-state trajectory diagnostics and trajectory-regularized
//! sampling for autoregressive generators.
//!
//! The generation boundary supplies per-layer hidden states and raw
//! next-token scores each step; the kernel returns up to three scalar
//! diagnostics in [0, 1] and an adjusted next-token distribution.
//!
//! # Invariants
//!
//! 1. **Bounded scores**: SDS, CIS and TC are clamped to [0, 1] after
//!    every stage, including under floating-point overshoot and NaN.
//!
//! 2. **Priors are not measurements**: when history or context is
//!    missing, a metric returns its configured prior without touching
//!    the hidden states supplied in that call.
//!
//! 3. **Only shape errors fail**: zero vectors, degenerate distributions,
//!    non-positive temperatures and out-of-range mixing weights are
//!    floored, substituted or clamped. Wrong ranks, empty layer sets,
//!    unknown pooling modes and mismatched operands return
//!    `TrajectoryError::Shape`.
//!
//! 4. **Stateless core**: `pooling`, `similarity`, `metrics` and
//!    `sampling` hold no state. Cross-step history lives in
//!    [`TrajectoryTracker`], owned per sequence by the caller, or in
//!    [`TrajectoryRegistry`] when many sequences are served at once.

pub mod metrics;
pub mod pooling;
pub mod registry;
pub mod sampling;
pub mod similarity;
pub mod tensor;
pub mod tracker;

pub use metrics::{context_influence_score, semantic_drift_score, trajectory_curvature};
pub use pooling::pool_hidden;
pub use registry::TrajectoryRegistry;
pub use sampling::{mix_distributions, stable_softmax, trajectory_regularized_logits};
pub use similarity::{cos_to_unit, Remap};
pub use tracker::{StepOutcome, TrajectoryTracker};
