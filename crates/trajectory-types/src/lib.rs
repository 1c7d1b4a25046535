// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Trajectory Kernel Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Type definitions, configuration, and error hierarchy for the
//! Trajectory Kernel — hidden-state drift diagnostics and
//! trajectory-regularized sampling for autoregressive generators.

pub mod config;
pub mod error;
pub mod score;

pub use config::{PoolMode, TrajectoryConfig};
pub use error::{TrajectoryError, TrajectoryResult};
pub use score::{clamp_score, TrajectoryReport, TrajectoryScores, TrajectoryTrace};
