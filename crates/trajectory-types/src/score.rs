// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Trajectory Kernel Score Types
// ─────────────────────────────────────────────────────────────────────

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Clamp a value to [lo, hi], mapping NaN to lo and Inf to nearest bound.
#[inline]
pub fn clamp_score(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        log::warn!("clamp_score: NaN detected, clamping to {lo:.4}");
        return lo;
    }
    if value.is_infinite() {
        let boundary = if value > 0.0 { hi } else { lo };
        log::warn!("clamp_score: Inf detected, clamping to {boundary:.4}");
        return boundary;
    }
    value.clamp(lo, hi)
}

/// The three trajectory diagnostics for one decoding step.
///
/// SDS and CIS read "higher is healthier"; TC reads "higher is more
/// anomalous". Any of them may be the configured prior when the step
/// lacked the history or context it needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryScores {
    /// Semantic drift score (local stability): 1.0 = adjacent steps identical.
    pub sds: f64,
    /// Context influence score: 1.0 = aligned with the anchor embedding.
    pub cis: f64,
    /// Trajectory curvature: 0.0 = straight continuation, 1.0 = reversal.
    pub tc: f64,
}

impl TrajectoryScores {
    pub fn new(sds: f64, cis: f64, tc: f64) -> Self {
        Self {
            sds: clamp_score(sds, 0.0, 1.0),
            cis: clamp_score(cis, 0.0, 1.0),
            tc: clamp_score(tc, 0.0, 1.0),
        }
    }

    /// All three at the prior.
    pub fn prior(prior: f64) -> Self {
        Self::new(prior, prior, prior)
    }

    /// Weighted health score in [0, 1].
    ///
    /// `w_stability * SDS + w_alignment * CIS + w_curvature * (1 - TC)`:
    /// curvature is inverted so that every term reads "higher is healthier".
    pub fn composite(&self, w_stability: f64, w_alignment: f64, w_curvature: f64) -> f64 {
        clamp_score(
            w_stability * self.sds + w_alignment * self.cis + w_curvature * (1.0 - self.tc),
            0.0,
            1.0,
        )
    }
}

/// Serializable summary of one tracked decoding step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryReport {
    /// Zero-based step index within the sequence.
    pub step: u64,
    pub scores: TrajectoryScores,
    /// Composite health score, see [`TrajectoryScores::composite`].
    pub composite: f64,
    /// Composite fell below the configured drift threshold.
    pub drifting: bool,
}

/// Accumulated reports for one generation sequence.
///
/// Summaries cover the reports still held. A bounded trace evicts its
/// oldest reports and counts them in `evicted`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrajectoryTrace {
    pub reports: VecDeque<TrajectoryReport>,
    #[serde(default)]
    pub evicted: u64,
}

impl TrajectoryTrace {
    pub fn push(&mut self, report: TrajectoryReport) {
        self.reports.push_back(report);
    }

    /// Append `report`, then drop the oldest reports beyond `capacity`.
    pub fn push_bounded(&mut self, report: TrajectoryReport, capacity: usize) {
        self.reports.push_back(report);
        while self.reports.len() > capacity {
            self.reports.pop_front();
            self.evicted += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn avg_composite(&self) -> f64 {
        if self.reports.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.reports.iter().map(|r| r.composite).sum();
        clamp_score(sum / self.reports.len() as f64, 0.0, 1.0)
    }

    pub fn min_composite(&self) -> f64 {
        self.reports
            .iter()
            .map(|r| r.composite)
            .fold(f64::INFINITY, f64::min)
            .clamp(0.0, 1.0)
    }

    /// Index of the first step flagged as drifting.
    pub fn first_drift(&self) -> Option<u64> {
        self.reports.iter().find(|r| r.drifting).map(|r| r.step)
    }

    pub fn drift_count(&self) -> usize {
        self.reports.iter().filter(|r| r.drifting).count()
    }
}
