// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Per-Sequence Trajectory Tracker
// ─────────────────────────────────────────────────────────────────────
//! Owns the rolling history one generation sequence needs between
//! decoding steps: the last two pooled vectors, the anchor embedding,
//! and the previous step's distribution.
//!
//! The metric and sampling functions stay stateless; the tracker only
//! threads their inputs and outputs from step to step. A step either
//! commits all of its history or none of it.

use std::collections::VecDeque;

use ndarray::{Array2, ArrayD};

use trajectory_types::score::TrajectoryTrace;
use trajectory_types::{TrajectoryConfig, TrajectoryReport, TrajectoryResult, TrajectoryScores};

use crate::metrics::{alignment_from_pooled, curvature_from_pooled, stability_from_pooled};
use crate::pooling::pool_hidden;
use crate::sampling::trajectory_regularized_logits;

/// Pooled steps retained: t-1 and t-2.
const HISTORY_DEPTH: usize = 2;

/// Result of a full tracked step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub report: TrajectoryReport,
    /// `ln(max(probs, 1e-12))`, (batch, vocab).
    pub log_probs: Array2<f64>,
    /// Adjusted distribution, retained as the next step's prior.
    pub probs: Array2<f64>,
}

/// Rolling trajectory state for one generation sequence.
#[derive(Debug, Clone)]
pub struct TrajectoryTracker {
    config: TrajectoryConfig,
    context: Option<Array2<f64>>,
    /// Oldest at the front.
    history: VecDeque<Array2<f64>>,
    prev_probs: Option<Array2<f64>>,
    trace: TrajectoryTrace,
    step: u64,
}

impl TrajectoryTracker {
    pub fn new(config: TrajectoryConfig) -> TrajectoryResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            context: None,
            history: VecDeque::with_capacity(HISTORY_DEPTH + 1),
            prev_probs: None,
            trace: TrajectoryTrace::default(),
            step: 0,
        })
    }

    /// Tracker anchored to `context`: (batch, hidden_dim), or one
    /// (1, hidden_dim) row shared by the whole batch.
    pub fn with_context(config: TrajectoryConfig, context: Array2<f64>) -> TrajectoryResult<Self> {
        let mut tracker = Self::new(config)?;
        tracker.context = Some(context);
        Ok(tracker)
    }

    pub fn set_context(&mut self, context: Option<Array2<f64>>) {
        self.context = context;
    }

    fn previous(&self) -> Option<&Array2<f64>> {
        self.history.back()
    }

    fn previous_previous(&self) -> Option<&Array2<f64>> {
        self.history
            .len()
            .checked_sub(HISTORY_DEPTH)
            .and_then(|i| self.history.get(i))
    }

    fn score_pooled(&self, pooled: &Array2<f64>) -> TrajectoryResult<TrajectoryScores> {
        let prior = self.config.prior;
        let sds = stability_from_pooled(pooled, self.previous(), prior)?;
        let cis = alignment_from_pooled(pooled, self.context.as_ref(), prior, self.config.sharpen)?;
        let tc = curvature_from_pooled(pooled, self.previous(), self.previous_previous(), prior)?;
        Ok(TrajectoryScores::new(sds, cis, tc))
    }

    fn push_pooled(&mut self, pooled: Array2<f64>) {
        self.history.push_back(pooled);
        while self.history.len() > HISTORY_DEPTH {
            self.history.pop_front();
        }
    }

    /// Score the current hidden states against retained history, then
    /// retain them.
    pub fn observe(&mut self, hidden: &[ArrayD<f64>]) -> TrajectoryResult<TrajectoryScores> {
        let pooled = pool_hidden(hidden, self.config.pool)?;
        let scores = self.score_pooled(&pooled)?;
        self.push_pooled(pooled);
        Ok(scores)
    }

    /// Temperature + mixing against the retained distribution.
    /// Returns `(log_probs, probs)` and retains `probs`.
    pub fn adjust(&mut self, logits: &ArrayD<f64>) -> TrajectoryResult<(Array2<f64>, Array2<f64>)> {
        let (log_probs, probs) = trajectory_regularized_logits(
            logits,
            self.config.temperature,
            self.prev_probs.as_ref(),
            self.config.mix_lambda,
        )?;
        self.prev_probs = Some(probs.clone());
        Ok((log_probs, probs))
    }

    /// Score hidden states, adjust the distribution, and record a report.
    pub fn step(&mut self, hidden: &[ArrayD<f64>], logits: &ArrayD<f64>) -> TrajectoryResult<StepOutcome> {
        let pooled = pool_hidden(hidden, self.config.pool)?;
        let scores = self.score_pooled(&pooled)?;
        let (log_probs, probs) = trajectory_regularized_logits(
            logits,
            self.config.temperature,
            self.prev_probs.as_ref(),
            self.config.mix_lambda,
        )?;

        let composite = scores.composite(
            self.config.w_stability,
            self.config.w_alignment,
            self.config.w_curvature,
        );
        let drifting = composite < self.config.drift_threshold;
        if drifting {
            log::warn!(
                "trajectory drift at step {}: composite {composite:.4} < {} (sds={:.4}, cis={:.4}, tc={:.4})",
                self.step,
                self.config.drift_threshold,
                scores.sds,
                scores.cis,
                scores.tc
            );
        }

        let report = TrajectoryReport {
            step: self.step,
            scores,
            composite,
            drifting,
        };

        self.push_pooled(pooled);
        self.prev_probs = Some(probs.clone());
        self.trace.push_bounded(report.clone(), self.config.trace_capacity);
        self.step += 1;

        Ok(StepOutcome {
            report,
            log_probs,
            probs,
        })
    }

    /// Forget all history; the anchor and config stay.
    pub fn reset(&mut self) {
        self.history.clear();
        self.prev_probs = None;
        self.trace = TrajectoryTrace::default();
        self.step = 0;
        log::debug!("trajectory tracker reset");
    }

    pub fn config(&self) -> &TrajectoryConfig {
        &self.config
    }

    pub fn context(&self) -> Option<&Array2<f64>> {
        self.context.as_ref()
    }

    pub fn prev_probs(&self) -> Option<&Array2<f64>> {
        self.prev_probs.as_ref()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn step_index(&self) -> u64 {
        self.step
    }

    pub fn trace(&self) -> &TrajectoryTrace {
        &self.trace
    }

    pub fn into_trace(self) -> TrajectoryTrace {
        self.trace
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array, IxDyn};

    use super::*;
    use crate::metrics::{context_influence_score, semantic_drift_score, trajectory_curvature};
    use trajectory_types::{PoolMode, TrajectoryError};

    fn hidden(v: [f64; 4]) -> Vec<ArrayD<f64>> {
        let layer = Array::from_shape_vec(IxDyn(&[1, 1, 4]), v.to_vec()).unwrap();
        vec![layer.clone(), layer]
    }

    fn logits() -> ArrayD<f64> {
        array![[1.0, 2.0, 3.0]].into_dyn()
    }

    #[test]
    fn test_first_steps_use_prior() {
        let mut tracker = TrajectoryTracker::new(TrajectoryConfig::default()).unwrap();
        let s0 = tracker.observe(&hidden([1.0, 0.0, 0.0, 0.0])).unwrap();
        assert_eq!(s0, TrajectoryScores::prior(0.5));

        let s1 = tracker.observe(&hidden([1.0, 0.0, 0.0, 0.0])).unwrap();
        assert_eq!(s1.sds, 1.0);
        assert_eq!(s1.cis, 0.5); // no context
        assert_eq!(s1.tc, 0.5); // one step of history only
        assert_eq!(tracker.history_len(), 2);
    }

    #[test]
    fn test_history_capped() {
        let mut tracker = TrajectoryTracker::new(TrajectoryConfig::default()).unwrap();
        for i in 0..6 {
            tracker.observe(&hidden([i as f64, 1.0, 0.0, 0.0])).unwrap();
        }
        assert_eq!(tracker.history_len(), HISTORY_DEPTH);
    }

    #[test]
    fn test_matches_stateless_metrics() {
        let config = TrajectoryConfig::default();
        let ctx = array![[0.5, 0.5, 0.0, 0.1]];
        let mut tracker = TrajectoryTracker::with_context(config.clone(), ctx.clone()).unwrap();
        let steps = [
            hidden([0.1, 0.9, -0.3, 0.2]),
            hidden([0.4, 0.7, 0.1, -0.5]),
            hidden([-0.2, 0.3, 0.8, 0.6]),
        ];
        let mut last = None;
        for h in &steps {
            last = Some(tracker.observe(h).unwrap());
        }
        let scores = last.unwrap();

        let pool = PoolMode::Last;
        let sds = semantic_drift_score(&steps[2], Some(&steps[1]), pool, 0.5).unwrap();
        let cis = context_influence_score(&steps[2], Some(&ctx), pool, 0.5, true).unwrap();
        let tc = trajectory_curvature(&steps[2], Some(&steps[1]), Some(&steps[0]), pool, 0.5)
            .unwrap();
        assert_eq!(scores.sds, sds);
        assert_eq!(scores.cis, cis);
        assert_eq!(scores.tc, tc);
    }

    #[test]
    fn test_adjust_retains_distribution() {
        let config = TrajectoryConfig {
            mix_lambda: 0.5,
            ..Default::default()
        };
        let mut tracker = TrajectoryTracker::new(config).unwrap();
        let (_, first) = tracker.adjust(&logits()).unwrap();
        assert_eq!(tracker.prev_probs(), Some(&first));

        // Same logits again: mixing a distribution with itself is a no-op.
        let (_, second) = tracker.adjust(&logits()).unwrap();
        for (a, b) in first.iter().zip(second.iter()) {
            assert!((a - b).abs() < 1e-12);
        }

        // Flat logits are pulled halfway toward the retained distribution.
        let (_, third) = tracker.adjust(&array![[0.0, 0.0, 0.0]].into_dyn()).unwrap();
        let expected = 0.5 * (1.0 / 3.0) + 0.5 * second[[0, 2]];
        assert!((third[[0, 2]] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_step_reports_and_counts() {
        let ctx = array![[1.0, 0.0, 0.0, 0.0]];
        let mut tracker = TrajectoryTracker::with_context(TrajectoryConfig::default(), ctx).unwrap();
        let out0 = tracker.step(&hidden([1.0, 0.0, 0.0, 0.0]), &logits()).unwrap();
        let out1 = tracker.step(&hidden([2.0, 0.0, 0.0, 0.0]), &logits()).unwrap();
        assert_eq!(out0.report.step, 0);
        assert_eq!(out1.report.step, 1);
        assert_eq!(out1.report.scores.sds, 1.0);
        assert!((out1.report.scores.cis - 1.0).abs() < 1e-12);
        assert!(!out1.report.drifting);
        assert_eq!(tracker.step_index(), 2);
        assert_eq!(tracker.trace().len(), 2);
        assert!((out1.probs.sum() - 1.0).abs() < 1e-9);

        let json = serde_json::to_value(&out1.report).unwrap();
        assert_eq!(json["step"], 1);
        assert_eq!(json["drifting"], false);
    }

    #[test]
    fn test_step_flags_drift() {
        let ctx = array![[1.0, 0.0, 0.0, 0.0]];
        let mut tracker = TrajectoryTracker::with_context(TrajectoryConfig::default(), ctx).unwrap();
        tracker.step(&hidden([1.0, 0.0, 0.0, 0.0]), &logits()).unwrap();
        tracker.step(&hidden([2.0, 0.0, 0.0, 0.0]), &logits()).unwrap();
        // Reverse direction and leave the anchor.
        let out = tracker.step(&hidden([-3.0, 0.0, 0.0, 0.0]), &logits()).unwrap();
        assert_eq!(out.report.scores.sds, 0.0);
        assert_eq!(out.report.scores.cis, 0.0);
        assert_eq!(out.report.scores.tc, 1.0);
        assert_eq!(out.report.composite, 0.0);
        assert!(out.report.drifting);
        assert_eq!(tracker.trace().first_drift(), Some(2));
    }

    #[test]
    fn test_identical_steps_exactly_stable() {
        let mut tracker = TrajectoryTracker::new(TrajectoryConfig::default()).unwrap();
        tracker.step(&hidden([0.3, -0.7, 0.2, 0.9]), &logits()).unwrap();
        let out = tracker.step(&hidden([0.3, -0.7, 0.2, 0.9]), &logits()).unwrap();
        assert_eq!(out.report.scores.sds, 1.0);
    }

    #[test]
    fn test_shared_anchor_with_batch() {
        let ctx = array![[1.0, 0.0]];
        let mut tracker = TrajectoryTracker::with_context(TrajectoryConfig::default(), ctx).unwrap();
        let h = vec![array![[[1.0, 0.0]], [[1.0, 0.0]]].into_dyn()];
        let batch_logits = array![[0.0, 1.0], [1.0, 0.0]].into_dyn();
        let out = tracker.step(&h, &batch_logits).unwrap();
        assert!((out.report.scores.cis - 1.0).abs() < 1e-12);
        assert_eq!(out.probs.dim(), (2, 2));
    }

    #[test]
    fn test_trace_bounded_by_capacity() {
        let config = TrajectoryConfig {
            trace_capacity: 3,
            ..Default::default()
        };
        let mut tracker = TrajectoryTracker::new(config).unwrap();
        for i in 0..10 {
            tracker.step(&hidden([1.0, i as f64, 0.0, 0.0]), &logits()).unwrap();
        }
        assert_eq!(tracker.step_index(), 10);
        assert_eq!(tracker.trace().len(), 3);
        assert_eq!(tracker.trace().evicted, 7);
        assert_eq!(tracker.trace().reports.back().map(|r| r.step), Some(9));
    }

    #[test]
    fn test_failed_step_commits_nothing() {
        let mut tracker = TrajectoryTracker::new(TrajectoryConfig::default()).unwrap();
        tracker.step(&hidden([1.0, 0.0, 0.0, 0.0]), &logits()).unwrap();
        let bad_logits = array![1.0, 2.0].into_dyn();
        let err = tracker.step(&hidden([0.0, 1.0, 0.0, 0.0]), &bad_logits).unwrap_err();
        assert!(matches!(err, TrajectoryError::Shape(_)));
        assert_eq!(tracker.history_len(), 1);
        assert_eq!(tracker.step_index(), 1);
        assert_eq!(tracker.trace().len(), 1);
    }

    #[test]
    fn test_hidden_dim_change_is_shape_error() {
        let mut tracker = TrajectoryTracker::new(TrajectoryConfig::default()).unwrap();
        tracker.observe(&hidden([1.0, 0.0, 0.0, 0.0])).unwrap();
        let narrow = vec![array![[[1.0, 0.0]]].into_dyn()];
        assert!(tracker.observe(&narrow).is_err());
    }

    #[test]
    fn test_reset_keeps_context() {
        let ctx = array![[1.0, 0.0, 0.0, 0.0]];
        let mut tracker = TrajectoryTracker::with_context(TrajectoryConfig::default(), ctx).unwrap();
        tracker.step(&hidden([1.0, 0.0, 0.0, 0.0]), &logits()).unwrap();
        tracker.reset();
        assert_eq!(tracker.history_len(), 0);
        assert_eq!(tracker.step_index(), 0);
        assert!(tracker.prev_probs().is_none());
        assert!(tracker.trace().is_empty());
        assert!(tracker.context().is_some());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TrajectoryConfig {
            prior: -0.1,
            ..Default::default()
        };
        assert!(TrajectoryTracker::new(config).is_err());
    }
}
