// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Trajectory Kernel Configuration
// ─────────────────────────────────────────────────────────────────────

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TrajectoryError, TrajectoryResult};

/// Score returned by every metric when its required history is missing.
/// 0.5 is the midpoint of [0, 1]: maximal uncertainty.
pub const DEFAULT_PRIOR: f64 = 0.5;

/// Linear coefficient of the CIS sharpening remap `y = a*x + b*x²`.
pub const CIS_SHARPEN_LINEAR: f64 = 0.4;

/// Quadratic coefficient of the CIS sharpening remap `y = a*x + b*x²`.
pub const CIS_SHARPEN_QUADRATIC: f64 = 0.6;

/// Floor applied to probabilities before `ln` and to distribution sums
/// before renormalisation.
pub const PROB_EPSILON: f64 = 1e-12;

/// Floor applied to vector norms before L2 normalisation.
pub const NORM_EPSILON: f64 = 1e-12;

/// Reports a tracker keeps before evicting the oldest.
pub const DEFAULT_TRACE_CAPACITY: usize = 4096;

/// How a layer's (batch, seq_len, hidden_dim) tensor collapses to
/// (batch, hidden_dim).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolMode {
    /// Vector at the final sequence position.
    #[default]
    Last,
    /// Arithmetic mean over the sequence axis.
    Mean,
}

impl PoolMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolMode::Last => "last",
            PoolMode::Mean => "mean",
        }
    }
}

impl fmt::Display for PoolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoolMode {
    type Err = TrajectoryError;

    /// Unknown modes are a caller-contract violation, reported as a shape error.
    fn from_str(s: &str) -> TrajectoryResult<Self> {
        match s {
            "last" => Ok(PoolMode::Last),
            "mean" => Ok(PoolMode::Mean),
            other => Err(TrajectoryError::Shape(format!(
                "unknown pool mode: {other:?} (expected \"last\" or \"mean\")"
            ))),
        }
    }
}

/// Runtime configuration for the Trajectory Kernel.
///
/// Fixed for the lifetime of a generation sequence: the pooling mode in
/// particular must not change between steps, or the pooled history stops
/// being comparable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    /// Pooling applied to every layer before averaging across layers.
    /// Default: `last`.
    pub pool: PoolMode,

    /// Fallback score when history or context is unavailable.
    /// Default: 0.5.
    pub prior: f64,

    /// Apply the `0.4x + 0.6x²` remap to CIS.
    /// Default: true.
    pub sharpen: bool,

    /// Softmax temperature. Non-positive values degrade to 1.0 in the sampler.
    /// Default: 1.0.
    pub temperature: f64,

    /// Weight of the previous step's distribution in the mix (clamped to [0, 1]).
    /// Default: 0.0 (mixing disabled).
    pub mix_lambda: f64,

    /// Weight of SDS in the composite score.
    /// Default: 0.4.
    pub w_stability: f64,

    /// Weight of CIS in the composite score.
    /// Default: 0.4.
    pub w_alignment: f64,

    /// Weight of the inverted curvature `1 - TC` in the composite score.
    /// Default: 0.2.
    pub w_curvature: f64,

    /// A step whose composite score falls below this is flagged as drifting.
    /// Default: 0.35.
    pub drift_threshold: f64,

    /// Most recent step reports kept in a tracker's trace. Must be at least 1.
    /// Default: 4096.
    pub trace_capacity: usize,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            pool: PoolMode::Last,
            prior: DEFAULT_PRIOR,
            sharpen: true,
            temperature: 1.0,
            mix_lambda: 0.0,
            w_stability: 0.4,
            w_alignment: 0.4,
            w_curvature: 0.2,
            drift_threshold: 0.35,
            trace_capacity: DEFAULT_TRACE_CAPACITY,
        }
    }
}

impl TrajectoryConfig {
    /// Validate configuration parameters.
    ///
    /// Non-positive temperatures and out-of-range mixing weights pass:
    /// the sampler substitutes and clamps them at call time.
    pub fn validate(&self) -> TrajectoryResult<()> {
        if !(0.0..=1.0).contains(&self.prior) {
            return Err(TrajectoryError::Config(format!(
                "prior must be in [0, 1], got {}",
                self.prior
            )));
        }
        if !(0.0..=1.0).contains(&self.drift_threshold) {
            return Err(TrajectoryError::Config(format!(
                "drift_threshold must be in [0, 1], got {}",
                self.drift_threshold
            )));
        }
        if !self.temperature.is_finite() {
            return Err(TrajectoryError::Config(format!(
                "temperature must be finite, got {}",
                self.temperature
            )));
        }
        if !self.mix_lambda.is_finite() {
            return Err(TrajectoryError::Config(format!(
                "mix_lambda must be finite, got {}",
                self.mix_lambda
            )));
        }
        let weights = [self.w_stability, self.w_alignment, self.w_curvature];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(TrajectoryError::Config(format!(
                "composite weights must be non-negative, got {weights:?}"
            )));
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > 1e-9 {
            return Err(TrajectoryError::Config(format!(
                "w_stability + w_alignment + w_curvature must equal 1.0, got {} + {} + {} = {}",
                self.w_stability, self.w_alignment, self.w_curvature, total
            )));
        }
        if self.trace_capacity == 0 {
            return Err(TrajectoryError::Config(
                "trace_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load from JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> TrajectoryResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| TrajectoryError::Config(format!("JSON parse error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        assert!(TrajectoryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_prior_out_of_range() {
        let config = TrajectoryConfig {
            prior: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TrajectoryError::Config(_))));
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let config = TrajectoryConfig {
            w_stability: 0.5,
            w_alignment: 0.5,
            w_curvature: 0.5,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must equal 1.0"));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let config = TrajectoryConfig {
            w_stability: 1.2,
            w_alignment: -0.2,
            w_curvature: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_temperature_is_not_a_config_error() {
        let config = TrajectoryConfig {
            temperature: -3.0,
            mix_lambda: 4.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nan_temperature_rejected() {
        let config = TrajectoryConfig {
            temperature: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_trace_capacity_rejected() {
        let config = TrajectoryConfig {
            trace_capacity: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("trace_capacity"));
    }

    #[test]
    fn test_from_json_partial() {
        let config = TrajectoryConfig::from_json(r#"{"pool": "mean", "mix_lambda": 0.25}"#)
            .unwrap();
        assert_eq!(config.pool, PoolMode::Mean);
        assert!((config.mix_lambda - 0.25).abs() < 1e-9);
        assert!((config.prior - 0.5).abs() < 1e-9);
        assert!(config.sharpen);
        assert_eq!(config.trace_capacity, DEFAULT_TRACE_CAPACITY);
    }

    #[test]
    fn test_from_json_unknown_pool() {
        let err = TrajectoryConfig::from_json(r#"{"pool": "max"}"#).unwrap_err();
        assert!(matches!(err, TrajectoryError::Config(_)));
    }

    #[test]
    fn test_pool_mode_parse() {
        assert_eq!("last".parse::<PoolMode>().unwrap(), PoolMode::Last);
        assert_eq!("mean".parse::<PoolMode>().unwrap(), PoolMode::Mean);
        assert!(matches!(
            "max".parse::<PoolMode>(),
            Err(TrajectoryError::Shape(_))
        ));
    }

    #[test]
    fn test_pool_mode_display_round_trip() {
        for mode in [PoolMode::Last, PoolMode::Mean] {
            assert_eq!(mode.to_string().parse::<PoolMode>().unwrap(), mode);
        }
    }
}
