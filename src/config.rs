use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorParams {
    /// Probability clamp to avoid degenerate log-derivatives.
    pub epsilon: f64,
    pub max_iterations: u32,
    /// Stop once a step moves theta less than this many display points.
    pub convergence_tol: f64,
    /// Per-iteration step cap, display points.
    pub max_step: f64,
    /// Substituted for the Fisher information when it is near zero.
    pub info_floor: f64,
    pub se_min: f64,
    pub se_max: f64,
    /// 95% normal quantile for the confidence interval.
    pub z_value: f64,
    /// Multiplier applied to the standard error after a discarded
    /// divergent update.
    pub divergence_widening: f64,
    pub early_stop_min_responses: usize,
    /// Full CI width below which early stop is allowed.
    pub early_stop_max_ci_width: f64,
    /// Reference question count of a non-adaptive protocol.
    pub baseline_question_count: usize,
    /// Display points a fully right/wrong prior answer shifts the seed
    /// away from its item difficulty.
    pub prior_spread: f64,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            max_iterations: 10,
            convergence_tol: 0.01,
            max_step: 15.0,
            info_floor: 1e-3,
            se_min: 0.1,
            se_max: 10.0,
            z_value: 1.96,
            divergence_widening: 1.5,
            early_stop_min_responses: 3,
            early_stop_max_ci_width: 10.0,
            baseline_question_count: 15,
            prior_spread: 20.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyParams {
    /// Score at or above which difficulty is raised by `large_step`.
    pub raise_threshold: f64,
    /// Score at or below which difficulty is lowered by `large_step`.
    pub lower_threshold: f64,
    pub large_step: f64,
    pub small_step: f64,
    /// Split point of the maintain band. Tunable policy, not an
    /// immutable constant.
    pub hold_band_midpoint: f64,
    pub max_adjustments: u8,
}

impl Default for DifficultyParams {
    fn default() -> Self {
        Self {
            raise_threshold: 0.80,
            lower_threshold: 0.60,
            large_step: 15.0,
            small_step: 5.0,
            hold_band_midpoint: 0.70,
            max_adjustments: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorParams {
    /// Half-width of the difficulty band around the target.
    pub tolerance_band: f64,
    /// Days before an item may be re-served to the same user.
    pub cooldown_days: i64,
    /// Items below this point-biserial correlation are flagged for
    /// rotation exclusion.
    pub min_discrimination: f64,
    /// Observations required before the discrimination index is trusted.
    pub min_sample_size: usize,
}

impl Default for SelectorParams {
    fn default() -> Self {
        Self {
            tolerance_band: 10.0,
            cooldown_days: 14,
            min_discrimination: 0.2,
            min_sample_size: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteryParams {
    /// Minimum score for a response to count as qualifying evidence.
    pub qualifying_score: f64,
    pub required_count: u32,
    pub required_channels: usize,
    /// Minimum spacing between consecutive qualifying responses.
    pub min_spacing_hours: i64,
    /// Maximum |confidence - score| on the display scale.
    pub calibration_tolerance: f64,
}

impl Default for MasteryParams {
    fn default() -> Self {
        Self {
            qualifying_score: 0.80,
            required_count: 3,
            required_channels: 2,
            min_spacing_hours: 48,
            calibration_tolerance: 15.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionParams {
    /// Sessions idle longer than this are marked stale by the sweep.
    pub inactivity_timeout_ms: i64,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            inactivity_timeout_ms: 30 * 60 * 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub estimator: EstimatorParams,
    pub difficulty: DifficultyParams,
    pub selector: SelectorParams,
    pub mastery: MasteryParams,
    pub session: SessionParams,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ASSESS_BASELINE_QUESTIONS") {
            config.estimator.baseline_question_count = val.parse().unwrap_or(15);
        }
        if let Ok(val) = std::env::var("ASSESS_MAX_ADJUSTMENTS") {
            config.difficulty.max_adjustments = val.parse().unwrap_or(3);
        }
        if let Ok(val) = std::env::var("ASSESS_COOLDOWN_DAYS") {
            config.selector.cooldown_days = val.parse().unwrap_or(14);
        }
        if let Ok(val) = std::env::var("ASSESS_INACTIVITY_TIMEOUT_MS") {
            config.session.inactivity_timeout_ms = val.parse().unwrap_or(30 * 60 * 1000);
        }

        config
    }
}
