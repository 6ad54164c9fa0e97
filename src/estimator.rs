//! Rasch (one-parameter logistic) ability estimation.
//!
//! Both theta and item difficulty live on a 0-100 display scale and are
//! rescaled to logits for the model. Estimation is a damped iterative
//! ascent on the log-likelihood score function; the step is applied in
//! display points and capped per iteration, so a short trajectory of
//! extreme scores moves the estimate decisively but never overshoots.

use crate::config::EstimatorParams;
use crate::types::{AbilityEstimate, EfficiencyMetrics, PriorResponse};

const DISPLAY_MIDPOINT: f64 = 50.0;
const LOGIT_SCALE: f64 = 10.0;

/// 0-100 display value to the logit scale.
pub fn to_logit(display: f64) -> f64 {
    (display - DISPLAY_MIDPOINT) / LOGIT_SCALE
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Debug, Clone)]
pub struct IrtEstimator {
    params: EstimatorParams,
}

impl IrtEstimator {
    pub fn new(params: EstimatorParams) -> Self {
        Self { params }
    }

    /// Probability of a correct response under the Rasch model, clamped
    /// away from 0 and 1 to keep the score function well-behaved.
    pub fn probability(&self, theta_logit: f64, difficulty_logit: f64) -> f64 {
        let p = sigmoid(theta_logit - difficulty_logit);
        p.clamp(self.params.epsilon, 1.0 - self.params.epsilon)
    }

    /// Difficulty-weighted seed from prior history for the objective.
    ///
    /// Each prior response votes for its item difficulty shifted by how
    /// far the score sat from the coin-flip midpoint, so a correct answer
    /// on a hard item pulls the seed above that difficulty. A naive
    /// proportion-correct seed gave poor starting points on skewed
    /// histories.
    pub fn seed_from_history(&self, prior: &[PriorResponse]) -> f64 {
        if prior.is_empty() {
            return DISPLAY_MIDPOINT;
        }
        let sum: f64 = prior
            .iter()
            .map(|r| r.difficulty + (r.score - 0.5) * self.params.prior_spread)
            .sum();
        (sum / prior.len() as f64).clamp(0.0, 100.0)
    }

    /// Log-likelihood score and Fisher information at `theta` (display
    /// scale) over a trajectory of (difficulty, score) pairs.
    fn score_and_info(&self, theta: f64, trajectory: &[(f64, f64)]) -> (f64, f64) {
        let theta_logit = to_logit(theta);
        let mut score = 0.0;
        let mut info = 0.0;
        for &(difficulty, correctness) in trajectory {
            let p = self.probability(theta_logit, to_logit(difficulty));
            score += correctness - p;
            info += p * (1.0 - p);
        }
        (score, info)
    }

    /// Estimate ability from a trajectory, starting at `seed` (display
    /// scale). An empty trajectory returns the seed with maximum
    /// uncertainty and `converged = false`.
    pub fn estimate(&self, trajectory: &[(f64, f64)], seed: f64) -> AbilityEstimate {
        let seed = seed.clamp(0.0, 100.0);
        if trajectory.is_empty() {
            return self.build_estimate(seed, self.params.se_max, 0, false);
        }

        let mut theta = seed;
        let mut iterations = 0u32;
        let mut converged = false;
        let mut diverged = false;

        for _ in 0..self.params.max_iterations {
            iterations += 1;
            let (score, info) = self.score_and_info(theta, trajectory);
            let info = info.max(self.params.info_floor);
            let raw_step = score / info;
            if !raw_step.is_finite() {
                // Discard the failed update and keep the last stable theta.
                tracing::warn!(theta, "non-finite update step, keeping last stable estimate");
                diverged = true;
                break;
            }
            let step = raw_step.clamp(-self.params.max_step, self.params.max_step);
            let next = (theta + step).clamp(0.0, 100.0);
            let moved = (next - theta).abs();
            theta = next;
            if moved < self.params.convergence_tol {
                converged = true;
                break;
            }
        }

        let (_, info) = self.score_and_info(theta, trajectory);
        let mut se = 1.0 / info.max(self.params.info_floor).sqrt();
        if diverged {
            se *= self.params.divergence_widening;
            converged = false;
        }
        let se = se.clamp(self.params.se_min, self.params.se_max);
        self.build_estimate(theta, se, iterations, converged)
    }

    fn build_estimate(&self, theta: f64, se: f64, iterations: u32, converged: bool) -> AbilityEstimate {
        let half = self.params.z_value * se;
        AbilityEstimate {
            theta,
            standard_error: se,
            ci_half_width: half,
            ci_lower: (theta - half).clamp(0.0, 100.0),
            ci_upper: (theta + half).clamp(0.0, 100.0),
            iterations,
            converged,
        }
    }

    /// True only with at least the minimum response count and a full CI
    /// width below the early-stop threshold.
    pub fn can_stop_early(&self, responses: usize, estimate: &AbilityEstimate) -> bool {
        responses >= self.params.early_stop_min_responses
            && 2.0 * estimate.ci_half_width < self.params.early_stop_max_ci_width
    }

    /// Savings relative to the fixed non-adaptive baseline protocol.
    pub fn efficiency(&self, questions_asked: usize) -> EfficiencyMetrics {
        let baseline = self.params.baseline_question_count;
        let saved = baseline.saturating_sub(questions_asked) as u32;
        let score = (1.0 - questions_asked as f64 / baseline as f64) * 100.0;
        EfficiencyMetrics {
            questions_saved: saved,
            efficiency_score: score.clamp(0.0, 100.0),
        }
    }
}

impl Default for IrtEstimator {
    fn default() -> Self {
        Self::new(EstimatorParams::default())
    }
}
