//! Bounded difficulty-adjustment controller.
//!
//! Reacts to the latest score with a deterministic step, then locks once
//! the per-session adjustment budget is spent so the verifier can gather
//! evidence at a stable target.

use crate::config::DifficultyParams;

pub const REASON_RAISE: &str = "strong performance: raising difficulty";
pub const REASON_LOWER: &str = "struggling: lowering difficulty";
pub const REASON_STABILIZE: &str = "stabilizing near current level";
pub const REASON_LOCKED: &str = "difficulty locked: evidence-gathering mode";

#[derive(Debug, Clone)]
pub struct DifficultyDecision {
    pub difficulty: f64,
    pub delta: f64,
    pub adjustments_used: u8,
    pub reason: &'static str,
}

/// Propose the next target difficulty from the last score.
pub fn adjust(
    current: f64,
    last_score: f64,
    adjustments_used: u8,
    params: &DifficultyParams,
) -> DifficultyDecision {
    if adjustments_used >= params.max_adjustments {
        return DifficultyDecision {
            difficulty: current,
            delta: 0.0,
            adjustments_used,
            reason: REASON_LOCKED,
        };
    }

    let (step, reason) = if last_score >= params.raise_threshold {
        (params.large_step, REASON_RAISE)
    } else if last_score <= params.lower_threshold {
        (-params.large_step, REASON_LOWER)
    } else if last_score >= params.hold_band_midpoint {
        (params.small_step, REASON_STABILIZE)
    } else {
        (-params.small_step, REASON_STABILIZE)
    };

    let next = (current + step).clamp(0.0, 100.0);
    let delta = next - current;
    // A step fully swallowed by the clamp does not spend budget.
    let used = if delta.abs() > f64::EPSILON {
        adjustments_used + 1
    } else {
        adjustments_used
    };

    DifficultyDecision {
        difficulty: next,
        delta,
        adjustments_used: used,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> DifficultyParams {
        DifficultyParams::default()
    }

    #[test]
    fn strong_score_raises_by_large_step() {
        let d = adjust(50.0, 0.85, 0, &params());
        assert_eq!(d.difficulty, 65.0);
        assert_eq!(d.delta, 15.0);
        assert_eq!(d.adjustments_used, 1);
        assert_eq!(d.reason, REASON_RAISE);
    }

    #[test]
    fn weak_score_lowers_by_large_step() {
        let d = adjust(50.0, 0.3, 0, &params());
        assert_eq!(d.difficulty, 35.0);
        assert_eq!(d.reason, REASON_LOWER);
    }

    #[test]
    fn maintain_band_splits_at_midpoint() {
        let up = adjust(50.0, 0.72, 0, &params());
        assert_eq!(up.difficulty, 55.0);
        assert_eq!(up.reason, REASON_STABILIZE);

        let down = adjust(50.0, 0.65, 0, &params());
        assert_eq!(down.difficulty, 45.0);
        assert_eq!(down.reason, REASON_STABILIZE);
    }

    #[test]
    fn budget_exhaustion_locks_difficulty() {
        let p = params();
        let mut difficulty = 50.0;
        let mut used = 0;
        for expected in [35.0, 20.0, 5.0] {
            let d = adjust(difficulty, 0.3, used, &p);
            assert_eq!(d.difficulty, expected);
            difficulty = d.difficulty;
            used = d.adjustments_used;
        }
        assert_eq!(used, 3);

        let locked = adjust(difficulty, 0.3, used, &p);
        assert_eq!(locked.difficulty, 5.0);
        assert_eq!(locked.delta, 0.0);
        assert_eq!(locked.reason, REASON_LOCKED);
        assert_eq!(locked.adjustments_used, 3);
    }

    #[test]
    fn clamp_at_floor_does_not_spend_budget() {
        let d = adjust(0.0, 0.1, 1, &params());
        assert_eq!(d.difficulty, 0.0);
        assert_eq!(d.adjustments_used, 1);
    }

    #[test]
    fn result_stays_in_range_at_ceiling() {
        let d = adjust(95.0, 0.95, 0, &params());
        assert_eq!(d.difficulty, 100.0);
        assert_eq!(d.delta, 5.0);
        assert_eq!(d.adjustments_used, 1);
    }
}
