//! Question selection with cooldown, novelty tie-breaks, and
//! discrimination-index maintenance.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::bank::{AssessmentStore, ContentGenerator};
use crate::config::SelectorParams;
use crate::error::EngineError;
use crate::types::QuestionBankItem;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// One per-item data point from a completed session, feeding the
/// point-biserial discrimination index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemObservation {
    pub item_id: String,
    pub item_score: f64,
    pub session_score: f64,
}

#[derive(Debug, Clone)]
pub struct QuestionSelector {
    params: SelectorParams,
}

impl QuestionSelector {
    pub fn new(params: SelectorParams) -> Self {
        Self { params }
    }

    /// Pick the next item near the target difficulty.
    ///
    /// Candidates inside the tolerance band and outside the user's
    /// cooldown window are ranked never-served first, then by distance
    /// from the target. The top candidate is claimed atomically; a claim
    /// conflict falls through to the next rank. Bank depletion invokes
    /// the generation fallback once before surfacing an error.
    pub fn select(
        &self,
        store: &dyn AssessmentStore,
        generator: Option<&dyn ContentGenerator>,
        objective_id: &str,
        user_id: &str,
        target_difficulty: f64,
        now: i64,
    ) -> Result<QuestionBankItem, EngineError> {
        let lo = (target_difficulty - self.params.tolerance_band).max(0.0);
        let hi = (target_difficulty + self.params.tolerance_band).min(100.0);
        let cooldown_ms = self.params.cooldown_days * MS_PER_DAY;

        let mut candidates = store.read_candidates(objective_id, lo, hi);
        candidates.retain(|item| {
            item.last_served
                .get(user_id)
                .map_or(true, |&ts| now - ts >= cooldown_ms)
        });
        candidates.sort_by(|a, b| {
            let a_served = a.last_served.contains_key(user_id);
            let b_served = b.last_served.contains_key(user_id);
            a_served.cmp(&b_served).then_with(|| {
                let da = (a.difficulty - target_difficulty).abs();
                let db = (b.difficulty - target_difficulty).abs();
                da.partial_cmp(&db).unwrap_or(Ordering::Equal)
            })
        });

        for item in candidates {
            let expected = item.last_served.get(user_id).copied();
            if store.claim_item(&item.id, user_id, expected, now) {
                let mut claimed = item;
                claimed.last_served.insert(user_id.to_string(), now);
                return Ok(claimed);
            }
            tracing::debug!(item_id = %item.id, "claim conflict, trying next candidate");
        }

        if let Some(generator) = generator {
            if let Some(item) = generator.generate(objective_id, target_difficulty) {
                tracing::info!(objective_id, target_difficulty, "bank depleted, generated item");
                return Ok(item);
            }
        }

        Err(EngineError::QuestionBankDepleted {
            objective_id: objective_id.to_string(),
        })
    }

    /// Recompute discrimination indices from completed-session
    /// observations. Items with enough data and a correlation below the
    /// minimum are flagged for rotation exclusion. Returns the ids whose
    /// stats were written, so the caller can drain their observations.
    pub fn recompute_discrimination(
        &self,
        store: &dyn AssessmentStore,
        observations: &[ItemObservation],
    ) -> Vec<String> {
        let mut by_item: HashMap<&str, Vec<&ItemObservation>> = HashMap::new();
        for obs in observations {
            by_item.entry(&obs.item_id).or_default().push(obs);
        }

        let mut updated = Vec::new();
        for (item_id, group) in by_item {
            if group.len() < self.params.min_sample_size {
                continue;
            }
            let Some(r) = point_biserial(&group) else {
                continue;
            };
            let excluded = r < self.params.min_discrimination;
            if store.update_item_stats(item_id, r, group.len() as u32, excluded) {
                updated.push(item_id.to_string());
            } else {
                tracing::debug!(item_id, "discrimination write conflict, will retry next pass");
            }
        }
        updated
    }
}

impl Default for QuestionSelector {
    fn default() -> Self {
        Self::new(SelectorParams::default())
    }
}

/// Point-biserial correlation between dichotomized per-item correctness
/// (score >= 0.5) and overall session score. None when the groups or the
/// variance are degenerate.
pub fn point_biserial(observations: &[&ItemObservation]) -> Option<f64> {
    let n = observations.len();
    if n < 2 {
        return None;
    }

    let mut sum_correct = 0.0;
    let mut n_correct = 0usize;
    let mut sum_incorrect = 0.0;
    for obs in observations {
        if obs.item_score >= 0.5 {
            sum_correct += obs.session_score;
            n_correct += 1;
        } else {
            sum_incorrect += obs.session_score;
        }
    }
    let n_incorrect = n - n_correct;
    if n_correct == 0 || n_incorrect == 0 {
        return None;
    }

    let mean_all: f64 = observations.iter().map(|o| o.session_score).sum::<f64>() / n as f64;
    let variance: f64 = observations
        .iter()
        .map(|o| (o.session_score - mean_all).powi(2))
        .sum::<f64>()
        / n as f64;
    if variance <= f64::EPSILON {
        return None;
    }

    let mean_correct = sum_correct / n_correct as f64;
    let mean_incorrect = sum_incorrect / n_incorrect as f64;
    let p = n_correct as f64 / n as f64;
    let q = 1.0 - p;
    Some((mean_correct - mean_incorrect) / variance.sqrt() * (p * q).sqrt())
}
