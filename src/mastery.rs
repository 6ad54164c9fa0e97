//! Mastery-verification state machine.
//!
//! Evaluates the full cross-session response history for one
//! (user, objective) pair. Verification demands a spaced chain of
//! high-scoring responses across more than one assessment channel, with
//! sane confidence calibration. The spacing chain is the anti-cramming
//! rule: extra attempts squeezed between spaced ones neither help nor
//! break an otherwise valid chain.

use crate::config::MasteryParams;
use crate::types::{ComplexityTier, MasteryRecord, MasteryStatus, ResponseRecord};

const MS_PER_HOUR: i64 = 60 * 60 * 1000;

#[derive(Debug, Clone)]
pub struct MasteryVerifier {
    params: MasteryParams,
}

impl MasteryVerifier {
    pub fn new(params: MasteryParams) -> Self {
        Self { params }
    }

    /// Re-evaluate mastery from history. `previous` short-circuits a
    /// verified record: verification is terminal per objective.
    /// `reached_tier` is the tier the objective is currently assessed at;
    /// its successor is revealed on verification.
    pub fn evaluate(
        &self,
        objective_id: &str,
        owner_id: &str,
        history: &[ResponseRecord],
        previous: Option<&MasteryRecord>,
        reached_tier: ComplexityTier,
    ) -> MasteryRecord {
        if let Some(prev) = previous {
            if prev.status == MasteryStatus::Verified {
                return prev.clone();
            }
        }

        let mut record = MasteryRecord::empty(objective_id, owner_id);
        if history.is_empty() {
            return record;
        }
        record.status = MasteryStatus::InProgress;

        let chain = self.spaced_qualifying_chain(history);
        record.consecutive_qualifying = chain.len() as u32;
        record.channels_used = chain.iter().map(|r| r.channel).collect();
        record.last_qualifying_at = chain.last().map(|r| r.timestamp);

        let calibrated = chain.iter().all(|r| self.well_calibrated(r));
        if chain.len() >= self.params.required_count as usize
            && record.channels_used.len() >= self.params.required_channels
            && calibrated
        {
            record.status = MasteryStatus::Verified;
            record.unlocked_tier = reached_tier.next();
            tracing::info!(
                objective_id,
                owner_id,
                qualifying = record.consecutive_qualifying,
                "mastery verified"
            );
        }
        record
    }

    /// Greedy chain over time-ordered qualifying responses: a response is
    /// kept only if it lands at least the minimum spacing after the
    /// previously kept one.
    fn spaced_qualifying_chain<'a>(&self, history: &'a [ResponseRecord]) -> Vec<&'a ResponseRecord> {
        let spacing_ms = self.params.min_spacing_hours * MS_PER_HOUR;
        let mut qualifying: Vec<&ResponseRecord> = history
            .iter()
            .filter(|r| r.score >= self.params.qualifying_score)
            .collect();
        qualifying.sort_by_key(|r| r.timestamp);

        let mut chain: Vec<&ResponseRecord> = Vec::new();
        for response in qualifying {
            match chain.last() {
                Some(prev) if response.timestamp - prev.timestamp < spacing_ms => {}
                _ => chain.push(response),
            }
        }
        chain
    }

    /// Responses without self-reported confidence are exempt.
    fn well_calibrated(&self, response: &ResponseRecord) -> bool {
        match response.confidence {
            Some(confidence) => {
                ((confidence - response.score) * 100.0).abs() <= self.params.calibration_tolerance
            }
            None => true,
        }
    }
}

impl Default for MasteryVerifier {
    fn default() -> Self {
        Self::new(MasteryParams::default())
    }
}
