//! Collaborator seams and the in-memory question bank.
//!
//! The engine is a pure computation component; durable storage and
//! on-demand content generation sit behind these traits. `InMemoryBank`
//! is the reference implementation used in tests and by embedded callers.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::types::{QuestionBankItem, ResponseRecord};

/// Persistent-store collaborator. Implementations must make `claim_item`
/// a conditional write: the claim succeeds only if the item's last-served
/// stamp for the user still matches `expected_last_served`.
pub trait AssessmentStore: Send + Sync {
    /// Items for the objective with difficulty in `[lo, hi]`, excluding
    /// items flagged out of rotation.
    fn read_candidates(&self, objective_id: &str, lo: f64, hi: f64) -> Vec<QuestionBankItem>;

    /// Append-only; records are immutable once written.
    fn append_response(
        &self,
        owner_id: &str,
        objective_id: &str,
        session_id: &str,
        record: &ResponseRecord,
    );

    /// Full cross-session history for one (user, objective) pair.
    fn response_history(&self, owner_id: &str, objective_id: &str) -> Vec<ResponseRecord>;

    /// Optimistic conditional claim. Returns false on conflict; the
    /// selector retries against the next-ranked candidate.
    fn claim_item(
        &self,
        item_id: &str,
        user_id: &str,
        expected_last_served: Option<i64>,
        now: i64,
    ) -> bool;

    /// Out-of-band maintenance write, same optimistic discipline.
    fn update_item_stats(
        &self,
        item_id: &str,
        discrimination: f64,
        sample_size: u32,
        excluded: bool,
    ) -> bool;
}

/// Invoked only once the bank is depleted for the target difficulty.
pub trait ContentGenerator: Send + Sync {
    fn generate(&self, objective_id: &str, target_difficulty: f64) -> Option<QuestionBankItem>;
}

#[derive(Default)]
pub struct InMemoryBank {
    items: RwLock<HashMap<String, QuestionBankItem>>,
    responses: RwLock<HashMap<(String, String), Vec<ResponseRecord>>>,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_item(&self, item: QuestionBankItem) {
        self.items.write().insert(item.id.clone(), item);
    }

    pub fn item(&self, item_id: &str) -> Option<QuestionBankItem> {
        self.items.read().get(item_id).cloned()
    }
}

impl AssessmentStore for InMemoryBank {
    fn read_candidates(&self, objective_id: &str, lo: f64, hi: f64) -> Vec<QuestionBankItem> {
        self.items
            .read()
            .values()
            .filter(|item| {
                item.objective_id == objective_id
                    && !item.excluded_from_rotation
                    && item.difficulty >= lo
                    && item.difficulty <= hi
            })
            .cloned()
            .collect()
    }

    fn append_response(
        &self,
        owner_id: &str,
        objective_id: &str,
        _session_id: &str,
        record: &ResponseRecord,
    ) {
        self.responses
            .write()
            .entry((owner_id.to_string(), objective_id.to_string()))
            .or_default()
            .push(record.clone());
    }

    fn response_history(&self, owner_id: &str, objective_id: &str) -> Vec<ResponseRecord> {
        self.responses
            .read()
            .get(&(owner_id.to_string(), objective_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn claim_item(
        &self,
        item_id: &str,
        user_id: &str,
        expected_last_served: Option<i64>,
        now: i64,
    ) -> bool {
        let mut items = self.items.write();
        let Some(item) = items.get_mut(item_id) else {
            return false;
        };
        if item.last_served.get(user_id).copied() != expected_last_served {
            return false;
        }
        item.last_served.insert(user_id.to_string(), now);
        true
    }

    fn update_item_stats(
        &self,
        item_id: &str,
        discrimination: f64,
        sample_size: u32,
        excluded: bool,
    ) -> bool {
        let mut items = self.items.write();
        let Some(item) = items.get_mut(item_id) else {
            return false;
        };
        item.discrimination = Some(discrimination);
        item.sample_size = sample_size;
        item.excluded_from_rotation = excluded;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ComplexityTier;

    #[test]
    fn claim_is_conditional_on_last_served() {
        let bank = InMemoryBank::new();
        bank.insert_item(QuestionBankItem::new("q1", "obj", 50.0, ComplexityTier::Basic));

        // Two racing claims with the same expectation: exactly one wins.
        assert!(bank.claim_item("q1", "u1", None, 1_000));
        assert!(!bank.claim_item("q1", "u1", None, 1_001));

        // A claim carrying the fresh stamp succeeds again.
        assert!(bank.claim_item("q1", "u1", Some(1_000), 2_000));
    }

    #[test]
    fn candidates_filter_range_and_rotation() {
        let bank = InMemoryBank::new();
        bank.insert_item(QuestionBankItem::new("in", "obj", 55.0, ComplexityTier::Basic));
        bank.insert_item(QuestionBankItem::new("out", "obj", 80.0, ComplexityTier::Basic));
        let mut excluded = QuestionBankItem::new("dull", "obj", 52.0, ComplexityTier::Basic);
        excluded.excluded_from_rotation = true;
        bank.insert_item(excluded);
        bank.insert_item(QuestionBankItem::new("other", "obj2", 55.0, ComplexityTier::Basic));

        let candidates = bank.read_candidates("obj", 45.0, 65.0);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "in");
    }

    #[test]
    fn history_accumulates_across_sessions() {
        let bank = InMemoryBank::new();
        let record = ResponseRecord {
            question_id: "q1".to_string(),
            difficulty: 50.0,
            score: 0.9,
            latency_ms: 1200,
            confidence: None,
            channel: Default::default(),
            timestamp: 1,
        };
        bank.append_response("u1", "obj", "s1", &record);
        bank.append_response("u1", "obj", "s2", &record);
        assert_eq!(bank.response_history("u1", "obj").len(), 2);
        assert!(bank.response_history("u2", "obj").is_empty());
    }
}
