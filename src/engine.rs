//! Per-cycle orchestration: validate, append, estimate, adjust, select,
//! verify, directive.
//!
//! Each submit-response cycle is a single synchronous computation.
//! Sessions are independent; the only contended resource is the question
//! bank, reached through the store's conditional claim. Session state is
//! never authoritative in memory: the ability estimate is rebuilt by
//! replaying the persisted trajectory, so an abandoned attempt resumes
//! from its log alone.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::bank::{AssessmentStore, ContentGenerator};
use crate::config::EngineConfig;
use crate::difficulty;
use crate::error::EngineError;
use crate::estimator::IrtEstimator;
use crate::mastery::MasteryVerifier;
use crate::selector::{ItemObservation, QuestionSelector};
use crate::types::{
    AbilityEstimate, AssessmentChannel, AssessmentSession, DifficultyAdjustment, Directive,
    MasteryRecord, MasteryStatus, PriorResponse, ResponseRecord, SessionStatus, SessionSummary,
    SubmitResponse,
};

pub struct AssessmentEngine {
    config: EngineConfig,
    store: Arc<dyn AssessmentStore>,
    generator: Option<Arc<dyn ContentGenerator>>,
    estimator: IrtEstimator,
    selector: QuestionSelector,
    verifier: MasteryVerifier,
    // Sessions lock individually; the map lock is only held to look a
    // handle up, never across a submit cycle.
    sessions: RwLock<HashMap<String, Arc<Mutex<AssessmentSession>>>>,
    mastery: RwLock<HashMap<(String, String), MasteryRecord>>,
    observations: RwLock<Vec<ItemObservation>>,
}

impl AssessmentEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn AssessmentStore>,
        generator: Option<Arc<dyn ContentGenerator>>,
    ) -> Self {
        let estimator = IrtEstimator::new(config.estimator.clone());
        let selector = QuestionSelector::new(config.selector.clone());
        let verifier = MasteryVerifier::new(config.mastery.clone());
        Self {
            config,
            store,
            generator,
            estimator,
            selector,
            verifier,
            sessions: RwLock::new(HashMap::new()),
            mastery: RwLock::new(HashMap::new()),
            observations: RwLock::new(Vec::new()),
        }
    }

    /// Start one assessment attempt, seeding theta and the initial
    /// difficulty from the caller-supplied prior history.
    pub fn start_session(
        &self,
        objective_id: &str,
        owner_id: &str,
        prior_history: &[PriorResponse],
    ) -> Result<Directive, EngineError> {
        let now = Utc::now().timestamp_millis();
        let seed = self.estimator.seed_from_history(prior_history);
        let ability = self.estimator.estimate(&[], seed);

        let first = self.selector.select(
            self.store.as_ref(),
            self.generator.as_deref(),
            objective_id,
            owner_id,
            seed,
            now,
        )?;

        let session = AssessmentSession {
            id: Uuid::new_v4().to_string(),
            objective_id: objective_id.to_string(),
            owner_id: owner_id.to_string(),
            initial_difficulty: seed,
            current_difficulty: seed,
            adjustments_used: 0,
            seed_theta: seed,
            trajectory: Vec::new(),
            status: SessionStatus::Active,
            pending_question: Some(first.clone()),
            highest_tier: first.tier,
            ability: Some(ability.clone()),
            started_at: now,
            last_activity: now,
        };
        let session_id = session.id.clone();
        tracing::info!(session_id = %session_id, objective_id, owner_id, seed, "session started");
        self.sessions
            .write()
            .insert(session_id.clone(), Arc::new(Mutex::new(session)));

        let mastery_status = self
            .mastery
            .read()
            .get(&(owner_id.to_string(), objective_id.to_string()))
            .map(|r| r.status)
            .unwrap_or_default();

        Ok(Directive {
            session_id,
            next_question: Some(first),
            current_difficulty: seed,
            adjustment: DifficultyAdjustment {
                delta: 0.0,
                reason: "initial difficulty seeded from prior history".to_string(),
            },
            ability: Some(ability),
            can_stop_early: false,
            efficiency: None,
            mastery_status,
        })
    }

    /// Process one answered question and return the next directive.
    pub fn submit_response(
        &self,
        session_id: &str,
        input: SubmitResponse,
    ) -> Result<Directive, EngineError> {
        validate(&input)?;
        let now = Utc::now().timestamp_millis();

        let handle = self.session_handle(session_id)?;
        let mut session = handle.lock();
        if session.status != SessionStatus::Active {
            return Err(EngineError::StaleSession(session_id.to_string()));
        }

        let served = session
            .pending_question
            .take()
            .filter(|q| q.id == input.question_id);
        let difficulty_served = served
            .as_ref()
            .map(|q| q.difficulty)
            .unwrap_or(session.current_difficulty);
        if let Some(ref q) = served {
            session.highest_tier = session.highest_tier.max(q.tier);
        }

        let record = ResponseRecord {
            question_id: input.question_id.clone(),
            difficulty: difficulty_served,
            score: input.correctness,
            latency_ms: input.latency_ms,
            confidence: input.confidence,
            channel: input.channel.unwrap_or(AssessmentChannel::AdaptiveQuiz),
            timestamp: now,
        };
        self.store.append_response(
            &session.owner_id,
            &session.objective_id,
            &session.id,
            &record,
        );
        session.trajectory.push(record);
        session.last_activity = now;

        let ability = self.replay_estimate(&session);
        let can_stop_early = self
            .estimator
            .can_stop_early(session.trajectory.len(), &ability);
        let efficiency = self.estimator.efficiency(session.trajectory.len());
        session.ability = Some(ability.clone());

        let decision = difficulty::adjust(
            session.current_difficulty,
            input.correctness,
            session.adjustments_used,
            &self.config.difficulty,
        );
        session.current_difficulty = decision.difficulty;
        session.adjustments_used = decision.adjustments_used;
        tracing::debug!(
            session_id = %session.id,
            difficulty = decision.difficulty,
            delta = decision.delta,
            reason = decision.reason,
            "difficulty adjusted"
        );

        let mastery_status = self.refresh_mastery(&session);

        let next = self.selector.select(
            self.store.as_ref(),
            self.generator.as_deref(),
            &session.objective_id,
            &session.owner_id,
            session.current_difficulty,
            now,
        );
        let next_question = match next {
            Ok(item) => {
                session.pending_question = Some(item.clone());
                Some(item)
            }
            Err(err @ EngineError::QuestionBankDepleted { .. }) => {
                // Paused, not failed: all state above is already durable
                // and the session stays active for resumption.
                tracing::warn!(session_id = %session.id, "assessment paused, awaiting new content");
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        Ok(Directive {
            session_id: session.id.clone(),
            next_question,
            current_difficulty: session.current_difficulty,
            adjustment: DifficultyAdjustment {
                delta: decision.delta,
                reason: decision.reason.to_string(),
            },
            ability: Some(ability),
            can_stop_early,
            efficiency: Some(efficiency),
            mastery_status,
        })
    }

    /// Rebuild engine state for an interrupted attempt by replaying the
    /// persisted trajectory; reactivates a stale session.
    pub fn resume_session(&self, session_id: &str) -> Result<Directive, EngineError> {
        let now = Utc::now().timestamp_millis();
        let handle = self.session_handle(session_id)?;
        let mut session = handle.lock();
        if session.status == SessionStatus::Completed {
            return Err(EngineError::StaleSession(session_id.to_string()));
        }
        session.status = SessionStatus::Active;
        session.last_activity = now;

        let ability = self.replay_estimate(&session);
        session.ability = Some(ability.clone());
        let can_stop_early = self
            .estimator
            .can_stop_early(session.trajectory.len(), &ability);
        let efficiency = if session.trajectory.is_empty() {
            None
        } else {
            Some(self.estimator.efficiency(session.trajectory.len()))
        };

        let next_question = match session.pending_question.clone() {
            Some(pending) => Some(pending),
            None => {
                let selected = self.selector.select(
                    self.store.as_ref(),
                    self.generator.as_deref(),
                    &session.objective_id,
                    &session.owner_id,
                    session.current_difficulty,
                    now,
                )?;
                session.pending_question = Some(selected.clone());
                Some(selected)
            }
        };

        let mastery_status = self.mastery_status_for(&session);
        Ok(Directive {
            session_id: session.id.clone(),
            next_question,
            current_difficulty: session.current_difficulty,
            adjustment: DifficultyAdjustment {
                delta: 0.0,
                reason: "session resumed from response log".to_string(),
            },
            ability: Some(ability),
            can_stop_early,
            efficiency,
            mastery_status,
        })
    }

    /// Complete the attempt and feed its per-item outcomes into the
    /// discrimination bookkeeping.
    pub fn finish_session(&self, session_id: &str) -> Result<SessionSummary, EngineError> {
        let handle = self.session_handle(session_id)?;
        let mut session = handle.lock();
        // Finishing twice would re-queue the trajectory's observations
        // and inflate the discrimination sample.
        if session.status == SessionStatus::Completed {
            return Err(EngineError::StaleSession(session_id.to_string()));
        }
        session.status = SessionStatus::Completed;
        session.pending_question = None;

        if !session.trajectory.is_empty() {
            let session_score = session.trajectory.iter().map(|r| r.score).sum::<f64>()
                / session.trajectory.len() as f64;
            let mut observations = self.observations.write();
            for record in &session.trajectory {
                observations.push(ItemObservation {
                    item_id: record.question_id.clone(),
                    item_score: record.score,
                    session_score,
                });
            }
        }

        let questions_asked = session.trajectory.len();
        let summary = SessionSummary {
            session_id: session.id.clone(),
            objective_id: session.objective_id.clone(),
            ability: session.ability.clone(),
            questions_asked,
            efficiency: self.estimator.efficiency(questions_asked),
            mastery_status: self.mastery_status_for(&session),
            status: session.status,
        };
        tracing::info!(session_id = %session.id, questions_asked, "session completed");
        Ok(summary)
    }

    /// Mark sessions stale after the configured inactivity window.
    /// Their qualifying responses remain valid mastery evidence.
    pub fn sweep_stale(&self) -> usize {
        let now = Utc::now().timestamp_millis();
        let timeout = self.config.session.inactivity_timeout_ms;
        let sessions = self.sessions.read();
        let mut marked = 0;
        for handle in sessions.values() {
            let mut session = handle.lock();
            if session.status == SessionStatus::Active && now - session.last_activity > timeout {
                session.status = SessionStatus::Stale;
                marked += 1;
            }
        }
        if marked > 0 {
            tracing::info!(marked, "marked inactive sessions stale");
        }
        marked
    }

    /// Out-of-band maintenance pass over completed-session observations.
    /// Observations consumed by a successful stats write are drained;
    /// under-sampled and conflicted groups stay queued for the next pass.
    pub fn run_discrimination_maintenance(&self) -> usize {
        let mut observations = self.observations.write();
        let updated = self
            .selector
            .recompute_discrimination(self.store.as_ref(), &observations);
        observations.retain(|obs| !updated.contains(&obs.item_id));
        updated.len()
    }

    pub fn session(&self, session_id: &str) -> Option<AssessmentSession> {
        self.sessions
            .read()
            .get(session_id)
            .map(|handle| handle.lock().clone())
    }

    pub fn mastery_record(&self, owner_id: &str, objective_id: &str) -> Option<MasteryRecord> {
        self.mastery
            .read()
            .get(&(owner_id.to_string(), objective_id.to_string()))
            .cloned()
    }

    fn session_handle(
        &self,
        session_id: &str,
    ) -> Result<Arc<Mutex<AssessmentSession>>, EngineError> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))
    }

    fn replay_estimate(&self, session: &AssessmentSession) -> AbilityEstimate {
        let trajectory: Vec<(f64, f64)> = session
            .trajectory
            .iter()
            .map(|r| (r.difficulty, r.score))
            .collect();
        self.estimator.estimate(&trajectory, session.seed_theta)
    }

    fn refresh_mastery(&self, session: &AssessmentSession) -> MasteryStatus {
        let history = self
            .store
            .response_history(&session.owner_id, &session.objective_id);
        let key = (session.owner_id.clone(), session.objective_id.clone());
        let mut mastery = self.mastery.write();
        let record = self.verifier.evaluate(
            &session.objective_id,
            &session.owner_id,
            &history,
            mastery.get(&key),
            session.highest_tier,
        );
        let status = record.status;
        mastery.insert(key, record);
        status
    }

    fn mastery_status_for(&self, session: &AssessmentSession) -> MasteryStatus {
        self.mastery
            .read()
            .get(&(session.owner_id.clone(), session.objective_id.clone()))
            .map(|r| r.status)
            .unwrap_or_default()
    }
}

fn validate(input: &SubmitResponse) -> Result<(), EngineError> {
    if !(0.0..=1.0).contains(&input.correctness) {
        return Err(EngineError::Validation(format!(
            "correctness {} outside [0, 1]",
            input.correctness
        )));
    }
    if let Some(confidence) = input.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(EngineError::Validation(format!(
                "confidence {confidence} outside [0, 1]"
            )));
        }
    }
    Ok(())
}
