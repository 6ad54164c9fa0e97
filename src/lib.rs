//! # assessment-engine
//!
//! Adaptive assessment engine for certifying durable mastery of a
//! learning objective from a short stream of scored responses.
//!
//! The engine is a pure computation and state-transition component: the
//! caller submits one response at a time and receives a directive with
//! the next item, the updated ability estimate, and the mastery status.
//! Storage and content generation sit behind collaborator traits.
//!
//! ## Modules
//!
//! - [`estimator`] - Rasch (1PL) ability estimation with damped iterative
//!   convergence, seeding, and efficiency metrics
//! - [`difficulty`] - bounded difficulty-adjustment controller
//! - [`selector`] - question selection with cooldown, novelty tie-breaks,
//!   and discrimination-index maintenance
//! - [`mastery`] - mastery-verification state machine with anti-cramming
//!   spacing rules
//! - [`engine`] - per-cycle orchestration and session lifecycle
//! - [`bank`] - collaborator traits plus the in-memory question bank
//! - [`config`] - tunable parameters with protocol defaults
//! - [`types`] - sessions, records, estimates, and directives
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use assessment_engine::{
//!     AssessmentEngine, ComplexityTier, EngineConfig, InMemoryBank, QuestionBankItem,
//!     SubmitResponse,
//! };
//!
//! let bank = InMemoryBank::new();
//! bank.insert_item(QuestionBankItem::new("q1", "fractions", 50.0, ComplexityTier::Basic));
//! bank.insert_item(QuestionBankItem::new("q2", "fractions", 60.0, ComplexityTier::Basic));
//!
//! let engine = AssessmentEngine::new(EngineConfig::default(), Arc::new(bank), None);
//! let directive = engine.start_session("fractions", "learner-1", &[]).unwrap();
//! let question = directive.next_question.unwrap();
//! let next = engine
//!     .submit_response(
//!         &directive.session_id,
//!         SubmitResponse {
//!             question_id: question.id,
//!             correctness: 0.9,
//!             latency_ms: 2100,
//!             confidence: None,
//!             channel: None,
//!         },
//!     )
//!     .unwrap();
//! assert!(next.ability.unwrap().theta > 50.0);
//! ```

pub mod bank;
pub mod config;
pub mod difficulty;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod mastery;
pub mod selector;
pub mod types;

pub use bank::{AssessmentStore, ContentGenerator, InMemoryBank};
pub use config::{
    DifficultyParams, EngineConfig, EstimatorParams, MasteryParams, SelectorParams, SessionParams,
};
pub use difficulty::{adjust, DifficultyDecision};
pub use engine::AssessmentEngine;
pub use error::EngineError;
pub use estimator::IrtEstimator;
pub use mastery::MasteryVerifier;
pub use selector::{point_biserial, ItemObservation, QuestionSelector};
pub use types::{
    AbilityEstimate, AssessmentChannel, AssessmentSession, ComplexityTier, DifficultyAdjustment,
    Directive, EfficiencyMetrics, MasteryRecord, MasteryStatus, PriorResponse, QuestionBankItem,
    ResponseRecord, SessionStatus, SessionSummary, SubmitResponse,
};
