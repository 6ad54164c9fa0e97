use thiserror::Error;

/// Errors surfaced to the caller.
///
/// Numerical instability in the estimator and claim races in the selector
/// are recovered locally and never appear here; they only show up as a
/// wider confidence interval or a different chosen item.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// No eligible candidate remained and the generation fallback yielded
    /// nothing. The session is paused, not destroyed.
    #[error("question bank depleted for objective {objective_id}")]
    QuestionBankDepleted { objective_id: String },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session {0} is not active")]
    StaleSession(String),
}
