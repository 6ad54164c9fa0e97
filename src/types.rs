use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Stale,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Stale => "stale",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MasteryStatus {
    #[default]
    NotStarted,
    InProgress,
    Verified,
}

impl MasteryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "notstarted",
            Self::InProgress => "inprogress",
            Self::Verified => "verified",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    #[default]
    Basic,
    Intermediate,
    Advanced,
}

impl ComplexityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    /// Tier revealed once the current one is mastered.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Basic => Some(Self::Intermediate),
            Self::Intermediate => Some(Self::Advanced),
            Self::Advanced => None,
        }
    }
}

/// A distinct mode of evidence collection. Mastery verification requires
/// evidence from more than one channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentChannel {
    #[default]
    AdaptiveQuiz,
    ScenarioPrompt,
    FreeRecall,
}

impl AssessmentChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdaptiveQuiz => "adaptivequiz",
            Self::ScenarioPrompt => "scenarioprompt",
            Self::FreeRecall => "freerecall",
        }
    }
}

/// Immutable once written; owned by the session that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub question_id: String,
    /// Difficulty of the served item, 0-100.
    pub difficulty: f64,
    /// Continuous correctness, 0.0-1.0. Supports partial credit.
    pub score: f64,
    pub latency_ms: i64,
    /// Self-reported confidence, 0.0-1.0.
    pub confidence: Option<f64>,
    pub channel: AssessmentChannel,
    pub timestamp: i64,
}

/// One prior response summary supplied by the caller at session start.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorResponse {
    pub difficulty: f64,
    pub score: f64,
}

/// Derived ability estimate, recomputed after every response. A new value
/// replaces the prior one wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityEstimate {
    /// Latent ability on the 0-100 display scale.
    pub theta: f64,
    /// Clamped to [0.1, 10].
    pub standard_error: f64,
    pub ci_half_width: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub iterations: u32,
    pub converged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionBankItem {
    pub id: String,
    pub objective_id: String,
    /// 0-100.
    pub difficulty: f64,
    /// Point-biserial discrimination index; None until enough data.
    pub discrimination: Option<f64>,
    /// Observations behind the discrimination index.
    pub sample_size: u32,
    /// Last-served timestamp per user, epoch ms. Doubles as the claim
    /// guard for the optimistic conditional write.
    pub last_served: HashMap<String, i64>,
    pub tier: ComplexityTier,
    /// Set by out-of-band maintenance, never by the selector.
    pub excluded_from_rotation: bool,
}

impl QuestionBankItem {
    pub fn new(id: &str, objective_id: &str, difficulty: f64, tier: ComplexityTier) -> Self {
        Self {
            id: id.to_string(),
            objective_id: objective_id.to_string(),
            difficulty,
            discrimination: None,
            sample_size: 0,
            last_served: HashMap::new(),
            tier,
            excluded_from_rotation: false,
        }
    }
}

/// One record per (user, objective), created lazily on first response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryRecord {
    pub objective_id: String,
    pub owner_id: String,
    /// Length of the spaced qualifying chain.
    pub consecutive_qualifying: u32,
    pub channels_used: BTreeSet<AssessmentChannel>,
    pub last_qualifying_at: Option<i64>,
    pub status: MasteryStatus,
    /// Next complexity tier revealed on verification.
    pub unlocked_tier: Option<ComplexityTier>,
}

impl MasteryRecord {
    pub fn empty(objective_id: &str, owner_id: &str) -> Self {
        Self {
            objective_id: objective_id.to_string(),
            owner_id: owner_id.to_string(),
            consecutive_qualifying: 0,
            channels_used: BTreeSet::new(),
            last_qualifying_at: None,
            status: MasteryStatus::NotStarted,
            unlocked_tier: None,
        }
    }
}

/// One continuous assessment attempt. Mutated only by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSession {
    pub id: String,
    pub objective_id: String,
    pub owner_id: String,
    pub initial_difficulty: f64,
    pub current_difficulty: f64,
    pub adjustments_used: u8,
    /// Seed theta derived from prior history; replay always restarts here.
    pub seed_theta: f64,
    pub trajectory: Vec<ResponseRecord>,
    pub status: SessionStatus,
    /// Item served but not yet answered.
    pub pending_question: Option<QuestionBankItem>,
    /// Highest complexity tier served during the attempt.
    pub highest_tier: ComplexityTier,
    pub ability: Option<AbilityEstimate>,
    pub started_at: i64,
    pub last_activity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyAdjustment {
    pub delta: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EfficiencyMetrics {
    pub questions_saved: u32,
    /// 0-100.
    pub efficiency_score: f64,
}

/// Caller input for one answered question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub question_id: String,
    /// 0.0-1.0.
    pub correctness: f64,
    pub latency_ms: i64,
    pub confidence: Option<f64>,
    /// Defaults to the adaptive quiz channel.
    pub channel: Option<AssessmentChannel>,
}

/// What the engine tells the caller to do next.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directive {
    pub session_id: String,
    pub next_question: Option<QuestionBankItem>,
    pub current_difficulty: f64,
    pub adjustment: DifficultyAdjustment,
    pub ability: Option<AbilityEstimate>,
    pub can_stop_early: bool,
    pub efficiency: Option<EfficiencyMetrics>,
    pub mastery_status: MasteryStatus,
}

/// Final summary handed back when a session completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub objective_id: String,
    pub ability: Option<AbilityEstimate>,
    pub questions_asked: usize,
    pub efficiency: EfficiencyMetrics,
    pub mastery_status: MasteryStatus,
    pub status: SessionStatus,
}
