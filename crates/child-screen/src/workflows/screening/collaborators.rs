use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::bonding::BondingAssessment;
use super::classification::ScreeningStatus;
use super::domain::{
    ChildId, EmotionLogEntry, ScoreCard, ScreeningId, ScreeningSubmission, SubmissionScores,
};
use super::guidance::TipSheet;
use super::ml::DetectedEmotion;

/// Status shown when the screening store cannot classify the session.
pub const FALLBACK_STATUS: ScreeningStatus = ScreeningStatus::HealthyProgress;
pub const FALLBACK_RECOMMENDATION: &str =
    "Focus on interactive storytelling and sound recognition games.";
pub const FALLBACK_BONDING_SCORE: f64 = 0.75;

/// Failure of an external collaborator call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("request rejected before dispatch: {0}")]
    Rejected(String),
    #[error("collaborator returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("collaborator task aborted: {0}")]
    Aborted(String),
}

/// Screening store response for a persisted submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningReceipt {
    pub screening_id: ScreeningId,
    pub child_id: ChildId,
    pub age_months: u32,
    pub status: ScreeningStatus,
    pub recommendation: String,
    pub total_score: u8,
    pub scores: SubmissionScores,
    #[serde(default)]
    pub emotions: Vec<DetectedEmotion>,
    #[serde(default)]
    pub heatmap: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondingRequest {
    pub child_id: ChildId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipRequest {
    pub child_id: ChildId,
    pub scores: ScoreCard,
}

#[async_trait]
pub trait ScreeningStore: Send + Sync {
    async fn save_screening(
        &self,
        submission: &ScreeningSubmission,
    ) -> Result<ScreeningReceipt, CollaboratorError>;

    async fn save_emotion_logs(
        &self,
        child_id: &ChildId,
        logs: &[EmotionLogEntry],
    ) -> Result<usize, CollaboratorError>;
}

#[async_trait]
pub trait BondingAdvisor: Send + Sync {
    async fn assess(&self, request: &BondingRequest)
        -> Result<BondingAssessment, CollaboratorError>;
}

#[async_trait]
pub trait TipAdvisor: Send + Sync {
    async fn tips(&self, request: &TipRequest) -> Result<TipSheet, CollaboratorError>;
}

/// The three services a session fans out to at submission and feedback time.
#[derive(Clone)]
pub struct SubmissionCollaborators {
    pub store: Arc<dyn ScreeningStore>,
    pub bonding: Arc<dyn BondingAdvisor>,
    pub tips: Arc<dyn TipAdvisor>,
}

impl SubmissionCollaborators {
    pub fn new(
        store: Arc<dyn ScreeningStore>,
        bonding: Arc<dyn BondingAdvisor>,
        tips: Arc<dyn TipAdvisor>,
    ) -> Self {
        Self {
            store,
            bonding,
            tips,
        }
    }
}

/// Where a report value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    Collaborator,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

/// Take the collaborator's value, or log the failure and substitute the fallback.
pub fn resolve_or_fallback<T>(
    collaborator: &'static str,
    result: Result<T, CollaboratorError>,
    fallback: impl FnOnce() -> T,
) -> Resolved<T> {
    match result {
        Ok(value) => Resolved {
            value,
            source: ValueSource::Collaborator,
        },
        Err(error) => {
            warn!(collaborator, %error, "collaborator failed; substituting fallback");
            Resolved {
                value: fallback(),
                source: ValueSource::Fallback,
            }
        }
    }
}

pub fn fallback_bonding() -> BondingAssessment {
    BondingAssessment::from_score(FALLBACK_BONDING_SCORE)
}

pub fn fallback_tips() -> TipSheet {
    TipSheet {
        tips: Vec::new(),
        tip: FALLBACK_RECOMMENDATION.to_string(),
    }
}
