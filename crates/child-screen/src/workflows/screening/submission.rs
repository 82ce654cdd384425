//! Best-effort fan-out performed when a session is submitted or closed with feedback.
//!
//! Each collaborator call runs as its own task; a failure, timeout, or panic in one
//! of them is replaced by its fallback and never prevents a report from being built.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

use super::bonding::BondingAssessment;
use super::collaborators::{
    fallback_bonding, fallback_tips, resolve_or_fallback, BondingRequest, CollaboratorError,
    Resolved, ScreeningReceipt, SubmissionCollaborators, TipRequest, ValueSource,
    FALLBACK_RECOMMENDATION, FALLBACK_STATUS,
};
use super::domain::{
    CapturedImage, ChildId, EmotionLogEntry, ScoreCard, ScreeningFeedback, ScreeningSubmission,
    SubmissionScores,
};
use super::guidance::TipSheet;
use super::ml::DetectedEmotion;
use super::session::{SessionError, SessionId};

/// Everything needed to submit one completed session, detached from the session itself.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub session_id: SessionId,
    pub submission: ScreeningSubmission,
    pub scores: ScoreCard,
    pub normalized: SubmissionScores,
    pub emotion_logs: Vec<EmotionLogEntry>,
    pub bonding_text: Option<String>,
}

/// Which collaborator supplied each part of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSources {
    pub screening: ValueSource,
    pub bonding: ValueSource,
    pub tips: ValueSource,
}

/// Displayable end-of-session report. Always populated, possibly from fallbacks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreeningReport {
    pub child_id: ChildId,
    pub status: String,
    pub recommendation: String,
    pub total_score: u8,
    pub scores: SubmissionScores,
    pub heatmap: Option<String>,
    pub emotions: Vec<DetectedEmotion>,
    pub emotion_logs: Vec<EmotionLogEntry>,
    pub bonding: BondingAssessment,
    pub tips: TipSheet,
    pub sources: ReportSources,
}

/// Result of the submission fan-out, applied back onto the owning session.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub session_id: SessionId,
    pub report: ScreeningReport,
}

fn joined<T>(
    collaborator: &'static str,
    result: Result<Result<T, CollaboratorError>, JoinError>,
) -> Result<T, CollaboratorError> {
    match result {
        Ok(inner) => inner,
        Err(error) => {
            warn!(collaborator, %error, "collaborator task did not complete");
            Err(CollaboratorError::Aborted(error.to_string()))
        }
    }
}

async fn join_optional<T>(
    collaborator: &'static str,
    handle: Option<JoinHandle<Result<T, CollaboratorError>>>,
    rejection: &str,
) -> Result<T, CollaboratorError> {
    match handle {
        Some(handle) => joined(collaborator, handle.await),
        None => Err(CollaboratorError::Rejected(rejection.to_string())),
    }
}

fn spawn_bonding(
    collaborators: &SubmissionCollaborators,
    child_id: &ChildId,
    text: Option<String>,
) -> Option<JoinHandle<Result<BondingAssessment, CollaboratorError>>> {
    let text = text.filter(|text| !text.trim().is_empty())?;
    let advisor = Arc::clone(&collaborators.bonding);
    let request = BondingRequest {
        child_id: child_id.clone(),
        text,
    };
    Some(tokio::spawn(async move { advisor.assess(&request).await }))
}

fn spawn_tips(
    collaborators: &SubmissionCollaborators,
    child_id: &ChildId,
    scores: &ScoreCard,
) -> JoinHandle<Result<TipSheet, CollaboratorError>> {
    let advisor = Arc::clone(&collaborators.tips);
    let request = TipRequest {
        child_id: child_id.clone(),
        scores: scores.clone(),
    };
    tokio::spawn(async move { advisor.tips(&request).await })
}

impl SubmissionRequest {
    /// Issue the screening save, bonding, and tips calls concurrently and build the report.
    pub async fn dispatch(self, collaborators: &SubmissionCollaborators) -> SubmissionOutcome {
        let child_id = self.submission.child_id.clone();

        let store = Arc::clone(&collaborators.store);
        let submission = self.submission.clone();
        let screening = tokio::spawn(async move { store.save_screening(&submission).await });
        let bonding = spawn_bonding(collaborators, &child_id, self.bonding_text.clone());
        let tips = spawn_tips(collaborators, &child_id, &self.scores);
        let logs = (!self.emotion_logs.is_empty()).then(|| {
            let store = Arc::clone(&collaborators.store);
            let child_id = child_id.clone();
            let logs = self.emotion_logs.clone();
            tokio::spawn(async move { store.save_emotion_logs(&child_id, &logs).await })
        });

        let (screening, bonding, tips, logs) = tokio::join!(
            screening,
            join_optional("bonding", bonding, "no emotion observations to assess"),
            tips,
            join_optional("emotion_logs", logs, "no emotion logs recorded"),
        );

        match logs {
            Ok(saved) => debug!(%child_id, saved, "emotion logs saved"),
            Err(CollaboratorError::Rejected(_)) => {}
            Err(error) => warn!(%child_id, %error, "emotion logs were not saved"),
        }

        let screening = resolve_or_fallback(
            "screening_store",
            joined("screening_store", screening).map(Some),
            || None,
        );
        let bonding = resolve_or_fallback("bonding", bonding, fallback_bonding);
        let tips = resolve_or_fallback("tips", joined("tips", tips), fallback_tips);

        let session_id = self.session_id;
        SubmissionOutcome {
            session_id,
            report: self.build_report(screening, bonding, tips),
        }
    }

    fn build_report(
        self,
        screening: Resolved<Option<ScreeningReceipt>>,
        bonding: Resolved<BondingAssessment>,
        tips: Resolved<TipSheet>,
    ) -> ScreeningReport {
        let captured = self.submission.image.map(|CapturedImage(image)| image);
        let (status, recommendation, emotions, heatmap) = match screening.value {
            Some(receipt) => (
                receipt.status.label().to_string(),
                receipt.recommendation,
                receipt.emotions,
                receipt.heatmap.or(captured),
            ),
            None => (
                FALLBACK_STATUS.label().to_string(),
                FALLBACK_RECOMMENDATION.to_string(),
                Vec::new(),
                captured,
            ),
        };

        ScreeningReport {
            child_id: self.submission.child_id,
            status,
            recommendation,
            total_score: self.normalized.total(),
            scores: self.normalized,
            heatmap,
            emotions,
            emotion_logs: self.emotion_logs,
            bonding: bonding.value,
            tips: tips.value,
            sources: ReportSources {
                screening: screening.source,
                bonding: bonding.source,
                tips: tips.source,
            },
        }
    }
}

/// Qualitative form the parent fills in after reading the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParentFeedback {
    pub sleep_hours: Option<f32>,
    #[serde(default)]
    pub speech_level: String,
    #[serde(default)]
    pub behavior_notes: String,
    #[serde(default)]
    pub concerns: String,
}

impl ParentFeedback {
    pub fn validate(&self) -> Result<ScreeningFeedback, SessionError> {
        let sleep_hours = self
            .sleep_hours
            .ok_or(SessionError::InvalidFeedback("sleep hours are required"))?;
        if !sleep_hours.is_finite() || sleep_hours < 0.0 {
            return Err(SessionError::InvalidFeedback(
                "sleep hours cannot be negative",
            ));
        }
        if self.speech_level.trim().is_empty() {
            return Err(SessionError::InvalidFeedback("speech level is required"));
        }

        let optional = |value: &str| {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };

        Ok(ScreeningFeedback {
            sleep_hours: Some(sleep_hours),
            speech_level: optional(&self.speech_level),
            behavior_notes: optional(&self.behavior_notes),
            concerns: optional(&self.concerns),
        })
    }

    /// Free text handed to the bonding heuristic.
    pub fn narrative(&self) -> String {
        format!("{} {}", self.behavior_notes.trim(), self.concerns.trim())
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackRequest {
    pub session_id: SessionId,
    pub submission: ScreeningSubmission,
    pub scores: ScoreCard,
    pub narrative: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSources {
    pub record: ValueSource,
    pub bonding: ValueSource,
    pub tips: ValueSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackOutcome {
    #[serde(skip)]
    pub session_id: SessionId,
    pub feedback: ScreeningFeedback,
    pub bonding: BondingAssessment,
    pub tips: TipSheet,
    pub sources: FeedbackSources,
}

impl FeedbackRequest {
    /// Persist the feedback as a new screening entry and refresh bonding and tips.
    pub async fn dispatch(self, collaborators: &SubmissionCollaborators) -> FeedbackOutcome {
        let child_id = self.submission.child_id.clone();

        let store = Arc::clone(&collaborators.store);
        let submission = self.submission.clone();
        let record = tokio::spawn(async move { store.save_screening(&submission).await });
        let bonding = spawn_bonding(collaborators, &child_id, Some(self.narrative.clone()));
        let tips = spawn_tips(collaborators, &child_id, &self.scores);

        let (record, bonding, tips) = tokio::join!(
            record,
            join_optional("bonding", bonding, "feedback narrative is empty"),
            tips,
        );

        let record = resolve_or_fallback(
            "screening_store",
            joined("screening_store", record).map(|_| ()),
            || (),
        );
        let bonding = resolve_or_fallback("bonding", bonding, fallback_bonding);
        let tips = resolve_or_fallback("tips", joined("tips", tips), fallback_tips);

        FeedbackOutcome {
            session_id: self.session_id,
            feedback: self.submission.feedback,
            bonding: bonding.value,
            tips: tips.value,
            sources: FeedbackSources {
                record: record.source,
                bonding: bonding.source,
                tips: tips.source,
            },
        }
    }
}
