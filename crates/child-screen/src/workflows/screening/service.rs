use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::bonding::{bonding_score, BondingAssessment};
use super::classification::classify;
use super::collaborators::{BondingRequest, ScreeningReceipt, TipRequest};
use super::domain::{
    Child, ChildDraft, ChildError, ChildId, ChildView, EmotionLogEntry, ScreeningFeedback,
    ScreeningId, ScreeningRecord, ScreeningSubmission, SubmissionScores,
};
use super::guidance::TipSheet;
use super::ml::GrowthInput;
use super::repository::{ChildDirectory, RepositoryError, ScreeningRepository, StoredEmotionLog};

/// Backend composing the child directory and the screening history.
pub struct ScreeningService<C, S> {
    children: Arc<C>,
    screenings: Arc<S>,
    clock: fn() -> DateTime<Utc>,
}

static CHILD_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static SCREENING_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_child_id() -> ChildId {
    let id = CHILD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ChildId(format!("child-{id:06}"))
}

fn next_screening_id() -> ScreeningId {
    let id = SCREENING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ScreeningId(format!("scr-{id:06}"))
}

/// Latest screening joined with the child it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChildAnalytics {
    pub child: ChildView,
    pub scores: SubmissionScores,
    pub total_score: u8,
    pub status: &'static str,
    pub feedback: ScreeningFeedback,
    pub created_at: DateTime<Utc>,
}

/// Most recent first; on equal timestamps the later insert wins.
fn latest(records: Vec<ScreeningRecord>) -> Option<ScreeningRecord> {
    records.into_iter().fold(None, |best, record| match best {
        Some(best) if best.created_at > record.created_at => Some(best),
        _ => Some(record),
    })
}

impl<C, S> ScreeningService<C, S>
where
    C: ChildDirectory + 'static,
    S: ScreeningRepository + 'static,
{
    pub fn new(children: Arc<C>, screenings: Arc<S>) -> Self {
        Self::with_clock(children, screenings, Utc::now)
    }

    pub fn with_clock(children: Arc<C>, screenings: Arc<S>, clock: fn() -> DateTime<Utc>) -> Self {
        Self {
            children,
            screenings,
            clock,
        }
    }

    fn today(&self) -> NaiveDate {
        (self.clock)().date_naive()
    }

    fn require_child(&self, id: &ChildId) -> Result<Child, ScreeningServiceError> {
        self.children
            .fetch(id)?
            .ok_or_else(|| ScreeningServiceError::UnknownChild(id.clone()))
    }

    pub fn list_children(&self) -> Result<Vec<ChildView>, ScreeningServiceError> {
        let today = self.today();
        let children = self.children.list()?;
        Ok(children.iter().map(|child| child.view_on(today)).collect())
    }

    pub fn get_child(&self, id: &ChildId) -> Result<ChildView, ScreeningServiceError> {
        Ok(self.require_child(id)?.view_on(self.today()))
    }

    pub fn add_child(&self, draft: ChildDraft) -> Result<ChildView, ScreeningServiceError> {
        let today = self.today();
        let date_of_birth = draft.validate(today)?;

        let child = Child {
            id: next_child_id(),
            name: draft.name.trim().to_string(),
            date_of_birth,
            gender: draft.gender.trim().to_string(),
        };
        let stored = self.children.insert(child)?;
        info!(child_id = %stored.id, "child added");
        Ok(stored.view_on(today))
    }

    /// Replace name and gender. The date of birth is fixed once the child exists.
    pub fn update_child(
        &self,
        id: &ChildId,
        draft: ChildDraft,
    ) -> Result<ChildView, ScreeningServiceError> {
        let today = self.today();
        let mut child = self.require_child(id)?;
        let draft = ChildDraft {
            date_of_birth: draft.date_of_birth.or(Some(child.date_of_birth)),
            ..draft
        };
        let date_of_birth = draft.validate(today)?;
        if date_of_birth != child.date_of_birth {
            return Err(ChildError::DateOfBirthChanged.into());
        }

        child.name = draft.name.trim().to_string();
        child.gender = draft.gender.trim().to_string();
        let stored = self.children.update(child)?;
        Ok(stored.view_on(today))
    }

    pub fn delete_child(&self, id: &ChildId) -> Result<(), ScreeningServiceError> {
        match self.children.remove(id) {
            Err(RepositoryError::NotFound) => Err(ScreeningServiceError::UnknownChild(id.clone())),
            other => Ok(other?),
        }
    }

    /// Persist an immutable screening record and classify its total.
    pub fn save_screening(
        &self,
        submission: ScreeningSubmission,
    ) -> Result<ScreeningReceipt, ScreeningServiceError> {
        let child = self.require_child(&submission.child_id)?;
        let created_at = (self.clock)();
        let age_months = match submission.age_months {
            0 => child.age_months_on(created_at.date_naive()),
            months => months,
        };

        let record = ScreeningRecord {
            screening_id: next_screening_id(),
            child_id: child.id,
            age_months,
            emotion_score: submission.emotion_score,
            sound_score: submission.sound_score,
            quiz_score: submission.quiz_score,
            feedback: submission.feedback,
            created_at,
        };
        let stored = self.screenings.insert(record)?;

        let scores = stored.scores();
        let total_score = scores.total();
        let classification = classify(total_score);
        info!(
            screening_id = %stored.screening_id.0,
            child_id = %stored.child_id,
            total_score,
            status = classification.status.label(),
            "screening saved"
        );

        Ok(ScreeningReceipt {
            screening_id: stored.screening_id,
            child_id: stored.child_id,
            age_months: stored.age_months,
            status: classification.status,
            recommendation: classification.recommendation.to_string(),
            total_score,
            scores,
            emotions: Vec::new(),
            heatmap: None,
        })
    }

    pub fn latest_screening(
        &self,
        child_id: &ChildId,
    ) -> Result<Option<ScreeningRecord>, ScreeningServiceError> {
        Ok(latest(self.screenings.for_child(child_id)?))
    }

    /// One record per child, most recent first.
    pub fn latest_per_child(&self) -> Result<Vec<ScreeningRecord>, ScreeningServiceError> {
        let mut records = self.screenings.all()?;
        // Stable sort, then reverse: later inserts win ties.
        records.sort_by_key(|record| record.created_at);
        records.reverse();

        let mut seen = BTreeSet::new();
        records.retain(|record| seen.insert(record.child_id.clone()));
        Ok(records)
    }

    fn analytics_for(&self, child: &Child, record: ScreeningRecord) -> ChildAnalytics {
        let total_score = record.total_score();
        ChildAnalytics {
            child: child.view_on(self.today()),
            scores: record.scores(),
            total_score,
            status: classify(total_score).status.label(),
            feedback: record.feedback,
            created_at: record.created_at,
        }
    }

    pub fn analytics(&self, child_id: &ChildId) -> Result<ChildAnalytics, ScreeningServiceError> {
        let child = self.require_child(child_id)?;
        let record = self
            .latest_screening(child_id)?
            .ok_or_else(|| ScreeningServiceError::NoScreening(child_id.clone()))?;
        Ok(self.analytics_for(&child, record))
    }

    /// Analytics for every child that still exists and has been screened.
    pub fn all_analytics(&self) -> Result<Vec<ChildAnalytics>, ScreeningServiceError> {
        let mut analytics = Vec::new();
        for record in self.latest_per_child()? {
            match self.children.fetch(&record.child_id)? {
                Some(child) => analytics.push(self.analytics_for(&child, record)),
                None => debug!(child_id = %record.child_id, "skipping screening of removed child"),
            }
        }
        Ok(analytics)
    }

    pub fn bonding(
        &self,
        request: &BondingRequest,
    ) -> Result<BondingAssessment, ScreeningServiceError> {
        if request.child_id.0.trim().is_empty() || request.text.trim().is_empty() {
            return Err(ValidationError::BondingInput.into());
        }
        let assessment = bonding_score(&request.text);
        debug!(child_id = %request.child_id, score = assessment.score, "bonding score computed");
        Ok(assessment)
    }

    pub fn tips(&self, request: &TipRequest) -> Result<TipSheet, ScreeningServiceError> {
        if request.child_id.0.trim().is_empty() {
            return Err(ValidationError::MissingField("child_id").into());
        }
        Ok(TipSheet::standard())
    }

    /// Growth model input: the latest screening's scores, all zero when never screened.
    pub fn growth_input(&self, child_id: &ChildId) -> Result<GrowthInput, ScreeningServiceError> {
        let child = self.require_child(child_id)?;
        let scores = self
            .latest_screening(child_id)?
            .map(|record| record.scores())
            .unwrap_or_default();
        Ok(GrowthInput {
            age_months: child.age_months_on(self.today()),
            scores,
        })
    }

    pub fn record_emotion_logs(
        &self,
        child_id: &ChildId,
        entries: Vec<EmotionLogEntry>,
    ) -> Result<usize, ScreeningServiceError> {
        if entries.is_empty() {
            return Err(ValidationError::MissingField("logs").into());
        }
        let child = self.require_child(child_id)?;
        let logs = entries
            .into_iter()
            .map(|entry| StoredEmotionLog {
                child_id: child.id.clone(),
                entry,
            })
            .collect();
        Ok(self.screenings.append_emotion_logs(logs)?)
    }
}

/// Boundary validation failure; never forwarded to a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("child id and non-empty text are required")]
    BondingInput,
}

#[derive(Debug, thiserror::Error)]
pub enum ScreeningServiceError {
    #[error(transparent)]
    Child(#[from] ChildError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("child {0} not found")]
    UnknownChild(ChildId),
    #[error("no screening data found for child {0}")]
    NoScreening(ChildId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
