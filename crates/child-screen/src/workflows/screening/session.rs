use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::collaborators::SubmissionCollaborators;
use super::domain::{
    default_missing_scores_to_zero, CapturedImage, ChildId, ChildView, Difficulty,
    EmotionLogEntry, ModuleId, ModuleMetadata, ModuleScore, ScoreCard, ScoreError,
    ScreeningFeedback, ScreeningSubmission,
};
use super::flow::{difficulty_for, next_module, MODULE_SEQUENCE};
use super::submission::{
    FeedbackOutcome, FeedbackRequest, ParentFeedback, ScreeningReport, SubmissionOutcome,
    SubmissionRequest,
};

/// Identity of one screening attempt. Every start, restart, or child switch mints a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{:06}", self.0)
    }
}

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> SessionId {
    SessionId(SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Active { current: ModuleId },
    AwaitingSubmission,
    Submitted,
    FeedbackPending,
    Closed,
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Active { .. } => "active",
            SessionState::AwaitingSubmission => "awaiting-submission",
            SessionState::Submitted => "submitted",
            SessionState::FeedbackPending => "feedback-pending",
            SessionState::Closed => "closed",
        }
    }
}

/// Child the session is screening, with age resolved when the child was selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildProfile {
    pub child_id: ChildId,
    pub name: String,
    pub age_months: u32,
}

impl From<&ChildView> for ChildProfile {
    fn from(view: &ChildView) -> Self {
        Self {
            child_id: view.id.clone(),
            name: view.name.clone(),
            age_months: view.age_months,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("select a child before starting a screening")]
    NoChildSelected,
    #[error("cannot {action} while the session is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
    #[error(transparent)]
    InvalidScore(#[from] ScoreError),
    #[error("invalid feedback: {0}")]
    InvalidFeedback(&'static str),
    #[error("result for {received} arrived after the session moved on to {current}")]
    StaleResult {
        received: SessionId,
        current: SessionId,
    },
}

/// Client-side controller for one child's pass through the module sequence.
///
/// `idle -> active -> awaiting-submission -> submitted -> feedback-pending -> closed -> idle`
#[derive(Debug)]
pub struct ScreeningSession {
    id: SessionId,
    child: Option<ChildProfile>,
    state: SessionState,
    scores: ScoreCard,
    completed: BTreeSet<ModuleId>,
    captured_image: Option<CapturedImage>,
    emotion_logs: Vec<EmotionLogEntry>,
    report: Option<ScreeningReport>,
    feedback: Option<FeedbackOutcome>,
}

impl Default for ScreeningSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreeningSession {
    pub fn new() -> Self {
        Self {
            id: next_session_id(),
            child: None,
            state: SessionState::Idle,
            scores: ScoreCard::new(),
            completed: BTreeSet::new(),
            captured_image: None,
            emotion_logs: Vec::new(),
            report: None,
            feedback: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn child(&self) -> Option<&ChildProfile> {
        self.child.as_ref()
    }

    pub fn scores(&self) -> &ScoreCard {
        &self.scores
    }

    pub fn completed(&self) -> &BTreeSet<ModuleId> {
        &self.completed
    }

    pub fn captured_image(&self) -> Option<&CapturedImage> {
        self.captured_image.as_ref()
    }

    pub fn emotion_logs(&self) -> &[EmotionLogEntry] {
        &self.emotion_logs
    }

    pub fn report(&self) -> Option<&ScreeningReport> {
        self.report.as_ref()
    }

    pub fn feedback(&self) -> Option<&FeedbackOutcome> {
        self.feedback.as_ref()
    }

    /// True once a report exists for this attempt.
    pub fn is_submitted(&self) -> bool {
        matches!(
            self.state,
            SessionState::Submitted | SessionState::FeedbackPending | SessionState::Closed
        )
    }

    pub fn current_module(&self) -> Option<ModuleId> {
        match self.state {
            SessionState::Active { current } => Some(current),
            _ => None,
        }
    }

    /// Difficulty tier for the module currently on screen.
    pub fn current_difficulty(&self) -> Option<Difficulty> {
        self.current_module()
            .map(|module| difficulty_for(module, &self.scores))
    }

    /// Completed and total module counts for progress display.
    pub fn progress(&self) -> (usize, usize) {
        (self.completed.len(), MODULE_SEQUENCE.len())
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            state: self.state.label(),
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(
            session = %self.id,
            from = self.state.label(),
            to = next.label(),
            "screening session transition"
        );
        self.state = next;
    }

    fn discard_progress(&mut self) {
        self.id = next_session_id();
        self.scores.clear();
        self.completed.clear();
        self.captured_image = None;
        self.emotion_logs.clear();
        self.report = None;
        self.feedback = None;
    }

    /// Choose the child to screen. Any in-flight attempt is discarded.
    pub fn select_child(&mut self, child: ChildProfile) {
        if self.state != SessionState::Idle {
            warn!(
                session = %self.id,
                state = self.state.label(),
                "child switched mid-session; discarding progress"
            );
        }
        self.discard_progress();
        self.child = Some(child);
        self.transition(SessionState::Idle);
    }

    /// Begin a fresh attempt and return the first module to present.
    pub fn start(&mut self) -> Result<ModuleId, SessionError> {
        if self.state != SessionState::Idle {
            return Err(self.invalid("start"));
        }
        if self.child.is_none() {
            return Err(SessionError::NoChildSelected);
        }

        self.discard_progress();
        let first = next_module(&self.scores, &self.completed)
            .ok_or_else(|| self.invalid("start"))?;
        info!(session = %self.id, module = %first, "screening started");
        self.transition(SessionState::Active { current: first });
        Ok(first)
    }

    /// Record a module's completion and advance to the next module.
    ///
    /// A repeated report for the same module replaces its score. Emotion log entries
    /// accumulate in arrival order; a newer captured image replaces the older one.
    pub fn record_module(
        &mut self,
        module: ModuleId,
        score: Option<ModuleScore>,
        metadata: ModuleMetadata,
    ) -> Result<SessionState, SessionError> {
        if !matches!(self.state, SessionState::Active { .. }) {
            return Err(self.invalid("record a module result"));
        }

        self.scores.record(module, score);
        if let Some(image) = metadata.image {
            self.captured_image = Some(image);
        }
        if let Some(entry) = metadata.emotion_log {
            self.emotion_logs.push(entry);
        }
        self.completed.insert(module);

        let next = match next_module(&self.scores, &self.completed) {
            Some(current) => SessionState::Active { current },
            None => SessionState::AwaitingSubmission,
        };
        self.transition(next);
        Ok(next)
    }

    /// Like [`Self::record_module`] for a raw score straight from a module.
    /// An out-of-range score leaves the session untouched.
    pub fn report_module(
        &mut self,
        module: ModuleId,
        raw_score: Option<i64>,
        metadata: ModuleMetadata,
    ) -> Result<SessionState, SessionError> {
        let score = raw_score.map(ModuleScore::new).transpose()?;
        self.record_module(module, score, metadata)
    }

    /// Text for the submission-time bonding estimate, built from observed emotions.
    fn emotion_narrative(&self) -> Option<String> {
        let labels: Vec<&str> = self
            .emotion_logs
            .iter()
            .map(|entry| entry.emotion.trim())
            .filter(|label| !label.is_empty())
            .collect();
        (!labels.is_empty()).then(|| labels.join(" "))
    }

    fn submission(&self, feedback: ScreeningFeedback) -> Result<ScreeningSubmission, SessionError> {
        let child = self.child.as_ref().ok_or(SessionError::NoChildSelected)?;
        let normalized = default_missing_scores_to_zero(&self.scores);
        Ok(ScreeningSubmission {
            child_id: child.child_id.clone(),
            age_months: child.age_months,
            emotion_score: Some(normalized.emotion_score),
            sound_score: Some(normalized.sound_score),
            quiz_score: Some(normalized.quiz_score),
            feedback,
            image: self.captured_image.clone(),
        })
    }

    /// Snapshot the finished attempt into a detached request for the collaborators.
    pub fn submission_request(&self) -> Result<SubmissionRequest, SessionError> {
        if self.state != SessionState::AwaitingSubmission {
            return Err(self.invalid("submit"));
        }

        Ok(SubmissionRequest {
            session_id: self.id,
            submission: self.submission(ScreeningFeedback::default())?,
            scores: self.scores.clone(),
            normalized: default_missing_scores_to_zero(&self.scores),
            emotion_logs: self.emotion_logs.clone(),
            bonding_text: self.emotion_narrative(),
        })
    }

    /// Apply a dispatched submission. Results from a superseded attempt are refused.
    pub fn complete_submission(
        &mut self,
        outcome: SubmissionOutcome,
    ) -> Result<&ScreeningReport, SessionError> {
        if outcome.session_id != self.id {
            return Err(SessionError::StaleResult {
                received: outcome.session_id,
                current: self.id,
            });
        }
        if self.state != SessionState::AwaitingSubmission {
            return Err(self.invalid("apply a submission result"));
        }

        info!(
            session = %self.id,
            status = %outcome.report.status,
            total = outcome.report.total_score,
            "screening report ready"
        );
        self.transition(SessionState::Submitted);
        self.report = Some(outcome.report);
        // The report is shown immediately; feedback is the next step.
        self.transition(SessionState::FeedbackPending);
        self.report.as_ref().ok_or(SessionError::InvalidTransition {
            action: "apply a submission result",
            state: "submitted",
        })
    }

    /// Submit the finished attempt and wait for the report.
    pub async fn submit(
        &mut self,
        collaborators: &SubmissionCollaborators,
    ) -> Result<&ScreeningReport, SessionError> {
        let request = self.submission_request()?;
        let outcome = request.dispatch(collaborators).await;
        self.complete_submission(outcome)
    }

    pub fn feedback_request(
        &self,
        feedback: &ParentFeedback,
    ) -> Result<FeedbackRequest, SessionError> {
        if self.state != SessionState::FeedbackPending {
            return Err(self.invalid("record feedback"));
        }
        let validated = feedback.validate()?;

        Ok(FeedbackRequest {
            session_id: self.id,
            submission: self.submission(validated)?,
            scores: self.scores.clone(),
            narrative: feedback.narrative(),
        })
    }

    pub fn complete_feedback(
        &mut self,
        outcome: FeedbackOutcome,
    ) -> Result<&FeedbackOutcome, SessionError> {
        if outcome.session_id != self.id {
            return Err(SessionError::StaleResult {
                received: outcome.session_id,
                current: self.id,
            });
        }
        if self.state != SessionState::FeedbackPending {
            return Err(self.invalid("apply feedback"));
        }

        self.transition(SessionState::Closed);
        Ok(self.feedback.insert(outcome))
    }

    /// Validate the parent's form, fan out bonding and tips, and close the session.
    pub async fn submit_feedback(
        &mut self,
        feedback: &ParentFeedback,
        collaborators: &SubmissionCollaborators,
    ) -> Result<&FeedbackOutcome, SessionError> {
        let request = self.feedback_request(feedback)?;
        let outcome = request.dispatch(collaborators).await;
        self.complete_feedback(outcome)
    }

    /// Leave a closed session ready for a new attempt with the same child.
    pub fn restart(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Closed {
            return Err(self.invalid("restart"));
        }
        self.discard_progress();
        self.transition(SessionState::Idle);
        Ok(())
    }

    /// Drop the current attempt from any state.
    pub fn abandon(&mut self) {
        self.discard_progress();
        self.transition(SessionState::Idle);
    }
}
