//! Adaptive screening flow: module sequencing, session control, scoring rules,
//! and the backend that persists screenings and serves guidance.

pub mod age;
pub mod bonding;
pub mod classification;
pub mod client;
pub mod collaborators;
pub mod domain;
pub mod flow;
pub mod guidance;
pub mod ml;
pub mod repository;
pub mod router;
pub mod service;
pub mod session;
pub mod submission;

#[cfg(test)]
mod tests;

pub use bonding::{bonding_score, BondingAssessment, BondingTier};
pub use classification::{classify, Classification, ScreeningStatus};
pub use client::{MlServiceClient, ScreeningApiClient};
pub use collaborators::{
    fallback_bonding, fallback_tips, resolve_or_fallback, BondingAdvisor, BondingRequest,
    CollaboratorError, Resolved, ScreeningReceipt, ScreeningStore, SubmissionCollaborators,
    TipAdvisor, TipRequest, ValueSource, FALLBACK_BONDING_SCORE, FALLBACK_RECOMMENDATION,
    FALLBACK_STATUS,
};
pub use domain::{
    default_missing_scores_to_zero, CapturedImage, Child, ChildDraft, ChildError, ChildId,
    ChildView, Difficulty, EmotionLogEntry, ModuleId, ModuleMetadata, ModuleScore, ScoreCard,
    ScoreError, ScreeningFeedback, ScreeningId, ScreeningRecord, ScreeningSubmission,
    SubmissionScores,
};
pub use flow::{difficulty_for, next_module, remaining_modules, MODULE_SEQUENCE};
pub use guidance::{age_recommendations, predict_milestone, MilestoneInput, TipSheet};
pub use ml::{
    DetectedEmotion, EmotionAnalyzer, EmotionDetection, EmotionInsight, GrowthInput,
    GrowthPredictor, GrowthTrajectory, MlBridge,
};
pub use repository::{ChildDirectory, RepositoryError, ScreeningRepository, StoredEmotionLog};
pub use router::{screening_router, ScreeningState};
pub use service::{ChildAnalytics, ScreeningService, ScreeningServiceError, ValidationError};
pub use session::{ChildProfile, ScreeningSession, SessionError, SessionId, SessionState};
pub use submission::{
    FeedbackOutcome, FeedbackRequest, FeedbackSources, ParentFeedback, ReportSources,
    ScreeningReport, SubmissionOutcome, SubmissionRequest,
};
