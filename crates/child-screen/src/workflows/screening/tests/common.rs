use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::screening::{
    classify, screening_router, BondingAdvisor, BondingAssessment, BondingRequest, CapturedImage,
    Child, ChildDirectory, ChildDraft, ChildId, ChildProfile, CollaboratorError,
    EmotionAnalyzer, EmotionDetection, EmotionLogEntry, GrowthInput, GrowthPredictor,
    GrowthTrajectory, MlBridge, ModuleId, ModuleMetadata, ModuleScore, RepositoryError,
    ScreeningId, ScreeningReceipt, ScreeningRecord, ScreeningRepository, ScreeningService,
    ScreeningSession, ScreeningStore, ScreeningSubmission, StoredEmotionLog,
    SubmissionCollaborators, SubmissionScores, TipAdvisor, TipRequest, TipSheet,
};

pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn score(value: i64) -> ModuleScore {
    ModuleScore::new(value).expect("score in range")
}

pub(super) fn draft(name: &str, date_of_birth: NaiveDate) -> ChildDraft {
    ChildDraft {
        name: name.to_string(),
        date_of_birth: Some(date_of_birth),
        gender: "Female".to_string(),
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryChildren {
    pub(super) children: Arc<Mutex<BTreeMap<ChildId, Child>>>,
}

impl ChildDirectory for MemoryChildren {
    fn list(&self) -> Result<Vec<Child>, RepositoryError> {
        let guard = self.children.lock().expect("directory mutex poisoned");
        Ok(guard.values().cloned().collect())
    }

    fn fetch(&self, id: &ChildId) -> Result<Option<Child>, RepositoryError> {
        let guard = self.children.lock().expect("directory mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn insert(&self, child: Child) -> Result<Child, RepositoryError> {
        let mut guard = self.children.lock().expect("directory mutex poisoned");
        if guard.contains_key(&child.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(child.id.clone(), child.clone());
        Ok(child)
    }

    fn update(&self, child: Child) -> Result<Child, RepositoryError> {
        let mut guard = self.children.lock().expect("directory mutex poisoned");
        if !guard.contains_key(&child.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(child.id.clone(), child.clone());
        Ok(child)
    }

    fn remove(&self, id: &ChildId) -> Result<(), RepositoryError> {
        let mut guard = self.children.lock().expect("directory mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryScreenings {
    pub(super) records: Arc<Mutex<Vec<ScreeningRecord>>>,
    pub(super) logs: Arc<Mutex<Vec<StoredEmotionLog>>>,
}

impl MemoryScreenings {
    pub(super) fn logs(&self) -> Vec<StoredEmotionLog> {
        self.logs.lock().expect("log mutex poisoned").clone()
    }
}

impl ScreeningRepository for MemoryScreenings {
    fn insert(&self, record: ScreeningRecord) -> Result<ScreeningRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.push(record.clone());
        Ok(record)
    }

    fn for_child(&self, child_id: &ChildId) -> Result<Vec<ScreeningRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .iter()
            .filter(|record| &record.child_id == child_id)
            .cloned()
            .collect())
    }

    fn all(&self) -> Result<Vec<ScreeningRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.clone())
    }

    fn append_emotion_logs(&self, logs: Vec<StoredEmotionLog>) -> Result<usize, RepositoryError> {
        let mut guard = self.logs.lock().expect("log mutex poisoned");
        let saved = logs.len();
        guard.extend(logs);
        Ok(saved)
    }
}

pub(super) struct UnavailableScreenings;

impl ScreeningRepository for UnavailableScreenings {
    fn insert(&self, _record: ScreeningRecord) -> Result<ScreeningRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn for_child(&self, _child_id: &ChildId) -> Result<Vec<ScreeningRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn all(&self) -> Result<Vec<ScreeningRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn append_emotion_logs(&self, _logs: Vec<StoredEmotionLog>) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) type MemoryService = ScreeningService<MemoryChildren, MemoryScreenings>;

pub(super) fn build_service() -> (MemoryService, Arc<MemoryChildren>, Arc<MemoryScreenings>) {
    let children = Arc::new(MemoryChildren::default());
    let screenings = Arc::new(MemoryScreenings::default());
    let service = ScreeningService::with_clock(children.clone(), screenings.clone(), fixed_now);
    (service, children, screenings)
}

/// How a scripted collaborator answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Behavior {
    Succeed,
    Fail,
    Panic,
}

impl Behavior {
    fn check(self, name: &str) -> Result<(), CollaboratorError> {
        match self {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(CollaboratorError::Http {
                status: 502,
                message: format!("{name} unavailable"),
            }),
            Behavior::Panic => panic!("{name} crashed"),
        }
    }
}

pub(super) struct ScriptedStore {
    behavior: Behavior,
    pub(super) submissions: Mutex<Vec<ScreeningSubmission>>,
    pub(super) logs: Mutex<Vec<EmotionLogEntry>>,
}

impl ScriptedStore {
    pub(super) fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            submissions: Mutex::new(Vec::new()),
            logs: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn submissions(&self) -> Vec<ScreeningSubmission> {
        self.submissions.lock().expect("store mutex poisoned").clone()
    }
}

#[async_trait]
impl ScreeningStore for ScriptedStore {
    async fn save_screening(
        &self,
        submission: &ScreeningSubmission,
    ) -> Result<ScreeningReceipt, CollaboratorError> {
        self.submissions
            .lock()
            .expect("store mutex poisoned")
            .push(submission.clone());
        self.behavior.check("screening store")?;

        let scores = SubmissionScores {
            emotion_score: submission.emotion_score.unwrap_or(ModuleScore::ZERO),
            sound_score: submission.sound_score.unwrap_or(ModuleScore::ZERO),
            quiz_score: submission.quiz_score.unwrap_or(ModuleScore::ZERO),
        };
        let classification = classify(scores.total());
        Ok(ScreeningReceipt {
            screening_id: ScreeningId("scr-test".to_string()),
            child_id: submission.child_id.clone(),
            age_months: submission.age_months,
            status: classification.status,
            recommendation: classification.recommendation.to_string(),
            total_score: scores.total(),
            scores,
            emotions: Vec::new(),
            heatmap: Some("data:image/png;base64,heatmap".to_string()),
        })
    }

    async fn save_emotion_logs(
        &self,
        _child_id: &ChildId,
        logs: &[EmotionLogEntry],
    ) -> Result<usize, CollaboratorError> {
        self.behavior.check("emotion log store")?;
        let mut guard = self.logs.lock().expect("store mutex poisoned");
        guard.extend(logs.iter().cloned());
        Ok(logs.len())
    }
}

pub(super) struct ScriptedBonding {
    behavior: Behavior,
    pub(super) requests: Mutex<Vec<BondingRequest>>,
}

impl ScriptedBonding {
    pub(super) fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn requests(&self) -> Vec<BondingRequest> {
        self.requests.lock().expect("bonding mutex poisoned").clone()
    }
}

#[async_trait]
impl BondingAdvisor for ScriptedBonding {
    async fn assess(
        &self,
        request: &BondingRequest,
    ) -> Result<BondingAssessment, CollaboratorError> {
        self.requests
            .lock()
            .expect("bonding mutex poisoned")
            .push(request.clone());
        self.behavior.check("bonding")?;
        Ok(BondingAssessment::from_score(0.9))
    }
}

pub(super) struct ScriptedTips {
    behavior: Behavior,
}

impl ScriptedTips {
    pub(super) fn new(behavior: Behavior) -> Self {
        Self { behavior }
    }
}

#[async_trait]
impl TipAdvisor for ScriptedTips {
    async fn tips(&self, _request: &TipRequest) -> Result<TipSheet, CollaboratorError> {
        self.behavior.check("tips")?;
        Ok(TipSheet::standard())
    }
}

pub(super) struct Harness {
    pub(super) store: Arc<ScriptedStore>,
    pub(super) bonding: Arc<ScriptedBonding>,
    pub(super) collaborators: SubmissionCollaborators,
}

pub(super) fn harness(store: Behavior, bonding: Behavior, tips: Behavior) -> Harness {
    let store = Arc::new(ScriptedStore::new(store));
    let bonding = Arc::new(ScriptedBonding::new(bonding));
    let collaborators = SubmissionCollaborators::new(
        store.clone(),
        bonding.clone(),
        Arc::new(ScriptedTips::new(tips)),
    );
    Harness {
        store,
        bonding,
        collaborators,
    }
}

pub(super) fn profile() -> ChildProfile {
    ChildProfile {
        child_id: ChildId("child-000007".to_string()),
        name: "Asha".to_string(),
        age_months: 30,
    }
}

pub(super) fn happy_log() -> EmotionLogEntry {
    EmotionLogEntry {
        emotion: "happy".to_string(),
        confidence: Some(0.92),
        captured_at: None,
    }
}

/// Scores from the reference walk-through: story reports no score.
pub(super) fn reference_scores() -> [(ModuleId, Option<i64>); 6] {
    [
        (ModuleId::Emotion, Some(4)),
        (ModuleId::Story, None),
        (ModuleId::Sound, Some(5)),
        (ModuleId::Sensor, Some(3)),
        (ModuleId::Voice, Some(2)),
        (ModuleId::Quiz, Some(4)),
    ]
}

/// A session that has walked every module with the reference scores.
pub(super) fn completed_session() -> ScreeningSession {
    let mut session = ScreeningSession::new();
    session.select_child(profile());
    session.start().expect("session starts");

    for (module, raw) in reference_scores() {
        let metadata = match module {
            ModuleId::Emotion => ModuleMetadata {
                image: Some(CapturedImage("data:image/jpeg;base64,frame".to_string())),
                emotion_log: Some(happy_log()),
            },
            _ => ModuleMetadata::default(),
        };
        session
            .report_module(module, raw, metadata)
            .expect("module recorded");
    }
    session
}

pub(super) fn completed_modules(modules: &[ModuleId]) -> BTreeSet<ModuleId> {
    modules.iter().copied().collect()
}

/// ML collaborators that are never reachable.
pub(super) struct OfflineMl;

#[async_trait]
impl EmotionAnalyzer for OfflineMl {
    async fn detect(
        &self,
        _child_id: &ChildId,
        _image: &CapturedImage,
    ) -> Result<EmotionDetection, CollaboratorError> {
        Err(CollaboratorError::Network("ml service offline".to_string()))
    }

    async fn heatmap(
        &self,
        _scores: &BTreeMap<String, f64>,
    ) -> Result<Option<String>, CollaboratorError> {
        Err(CollaboratorError::Network("ml service offline".to_string()))
    }
}

#[async_trait]
impl GrowthPredictor for OfflineMl {
    async fn predict(
        &self,
        _child_id: &ChildId,
        _input: &GrowthInput,
    ) -> Result<GrowthTrajectory, CollaboratorError> {
        Err(CollaboratorError::Network("ml service offline".to_string()))
    }
}

pub(super) fn offline_bridge() -> Arc<MlBridge> {
    Arc::new(MlBridge::new(
        Arc::new(OfflineMl),
        Arc::new(OfflineMl),
        Duration::from_millis(200),
    ))
}

pub(super) fn router_with_service(service: MemoryService) -> axum::Router {
    screening_router(Arc::new(service), offline_bridge())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
