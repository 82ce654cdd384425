use async_trait::async_trait;
use chrono::NaiveDate;
use child_screen::workflows::screening::{
    BondingAdvisor, BondingAssessment, BondingRequest, Child, ChildDirectory, ChildId,
    CollaboratorError, EmotionLogEntry, RepositoryError, ScreeningReceipt, ScreeningRecord,
    ScreeningRepository, ScreeningService, ScreeningServiceError, ScreeningStore,
    ScreeningSubmission, StoredEmotionLog, TipAdvisor, TipRequest, TipSheet,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryChildDirectory {
    children: Arc<Mutex<HashMap<ChildId, Child>>>,
}

impl ChildDirectory for InMemoryChildDirectory {
    fn list(&self) -> Result<Vec<Child>, RepositoryError> {
        let guard = self.children.lock().expect("directory mutex poisoned");
        let mut children: Vec<Child> = guard.values().cloned().collect();
        children.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(children)
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
        if guard.contains_key(&child.id) {
            guard.insert(child.id.clone(), child.clone());
            Ok(child)
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn remove(&self, id: &ChildId) -> Result<(), RepositoryError> {
        let mut guard = self.children.lock().expect("directory mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryScreeningRepository {
    records: Arc<Mutex<Vec<ScreeningRecord>>>,
    logs: Arc<Mutex<Vec<StoredEmotionLog>>>,
}

impl ScreeningRepository for InMemoryScreeningRepository {
    fn insert(&self, record: ScreeningRecord) -> Result<ScreeningRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard
            .iter()
            .any(|stored| stored.screening_id == record.screening_id)
        {
            return Err(RepositoryError::Conflict);
        }
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

pub(crate) type InMemoryScreeningService =
    ScreeningService<InMemoryChildDirectory, InMemoryScreeningRepository>;

/// Which in-process collaborators should behave as if their backend were down.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Outages {
    pub(crate) store: bool,
    pub(crate) bonding: bool,
    pub(crate) tips: bool,
}

/// Collaborators answered directly by the local service instead of over HTTP.
pub(crate) struct InProcessCollaborators {
    service: Arc<InMemoryScreeningService>,
    outages: Outages,
}

impl InProcessCollaborators {
    pub(crate) fn new(service: Arc<InMemoryScreeningService>, outages: Outages) -> Self {
        Self { service, outages }
    }

    fn reachable(&self, down: bool, name: &str) -> Result<(), CollaboratorError> {
        if down {
            return Err(CollaboratorError::Network(format!("{name} is offline")));
        }
        Ok(())
    }
}

fn service_failure(error: ScreeningServiceError) -> CollaboratorError {
    CollaboratorError::Http {
        status: error.status_code().as_u16(),
        message: error.to_string(),
    }
}

#[async_trait]
impl ScreeningStore for InProcessCollaborators {
    async fn save_screening(
        &self,
        submission: &ScreeningSubmission,
    ) -> Result<ScreeningReceipt, CollaboratorError> {
        self.reachable(self.outages.store, "screening store")?;
        self.service
            .save_screening(submission.clone())
            .map_err(service_failure)
    }

    async fn save_emotion_logs(
        &self,
        child_id: &ChildId,
        logs: &[EmotionLogEntry],
    ) -> Result<usize, CollaboratorError> {
        self.reachable(self.outages.store, "screening store")?;
        self.service
            .record_emotion_logs(child_id, logs.to_vec())
            .map_err(service_failure)
    }
}

#[async_trait]
impl BondingAdvisor for InProcessCollaborators {
    async fn assess(
        &self,
        request: &BondingRequest,
    ) -> Result<BondingAssessment, CollaboratorError> {
        self.reachable(self.outages.bonding, "bonding advisor")?;
        self.service.bonding(request).map_err(service_failure)
    }
}

#[async_trait]
impl TipAdvisor for InProcessCollaborators {
    async fn tips(&self, request: &TipRequest) -> Result<TipSheet, CollaboratorError> {
        self.reachable(self.outages.tips, "tip advisor")?;
        self.service.tips(request).map_err(service_failure)
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
