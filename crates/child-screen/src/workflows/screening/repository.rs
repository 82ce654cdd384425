use serde::{Deserialize, Serialize};

use super::domain::{Child, ChildId, EmotionLogEntry, ScreeningRecord};

/// Storage abstraction for child profiles.
pub trait ChildDirectory: Send + Sync {
    fn list(&self) -> Result<Vec<Child>, RepositoryError>;
    fn fetch(&self, id: &ChildId) -> Result<Option<Child>, RepositoryError>;
    fn insert(&self, child: Child) -> Result<Child, RepositoryError>;
    fn update(&self, child: Child) -> Result<Child, RepositoryError>;
    fn remove(&self, id: &ChildId) -> Result<(), RepositoryError>;
}

/// Append-only screening history plus the emotion observations gathered during sessions.
pub trait ScreeningRepository: Send + Sync {
    fn insert(&self, record: ScreeningRecord) -> Result<ScreeningRecord, RepositoryError>;

    /// Every record for the child in insertion order.
    fn for_child(&self, child_id: &ChildId) -> Result<Vec<ScreeningRecord>, RepositoryError>;

    /// Every record in insertion order.
    fn all(&self) -> Result<Vec<ScreeningRecord>, RepositoryError>;

    fn append_emotion_logs(
        &self,
        logs: Vec<StoredEmotionLog>,
    ) -> Result<usize, RepositoryError>;
}

/// Emotion observation persisted against a child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEmotionLog {
    pub child_id: ChildId,
    #[serde(flatten)]
    pub entry: EmotionLogEntry,
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
