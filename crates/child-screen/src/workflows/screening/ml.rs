//! Bridge to the external emotion-detection and growth-prediction service.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::collaborators::{resolve_or_fallback, CollaboratorError, Resolved};
use super::domain::{CapturedImage, ChildId, ModuleScore, SubmissionScores};

/// One face analysed in a captured frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedEmotion {
    pub dominant_emotion: String,
    #[serde(default)]
    pub emotion: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionDetection {
    #[serde(default)]
    pub emotions: Vec<DetectedEmotion>,
}

/// Growth curve projected for a child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthTrajectory {
    pub months: Vec<String>,
    pub values: Vec<u32>,
    #[serde(rename = "focusArea")]
    pub focus_area: String,
    pub similarity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_months: Option<u32>,
}

impl GrowthTrajectory {
    /// Static curve served whenever the ML service is unavailable.
    pub fn fallback() -> Self {
        Self {
            months: ["12m", "15m", "18m", "21m", "24m"]
                .iter()
                .map(|month| month.to_string())
                .collect(),
            values: vec![15, 35, 50, 75, 90],
            focus_area: "Cognitive Development".to_string(),
            similarity: 88,
            age_months: Some(24),
        }
    }
}

/// Inputs the growth model is fed: latest persisted scores plus age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthInput {
    pub age_months: u32,
    #[serde(flatten)]
    pub scores: SubmissionScores,
}

#[async_trait]
pub trait EmotionAnalyzer: Send + Sync {
    async fn detect(
        &self,
        child_id: &ChildId,
        image: &CapturedImage,
    ) -> Result<EmotionDetection, CollaboratorError>;

    async fn heatmap(
        &self,
        scores: &BTreeMap<String, f64>,
    ) -> Result<Option<String>, CollaboratorError>;
}

#[async_trait]
pub trait GrowthPredictor: Send + Sync {
    async fn predict(
        &self,
        child_id: &ChildId,
        input: &GrowthInput,
    ) -> Result<GrowthTrajectory, CollaboratorError>;
}

/// Emotion detections and rendered heatmap attached to a saved screening.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionInsight {
    pub emotions: Vec<DetectedEmotion>,
    pub heatmap: Option<String>,
}

/// Timeout-bounded access to the ML collaborators with fallback substitution.
#[derive(Clone)]
pub struct MlBridge {
    analyzer: Arc<dyn EmotionAnalyzer>,
    predictor: Arc<dyn GrowthPredictor>,
    timeout: Duration,
}

impl MlBridge {
    pub fn new(
        analyzer: Arc<dyn EmotionAnalyzer>,
        predictor: Arc<dyn GrowthPredictor>,
        timeout: Duration,
    ) -> Self {
        Self {
            analyzer,
            predictor,
            timeout,
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, CollaboratorError>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CollaboratorError::Timeout(self.timeout.as_secs())),
        }
    }

    async fn detect_with_heatmap(
        &self,
        child_id: &ChildId,
        image: &CapturedImage,
        emotion_score: Option<ModuleScore>,
    ) -> Result<EmotionInsight, CollaboratorError> {
        let detection = self
            .bounded(self.analyzer.detect(child_id, image))
            .await?;

        let heatmap_scores = match detection.emotions.first() {
            Some(first) => first.emotion.clone(),
            None => {
                let mut scores = BTreeMap::new();
                let value = emotion_score.map(|score| score.value()).unwrap_or(0);
                scores.insert("emotion".to_string(), f64::from(value));
                scores
            }
        };

        let heatmap = match self.bounded(self.analyzer.heatmap(&heatmap_scores)).await {
            Ok(heatmap) => heatmap,
            Err(error) => {
                warn!(%child_id, %error, "heatmap rendering failed; keeping detected emotions");
                None
            }
        };

        Ok(EmotionInsight {
            emotions: detection.emotions,
            heatmap,
        })
    }

    /// Detect emotions in `image`, then render a heatmap from the first detection
    /// (or from the module score when nothing was detected). A failed heatmap
    /// leaves the detections intact.
    pub async fn emotion_insight(
        &self,
        child_id: &ChildId,
        image: &CapturedImage,
        emotion_score: Option<ModuleScore>,
    ) -> Resolved<EmotionInsight> {
        let result = self
            .detect_with_heatmap(child_id, image, emotion_score)
            .await;
        resolve_or_fallback("emotion_analyzer", result, EmotionInsight::default)
    }

    pub async fn growth_trajectory(
        &self,
        child_id: &ChildId,
        input: &GrowthInput,
    ) -> Resolved<GrowthTrajectory> {
        let result = self.bounded(self.predictor.predict(child_id, input)).await;
        resolve_or_fallback("growth_predictor", result, GrowthTrajectory::fallback)
    }
}
