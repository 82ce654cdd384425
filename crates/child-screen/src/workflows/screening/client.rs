//! HTTP implementations of the screening and ML collaborators.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::bonding::BondingAssessment;
use super::collaborators::{
    BondingAdvisor, BondingRequest, CollaboratorError, ScreeningReceipt, ScreeningStore,
    TipAdvisor, TipRequest,
};
use super::domain::{
    CapturedImage, ChildId, EmotionLogEntry, ScreeningSubmission, SubmissionScores,
};
use super::guidance::TipSheet;
use super::ml::{
    EmotionAnalyzer, EmotionDetection, GrowthInput, GrowthPredictor, GrowthTrajectory,
};

fn build_client(timeout: Duration) -> Result<reqwest::Client, CollaboratorError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CollaboratorError::Network(format!("failed to build HTTP client: {e}")))
}

/// Shared POST-json-and-decode path for both clients.
#[derive(Clone)]
struct JsonEndpoint {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl JsonEndpoint {
    fn new(base_url: &str, timeout: Duration) -> Result<Self, CollaboratorError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_client(timeout)?,
            timeout,
        })
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, CollaboratorError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CollaboratorError::Timeout(self.timeout.as_secs())
                } else if e.is_connect() {
                    CollaboratorError::Network(format!("{} is not reachable", self.base_url))
                } else {
                    CollaboratorError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status >= 400 {
            let message = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Http { status, message });
        }

        response
            .json()
            .await
            .map_err(|e| CollaboratorError::Decode(format!("failed to parse response: {e}")))
    }
}

/// Client for the screening backend's own HTTP surface.
#[derive(Clone)]
pub struct ScreeningApiClient {
    endpoint: JsonEndpoint,
}

impl ScreeningApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CollaboratorError> {
        Ok(Self {
            endpoint: JsonEndpoint::new(base_url, timeout)?,
        })
    }
}

#[derive(Serialize)]
struct EmotionLogBody<'a> {
    child_id: &'a ChildId,
    logs: &'a [EmotionLogEntry],
}

#[derive(Deserialize)]
struct EmotionLogResponse {
    saved: usize,
}

#[async_trait]
impl ScreeningStore for ScreeningApiClient {
    #[instrument(skip(self, submission), fields(child_id = %submission.child_id))]
    async fn save_screening(
        &self,
        submission: &ScreeningSubmission,
    ) -> Result<ScreeningReceipt, CollaboratorError> {
        self.endpoint.post("/api/screening/scores", submission).await
    }

    async fn save_emotion_logs(
        &self,
        child_id: &ChildId,
        logs: &[EmotionLogEntry],
    ) -> Result<usize, CollaboratorError> {
        let body = EmotionLogBody { child_id, logs };
        let response: EmotionLogResponse = self.endpoint.post("/api/emotion/logs", &body).await?;
        Ok(response.saved)
    }
}

#[async_trait]
impl BondingAdvisor for ScreeningApiClient {
    async fn assess(
        &self,
        request: &BondingRequest,
    ) -> Result<BondingAssessment, CollaboratorError> {
        self.endpoint.post("/api/bonding-score", request).await
    }
}

#[async_trait]
impl TipAdvisor for ScreeningApiClient {
    async fn tips(&self, request: &TipRequest) -> Result<TipSheet, CollaboratorError> {
        self.endpoint.post("/api/tips", request).await
    }
}

/// Client for the external emotion-detection and growth-prediction service.
#[derive(Clone)]
pub struct MlServiceClient {
    endpoint: JsonEndpoint,
}

impl MlServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CollaboratorError> {
        Ok(Self {
            endpoint: JsonEndpoint::new(base_url, timeout)?,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectBody<'a> {
    image: &'a str,
    child_id: &'a ChildId,
}

#[derive(Serialize)]
struct HeatmapBody<'a> {
    scores: &'a BTreeMap<String, f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeatmapResponse {
    #[serde(default)]
    image_base64: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GrowthBody<'a> {
    child_id: &'a ChildId,
    age_months: u32,
    scores: &'a SubmissionScores,
}

#[async_trait]
impl EmotionAnalyzer for MlServiceClient {
    #[instrument(skip(self, image))]
    async fn detect(
        &self,
        child_id: &ChildId,
        image: &CapturedImage,
    ) -> Result<EmotionDetection, CollaboratorError> {
        if image.0.trim().is_empty() {
            return Err(CollaboratorError::Rejected("no image provided".to_string()));
        }
        let body = DetectBody {
            image: &image.0,
            child_id,
        };
        self.endpoint.post("/api/emotion", &body).await
    }

    async fn heatmap(
        &self,
        scores: &BTreeMap<String, f64>,
    ) -> Result<Option<String>, CollaboratorError> {
        let response: HeatmapResponse = self
            .endpoint
            .post("/api/emotion-heatmap", &HeatmapBody { scores })
            .await?;
        Ok(response.image_base64)
    }
}

#[async_trait]
impl GrowthPredictor for MlServiceClient {
    #[instrument(skip(self, input))]
    async fn predict(
        &self,
        child_id: &ChildId,
        input: &GrowthInput,
    ) -> Result<GrowthTrajectory, CollaboratorError> {
        let body = GrowthBody {
            child_id,
            age_months: input.age_months,
            scores: &input.scores,
        };
        self.endpoint.post("/ml/growth-twin", &body).await
    }
}
