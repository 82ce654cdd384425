use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::collaborators::{BondingRequest, TipRequest, ValueSource};
use super::domain::{
    ChildDraft, ChildError, ChildId, EmotionLogEntry, ScoreCard, ScreeningSubmission,
};
use super::guidance::{age_recommendations, predict_milestone, MilestoneInput};
use super::ml::{GrowthTrajectory, MlBridge};
use super::repository::{ChildDirectory, RepositoryError, ScreeningRepository};
use super::service::{ScreeningService, ScreeningServiceError};

/// Shared handler state: the backend service plus the timeout-bounded ML bridge.
pub struct ScreeningState<C, S> {
    pub service: Arc<ScreeningService<C, S>>,
    pub ml: Arc<MlBridge>,
}

impl<C, S> Clone for ScreeningState<C, S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            ml: Arc::clone(&self.ml),
        }
    }
}

/// Router exposing the child directory, screening store, and guidance endpoints.
pub fn screening_router<C, S>(service: Arc<ScreeningService<C, S>>, ml: Arc<MlBridge>) -> Router
where
    C: ChildDirectory + 'static,
    S: ScreeningRepository + 'static,
{
    Router::new()
        .route(
            "/api/children",
            get(list_children_handler::<C, S>).post(add_child_handler::<C, S>),
        )
        .route(
            "/api/children/:id",
            get(get_child_handler::<C, S>)
                .put(update_child_handler::<C, S>)
                .delete(delete_child_handler::<C, S>),
        )
        .route("/api/screening/scores", post(save_screening_handler::<C, S>))
        .route(
            "/api/screening/latest/:child_id",
            get(latest_screening_handler::<C, S>),
        )
        .route("/api/analytics", get(analytics_handler::<C, S>))
        .route("/api/analytics/all", get(all_analytics_handler::<C, S>))
        .route("/api/bonding-score", post(bonding_handler::<C, S>))
        .route("/api/tips", post(tips_handler::<C, S>))
        .route("/api/recommendations", post(recommendations_handler))
        .route("/api/predict-milestone", post(milestone_handler))
        .route(
            "/api/ml/growth-trajectory/:child_id",
            get(growth_trajectory_handler::<C, S>),
        )
        .route("/api/emotion/logs", post(emotion_logs_handler::<C, S>))
        .with_state(ScreeningState { service, ml })
}

impl ScreeningServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScreeningServiceError::Child(ChildError::DateOfBirthChanged) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ScreeningServiceError::Child(_) | ScreeningServiceError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            ScreeningServiceError::UnknownChild(_)
            | ScreeningServiceError::NoScreening(_)
            | ScreeningServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            ScreeningServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            ScreeningServiceError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl IntoResponse for ScreeningServiceError {
    fn into_response(self) -> Response {
        if self.status_code().is_server_error() {
            tracing::error!(error = %self, "screening request failed");
        }
        let payload = json!({
            "error": self.to_string(),
        });
        (self.status_code(), Json(payload)).into_response()
    }
}

fn bad_request(message: &str) -> Response {
    let payload = json!({
        "error": message,
    });
    (StatusCode::BAD_REQUEST, Json(payload)).into_response()
}

pub(crate) async fn list_children_handler<C, S>(
    State(state): State<ScreeningState<C, S>>,
) -> Response
where
    C: ChildDirectory + 'static,
    S: ScreeningRepository + 'static,
{
    match state.service.list_children() {
        Ok(children) => (StatusCode::OK, Json(children)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn add_child_handler<C, S>(
    State(state): State<ScreeningState<C, S>>,
    Json(draft): Json<ChildDraft>,
) -> Response
where
    C: ChildDirectory + 'static,
    S: ScreeningRepository + 'static,
{
    match state.service.add_child(draft) {
        Ok(child) => {
            let payload = json!({
                "message": "child added",
                "child": child,
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn get_child_handler<C, S>(
    State(state): State<ScreeningState<C, S>>,
    Path(id): Path<String>,
) -> Response
where
    C: ChildDirectory + 'static,
    S: ScreeningRepository + 'static,
{
    match state.service.get_child(&ChildId(id)) {
        Ok(child) => (StatusCode::OK, Json(child)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn update_child_handler<C, S>(
    State(state): State<ScreeningState<C, S>>,
    Path(id): Path<String>,
    Json(draft): Json<ChildDraft>,
) -> Response
where
    C: ChildDirectory + 'static,
    S: ScreeningRepository + 'static,
{
    match state.service.update_child(&ChildId(id), draft) {
        Ok(child) => {
            let payload = json!({
                "message": "child updated",
                "child": child,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn delete_child_handler<C, S>(
    State(state): State<ScreeningState<C, S>>,
    Path(id): Path<String>,
) -> Response
where
    C: ChildDirectory + 'static,
    S: ScreeningRepository + 'static,
{
    match state.service.delete_child(&ChildId(id)) {
        Ok(()) => {
            let payload = json!({
                "message": "child deleted",
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error.into_response(),
    }
}

/// Saves the record first; the emotion insight is attached afterwards and never fails the save.
pub(crate) async fn save_screening_handler<C, S>(
    State(state): State<ScreeningState<C, S>>,
    Json(submission): Json<ScreeningSubmission>,
) -> Response
where
    C: ChildDirectory + 'static,
    S: ScreeningRepository + 'static,
{
    let image = submission.image.clone();
    let emotion_score = submission.emotion_score;

    let mut receipt = match state.service.save_screening(submission) {
        Ok(receipt) => receipt,
        Err(error) => return error.into_response(),
    };

    if let Some(image) = image {
        let insight = state
            .ml
            .emotion_insight(&receipt.child_id, &image, emotion_score)
            .await;
        receipt.emotions = insight.value.emotions;
        receipt.heatmap = insight.value.heatmap;
    }

    (StatusCode::CREATED, Json(receipt)).into_response()
}

pub(crate) async fn latest_screening_handler<C, S>(
    State(state): State<ScreeningState<C, S>>,
    Path(child_id): Path<String>,
) -> Response
where
    C: ChildDirectory + 'static,
    S: ScreeningRepository + 'static,
{
    let child_id = ChildId(child_id);
    match state.service.latest_screening(&child_id) {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => ScreeningServiceError::NoScreening(child_id).into_response(),
        Err(error) => error.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnalyticsQuery {
    child_id: Option<String>,
}

pub(crate) async fn analytics_handler<C, S>(
    State(state): State<ScreeningState<C, S>>,
    Query(query): Query<AnalyticsQuery>,
) -> Response
where
    C: ChildDirectory + 'static,
    S: ScreeningRepository + 'static,
{
    let Some(child_id) = query.child_id.filter(|id| !id.trim().is_empty()) else {
        return bad_request("child_id is required");
    };
    match state.service.analytics(&ChildId(child_id)) {
        Ok(analytics) => (StatusCode::OK, Json(analytics)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn all_analytics_handler<C, S>(
    State(state): State<ScreeningState<C, S>>,
) -> Response
where
    C: ChildDirectory + 'static,
    S: ScreeningRepository + 'static,
{
    match state.service.all_analytics() {
        Ok(analytics) => (StatusCode::OK, Json(analytics)).into_response(),
        Err(error) => error.into_response(),
    }
}

/// Lenient body so missing fields surface as validation errors rather than rejections.
#[derive(Debug, Deserialize)]
pub(crate) struct BondingPayload {
    #[serde(default)]
    child_id: String,
    #[serde(default)]
    text: String,
}

pub(crate) async fn bonding_handler<C, S>(
    State(state): State<ScreeningState<C, S>>,
    Json(payload): Json<BondingPayload>,
) -> Response
where
    C: ChildDirectory + 'static,
    S: ScreeningRepository + 'static,
{
    let request = BondingRequest {
        child_id: ChildId(payload.child_id),
        text: payload.text,
    };
    match state.service.bonding(&request) {
        Ok(assessment) => (StatusCode::OK, Json(assessment)).into_response(),
        Err(error) => error.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TipsPayload {
    #[serde(default)]
    child_id: String,
    #[serde(default)]
    scores: ScoreCard,
}

pub(crate) async fn tips_handler<C, S>(
    State(state): State<ScreeningState<C, S>>,
    Json(payload): Json<TipsPayload>,
) -> Response
where
    C: ChildDirectory + 'static,
    S: ScreeningRepository + 'static,
{
    let request = TipRequest {
        child_id: ChildId(payload.child_id),
        scores: payload.scores,
    };
    match state.service.tips(&request) {
        Ok(sheet) => (StatusCode::OK, Json(sheet)).into_response(),
        Err(error) => error.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecommendationPayload {
    age_months: Option<u32>,
}

pub(crate) async fn recommendations_handler(
    Json(payload): Json<RecommendationPayload>,
) -> Response {
    let Some(age_months) = payload.age_months else {
        return bad_request("age_months is required");
    };
    let payload = json!({
        "recommendations": age_recommendations(age_months),
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn milestone_handler(Json(input): Json<MilestoneInput>) -> Response {
    let payload = json!({
        "milestone": predict_milestone(&input),
    });
    (StatusCode::OK, Json(payload)).into_response()
}

#[derive(Debug, Serialize)]
struct TrajectoryView {
    #[serde(flatten)]
    trajectory: GrowthTrajectory,
    source: ValueSource,
}

pub(crate) async fn growth_trajectory_handler<C, S>(
    State(state): State<ScreeningState<C, S>>,
    Path(child_id): Path<String>,
) -> Response
where
    C: ChildDirectory + 'static,
    S: ScreeningRepository + 'static,
{
    let child_id = ChildId(child_id);
    let input = match state.service.growth_input(&child_id) {
        Ok(input) => input,
        Err(error) => return error.into_response(),
    };

    let resolved = state.ml.growth_trajectory(&child_id, &input).await;
    let view = TrajectoryView {
        trajectory: resolved.value,
        source: resolved.source,
    };
    (StatusCode::OK, Json(view)).into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmotionLogPayload {
    child_id: String,
    #[serde(default)]
    logs: Vec<EmotionLogEntry>,
}

pub(crate) async fn emotion_logs_handler<C, S>(
    State(state): State<ScreeningState<C, S>>,
    Json(payload): Json<EmotionLogPayload>,
) -> Response
where
    C: ChildDirectory + 'static,
    S: ScreeningRepository + 'static,
{
    match state
        .service
        .record_emotion_logs(&ChildId(payload.child_id), payload.logs)
    {
        Ok(saved) => {
            let payload = json!({
                "saved": saved,
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(error) => error.into_response(),
    }
}
