use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use child_screen::workflows::screening::{
    screening_router, ChildDirectory, MlBridge, ScreeningRepository, ScreeningService,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_screening_routes<C, S>(
    service: Arc<ScreeningService<C, S>>,
    ml: Arc<MlBridge>,
) -> axum::Router
where
    C: ChildDirectory + 'static,
    S: ScreeningRepository + 'static,
{
    screening_router(service, ml)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{InMemoryChildDirectory, InMemoryScreeningRepository};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use child_screen::workflows::screening::{
        CapturedImage, ChildId, CollaboratorError, EmotionAnalyzer, EmotionDetection,
        GrowthInput, GrowthPredictor, GrowthTrajectory,
    };
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    struct OfflineMl;

    #[async_trait]
    impl EmotionAnalyzer for OfflineMl {
        async fn detect(
            &self,
            _child_id: &ChildId,
            _image: &CapturedImage,
        ) -> Result<EmotionDetection, CollaboratorError> {
            Err(CollaboratorError::Network("offline".to_string()))
        }

        async fn heatmap(
            &self,
            _scores: &BTreeMap<String, f64>,
        ) -> Result<Option<String>, CollaboratorError> {
            Err(CollaboratorError::Network("offline".to_string()))
        }
    }

    #[async_trait]
    impl GrowthPredictor for OfflineMl {
        async fn predict(
            &self,
            _child_id: &ChildId,
            _input: &GrowthInput,
        ) -> Result<GrowthTrajectory, CollaboratorError> {
            Err(CollaboratorError::Network("offline".to_string()))
        }
    }

    fn app(ready: bool) -> axum::Router {
        let service = Arc::new(ScreeningService::new(
            Arc::new(InMemoryChildDirectory::default()),
            Arc::new(InMemoryScreeningRepository::default()),
        ));
        let ml = Arc::new(MlBridge::new(
            Arc::new(OfflineMl),
            Arc::new(OfflineMl),
            Duration::from_millis(100),
        ));
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        state.readiness.store(ready, Ordering::Release);
        with_screening_routes(service, ml).layer(Extension(state))
    }

    async fn status_of(app: axum::Router, uri: &str) -> StatusCode {
        let request = Request::get(uri).body(Body::empty()).expect("request builds");
        app.oneshot(request).await.expect("route executes").status()
    }

    #[tokio::test]
    async fn readiness_tracks_flag() {
        assert_eq!(status_of(app(false), "/ready").await, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(app(true), "/ready").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn ops_and_screening_routes_share_one_router() {
        assert_eq!(status_of(app(true), "/health").await, StatusCode::OK);
        assert_eq!(status_of(app(true), "/metrics").await, StatusCode::OK);
        assert_eq!(status_of(app(true), "/api/children").await, StatusCode::OK);
        assert_eq!(
            status_of(app(true), "/api/ml/growth-trajectory/child-404").await,
            StatusCode::NOT_FOUND
        );
    }
}
