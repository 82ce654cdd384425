use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryChildDirectory, InMemoryScreeningRepository};
use crate::routes::with_screening_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use child_screen::config::AppConfig;
use child_screen::error::AppError;
use child_screen::telemetry;
use child_screen::workflows::screening::{MlBridge, MlServiceClient, ScreeningService};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(ml_url) = args.ml_url.take() {
        config.ml.base_url = ml_url.trim_end_matches('/').to_string();
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(ScreeningService::new(
        Arc::new(InMemoryChildDirectory::default()),
        Arc::new(InMemoryScreeningRepository::default()),
    ));
    let ml_client = Arc::new(MlServiceClient::new(
        &config.ml.base_url,
        config.ml.timeout(),
    )?);
    let ml = Arc::new(MlBridge::new(
        ml_client.clone(),
        ml_client,
        config.ml.timeout(),
    ));

    let app = with_screening_routes(service, ml)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        ml_service = %config.ml.base_url,
        "child screening service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
