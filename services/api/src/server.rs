use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use tracing::info;
use washplan::config::AppConfig;
use washplan::error::AppError;
use washplan::telemetry;
use washplan::workflows::laundry::requests::WashRequestService;
use washplan::workflows::laundry::{PolicyRegistry, PromotionCoordinator};

use crate::admin::AdminContext;
use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryAllowanceStore, InMemoryBatchRepository, InMemoryPolicyStore,
    InMemoryRequestRepository, InMemoryStudentRepository,
};
use crate::routes::with_service_routes;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let policies = Arc::new(InMemoryPolicyStore::default());
    let batches = Arc::new(InMemoryBatchRepository::default());
    let students = Arc::new(InMemoryStudentRepository::default());
    let allowances = Arc::new(InMemoryAllowanceStore::default());
    let requests = Arc::new(InMemoryRequestRepository::default());

    let request_service = Arc::new(WashRequestService::new(
        requests,
        students.clone(),
        allowances.clone(),
    ));
    let admin_context = AdminContext {
        policies: Arc::new(PolicyRegistry::new(policies.clone())),
        coordinator: Arc::new(PromotionCoordinator::new(
            batches.clone(),
            students,
            allowances,
            policies,
        )),
        batches,
        admin_token: config.admin.admin_token.clone(),
    };

    let app = with_service_routes(request_service, admin_context)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "wash-service orchestrator ready");

    axum::serve(listener, app).await?;
    Ok(())
}
