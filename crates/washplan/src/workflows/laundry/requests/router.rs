use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::RequestStatus;
use super::repository::{RepositoryError, WashRequestRepository};
use super::service::{RequestServiceError, WashRequestService};
use crate::workflows::laundry::allowance::{AllowanceStore, LedgerError};
use crate::workflows::laundry::domain::{RequestId, StudentId};
use crate::workflows::laundry::roster::StudentRepository;

/// Router builder exposing HTTP endpoints for the wash-request lifecycle.
pub fn request_router<Q, S, A>(service: Arc<WashRequestService<Q, S, A>>) -> Router
where
    Q: WashRequestRepository + 'static,
    S: StudentRepository + 'static,
    A: AllowanceStore + 'static,
{
    Router::new()
        .route("/api/v1/laundry/requests", post(create_handler::<Q, S, A>))
        .route(
            "/api/v1/laundry/requests/:request_id",
            get(get_handler::<Q, S, A>),
        )
        .route(
            "/api/v1/laundry/requests/:request_id/weight",
            post(weight_handler::<Q, S, A>),
        )
        .route(
            "/api/v1/laundry/requests/:request_id/status",
            post(status_handler::<Q, S, A>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateRequestBody {
    pub(crate) student_id: String,
    #[serde(default)]
    pub(crate) cloth_count: Option<u32>,
    #[serde(default)]
    pub(crate) notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecordWeightBody {
    pub(crate) weight_kg: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SetStatusBody {
    pub(crate) status: RequestStatus,
    #[serde(default)]
    pub(crate) reason: Option<String>,
}

pub(crate) async fn create_handler<Q, S, A>(
    State(service): State<Arc<WashRequestService<Q, S, A>>>,
    axum::Json(body): axum::Json<CreateRequestBody>,
) -> Response
where
    Q: WashRequestRepository + 'static,
    S: StudentRepository + 'static,
    A: AllowanceStore + 'static,
{
    match service.create(StudentId(body.student_id), body.cloth_count, body.notes) {
        Ok(request) => (StatusCode::CREATED, axum::Json(request.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn get_handler<Q, S, A>(
    State(service): State<Arc<WashRequestService<Q, S, A>>>,
    Path(request_id): Path<String>,
) -> Response
where
    Q: WashRequestRepository + 'static,
    S: StudentRepository + 'static,
    A: AllowanceStore + 'static,
{
    match service.get(&RequestId(request_id)) {
        Ok(request) => (StatusCode::OK, axum::Json(request.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn weight_handler<Q, S, A>(
    State(service): State<Arc<WashRequestService<Q, S, A>>>,
    Path(request_id): Path<String>,
    axum::Json(body): axum::Json<RecordWeightBody>,
) -> Response
where
    Q: WashRequestRepository + 'static,
    S: StudentRepository + 'static,
    A: AllowanceStore + 'static,
{
    match service.record_weight(&RequestId(request_id), body.weight_kg) {
        Ok(outcome) => {
            let payload = json!({
                "request": outcome.request.status_view(),
                "auto_cancelled": outcome.auto_cancelled,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<Q, S, A>(
    State(service): State<Arc<WashRequestService<Q, S, A>>>,
    Path(request_id): Path<String>,
    axum::Json(body): axum::Json<SetStatusBody>,
) -> Response
where
    Q: WashRequestRepository + 'static,
    S: StudentRepository + 'static,
    A: AllowanceStore + 'static,
{
    match service.set_status(&RequestId(request_id), body.status, body.reason) {
        Ok(request) => (StatusCode::OK, axum::Json(request.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: RequestServiceError) -> Response {
    let status = match &error {
        RequestServiceError::ActiveRequestExists
        | RequestServiceError::InvalidTransition { .. }
        | RequestServiceError::NotWeighable(_) => StatusCode::CONFLICT,
        RequestServiceError::InvalidWeight(_)
        | RequestServiceError::MissingCancellationReason => StatusCode::UNPROCESSABLE_ENTITY,
        RequestServiceError::UnknownStudent | RequestServiceError::NoOpenAllowance => {
            StatusCode::NOT_FOUND
        }
        RequestServiceError::Repository(RepositoryError::NotFound)
        | RequestServiceError::Ledger(LedgerError::NotFound) => StatusCode::NOT_FOUND,
        RequestServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}
