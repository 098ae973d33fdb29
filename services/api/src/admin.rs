use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use washplan::error::AppError;
use washplan::workflows::laundry::{
    validate_year_windows, BatchId, BatchRepository, BatchYear, PolicyDraft, PolicyError,
    PolicyId, PolicyRegistry, PolicyUpdate, PromotionCoordinator, PromotionError,
    PromotionOptions,
};

use crate::infra::{
    InMemoryAllowanceStore, InMemoryBatchRepository, InMemoryPolicyStore,
    InMemoryRequestRepository, InMemoryStudentRepository,
};

pub(crate) type Coordinator = PromotionCoordinator<
    InMemoryBatchRepository,
    InMemoryStudentRepository,
    InMemoryAllowanceStore,
    InMemoryPolicyStore,
>;

pub(crate) type RequestService = washplan::workflows::laundry::requests::WashRequestService<
    InMemoryRequestRepository,
    InMemoryStudentRepository,
    InMemoryAllowanceStore,
>;

/// Shared state for the administrative surface.
#[derive(Clone)]
pub(crate) struct AdminContext {
    pub(crate) policies: Arc<PolicyRegistry<InMemoryPolicyStore>>,
    pub(crate) coordinator: Arc<Coordinator>,
    pub(crate) batches: Arc<InMemoryBatchRepository>,
    pub(crate) admin_token: Option<String>,
}

pub(crate) fn admin_router(context: AdminContext) -> Router {
    Router::new()
        .route(
            "/api/v1/admin/policies",
            post(create_policy).get(list_policies),
        )
        .route("/api/v1/admin/policies/:policy_id", patch(update_policy))
        .route(
            "/api/v1/admin/policies/:policy_id/activate",
            post(activate_policy),
        )
        .route(
            "/api/v1/admin/policies/:policy_id/deactivate",
            post(deactivate_policy),
        )
        .route(
            "/api/v1/admin/policies/:policy_id/archive",
            post(archive_policy),
        )
        .route(
            "/api/v1/admin/policies/:policy_id/restore",
            post(restore_policy),
        )
        .route("/api/v1/admin/batches/:batch_id/promote", post(promote_batch))
        .route(
            "/api/v1/admin/batches/:batch_id/years/validate",
            post(validate_batch_years),
        )
        .with_state(context)
}

/// Shared-token check standing in for the external authorization layer; the
/// 403 path stays distinguishable from validation and conflict errors.
fn authorize(context: &AdminContext, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = &context.admin_token else {
        return Ok(());
    };
    let presented = headers
        .get("x-admin-token")
        .and_then(|value| value.to_str().ok());
    if presented == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(AppError::Permission("admin token missing or wrong".to_string()).into_response())
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListPoliciesQuery {
    #[serde(default)]
    include_archived: bool,
}

async fn create_policy(
    State(context): State<AdminContext>,
    headers: HeaderMap,
    Json(draft): Json<PolicyDraft>,
) -> Response {
    if let Err(denied) = authorize(&context, &headers) {
        return denied;
    }
    match context.policies.create(draft) {
        Ok(policy) => (StatusCode::CREATED, Json(policy)).into_response(),
        Err(error) => policy_error_response(error),
    }
}

async fn list_policies(
    State(context): State<AdminContext>,
    headers: HeaderMap,
    Query(query): Query<ListPoliciesQuery>,
) -> Response {
    if let Err(denied) = authorize(&context, &headers) {
        return denied;
    }
    match context.policies.list(query.include_archived) {
        Ok(policies) => (StatusCode::OK, Json(policies)).into_response(),
        Err(error) => policy_error_response(error),
    }
}

async fn update_policy(
    State(context): State<AdminContext>,
    Path(policy_id): Path<String>,
    headers: HeaderMap,
    Json(changes): Json<PolicyUpdate>,
) -> Response {
    if let Err(denied) = authorize(&context, &headers) {
        return denied;
    }
    match context.policies.update(&PolicyId(policy_id), changes) {
        Ok(policy) => (StatusCode::OK, Json(policy)).into_response(),
        Err(error) => policy_error_response(error),
    }
}

async fn activate_policy(
    State(context): State<AdminContext>,
    Path(policy_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&context, &headers) {
        return denied;
    }
    match context.policies.activate(&PolicyId(policy_id)) {
        Ok(policy) => (StatusCode::OK, Json(policy)).into_response(),
        Err(error) => policy_error_response(error),
    }
}

async fn deactivate_policy(
    State(context): State<AdminContext>,
    Path(policy_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&context, &headers) {
        return denied;
    }
    match context.policies.deactivate(&PolicyId(policy_id)) {
        Ok(policy) => (StatusCode::OK, Json(policy)).into_response(),
        Err(error) => policy_error_response(error),
    }
}

async fn archive_policy(
    State(context): State<AdminContext>,
    Path(policy_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&context, &headers) {
        return denied;
    }
    match context.policies.archive(&PolicyId(policy_id)) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => policy_error_response(error),
    }
}

async fn restore_policy(
    State(context): State<AdminContext>,
    Path(policy_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&context, &headers) {
        return denied;
    }
    match context.policies.restore(&PolicyId(policy_id)) {
        Ok(policy) => (StatusCode::OK, Json(policy)).into_response(),
        Err(error) => policy_error_response(error),
    }
}

async fn promote_batch(
    State(context): State<AdminContext>,
    Path(batch_id): Path<String>,
    headers: HeaderMap,
    Json(options): Json<PromotionOptions>,
) -> Response {
    if let Err(denied) = authorize(&context, &headers) {
        return denied;
    }
    match context.coordinator.promote(&BatchId(batch_id), &options) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => promotion_error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ValidateYearsBody {
    years: Vec<BatchYear>,
}

async fn validate_batch_years(
    State(context): State<AdminContext>,
    Path(batch_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ValidateYearsBody>,
) -> Response {
    if let Err(denied) = authorize(&context, &headers) {
        return denied;
    }

    let batch_id = BatchId(batch_id);
    match context.batches.fetch(&batch_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            let payload = json!({ "error": "batch not found" });
            return (StatusCode::NOT_FOUND, Json(payload)).into_response();
        }
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response();
        }
    }

    match validate_year_windows(&body.years) {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(violation) => {
            let payload = json!({
                "ok": false,
                "conflict": violation.to_string(),
                "conflicting_years": conflicting_years(&violation),
            });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
    }
}

fn conflicting_years(
    violation: &washplan::workflows::laundry::YearWindowViolation,
) -> Vec<u8> {
    use washplan::workflows::laundry::YearWindowViolation::*;
    match violation {
        YearOutOfRange { year_no } | DuplicateYear { year_no } | EmptyWindow { year_no } => {
            vec![*year_no]
        }
        InsufficientGap { earlier, later } => vec![*earlier, *later],
    }
}

fn policy_error_response(error: PolicyError) -> Response {
    let status = match &error {
        PolicyError::WeightCap(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PolicyError::NotFound => StatusCode::NOT_FOUND,
        PolicyError::Archived => StatusCode::CONFLICT,
        PolicyError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}

fn promotion_error_response(error: PromotionError) -> Response {
    let status = match &error {
        PromotionError::BatchNotFound => StatusCode::NOT_FOUND,
        PromotionError::BatchArchived
        | PromotionError::AlreadyGraduated
        | PromotionError::AlreadyRunning
        | PromotionError::NoActivePolicy => StatusCode::CONFLICT,
        PromotionError::IncompleteOverride => StatusCode::UNPROCESSABLE_ENTITY,
        PromotionError::Policy(PolicyError::WeightCap(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        PromotionError::Policy(_) | PromotionError::Roster(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use washplan::workflows::laundry::{Batch, PolicySnapshot};

    fn context(token: Option<&str>) -> AdminContext {
        let policies = Arc::new(InMemoryPolicyStore::default());
        let batches = Arc::new(InMemoryBatchRepository::default());
        let students = Arc::new(InMemoryStudentRepository::default());
        let allowances = Arc::new(InMemoryAllowanceStore::default());
        AdminContext {
            policies: Arc::new(PolicyRegistry::new(policies.clone())),
            coordinator: Arc::new(PromotionCoordinator::new(
                batches.clone(),
                students,
                allowances,
                policies,
            )),
            batches,
            admin_token: token.map(str::to_string),
        }
    }

    fn seeded_batch(context: &AdminContext) -> BatchId {
        let batch = Batch {
            id: BatchId("batch-1".to_string()),
            department_id: "mech".to_string(),
            start_year: 2023,
            end_year: 2027,
            current_year: 1,
            archived: false,
            years: Vec::new(),
        };
        context.batches.insert(batch.clone()).expect("batch stores");
        batch.id
    }

    #[tokio::test]
    async fn validate_years_reports_the_conflicting_pair() {
        let context = context(None);
        let batch_id = seeded_batch(&context);

        let years = vec![
            BatchYear {
                year_no: 1,
                start_date: NaiveDate::from_ymd_opt(2023, 6, 1),
                end_date: NaiveDate::from_ymd_opt(2024, 4, 30),
            },
            BatchYear {
                year_no: 2,
                start_date: NaiveDate::from_ymd_opt(2024, 4, 30),
                end_date: NaiveDate::from_ymd_opt(2025, 4, 30),
            },
        ];
        let response = validate_batch_years(
            State(context),
            Path(batch_id.0),
            HeaderMap::new(),
            Json(ValidateYearsBody { years }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn admin_routes_refuse_a_wrong_token() {
        let context = context(Some("sekrit"));

        let response = list_policies(
            State(context),
            HeaderMap::new(),
            Query(ListPoliciesQuery::default()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn promote_without_policy_is_a_conflict() {
        let context = context(None);
        let batch_id = seeded_batch(&context);

        let response = promote_batch(
            State(context),
            Path(batch_id.0),
            HeaderMap::new(),
            Json(PromotionOptions::default()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn override_snapshot_bounds_match_policy_bounds() {
        assert!(PolicySnapshot::validated(30, 0.09).is_err());
        assert!(PolicySnapshot::validated(0, 0.1).is_ok());
    }
}
