use chrono::NaiveDate;
use serde::Serialize;

use super::domain::WashRequest;
use crate::workflows::laundry::domain::{AllowanceId, RequestId, StudentId};

/// Storage abstraction so the service module can be exercised in isolation.
pub trait WashRequestRepository: Send + Sync {
    fn insert(&self, request: WashRequest) -> Result<WashRequest, RepositoryError>;
    fn update(&self, request: WashRequest) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &RequestId) -> Result<Option<WashRequest>, RepositoryError>;
    /// The student's request in a non-terminal state, if any.
    fn find_active_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<WashRequest>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Sanitized representation of a request's exposed state.
#[derive(Debug, Clone, Serialize)]
pub struct WashRequestView {
    pub request_id: RequestId,
    pub student_id: StudentId,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowance_id: Option<AllowanceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloth_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    pub wash_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returned_date: Option<NaiveDate>,
}

impl WashRequest {
    pub fn status_view(&self) -> WashRequestView {
        WashRequestView {
            request_id: self.id.clone(),
            student_id: self.student_id.clone(),
            status: self.status.label(),
            allowance_id: self.allowance_id.clone(),
            cloth_count: self.cloth_count,
            weight_kg: self.weight_kg,
            wash_count: self.wash_count,
            cancellation_reason: self.cancellation_reason.clone(),
            returned_date: self.returned_date,
        }
    }
}
