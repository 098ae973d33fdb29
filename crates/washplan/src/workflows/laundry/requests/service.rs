use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::domain::{RequestStatus, WashRequest, INSUFFICIENT_ALLOWANCE_REASON};
use super::repository::{RepositoryError, WashRequestRepository};
use crate::workflows::laundry::allowance::{AllowanceStore, LedgerError};
use crate::workflows::laundry::domain::{RequestId, StudentId};
use crate::workflows::laundry::roster::{RosterError, StudentRepository};

/// Service running the wash-request state machine against the roster and
/// the allowance ledger.
pub struct WashRequestService<Q, S, A> {
    requests: Arc<Q>,
    students: Arc<S>,
    allowances: Arc<A>,
}

/// Result of a weigh-in. An exhausted allowance is not an error: the request
/// is auto-cancelled and reported back with `auto_cancelled` set.
#[derive(Debug, Clone)]
pub struct WeighOutcome {
    pub request: WashRequest,
    pub auto_cancelled: bool,
}

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> RequestId {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RequestId(format!("req-{id:06}"))
}

impl<Q, S, A> WashRequestService<Q, S, A>
where
    Q: WashRequestRepository + 'static,
    S: StudentRepository + 'static,
    A: AllowanceStore + 'static,
{
    pub fn new(requests: Arc<Q>, students: Arc<S>, allowances: Arc<A>) -> Self {
        Self {
            requests,
            students,
            allowances,
        }
    }

    /// Open a new request. A student carries at most one request in a
    /// non-terminal state.
    pub fn create(
        &self,
        student_id: StudentId,
        cloth_count: Option<u32>,
        notes: Option<String>,
    ) -> Result<WashRequest, RequestServiceError> {
        let student = self
            .students
            .fetch(&student_id)?
            .filter(|student| !student.archived)
            .ok_or(RequestServiceError::UnknownStudent)?;

        if self
            .requests
            .find_active_for_student(&student.id)?
            .is_some()
        {
            return Err(RequestServiceError::ActiveRequestExists);
        }

        let request = WashRequest::opened(
            next_request_id(),
            student.id,
            cloth_count,
            notes,
            Utc::now(),
        );
        let stored = self.requests.insert(request)?;
        info!(request_id = %stored.id.0, student_id = %stored.student_id.0, "wash request opened");
        Ok(stored)
    }

    /// Record the measured weight and settle the wash count against the
    /// student's open allowance.
    pub fn record_weight(
        &self,
        id: &RequestId,
        weight_kg: f64,
    ) -> Result<WeighOutcome, RequestServiceError> {
        if !weight_kg.is_finite() || weight_kg <= 0.0 {
            return Err(RequestServiceError::InvalidWeight(weight_kg));
        }

        let mut request = self
            .requests
            .fetch(id)?
            .ok_or(RequestServiceError::Repository(RepositoryError::NotFound))?;
        if !request.status.is_weighable() {
            return Err(RequestServiceError::NotWeighable(request.status.label()));
        }

        // A re-weigh refunds the earlier debit before the new one is taken;
        // the cleared request is persisted first so the refund cannot be
        // replayed if a later step fails.
        if request.wash_count > 0 {
            if let Some(prior) = request.allowance_id.take() {
                self.allowances.credit(&prior, request.wash_count)?;
            }
            request.wash_count = 0;
            self.requests.update(request.clone())?;
        }

        let allowance = self
            .allowances
            .find_open(&request.student_id)?
            .ok_or(RequestServiceError::NoOpenAllowance)?;
        let wash_count = allowance.snapshot.washes_for(weight_kg);

        match self.allowances.debit(&allowance.id, wash_count) {
            Ok(debited) => {
                request.weight_kg = Some(weight_kg);
                request.wash_count = wash_count;
                request.allowance_id = Some(debited.id.clone());
                if matches!(
                    request.status,
                    RequestStatus::PickupPending | RequestStatus::PickedUp
                ) {
                    request.status = RequestStatus::Washing;
                }
                self.requests.update(request.clone())?;
                info!(
                    request_id = %request.id.0,
                    wash_count,
                    remaining = debited.remaining_washes(),
                    "weigh-in debited allowance"
                );
                Ok(WeighOutcome {
                    request,
                    auto_cancelled: false,
                })
            }
            Err(LedgerError::Insufficient {
                requested,
                remaining,
            }) => {
                request.weight_kg = Some(weight_kg);
                request.cancel(INSUFFICIENT_ALLOWANCE_REASON.to_string());
                self.requests.update(request.clone())?;
                warn!(
                    request_id = %request.id.0,
                    requested,
                    remaining,
                    "weigh-in exceeded allowance; request auto-cancelled"
                );
                Ok(WeighOutcome {
                    request,
                    auto_cancelled: true,
                })
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Move a request along the processing chain.
    pub fn set_status(
        &self,
        id: &RequestId,
        next: RequestStatus,
        reason: Option<String>,
    ) -> Result<WashRequest, RequestServiceError> {
        let mut request = self
            .requests
            .fetch(id)?
            .ok_or(RequestServiceError::Repository(RepositoryError::NotFound))?;

        if !request.status.permits(next) {
            return Err(RequestServiceError::InvalidTransition {
                from: request.status.label(),
                to: next.label(),
            });
        }

        match next {
            RequestStatus::Cancelled => {
                let reason = reason
                    .filter(|reason| !reason.trim().is_empty())
                    .or_else(|| request.cancellation_reason.clone())
                    .ok_or(RequestServiceError::MissingCancellationReason)?;
                request.cancel(reason);
            }
            RequestStatus::Returned => request.mark_returned(Utc::now().date_naive()),
            other => request.status = other,
        }

        self.requests.update(request.clone())?;
        info!(
            request_id = %request.id.0,
            status = request.status.label(),
            "wash request status updated"
        );
        Ok(request)
    }

    pub fn get(&self, id: &RequestId) -> Result<WashRequest, RequestServiceError> {
        self.requests
            .fetch(id)?
            .ok_or(RequestServiceError::Repository(RepositoryError::NotFound))
    }
}

/// Error raised by the wash-request service.
#[derive(Debug, thiserror::Error)]
pub enum RequestServiceError {
    #[error("active request exists")]
    ActiveRequestExists,
    #[error("student not found")]
    UnknownStudent,
    #[error("cannot move request from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
    #[error("request is {0} and can no longer be weighed")]
    NotWeighable(&'static str),
    #[error("cancellation requires a reason")]
    MissingCancellationReason,
    #[error("weight must be a positive number of kilograms, got {0}")]
    InvalidWeight(f64),
    #[error("no open wash allowance for this student")]
    NoOpenAllowance,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Roster(#[from] RosterError),
}
