use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::laundry::domain::{AllowanceId, RequestId, StudentId};

/// Cancellation reason stamped when a weigh-in outruns the plan.
pub const INSUFFICIENT_ALLOWANCE_REASON: &str = "insufficient wash allowance";

/// Processing state of a wash request.
///
/// Requests move forward along pickup_pending → picked_up → washing →
/// completed → returned; `cancelled` is reachable from any non-terminal
/// state. `returned` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    PickupPending,
    PickedUp,
    Washing,
    Completed,
    Returned,
    Cancelled,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::PickupPending => "pickup_pending",
            Self::PickedUp => "picked_up",
            Self::Washing => "washing",
            Self::Completed => "completed",
            Self::Returned => "returned",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Returned | Self::Cancelled)
    }

    /// Whether a weigh-in may still land on the request.
    pub const fn is_weighable(self) -> bool {
        matches!(self, Self::PickupPending | Self::PickedUp | Self::Washing)
    }

    /// Position along the processing chain; `Cancelled` sits outside it.
    const fn chain_position(self) -> Option<u8> {
        match self {
            Self::PickupPending => Some(0),
            Self::PickedUp => Some(1),
            Self::Washing => Some(2),
            Self::Completed => Some(3),
            Self::Returned => Some(4),
            Self::Cancelled => None,
        }
    }

    /// Whether an operator may move a request from `self` to `next`.
    pub fn permits(self, next: RequestStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(next, Self::Cancelled) {
            return true;
        }
        match (self.chain_position(), next.chain_position()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }
}

/// A single laundry drop-off moving through the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WashRequest {
    pub id: RequestId,
    pub student_id: StudentId,
    /// The allowance the weigh-in debited; stays unset until then.
    pub allowance_id: Option<AllowanceId>,
    pub cloth_count: Option<u32>,
    pub notes: Option<String>,
    pub weight_kg: Option<f64>,
    /// Washes debited from the allowance; 0 until measured.
    pub wash_count: u32,
    pub status: RequestStatus,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub returned_date: Option<NaiveDate>,
}

impl WashRequest {
    pub fn opened(
        id: RequestId,
        student_id: StudentId,
        cloth_count: Option<u32>,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            student_id,
            allowance_id: None,
            cloth_count,
            notes,
            weight_kg: None,
            wash_count: 0,
            status: RequestStatus::PickupPending,
            cancellation_reason: None,
            created_at,
            returned_date: None,
        }
    }

    pub(crate) fn cancel(&mut self, reason: String) {
        self.status = RequestStatus::Cancelled;
        self.cancellation_reason = Some(reason);
    }

    pub(crate) fn mark_returned(&mut self, on: NaiveDate) {
        self.status = RequestStatus::Returned;
        self.returned_date = Some(on);
    }
}
