//! Wash-request intake, weighing, and processing-state transitions.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{RequestStatus, WashRequest, INSUFFICIENT_ALLOWANCE_REASON};
pub use repository::{RepositoryError, WashRequestRepository, WashRequestView};
pub use router::request_router;
pub use service::{RequestServiceError, WashRequestService, WeighOutcome};
