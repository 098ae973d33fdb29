//! The wash-service lifecycle: policies, per-year allowances, wash requests,
//! and the batch promotion engine.

pub mod allowance;
pub mod calendar;
pub mod domain;
pub mod policy;
pub mod promotion;
pub mod requests;
pub mod roster;

pub use allowance::{AllowanceStatus, AllowanceStatusView, AllowanceStore, LedgerError, WashAllowance};
pub use calendar::{validate_year_windows, YearWindowViolation};
pub use domain::{
    AllowanceId, Batch, BatchId, BatchYear, HostelStatus, PolicyId, PolicySnapshot, RequestId,
    Student, StudentId, WeightCapOutOfRange, MAX_BATCH_YEARS, MIN_WEIGHT_PER_WASH,
};
pub use policy::{
    ArchiveOutcome, Policy, PolicyDraft, PolicyError, PolicyRegistry, PolicyStore, PolicyUpdate,
};
pub use promotion::{
    PromotionCoordinator, PromotionError, PromotionFailure, PromotionOptions, PromotionOutcome,
};
pub use roster::{BatchRepository, RosterError, StudentRepository};
