//! Wash-service lifecycle and batch promotion engine for institutional
//! laundry plans: policies, per-year wash allowances, the wash-request state
//! machine, roster intake, and year-end batch promotion.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
