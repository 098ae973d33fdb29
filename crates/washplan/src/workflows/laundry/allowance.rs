use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{AllowanceId, PolicySnapshot, StudentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowanceStatus {
    Open,
    Closed,
}

impl AllowanceStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// One student's consumable wash plan for a single academic year.
///
/// Carries the policy snapshot taken at provisioning time; consumption only
/// ever moves through [`WashAllowance::debit`] and [`WashAllowance::credit`],
/// which hold `0 <= used_washes <= total_washes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WashAllowance {
    pub id: AllowanceId,
    pub student_id: StudentId,
    pub year_no: u8,
    pub snapshot: PolicySnapshot,
    pub used_washes: u32,
    pub status: AllowanceStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl WashAllowance {
    pub fn provisioned(
        id: AllowanceId,
        student_id: StudentId,
        year_no: u8,
        snapshot: PolicySnapshot,
        window: (Option<NaiveDate>, Option<NaiveDate>),
    ) -> Self {
        Self {
            id,
            student_id,
            year_no,
            snapshot,
            used_washes: 0,
            status: AllowanceStatus::Open,
            start_date: window.0,
            end_date: window.1,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == AllowanceStatus::Open
    }

    pub fn remaining_washes(&self) -> u32 {
        self.snapshot.total_washes.saturating_sub(self.used_washes)
    }

    pub(crate) fn debit(&mut self, count: u32) -> Result<(), LedgerError> {
        if !self.is_open() {
            return Err(LedgerError::Closed);
        }
        let remaining = self.remaining_washes();
        if count > remaining {
            return Err(LedgerError::Insufficient {
                requested: count,
                remaining,
            });
        }
        self.used_washes += count;
        Ok(())
    }

    /// Credits may land on a closed allowance (a re-weigh after rollover)
    /// and only ever lower consumption.
    pub(crate) fn credit(&mut self, count: u32) {
        self.used_washes = self.used_washes.saturating_sub(count);
    }

    pub(crate) fn close(&mut self) {
        self.status = AllowanceStatus::Closed;
    }

    pub fn status_view(&self) -> AllowanceStatusView {
        AllowanceStatusView {
            allowance_id: self.id.clone(),
            student_id: self.student_id.clone(),
            year_no: self.year_no,
            total_washes: self.snapshot.total_washes,
            used_washes: self.used_washes,
            remaining_washes: self.remaining_washes(),
            status: self.status.label(),
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

/// Sanitized representation of an allowance's consumption state.
#[derive(Debug, Clone, Serialize)]
pub struct AllowanceStatusView {
    pub allowance_id: AllowanceId,
    pub student_id: StudentId,
    pub year_no: u8,
    pub total_washes: u32,
    pub used_washes: u32,
    pub remaining_washes: u32,
    pub status: &'static str,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Error enumeration for the allowance ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient wash allowance (requested {requested}, remaining {remaining})")]
    Insufficient { requested: u32, remaining: u32 },
    #[error("allowance is closed")]
    Closed,
    #[error("student already holds an allowance for year {year_no}")]
    AlreadyProvisioned { student_id: StudentId, year_no: u8 },
    #[error("allowance not found")]
    NotFound,
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction for the allowance ledger.
///
/// `debit` is a conditional update: the remaining-washes check and the
/// increment must happen inside one critical section, never as a
/// read-then-write across calls. `close` is a no-op on an already-closed
/// allowance so promotion retries stay safe. `insert` enforces one allowance
/// per (student, year).
pub trait AllowanceStore: Send + Sync {
    fn insert(&self, allowance: WashAllowance) -> Result<WashAllowance, LedgerError>;
    fn fetch(&self, id: &AllowanceId) -> Result<Option<WashAllowance>, LedgerError>;
    /// The student's open allowance; with more than one open, the highest
    /// year wins.
    fn find_open(&self, student_id: &StudentId) -> Result<Option<WashAllowance>, LedgerError>;
    fn find_for_year(
        &self,
        student_id: &StudentId,
        year_no: u8,
    ) -> Result<Option<WashAllowance>, LedgerError>;
    fn debit(&self, id: &AllowanceId, count: u32) -> Result<WashAllowance, LedgerError>;
    fn credit(&self, id: &AllowanceId, count: u32) -> Result<WashAllowance, LedgerError>;
    fn close(&self, id: &AllowanceId) -> Result<WashAllowance, LedgerError>;
}

static ALLOWANCE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_allowance_id() -> AllowanceId {
    let id = ALLOWANCE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AllowanceId(format!("alw-{id:06}"))
}
