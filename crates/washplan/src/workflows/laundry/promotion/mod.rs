//! Year-end rollover: close the outgoing year's allowances, advance the
//! batch, and provision the incoming year's allowances.
//!
//! The rollover is a saga, not one transaction: closes are committed before
//! provisioning is attempted, and provisioning failures are collected per
//! student rather than rolled back. The batch-level year advance is the
//! source of truth either way.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::allowance::{next_allowance_id, AllowanceStore, LedgerError, WashAllowance};
use super::domain::{BatchId, PolicySnapshot, Student, StudentId};
use super::policy::{PolicyError, PolicyStore};
use super::roster::{BatchRepository, RosterError, StudentRepository};

/// Caller-supplied promotion parameters. With `use_policy_override` set, the
/// override values replace the active policy for this promotion only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromotionOptions {
    #[serde(default)]
    pub use_policy_override: bool,
    #[serde(default)]
    pub total_washes: Option<u32>,
    #[serde(default)]
    pub max_weight_per_wash: Option<f64>,
}

/// One student the rollover could not carry into the new year.
#[derive(Debug, Clone, Serialize)]
pub struct PromotionFailure {
    pub student_id: StudentId,
    pub reason: String,
}

/// Report of a completed rollover.
#[derive(Debug, Clone, Serialize)]
pub struct PromotionOutcome {
    pub batch_id: BatchId,
    pub from_year: u8,
    pub to_year: u8,
    pub graduated: bool,
    pub promoted: Vec<Student>,
    pub failed: Vec<PromotionFailure>,
}

/// Error raised before the rollover touches any ledger entry.
#[derive(Debug, thiserror::Error)]
pub enum PromotionError {
    #[error("batch not found")]
    BatchNotFound,
    #[error("batch is archived")]
    BatchArchived,
    #[error("batch has already graduated")]
    AlreadyGraduated,
    #[error("a promotion for this batch is already running")]
    AlreadyRunning,
    #[error("no active wash policy and no override supplied")]
    NoActivePolicy,
    #[error("policy override requires total_washes and max_weight_per_wash")]
    IncompleteOverride,
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Roster(#[from] RosterError),
}

/// Coordinates batch rollovers across the roster, ledger, and policy stores.
pub struct PromotionCoordinator<B, S, A, P> {
    batches: Arc<B>,
    students: Arc<S>,
    allowances: Arc<A>,
    policies: Arc<P>,
    in_flight: Mutex<HashSet<BatchId>>,
}

impl<B, S, A, P> PromotionCoordinator<B, S, A, P>
where
    B: BatchRepository + 'static,
    S: StudentRepository + 'static,
    A: AllowanceStore + 'static,
    P: PolicyStore + 'static,
{
    pub fn new(batches: Arc<B>, students: Arc<S>, allowances: Arc<A>, policies: Arc<P>) -> Self {
        Self {
            batches,
            students,
            allowances,
            policies,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Roll a batch into its next academic year.
    pub fn promote(
        &self,
        batch_id: &BatchId,
        options: &PromotionOptions,
    ) -> Result<PromotionOutcome, PromotionError> {
        let _claim = self.claim(batch_id)?;

        let batch = self
            .batches
            .fetch(batch_id)?
            .ok_or(PromotionError::BatchNotFound)?;
        if batch.archived {
            return Err(PromotionError::BatchArchived);
        }
        if batch.is_graduated() {
            return Err(PromotionError::AlreadyGraduated);
        }

        let from_year = batch.current_year;
        let to_year = from_year + 1;
        let graduated = to_year > batch.duration_years();
        // A graduation transition opens no new plans, so it never needs a
        // source policy.
        let snapshot = if graduated {
            None
        } else {
            Some(self.resolve_snapshot(options)?)
        };

        let students = self.students.promotable_in_batch(batch_id)?;
        let mut failed: Vec<PromotionFailure> = Vec::new();
        let mut failed_ids: HashSet<StudentId> = HashSet::new();

        for student in &students {
            if let Err(err) = self.close_current(student, from_year) {
                warn!(
                    student_id = %student.id.0,
                    error = %err,
                    "failed to close outgoing allowance"
                );
                failed_ids.insert(student.id.clone());
                failed.push(PromotionFailure {
                    student_id: student.id.clone(),
                    reason: err.to_string(),
                });
            }
        }

        let mut promoted: Vec<Student> = Vec::new();
        if let Some(snapshot) = &snapshot {
            let window = batch
                .year(to_year)
                .map(|year| (year.start_date, year.end_date))
                .unwrap_or((None, None));

            for student in &students {
                if failed_ids.contains(&student.id) {
                    continue;
                }
                match self.provision(student, to_year, snapshot, window) {
                    Ok(()) => promoted.push(student.clone()),
                    Err(err) => {
                        warn!(
                            student_id = %student.id.0,
                            error = %err,
                            "failed to provision incoming allowance"
                        );
                        failed.push(PromotionFailure {
                            student_id: student.id.clone(),
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }

        let mut advanced = batch.clone();
        advanced.current_year = to_year;
        self.batches.update(advanced)?;

        info!(
            batch_id = %batch_id.0,
            from_year,
            to_year,
            graduated,
            promoted = promoted.len(),
            failed = failed.len(),
            "batch promoted"
        );

        Ok(PromotionOutcome {
            batch_id: batch_id.clone(),
            from_year,
            to_year,
            graduated,
            promoted,
            failed,
        })
    }

    fn resolve_snapshot(
        &self,
        options: &PromotionOptions,
    ) -> Result<PolicySnapshot, PromotionError> {
        if options.use_policy_override {
            let (Some(total_washes), Some(max_weight_per_wash)) =
                (options.total_washes, options.max_weight_per_wash)
            else {
                return Err(PromotionError::IncompleteOverride);
            };
            let snapshot = PolicySnapshot::validated(total_washes, max_weight_per_wash)
                .map_err(PolicyError::from)?;
            return Ok(snapshot);
        }

        self.policies
            .active()?
            .map(|policy| policy.snapshot())
            .ok_or(PromotionError::NoActivePolicy)
    }

    fn close_current(&self, student: &Student, year_no: u8) -> Result<(), LedgerError> {
        match self.allowances.find_for_year(&student.id, year_no)? {
            Some(allowance) if allowance.is_open() => {
                self.allowances.close(&allowance.id)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn provision(
        &self,
        student: &Student,
        year_no: u8,
        snapshot: &PolicySnapshot,
        window: (Option<chrono::NaiveDate>, Option<chrono::NaiveDate>),
    ) -> Result<(), LedgerError> {
        // A retried promotion finds the allowance it already created.
        if self.allowances.find_for_year(&student.id, year_no)?.is_some() {
            return Ok(());
        }

        let allowance = WashAllowance::provisioned(
            next_allowance_id(),
            student.id.clone(),
            year_no,
            snapshot.clone(),
            window,
        );
        match self.allowances.insert(allowance) {
            Ok(_) | Err(LedgerError::AlreadyProvisioned { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn claim(&self, batch_id: &BatchId) -> Result<InFlightClaim<'_>, PromotionError> {
        let mut slots = self.in_flight.lock().expect("promotion mutex poisoned");
        if !slots.insert(batch_id.clone()) {
            return Err(PromotionError::AlreadyRunning);
        }
        Ok(InFlightClaim {
            slots: &self.in_flight,
            batch_id: batch_id.clone(),
        })
    }
}

/// Releases the batch's promotion slot on drop, error paths included.
struct InFlightClaim<'a> {
    slots: &'a Mutex<HashSet<BatchId>>,
    batch_id: BatchId,
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.remove(&self.batch_id);
        }
    }
}
