//! Roster intake: enroll a batch's students from a CSV export and provision
//! their first wash allowances from the active policy.

mod parser;

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::workflows::laundry::allowance::{next_allowance_id, AllowanceStore, LedgerError, WashAllowance};
use crate::workflows::laundry::domain::{BatchId, Student, StudentId};
use crate::workflows::laundry::policy::{PolicyError, PolicyStore};
use crate::workflows::laundry::roster::{RosterError, StudentRepository};

#[derive(Debug)]
pub enum RosterImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    EmptyRegisterNo { line: usize },
    Roster(RosterError),
    Ledger(LedgerError),
    Policy(PolicyError),
    NoActivePolicy,
}

impl std::fmt::Display for RosterImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterImportError::Io(err) => write!(f, "failed to read roster export: {}", err),
            RosterImportError::Csv(err) => write!(f, "invalid roster CSV data: {}", err),
            RosterImportError::EmptyRegisterNo { line } => {
                write!(f, "roster row on line {} has an empty register number", line)
            }
            RosterImportError::Roster(err) => {
                write!(f, "could not apply roster data to the student store: {}", err)
            }
            RosterImportError::Ledger(err) => {
                write!(f, "could not provision allowances for the roster: {}", err)
            }
            RosterImportError::Policy(err) => write!(f, "policy lookup failed: {}", err),
            RosterImportError::NoActivePolicy => {
                write!(f, "no active wash policy to provision allowances from")
            }
        }
    }
}

impl std::error::Error for RosterImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterImportError::Io(err) => Some(err),
            RosterImportError::Csv(err) => Some(err),
            RosterImportError::EmptyRegisterNo { .. } => None,
            RosterImportError::Roster(err) => Some(err),
            RosterImportError::Ledger(err) => Some(err),
            RosterImportError::Policy(err) => Some(err),
            RosterImportError::NoActivePolicy => None,
        }
    }
}

impl From<std::io::Error> for RosterImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RosterImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<RosterError> for RosterImportError {
    fn from(err: RosterError) -> Self {
        Self::Roster(err)
    }
}

impl From<LedgerError> for RosterImportError {
    fn from(err: LedgerError) -> Self {
        Self::Ledger(err)
    }
}

impl From<PolicyError> for RosterImportError {
    fn from(err: PolicyError) -> Self {
        Self::Policy(err)
    }
}

/// What an import run did: who got enrolled, which register numbers were
/// already present (or repeated in the file) and were skipped.
#[derive(Debug, Default, Serialize)]
pub struct EnrollmentSummary {
    pub enrolled: Vec<Student>,
    pub skipped: Vec<String>,
}

static STUDENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_student_id() -> StudentId {
    let id = STUDENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    StudentId(format!("stu-{id:06}"))
}

pub struct RosterImporter;

impl RosterImporter {
    pub fn from_path<P: AsRef<Path>, S: StudentRepository>(
        path: P,
        batch_id: &BatchId,
        students: &S,
    ) -> Result<EnrollmentSummary, RosterImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, batch_id, students)
    }

    pub fn from_reader<R: Read, S: StudentRepository>(
        reader: R,
        batch_id: &BatchId,
        students: &S,
    ) -> Result<EnrollmentSummary, RosterImportError> {
        let entries = parser::parse_entries(reader)?;
        let mut summary = EnrollmentSummary::default();
        let mut seen: HashSet<String> = HashSet::new();

        for entry in entries {
            if !seen.insert(entry.register_no.clone()) {
                summary.skipped.push(entry.register_no);
                continue;
            }
            if students
                .find_by_register_no(batch_id, &entry.register_no)?
                .is_some()
            {
                summary.skipped.push(entry.register_no);
                continue;
            }

            let student = Student {
                id: next_student_id(),
                batch_id: batch_id.clone(),
                register_no: entry.register_no,
                name: entry.name,
                hostel_status: entry.hostel_status,
                archived: false,
            };
            match students.insert(student) {
                Ok(stored) => summary.enrolled.push(stored),
                Err(RosterError::DuplicateStudent(register_no)) => {
                    summary.skipped.push(register_no)
                }
                Err(other) => return Err(other.into()),
            }
        }

        info!(
            batch_id = %batch_id.0,
            enrolled = summary.enrolled.len(),
            skipped = summary.skipped.len(),
            "roster import applied"
        );
        Ok(summary)
    }
}

/// Provision year-`year_no` allowances from the active policy for the given
/// students. Non-active students and students already holding an allowance
/// for that year are left alone; the count of freshly provisioned plans is
/// returned.
pub fn provision_allowances<A, P>(
    students: &[Student],
    year_no: u8,
    window: (Option<NaiveDate>, Option<NaiveDate>),
    policies: &P,
    allowances: &A,
) -> Result<usize, RosterImportError>
where
    A: AllowanceStore,
    P: PolicyStore,
{
    let snapshot = policies
        .active()?
        .map(|policy| policy.snapshot())
        .ok_or(RosterImportError::NoActivePolicy)?;

    let mut provisioned = 0;
    for student in students.iter().filter(|s| s.hostel_status.is_active()) {
        if allowances.find_for_year(&student.id, year_no)?.is_some() {
            continue;
        }
        let allowance = WashAllowance::provisioned(
            next_allowance_id(),
            student.id.clone(),
            year_no,
            snapshot.clone(),
            window,
        );
        match allowances.insert(allowance) {
            Ok(_) => provisioned += 1,
            Err(LedgerError::AlreadyProvisioned { .. }) => {}
            Err(err) => return Err(err.into()),
        }
    }

    info!(year_no, provisioned, "initial allowances provisioned");
    Ok(provisioned)
}
