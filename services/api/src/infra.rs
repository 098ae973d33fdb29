use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use washplan::workflows::laundry::requests::{
    RepositoryError, WashRequest, WashRequestRepository,
};
use washplan::workflows::laundry::{
    AllowanceId, AllowanceStatus, AllowanceStore, Batch, BatchId, BatchRepository, LedgerError,
    Policy, PolicyError, PolicyId, PolicyStore, RequestId, RosterError, Student, StudentId,
    StudentRepository, WashAllowance,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("'{value}' is not a YYYY-MM-DD date"))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryPolicyStore {
    records: Arc<Mutex<HashMap<PolicyId, Policy>>>,
}

impl PolicyStore for InMemoryPolicyStore {
    fn insert(&self, policy: Policy) -> Result<Policy, PolicyError> {
        let mut guard = self.records.lock().expect("policy mutex poisoned");
        guard.insert(policy.id.clone(), policy.clone());
        Ok(policy)
    }

    fn fetch(&self, id: &PolicyId) -> Result<Option<Policy>, PolicyError> {
        let guard = self.records.lock().expect("policy mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update(&self, policy: Policy) -> Result<(), PolicyError> {
        let mut guard = self.records.lock().expect("policy mutex poisoned");
        if !guard.contains_key(&policy.id) {
            return Err(PolicyError::NotFound);
        }
        guard.insert(policy.id.clone(), policy);
        Ok(())
    }

    fn list(&self) -> Result<Vec<Policy>, PolicyError> {
        let guard = self.records.lock().expect("policy mutex poisoned");
        let mut policies: Vec<Policy> = guard.values().cloned().collect();
        policies.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(policies)
    }

    fn swap_active(&self, id: &PolicyId) -> Result<Policy, PolicyError> {
        // One lock covers the deactivate-then-activate swap, which is what
        // keeps the single-active invariant under concurrent callers.
        let mut guard = self.records.lock().expect("policy mutex poisoned");
        let target = guard.get(id).cloned().ok_or(PolicyError::NotFound)?;
        if target.archived {
            return Err(PolicyError::Archived);
        }
        for policy in guard.values_mut() {
            policy.is_active = false;
        }
        let target = guard.get_mut(id).expect("target fetched above");
        target.is_active = true;
        Ok(target.clone())
    }

    fn active(&self) -> Result<Option<Policy>, PolicyError> {
        let guard = self.records.lock().expect("policy mutex poisoned");
        Ok(guard
            .values()
            .find(|policy| policy.is_active && !policy.archived)
            .cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryBatchRepository {
    records: Arc<Mutex<HashMap<BatchId, Batch>>>,
}

impl BatchRepository for InMemoryBatchRepository {
    fn insert(&self, batch: Batch) -> Result<Batch, RosterError> {
        let mut guard = self.records.lock().expect("batch mutex poisoned");
        guard.insert(batch.id.clone(), batch.clone());
        Ok(batch)
    }

    fn fetch(&self, id: &BatchId) -> Result<Option<Batch>, RosterError> {
        let guard = self.records.lock().expect("batch mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update(&self, batch: Batch) -> Result<(), RosterError> {
        let mut guard = self.records.lock().expect("batch mutex poisoned");
        if !guard.contains_key(&batch.id) {
            return Err(RosterError::BatchNotFound);
        }
        guard.insert(batch.id.clone(), batch);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryStudentRepository {
    records: Arc<Mutex<HashMap<StudentId, Student>>>,
}

impl StudentRepository for InMemoryStudentRepository {
    fn insert(&self, student: Student) -> Result<Student, RosterError> {
        let mut guard = self.records.lock().expect("student mutex poisoned");
        if guard.values().any(|existing| {
            existing.batch_id == student.batch_id && existing.register_no == student.register_no
        }) {
            return Err(RosterError::DuplicateStudent(student.register_no));
        }
        guard.insert(student.id.clone(), student.clone());
        Ok(student)
    }

    fn fetch(&self, id: &StudentId) -> Result<Option<Student>, RosterError> {
        let guard = self.records.lock().expect("student mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn promotable_in_batch(&self, batch_id: &BatchId) -> Result<Vec<Student>, RosterError> {
        let guard = self.records.lock().expect("student mutex poisoned");
        let mut students: Vec<Student> = guard
            .values()
            .filter(|student| &student.batch_id == batch_id && student.is_promotable())
            .cloned()
            .collect();
        students.sort_by(|a, b| a.register_no.cmp(&b.register_no));
        Ok(students)
    }

    fn find_by_register_no(
        &self,
        batch_id: &BatchId,
        register_no: &str,
    ) -> Result<Option<Student>, RosterError> {
        let guard = self.records.lock().expect("student mutex poisoned");
        Ok(guard
            .values()
            .find(|student| &student.batch_id == batch_id && student.register_no == register_no)
            .cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAllowanceStore {
    records: Arc<Mutex<HashMap<AllowanceId, WashAllowance>>>,
}

impl AllowanceStore for InMemoryAllowanceStore {
    fn insert(&self, allowance: WashAllowance) -> Result<WashAllowance, LedgerError> {
        let mut guard = self.records.lock().expect("allowance mutex poisoned");
        if guard.values().any(|existing| {
            existing.student_id == allowance.student_id && existing.year_no == allowance.year_no
        }) {
            return Err(LedgerError::AlreadyProvisioned {
                student_id: allowance.student_id,
                year_no: allowance.year_no,
            });
        }
        guard.insert(allowance.id.clone(), allowance.clone());
        Ok(allowance)
    }

    fn fetch(&self, id: &AllowanceId) -> Result<Option<WashAllowance>, LedgerError> {
        let guard = self.records.lock().expect("allowance mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_open(&self, student_id: &StudentId) -> Result<Option<WashAllowance>, LedgerError> {
        let guard = self.records.lock().expect("allowance mutex poisoned");
        Ok(guard
            .values()
            .filter(|allowance| &allowance.student_id == student_id && allowance.is_open())
            .max_by_key(|allowance| allowance.year_no)
            .cloned())
    }

    fn find_for_year(
        &self,
        student_id: &StudentId,
        year_no: u8,
    ) -> Result<Option<WashAllowance>, LedgerError> {
        let guard = self.records.lock().expect("allowance mutex poisoned");
        Ok(guard
            .values()
            .find(|allowance| &allowance.student_id == student_id && allowance.year_no == year_no)
            .cloned())
    }

    fn debit(&self, id: &AllowanceId, count: u32) -> Result<WashAllowance, LedgerError> {
        // The remaining-washes check and the increment share one lock; two
        // concurrent weigh-ins cannot both pass the check.
        let mut guard = self.records.lock().expect("allowance mutex poisoned");
        let allowance = guard.get_mut(id).ok_or(LedgerError::NotFound)?;
        if !allowance.is_open() {
            return Err(LedgerError::Closed);
        }
        let remaining = allowance.remaining_washes();
        if count > remaining {
            return Err(LedgerError::Insufficient {
                requested: count,
                remaining,
            });
        }
        allowance.used_washes += count;
        Ok(allowance.clone())
    }

    fn credit(&self, id: &AllowanceId, count: u32) -> Result<WashAllowance, LedgerError> {
        let mut guard = self.records.lock().expect("allowance mutex poisoned");
        let allowance = guard.get_mut(id).ok_or(LedgerError::NotFound)?;
        allowance.used_washes = allowance.used_washes.saturating_sub(count);
        Ok(allowance.clone())
    }

    fn close(&self, id: &AllowanceId) -> Result<WashAllowance, LedgerError> {
        let mut guard = self.records.lock().expect("allowance mutex poisoned");
        let allowance = guard.get_mut(id).ok_or(LedgerError::NotFound)?;
        allowance.status = AllowanceStatus::Closed;
        Ok(allowance.clone())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryRequestRepository {
    records: Arc<Mutex<HashMap<RequestId, WashRequest>>>,
}

impl WashRequestRepository for InMemoryRequestRepository {
    fn insert(&self, request: WashRequest) -> Result<WashRequest, RepositoryError> {
        let mut guard = self.records.lock().expect("request mutex poisoned");
        if guard.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn update(&self, request: WashRequest) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("request mutex poisoned");
        if !guard.contains_key(&request.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(request.id.clone(), request);
        Ok(())
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<WashRequest>, RepositoryError> {
        let guard = self.records.lock().expect("request mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_active_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<WashRequest>, RepositoryError> {
        let guard = self.records.lock().expect("request mutex poisoned");
        Ok(guard
            .values()
            .find(|request| &request.student_id == student_id && !request.status.is_terminal())
            .cloned())
    }
}
