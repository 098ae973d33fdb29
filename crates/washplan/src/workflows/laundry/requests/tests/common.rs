use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::workflows::laundry::allowance::{AllowanceStore, LedgerError, WashAllowance};
use crate::workflows::laundry::domain::{
    AllowanceId, BatchId, HostelStatus, PolicySnapshot, Student, StudentId,
};
use crate::workflows::laundry::requests::domain::WashRequest;
use crate::workflows::laundry::requests::repository::{RepositoryError, WashRequestRepository};
use crate::workflows::laundry::requests::{request_router, WashRequestService};
use crate::workflows::laundry::roster::{RosterError, StudentRepository};

pub(super) type TestService = WashRequestService<MemoryRequests, MemoryStudents, MemoryAllowances>;

pub(super) fn student() -> Student {
    Student {
        id: StudentId("stu-100".to_string()),
        batch_id: BatchId("batch-1".to_string()),
        register_no: "21ME101".to_string(),
        name: "Priya Raman".to_string(),
        hostel_status: HostelStatus::Active,
        archived: false,
    }
}

pub(super) fn allowance_for(
    student: &Student,
    total: u32,
    used: u32,
    max_weight: f64,
) -> WashAllowance {
    let mut allowance = WashAllowance::provisioned(
        AllowanceId(format!("alw-{}", student.id.0)),
        student.id.clone(),
        1,
        PolicySnapshot::validated(total, max_weight).expect("valid snapshot"),
        (None, None),
    );
    allowance.used_washes = used;
    allowance
}

pub(super) fn build_service() -> (
    TestService,
    Arc<MemoryRequests>,
    Arc<MemoryStudents>,
    Arc<MemoryAllowances>,
) {
    let requests = Arc::new(MemoryRequests::default());
    let students = Arc::new(MemoryStudents::default());
    let allowances = Arc::new(MemoryAllowances::default());
    let service = WashRequestService::new(requests.clone(), students.clone(), allowances.clone());
    (service, requests, students, allowances)
}

/// Service seeded with one active student holding an open allowance.
pub(super) fn seeded_service(
    total: u32,
    used: u32,
    max_weight: f64,
) -> (TestService, Student, Arc<MemoryAllowances>) {
    let (service, _, students, allowances) = build_service();
    let student = student();
    students.insert(student.clone()).expect("student enrolls");
    allowances
        .insert(allowance_for(&student, total, used, max_weight))
        .expect("allowance provisions");
    (service, student, allowances)
}

pub(super) fn request_router_with_service(service: TestService) -> axum::Router {
    request_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[derive(Default, Clone)]
pub(super) struct MemoryRequests {
    records: Arc<Mutex<HashMap<crate::workflows::laundry::domain::RequestId, WashRequest>>>,
}

impl WashRequestRepository for MemoryRequests {
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

    fn fetch(
        &self,
        id: &crate::workflows::laundry::domain::RequestId,
    ) -> Result<Option<WashRequest>, RepositoryError> {
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

#[derive(Default, Clone)]
pub(super) struct MemoryStudents {
    records: Arc<Mutex<HashMap<StudentId, Student>>>,
}

impl StudentRepository for MemoryStudents {
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
        Ok(guard
            .values()
            .filter(|student| &student.batch_id == batch_id && student.is_promotable())
            .cloned()
            .collect())
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
pub(super) struct MemoryAllowances {
    records: Arc<Mutex<HashMap<AllowanceId, WashAllowance>>>,
}

impl MemoryAllowances {
    pub(super) fn snapshot_of(&self, id: &AllowanceId) -> WashAllowance {
        self.fetch(id)
            .expect("allowance store available")
            .expect("allowance present")
    }

    pub(super) fn find_open_for(&self, student_id: &StudentId) -> Option<WashAllowance> {
        self.find_open(student_id).expect("allowance store available")
    }
}

impl AllowanceStore for MemoryAllowances {
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
        let mut guard = self.records.lock().expect("allowance mutex poisoned");
        let allowance = guard.get_mut(id).ok_or(LedgerError::NotFound)?;
        allowance.debit(count)?;
        Ok(allowance.clone())
    }

    fn credit(&self, id: &AllowanceId, count: u32) -> Result<WashAllowance, LedgerError> {
        let mut guard = self.records.lock().expect("allowance mutex poisoned");
        let allowance = guard.get_mut(id).ok_or(LedgerError::NotFound)?;
        allowance.credit(count);
        Ok(allowance.clone())
    }

    fn close(&self, id: &AllowanceId) -> Result<WashAllowance, LedgerError> {
        let mut guard = self.records.lock().expect("allowance mutex poisoned");
        let allowance = guard.get_mut(id).ok_or(LedgerError::NotFound)?;
        allowance.close();
        Ok(allowance.clone())
    }
}

/// Student directory that refuses every call, for exercising failure
/// propagation.
pub(super) struct UnavailableStudents;

impl StudentRepository for UnavailableStudents {
    fn insert(&self, _student: Student) -> Result<Student, RosterError> {
        Err(RosterError::Unavailable("directory offline".to_string()))
    }

    fn fetch(&self, _id: &StudentId) -> Result<Option<Student>, RosterError> {
        Err(RosterError::Unavailable("directory offline".to_string()))
    }

    fn promotable_in_batch(&self, _batch_id: &BatchId) -> Result<Vec<Student>, RosterError> {
        Err(RosterError::Unavailable("directory offline".to_string()))
    }

    fn find_by_register_no(
        &self,
        _batch_id: &BatchId,
        _register_no: &str,
    ) -> Result<Option<Student>, RosterError> {
        Err(RosterError::Unavailable("directory offline".to_string()))
    }
}

/// Ledger that refuses every call, for exercising failure propagation.
pub(super) struct UnavailableAllowances;

impl AllowanceStore for UnavailableAllowances {
    fn insert(&self, _allowance: WashAllowance) -> Result<WashAllowance, LedgerError> {
        Err(LedgerError::Unavailable("ledger offline".to_string()))
    }

    fn fetch(&self, _id: &AllowanceId) -> Result<Option<WashAllowance>, LedgerError> {
        Err(LedgerError::Unavailable("ledger offline".to_string()))
    }

    fn find_open(&self, _student_id: &StudentId) -> Result<Option<WashAllowance>, LedgerError> {
        Err(LedgerError::Unavailable("ledger offline".to_string()))
    }

    fn find_for_year(
        &self,
        _student_id: &StudentId,
        _year_no: u8,
    ) -> Result<Option<WashAllowance>, LedgerError> {
        Err(LedgerError::Unavailable("ledger offline".to_string()))
    }

    fn debit(&self, _id: &AllowanceId, _count: u32) -> Result<WashAllowance, LedgerError> {
        Err(LedgerError::Unavailable("ledger offline".to_string()))
    }

    fn credit(&self, _id: &AllowanceId, _count: u32) -> Result<WashAllowance, LedgerError> {
        Err(LedgerError::Unavailable("ledger offline".to_string()))
    }

    fn close(&self, _id: &AllowanceId) -> Result<WashAllowance, LedgerError> {
        Err(LedgerError::Unavailable("ledger offline".to_string()))
    }
}
