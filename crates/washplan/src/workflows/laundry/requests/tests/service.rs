use std::sync::Arc;

use super::common::*;
use crate::workflows::laundry::domain::{RequestId, StudentId};
use crate::workflows::laundry::requests::repository::RepositoryError;
use crate::workflows::laundry::requests::{
    RequestServiceError, RequestStatus, WashRequestService,
};

#[test]
fn create_opens_a_pending_request() {
    let (service, _, _) = seeded_service(30, 0, 7.0);

    let request = service
        .create(StudentId("stu-100".to_string()), Some(14), None)
        .expect("request opens");

    assert_eq!(request.status, RequestStatus::PickupPending);
    assert_eq!(request.wash_count, 0);
    assert_eq!(request.cloth_count, Some(14));
    assert!(request.allowance_id.is_none());
}

#[test]
fn create_rejects_a_second_live_request() {
    let (service, student, _) = seeded_service(30, 0, 7.0);

    service
        .create(student.id.clone(), None, None)
        .expect("first request opens");
    match service.create(student.id, None, None) {
        Err(RequestServiceError::ActiveRequestExists) => {}
        other => panic!("expected active-request conflict, got {other:?}"),
    }
}

#[test]
fn create_allows_a_new_request_after_the_previous_terminates() {
    let (service, student, _) = seeded_service(30, 0, 7.0);

    let first = service
        .create(student.id.clone(), None, None)
        .expect("first request opens");
    service
        .set_status(
            &first.id,
            RequestStatus::Cancelled,
            Some("duplicate drop-off".to_string()),
        )
        .expect("cancellation lands");

    service
        .create(student.id, None, None)
        .expect("second request opens after cancellation");
}

#[test]
fn create_rejects_unknown_students() {
    let (service, _, _, _) = build_service();

    match service.create(StudentId("stu-missing".to_string()), None, None) {
        Err(RequestServiceError::UnknownStudent) => {}
        other => panic!("expected unknown student, got {other:?}"),
    }
}

#[test]
fn create_rejects_archived_students() {
    let (service, _, students, _) = build_service();
    let mut archived = student();
    archived.archived = true;
    use crate::workflows::laundry::roster::StudentRepository;
    students.insert(archived.clone()).expect("student stores");

    match service.create(archived.id, None, None) {
        Err(RequestServiceError::UnknownStudent) => {}
        other => panic!("expected unknown student for archived entry, got {other:?}"),
    }
}

#[test]
fn get_propagates_not_found() {
    let (service, _, _, _) = build_service();

    match service.get(&RequestId("req-missing".to_string())) {
        Err(RequestServiceError::Repository(RepositoryError::NotFound)) => {}
        other => panic!("expected not found error, got {other:?}"),
    }
}

#[test]
fn create_propagates_directory_unavailability() {
    let requests = Arc::new(MemoryRequests::default());
    let allowances = Arc::new(MemoryAllowances::default());
    let service =
        WashRequestService::new(requests, Arc::new(UnavailableStudents), allowances);

    match service.create(StudentId("stu-100".to_string()), None, None) {
        Err(RequestServiceError::Roster(_)) => {}
        other => panic!("expected roster failure, got {other:?}"),
    }
}

#[test]
fn weigh_failure_propagates_ledger_unavailability() {
    let requests = Arc::new(MemoryRequests::default());
    let students = Arc::new(MemoryStudents::default());
    use crate::workflows::laundry::roster::StudentRepository;
    let student = student();
    students.insert(student.clone()).expect("student stores");
    let service = WashRequestService::new(requests, students, Arc::new(UnavailableAllowances));

    let request = service
        .create(student.id, None, None)
        .expect("request opens without touching the ledger");
    match service.record_weight(&request.id, 10.0) {
        Err(RequestServiceError::Ledger(_)) => {}
        other => panic!("expected ledger failure, got {other:?}"),
    }
}
