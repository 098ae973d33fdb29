use super::domain::{Batch, BatchId, Student, StudentId};

/// Error enumeration for batch and student storage.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("batch not found")]
    BatchNotFound,
    #[error("register number {0} is already enrolled in this batch")]
    DuplicateStudent(String),
    #[error("roster store unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction for batches and their academic calendars.
pub trait BatchRepository: Send + Sync {
    fn insert(&self, batch: Batch) -> Result<Batch, RosterError>;
    fn fetch(&self, id: &BatchId) -> Result<Option<Batch>, RosterError>;
    fn update(&self, batch: Batch) -> Result<(), RosterError>;
}

/// Storage abstraction for the student roster.
pub trait StudentRepository: Send + Sync {
    fn insert(&self, student: Student) -> Result<Student, RosterError>;
    fn fetch(&self, id: &StudentId) -> Result<Option<Student>, RosterError>;
    /// Non-archived students with an active hostel status, the population
    /// every promotion and provisioning pass operates on.
    fn promotable_in_batch(&self, batch_id: &BatchId) -> Result<Vec<Student>, RosterError>;
    fn find_by_register_no(
        &self,
        batch_id: &BatchId,
        register_no: &str,
    ) -> Result<Option<Student>, RosterError>;
}
