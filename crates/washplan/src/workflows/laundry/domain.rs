use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for wash policies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyId(pub String);

/// Identifier wrapper for student batches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub String);

/// Identifier wrapper for enrolled students.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudentId(pub String);

/// Identifier wrapper for wash allowances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllowanceId(pub String);

/// Identifier wrapper for wash requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// Smallest weight cap a policy may carry, in kilograms.
pub const MIN_WEIGHT_PER_WASH: f64 = 0.1;

/// Highest academic year a batch calendar may describe.
pub const MAX_BATCH_YEARS: u8 = 6;

/// Raised when a policy's weight cap falls below the supported minimum.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("max weight per wash must be at least {MIN_WEIGHT_PER_WASH} kg, got {0}")]
pub struct WeightCapOutOfRange(pub f64);

/// The policy values frozen into an allowance when it is provisioned.
///
/// Allowances never re-read the live policy; edits to a policy only affect
/// allowances created afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub total_washes: u32,
    pub max_weight_per_wash: f64,
}

impl PolicySnapshot {
    pub fn validated(
        total_washes: u32,
        max_weight_per_wash: f64,
    ) -> Result<Self, WeightCapOutOfRange> {
        if !max_weight_per_wash.is_finite() || max_weight_per_wash < MIN_WEIGHT_PER_WASH {
            return Err(WeightCapOutOfRange(max_weight_per_wash));
        }

        Ok(Self {
            total_washes,
            max_weight_per_wash,
        })
    }

    /// Number of washes a load of `weight_kg` consumes under this snapshot.
    pub fn washes_for(&self, weight_kg: f64) -> u32 {
        (weight_kg / self.max_weight_per_wash).ceil() as u32
    }
}

/// Residency state tracked for every enrolled student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostelStatus {
    Active,
    Dropped,
    Completed,
}

impl HostelStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Dropped => "dropped",
            Self::Completed => "completed",
        }
    }

    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// A student enrolled in a batch's hostel roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub batch_id: BatchId,
    pub register_no: String,
    pub name: String,
    pub hostel_status: HostelStatus,
    pub archived: bool,
}

impl Student {
    /// Whether the student participates in active-lifecycle operations.
    pub fn is_promotable(&self) -> bool {
        !self.archived && self.hostel_status.is_active()
    }
}

/// The calendar window of one academic year inside a batch.
///
/// Dates stay optional until administration settles the academic calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchYear {
    pub year_no: u8,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl BatchYear {
    /// Both dates, when the window is fully settled.
    pub fn window(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.start_date.zip(self.end_date)
    }
}

/// A cohort of students admitted together and promoted together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub department_id: String,
    pub start_year: i32,
    pub end_year: i32,
    /// 1-based academic year; `duration_years() + 1` denotes a graduated batch.
    pub current_year: u8,
    pub archived: bool,
    pub years: Vec<BatchYear>,
}

impl Batch {
    pub fn duration_years(&self) -> u8 {
        (self.end_year - self.start_year).clamp(0, MAX_BATCH_YEARS as i32) as u8
    }

    pub fn is_graduated(&self) -> bool {
        self.current_year > self.duration_years()
    }

    pub fn year(&self, year_no: u8) -> Option<&BatchYear> {
        self.years.iter().find(|year| year.year_no == year_no)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_rejects_weight_cap_below_minimum() {
        assert!(PolicySnapshot::validated(30, 0.05).is_err());
        assert!(PolicySnapshot::validated(30, f64::NAN).is_err());
        assert!(PolicySnapshot::validated(30, 0.1).is_ok());
    }

    #[test]
    fn washes_round_up_to_whole_loads() {
        let snapshot = PolicySnapshot::validated(30, 7.0).expect("valid snapshot");
        assert_eq!(snapshot.washes_for(20.0), 3);
        assert_eq!(snapshot.washes_for(21.0), 3);
        assert_eq!(snapshot.washes_for(21.5), 4);
        assert_eq!(snapshot.washes_for(0.5), 1);
    }

    #[test]
    fn batch_duration_and_graduation() {
        let batch = Batch {
            id: BatchId("batch-1".to_string()),
            department_id: "mech".to_string(),
            start_year: 2023,
            end_year: 2027,
            current_year: 4,
            archived: false,
            years: Vec::new(),
        };
        assert_eq!(batch.duration_years(), 4);
        assert!(!batch.is_graduated());

        let graduated = Batch {
            current_year: 5,
            ..batch
        };
        assert!(graduated.is_graduated());
    }
}
