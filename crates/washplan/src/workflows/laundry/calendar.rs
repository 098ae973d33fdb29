use super::domain::{BatchYear, MAX_BATCH_YEARS};

/// First violation found while checking a batch's year windows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum YearWindowViolation {
    #[error("year {year_no} is outside the supported range 1..={MAX_BATCH_YEARS}")]
    YearOutOfRange { year_no: u8 },
    #[error("year {year_no} appears more than once")]
    DuplicateYear { year_no: u8 },
    #[error("year {year_no} must end after it starts")]
    EmptyWindow { year_no: u8 },
    #[error("year {earlier} must end at least one day before year {later} starts")]
    InsufficientGap { earlier: u8, later: u8 },
}

/// Validate the calendar of a batch's academic years.
///
/// Per year: when both dates are set, the window must be non-empty. Across
/// years: any two fully dated windows must not touch; the earlier year ends
/// strictly before the later year starts, leaving at least one calendar day
/// between them. Partially dated years are accepted and skipped in the
/// cross-year checks.
///
/// Applied to the single first year at batch creation and to the full years
/// array on every calendar edit.
pub fn validate_year_windows(years: &[BatchYear]) -> Result<(), YearWindowViolation> {
    let mut seen = [false; MAX_BATCH_YEARS as usize + 1];

    for year in years {
        if year.year_no == 0 || year.year_no > MAX_BATCH_YEARS {
            return Err(YearWindowViolation::YearOutOfRange {
                year_no: year.year_no,
            });
        }
        if seen[year.year_no as usize] {
            return Err(YearWindowViolation::DuplicateYear {
                year_no: year.year_no,
            });
        }
        seen[year.year_no as usize] = true;

        if let Some((start, end)) = year.window() {
            if end <= start {
                return Err(YearWindowViolation::EmptyWindow {
                    year_no: year.year_no,
                });
            }
        }
    }

    let mut dated: Vec<(u8, chrono::NaiveDate, chrono::NaiveDate)> = years
        .iter()
        .filter_map(|year| year.window().map(|(start, end)| (year.year_no, start, end)))
        .collect();
    dated.sort_by_key(|(year_no, _, _)| *year_no);

    for pair in dated.windows(2) {
        let (earlier_no, _, earlier_end) = pair[0];
        let (later_no, later_start, _) = pair[1];
        if earlier_end >= later_start {
            return Err(YearWindowViolation::InsufficientGap {
                earlier: earlier_no,
                later: later_no,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn year(year_no: u8, start: Option<NaiveDate>, end: Option<NaiveDate>) -> BatchYear {
        BatchYear {
            year_no,
            start_date: start,
            end_date: end,
        }
    }

    #[test]
    fn accepts_well_separated_years() {
        let years = [
            year(1, Some(date(2024, 6, 1)), Some(date(2025, 4, 30))),
            year(2, Some(date(2025, 6, 1)), Some(date(2026, 4, 30))),
            year(3, None, None),
        ];
        assert_eq!(validate_year_windows(&years), Ok(()));
    }

    #[test]
    fn rejects_inverted_window() {
        let years = [year(1, Some(date(2024, 6, 1)), Some(date(2024, 6, 1)))];
        assert_eq!(
            validate_year_windows(&years),
            Err(YearWindowViolation::EmptyWindow { year_no: 1 })
        );
    }

    #[test]
    fn rejects_touching_years() {
        // Year 2 starts the same day year 1 ends; the rollover needs a full day.
        let years = [
            year(1, Some(date(2024, 6, 1)), Some(date(2025, 5, 31))),
            year(2, Some(date(2025, 5, 31)), Some(date(2026, 4, 30))),
        ];
        assert_eq!(
            validate_year_windows(&years),
            Err(YearWindowViolation::InsufficientGap {
                earlier: 1,
                later: 2
            })
        );
    }

    #[test]
    fn rejects_duplicate_year_numbers() {
        let years = [year(2, None, None), year(2, None, None)];
        assert_eq!(
            validate_year_windows(&years),
            Err(YearWindowViolation::DuplicateYear { year_no: 2 })
        );
    }

    #[test]
    fn rejects_out_of_range_year() {
        let years = [year(7, None, None)];
        assert_eq!(
            validate_year_windows(&years),
            Err(YearWindowViolation::YearOutOfRange { year_no: 7 })
        );
    }

    #[test]
    fn partially_dated_years_do_not_participate_in_gap_checks() {
        let years = [
            year(1, Some(date(2024, 6, 1)), Some(date(2025, 4, 30))),
            year(2, Some(date(2025, 1, 1)), None),
            year(3, Some(date(2025, 6, 1)), Some(date(2026, 4, 30))),
        ];
        assert_eq!(validate_year_windows(&years), Ok(()));
    }

    #[test]
    fn reports_the_first_violation_only() {
        let years = [
            year(1, Some(date(2024, 6, 1)), Some(date(2024, 1, 1))),
            year(1, None, None),
        ];
        assert_eq!(
            validate_year_windows(&years),
            Err(YearWindowViolation::EmptyWindow { year_no: 1 })
        );
    }
}
