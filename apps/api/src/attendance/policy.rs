use anyhow::{Context, Result};
use chrono::{Months, NaiveDate, NaiveTime};

use crate::errors::AppError;
use crate::models::attendance::AttendanceStatus;

/// Workday cutoffs, in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendancePolicy {
    /// Clocking in strictly after this is late.
    pub late_after: NaiveTime,
    /// Clocking out strictly before this is an early leave.
    pub early_leave_before: NaiveTime,
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            late_after: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            early_leave_before: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
        }
    }
}

impl AttendancePolicy {
    pub fn from_strings(late_after: &str, early_leave_before: &str) -> Result<Self> {
        Ok(Self {
            late_after: parse_cutoff(late_after).context("ATTENDANCE_LATE_AFTER must be HH:MM")?,
            early_leave_before: parse_cutoff(early_leave_before)
                .context("ATTENDANCE_EARLY_LEAVE_BEFORE must be HH:MM")?,
        })
    }

    pub fn clock_in_status(&self, at: NaiveTime) -> AttendanceStatus {
        if at > self.late_after {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Normal
        }
    }

    /// An early leave replaces whatever status the clock-in recorded.
    pub fn is_early_leave(&self, at: NaiveTime) -> bool {
        at < self.early_leave_before
    }
}

fn parse_cutoff(value: &str) -> Result<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .with_context(|| format!("invalid time '{value}'"))
}

/// `YYYY-MM` to the half-open date range `[first day, first day of next month)`.
pub fn month_bounds(month: &str) -> Result<(NaiveDate, NaiveDate), AppError> {
    let invalid = || AppError::Validation("month must be formatted as YYYY-MM".to_string());
    if month.len() != 7 {
        return Err(invalid());
    }
    let start =
        NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d").map_err(|_| invalid())?;
    let end = start.checked_add_months(Months::new(1)).ok_or_else(invalid)?;
    Ok((start, end))
}
