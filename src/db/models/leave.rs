// src/db/models/leave.rs
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::workflow::ReviewAction;

/// Academic department grouping used to scope reviewer visibility.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "stream", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Stream {
    Cse,
    Ece,
    Eee,
    Mech,
    Civil,
}

impl Stream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::Cse => "CSE",
            Stream::Ece => "ECE",
            Stream::Eee => "EEE",
            Stream::Mech => "MECH",
            Stream::Civil => "CIVIL",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approval workflow states. `Approved` and `Declined` are terminal.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "leave_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    PendingPc,
    PendingAdmin,
    Approved,
    Declined,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::PendingPc => "pending_pc",
            LeaveStatus::PendingAdmin => "pending_admin",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Declined => "declined",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LeaveStatus::Approved | LeaveStatus::Declined)
    }

    /// Lenient parse for client-supplied filter strings. The store itself
    /// rejects unknown values (closed enum column); here an unknown filter
    /// falls back to `pending_pc`, matching what the legacy clients render
    /// for statuses they don't recognize.
    pub fn parse_lenient(raw: &str) -> LeaveStatus {
        match raw {
            "pending_pc" => LeaveStatus::PendingPc,
            "pending_admin" => LeaveStatus::PendingAdmin,
            "approved" => LeaveStatus::Approved,
            "declined" => LeaveStatus::Declined,
            other => {
                tracing::warn!(status = other, "unrecognized status filter, treating as pending_pc");
                LeaveStatus::PendingPc
            }
        }
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One applicant's leave submission.
#[derive(Debug, Serialize, Clone, FromRow, ToSchema)]
pub struct LeaveRequest {
    pub id: Uuid,
    pub requested_by: Uuid,
    pub student_name: String,
    pub student_class: String,
    pub reg_no: Option<String>,
    pub stream: Stream,
    #[schema(value_type = Option<f64>, example = 8.5)]
    pub cgpa: Option<BigDecimal>,
    #[schema(value_type = Option<f64>, example = 92.0)]
    pub attendance_percentage: Option<BigDecimal>,
    #[schema(value_type = String, format = "date", example = "2025-12-15")]
    pub from_date: NaiveDate,
    #[schema(value_type = String, format = "date", example = "2025-12-17")]
    pub to_date: NaiveDate,
    pub reason: String,
    pub attachment_url: Option<String>,
    pub status: LeaveStatus,
    pub created_at: DateTime<Utc>,
    pub pc_reviewed_by: Option<Uuid>,
    pub pc_reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub declined_by: Option<Uuid>,
}

/// Submission payload. The entry status is never client-supplied; it is
/// derived from the submitter's role.
#[derive(Debug, Deserialize, ToSchema)]
pub struct NewLeaveRequest {
    pub student_name: String,
    pub student_class: String,
    pub reg_no: Option<String>,
    #[schema(value_type = Option<f64>, example = 8.5)]
    pub cgpa: Option<BigDecimal>,
    #[schema(value_type = Option<f64>, example = 92.0)]
    pub attendance_percentage: Option<BigDecimal>,
    #[schema(value_type = String, format = "date", example = "2025-12-15")]
    pub from_date: NaiveDate,
    #[schema(value_type = String, format = "date", example = "2025-12-17")]
    pub to_date: NaiveDate,
    pub reason: String,
    pub attachment_url: Option<String>,
}

impl NewLeaveRequest {
    /// Reject before any store write. Returns every violation, not just the
    /// first, so the client can surface them inline.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if self.student_name.trim().is_empty() {
            problems.push("student_name is required".to_string());
        }
        if self.student_class.trim().is_empty() {
            problems.push("student_class is required".to_string());
        }
        if self.reason.trim().is_empty() {
            problems.push("reason is required".to_string());
        }
        if self.from_date > self.to_date {
            problems.push("from_date cannot be after to_date".to_string());
        }
        if let Some(cgpa) = &self.cgpa {
            if cgpa < &BigDecimal::from(0) {
                problems.push("cgpa cannot be negative".to_string());
            }
        }
        if let Some(att) = &self.attendance_percentage {
            if att < &BigDecimal::from(0) || att > &BigDecimal::from(100) {
                problems.push("attendance_percentage must be between 0 and 100".to_string());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

/// Reviewer's verdict on a request at their stage.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewDecision {
    pub action: ReviewAction,
}

/// Listing filters. `status` is a raw string so unknown values can take the
/// documented lenient fallback instead of failing deserialization.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    /// Filter by status (pending_pc, pending_admin, approved, declined)
    pub status: Option<String>,
    /// Filter by stream (admin only; reviewers are already stream-scoped)
    pub stream: Option<Stream>,
    /// Page size, defaults to 50, capped at 200
    pub limit: Option<i64>,
    /// Row offset for paging
    pub offset: Option<i64>,
}

/// Per-status counts over the caller's visibility scope.
#[derive(Debug, Serialize, Default, ToSchema)]
pub struct LeaveStats {
    pub total: i64,
    pub pending_pc: i64,
    pub pending_admin: i64,
    pub approved: i64,
    pub declined: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> NewLeaveRequest {
        NewLeaveRequest {
            student_name: "Asha Verma".to_string(),
            student_class: "III CSE A".to_string(),
            reg_no: Some("21CS042".to_string()),
            cgpa: None,
            attendance_percentage: None,
            from_date: NaiveDate::from_ymd_opt(2025, 12, 15).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2025, 12, 17).unwrap(),
            reason: "Fever".to_string(),
            attachment_url: None,
        }
    }

    #[test]
    fn valid_submission_passes() {
        assert!(base_request().validate().is_ok());
    }

    #[test]
    fn reversed_date_range_is_rejected() {
        let mut req = base_request();
        req.from_date = NaiveDate::from_ymd_opt(2025, 12, 18).unwrap();
        let problems = req.validate().unwrap_err();
        assert!(problems.iter().any(|p| p.contains("from_date")));
    }

    #[test]
    fn blank_reason_is_rejected() {
        let mut req = base_request();
        req.reason = "   ".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn out_of_range_academics_are_rejected() {
        let mut req = base_request();
        req.cgpa = Some(BigDecimal::from(-1));
        req.attendance_percentage = Some(BigDecimal::from(101));
        let problems = req.validate().unwrap_err();
        assert_eq!(problems.len(), 2);
    }

    #[test]
    fn single_day_leave_is_valid() {
        let mut req = base_request();
        req.to_date = req.from_date;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn unknown_status_filter_falls_back_to_pending_pc() {
        assert_eq!(LeaveStatus::parse_lenient("processing"), LeaveStatus::PendingPc);
        assert_eq!(LeaveStatus::parse_lenient("approved"), LeaveStatus::Approved);
    }

    #[test]
    fn terminal_states() {
        assert!(LeaveStatus::Approved.is_terminal());
        assert!(LeaveStatus::Declined.is_terminal());
        assert!(!LeaveStatus::PendingPc.is_terminal());
        assert!(!LeaveStatus::PendingAdmin.is_terminal());
    }
}
