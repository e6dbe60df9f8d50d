//! Notification dispatch.
//!
//! Every workflow event durably writes one `notifications` row per recipient;
//! push delivery is an external relay triggered by the row insert, so this
//! module's contract ends at the insert. Decision notifications are written
//! inside the transition's transaction (never zero per transition); the
//! downstream relay tolerates duplicates.

use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::db::models::leave::{LeaveRequest, LeaveStatus};
use crate::db::models::user::Role;
use crate::workflow::{ReviewStage, Transition};

pub type DispatchResult<T> = Result<T, DispatchError>;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Builder for a single-recipient notification record.
pub struct NotificationBuilder {
    user_id: Uuid,
    title: String,
    message: String,
    link: Option<String>,
}

impl NotificationBuilder {
    pub fn new(user_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            user_id,
            title: title.into(),
            message: String::new(),
            link: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Route the client opens when the notification is tapped.
    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Write the notification row. Takes any executor so callers can run it
    /// inside the transaction that produced the event.
    pub async fn send<'e>(self, db: impl PgExecutor<'e>) -> DispatchResult<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO notifications (user_id, title, message, link)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(self.user_id)
        .bind(&self.title)
        .bind(&self.message)
        .bind(&self.link)
        .fetch_one(db)
        .await?;

        Ok(id)
    }
}

/// Title and body for a review decision, addressed to the submitter.
pub fn decision_copy(request: &LeaveRequest, transition: &Transition) -> (String, String) {
    let period = format!("{} to {}", request.from_date, request.to_date);
    match (transition.stage, transition.to) {
        (ReviewStage::Pc, LeaveStatus::PendingAdmin) => (
            "Leave Request Forwarded".to_string(),
            format!(
                "Your leave request ({period}) was approved by the program coordinator and forwarded for admin review."
            ),
        ),
        (ReviewStage::Pc, _) => (
            "Leave Request Declined".to_string(),
            format!("Your leave request ({period}) was declined by the program coordinator."),
        ),
        (ReviewStage::Admin, LeaveStatus::Approved) => (
            "Leave Request Approved".to_string(),
            format!("Your leave request ({period}) was approved."),
        ),
        (ReviewStage::Admin, _) => (
            "Leave Request Declined".to_string(),
            format!("Your leave request ({period}) was declined by the admin."),
        ),
    }
}

/// Notify the submitter that a reviewer acted on their request. Runs on the
/// transition's own transaction so a committed transition always has its
/// notification.
pub async fn notify_request_decision<'e>(
    db: impl PgExecutor<'e>,
    request: &LeaveRequest,
    transition: &Transition,
) -> DispatchResult<Uuid> {
    let (title, message) = decision_copy(request, transition);
    NotificationBuilder::new(request.requested_by, title)
        .message(message)
        .link(format!("/requests/{}", request.id))
        .send(db)
        .await
}

/// Tell the reviewers at the request's entry stage that work arrived: the
/// stream's PCs for `pending_pc`, admins for `pending_admin`. Best-effort,
/// runs after the insert commits.
pub async fn notify_request_submitted(
    pool: &PgPool,
    request: &LeaveRequest,
) -> DispatchResult<usize> {
    let reviewer_ids: Vec<Uuid> = match request.status {
        LeaveStatus::PendingPc => {
            sqlx::query_scalar("SELECT id FROM profiles WHERE role = $1 AND stream = $2")
                .bind(Role::Pc)
                .bind(request.stream)
                .fetch_all(pool)
                .await?
        }
        _ => {
            sqlx::query_scalar("SELECT id FROM profiles WHERE role = $1")
                .bind(Role::Admin)
                .fetch_all(pool)
                .await?
        }
    };

    let count = reviewer_ids.len();
    for reviewer_id in reviewer_ids {
        NotificationBuilder::new(reviewer_id, "New Leave Request")
            .message(format!(
                "{} ({}) submitted a leave request for {} to {}.",
                request.student_name, request.stream, request.from_date, request.to_date
            ))
            .link(format!("/requests/{}", request.id))
            .send(pool)
            .await?;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use crate::db::models::leave::Stream;

    fn request_with_period() -> LeaveRequest {
        LeaveRequest {
            id: Uuid::new_v4(),
            requested_by: Uuid::new_v4(),
            student_name: "Asha Verma".to_string(),
            student_class: "III CSE A".to_string(),
            reg_no: None,
            stream: Stream::Cse,
            cgpa: None,
            attendance_percentage: None,
            from_date: NaiveDate::from_ymd_opt(2025, 12, 15).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2025, 12, 17).unwrap(),
            reason: "Fever".to_string(),
            attachment_url: None,
            status: LeaveStatus::PendingPc,
            created_at: Utc::now(),
            pc_reviewed_by: None,
            pc_reviewed_at: None,
            reviewed_by: None,
            reviewed_at: None,
            declined_by: None,
        }
    }

    #[test]
    fn pc_forward_copy_names_the_next_stage() {
        let t = Transition {
            from: LeaveStatus::PendingPc,
            to: LeaveStatus::PendingAdmin,
            stage: ReviewStage::Pc,
        };
        let (title, message) = decision_copy(&request_with_period(), &t);
        assert_eq!(title, "Leave Request Forwarded");
        assert!(message.contains("admin review"));
        assert!(message.contains("2025-12-15 to 2025-12-17"));
    }

    #[test]
    fn decline_copy_names_the_deciding_stage() {
        let pc_decline = Transition {
            from: LeaveStatus::PendingPc,
            to: LeaveStatus::Declined,
            stage: ReviewStage::Pc,
        };
        let (_, pc_msg) = decision_copy(&request_with_period(), &pc_decline);
        assert!(pc_msg.contains("program coordinator"));

        let admin_decline = Transition {
            from: LeaveStatus::PendingAdmin,
            to: LeaveStatus::Declined,
            stage: ReviewStage::Admin,
        };
        let (title, admin_msg) = decision_copy(&request_with_period(), &admin_decline);
        assert_eq!(title, "Leave Request Declined");
        assert!(admin_msg.contains("admin"));
    }

    #[test]
    fn approval_copy_is_final() {
        let t = Transition {
            from: LeaveStatus::PendingAdmin,
            to: LeaveStatus::Approved,
            stage: ReviewStage::Admin,
        };
        let (title, _) = decision_copy(&request_with_period(), &t);
        assert_eq!(title, "Leave Request Approved");
    }
}
