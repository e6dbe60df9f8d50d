//! Approval workflow for leave requests.
//!
//! Pure logic only: mapping (current status, actor role, action) to the next
//! status and the audit fields to stamp. Persistence applies the result as a
//! conditional update guarded by the expected current status, so a stale
//! caller gets a conflict instead of a double transition.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::db::models::leave::LeaveStatus;
use crate::db::models::user::Role;

/// The verdict a reviewer can give at their stage.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Decline,
}

/// Which review stage acted, and therefore which audit columns get stamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStage {
    /// Stamps pc_reviewed_by / pc_reviewed_at
    Pc,
    /// Stamps reviewed_by / reviewed_at (and declined_by on a decline)
    Admin,
}

/// A legal transition: the status the request must still hold, and the status
/// it moves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: LeaveStatus,
    pub to: LeaveStatus,
    pub stage: ReviewStage,
}

/// Where a fresh submission enters the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    pub status: LeaveStatus,
    /// A PC filing their own request has implicitly passed PC review; the
    /// pc_reviewed audit columns are stamped at insert time.
    pub pc_preapproved: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    /// The actor's role carries no review authority at all.
    #[error("role {0} cannot review leave requests")]
    NotReviewer(Role),

    /// The request is not sitting at the actor's review stage, either because
    /// it already reached a terminal status or because the other stage owns
    /// it. Reported to the caller as "already processed".
    #[error("request status is {status}, not awaiting {role} review")]
    NotActionable { status: LeaveStatus, role: Role },

    /// No entry state is defined for this submitter role.
    #[error("role {0} cannot submit leave requests")]
    SubmitterNotPermitted(Role),
}

/// Select the entry state for a new submission.
///
/// Students and staff submit into PC review; a PC's own request skips
/// straight to admin review. Admins have no submission path.
pub fn entry_point(submitter: Role) -> Result<EntryPoint, WorkflowError> {
    match submitter {
        Role::Student | Role::Staff => Ok(EntryPoint {
            status: LeaveStatus::PendingPc,
            pc_preapproved: false,
        }),
        Role::Pc => Ok(EntryPoint {
            status: LeaveStatus::PendingAdmin,
            pc_preapproved: true,
        }),
        Role::Admin => Err(WorkflowError::SubmitterNotPermitted(Role::Admin)),
    }
}

/// Resolve a reviewer's action against the request's current status.
///
/// The full transition table:
///
/// | From          | Action  | Actor | To            |
/// |---------------|---------|-------|---------------|
/// | pending_pc    | approve | pc    | pending_admin |
/// | pending_pc    | decline | pc    | declined      |
/// | pending_admin | approve | admin | approved      |
/// | pending_admin | decline | admin | declined      |
///
/// Everything else is an error; `approved` and `declined` accept no action.
pub fn transition(
    current: LeaveStatus,
    actor: Role,
    action: ReviewAction,
) -> Result<Transition, WorkflowError> {
    match (actor, current) {
        (Role::Pc, LeaveStatus::PendingPc) => Ok(Transition {
            from: LeaveStatus::PendingPc,
            to: match action {
                ReviewAction::Approve => LeaveStatus::PendingAdmin,
                ReviewAction::Decline => LeaveStatus::Declined,
            },
            stage: ReviewStage::Pc,
        }),
        (Role::Admin, LeaveStatus::PendingAdmin) => Ok(Transition {
            from: LeaveStatus::PendingAdmin,
            to: match action {
                ReviewAction::Approve => LeaveStatus::Approved,
                ReviewAction::Decline => LeaveStatus::Declined,
            },
            stage: ReviewStage::Admin,
        }),
        (Role::Pc | Role::Admin, status) => {
            Err(WorkflowError::NotActionable { status, role: actor })
        }
        (Role::Student | Role::Staff, _) => Err(WorkflowError::NotReviewer(actor)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_and_staff_submissions_enter_pc_review() {
        let student = entry_point(Role::Student).unwrap();
        assert_eq!(student.status, LeaveStatus::PendingPc);
        assert!(!student.pc_preapproved);

        let staff = entry_point(Role::Staff).unwrap();
        assert_eq!(staff.status, LeaveStatus::PendingPc);
        assert!(!staff.pc_preapproved);
    }

    #[test]
    fn pc_submission_skips_to_admin_review() {
        let pc = entry_point(Role::Pc).unwrap();
        assert_eq!(pc.status, LeaveStatus::PendingAdmin);
        assert!(pc.pc_preapproved);
    }

    #[test]
    fn admin_has_no_submission_path() {
        assert_eq!(
            entry_point(Role::Admin),
            Err(WorkflowError::SubmitterNotPermitted(Role::Admin))
        );
    }

    #[test]
    fn pc_approve_forwards_to_admin() {
        let t = transition(LeaveStatus::PendingPc, Role::Pc, ReviewAction::Approve).unwrap();
        assert_eq!(t.from, LeaveStatus::PendingPc);
        assert_eq!(t.to, LeaveStatus::PendingAdmin);
        assert_eq!(t.stage, ReviewStage::Pc);
    }

    #[test]
    fn pc_decline_is_terminal() {
        let t = transition(LeaveStatus::PendingPc, Role::Pc, ReviewAction::Decline).unwrap();
        assert_eq!(t.to, LeaveStatus::Declined);
        assert_eq!(t.stage, ReviewStage::Pc);
    }

    #[test]
    fn admin_approve_completes_the_chain() {
        let t = transition(LeaveStatus::PendingAdmin, Role::Admin, ReviewAction::Approve).unwrap();
        assert_eq!(t.to, LeaveStatus::Approved);
        assert_eq!(t.stage, ReviewStage::Admin);
    }

    #[test]
    fn admin_decline_is_terminal() {
        let t = transition(LeaveStatus::PendingAdmin, Role::Admin, ReviewAction::Decline).unwrap();
        assert_eq!(t.to, LeaveStatus::Declined);
    }

    #[test]
    fn terminal_states_accept_no_action() {
        for status in [LeaveStatus::Approved, LeaveStatus::Declined] {
            for role in [Role::Pc, Role::Admin] {
                for action in [ReviewAction::Approve, ReviewAction::Decline] {
                    assert_eq!(
                        transition(status, role, action),
                        Err(WorkflowError::NotActionable { status, role })
                    );
                }
            }
        }
    }

    #[test]
    fn reviewers_cannot_act_out_of_stage() {
        // Admin cannot short-circuit PC review; PC cannot act after forwarding.
        assert!(matches!(
            transition(LeaveStatus::PendingPc, Role::Admin, ReviewAction::Approve),
            Err(WorkflowError::NotActionable { .. })
        ));
        assert!(matches!(
            transition(LeaveStatus::PendingAdmin, Role::Pc, ReviewAction::Decline),
            Err(WorkflowError::NotActionable { .. })
        ));
    }

    #[test]
    fn students_and_staff_never_review() {
        for status in [
            LeaveStatus::PendingPc,
            LeaveStatus::PendingAdmin,
            LeaveStatus::Approved,
            LeaveStatus::Declined,
        ] {
            assert_eq!(
                transition(status, Role::Student, ReviewAction::Approve),
                Err(WorkflowError::NotReviewer(Role::Student))
            );
            assert_eq!(
                transition(status, Role::Staff, ReviewAction::Decline),
                Err(WorkflowError::NotReviewer(Role::Staff))
            );
        }
    }

    #[test]
    fn declined_by_pc_leaves_no_admin_action() {
        // Scenario: PC declines, then a stale admin client tries to approve.
        let t = transition(LeaveStatus::PendingPc, Role::Pc, ReviewAction::Decline).unwrap();
        assert_eq!(t.to, LeaveStatus::Declined);
        assert!(transition(t.to, Role::Admin, ReviewAction::Approve).is_err());
    }
}
