// src/db/models/user.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::leave::Stream;

/// Closed set of actor roles. The role is assigned once at signup and drives
/// both routing and review authority; there is no role-change operation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Staff,
    Pc,
    Admin,
}

impl Role {
    /// Resolve the one home destination for an actor after login.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Student => "/student",
            Role::Staff => "/staff",
            Role::Pc => "/pc",
            Role::Admin => "/admin",
        }
    }

    /// Lenient parse used only for routing of raw role strings coming from
    /// outside the typed store. Unknown values route to the student home,
    /// matching the legacy clients; the fallback is logged and never used to
    /// grant review authority.
    pub fn parse_lenient(raw: &str) -> Role {
        match raw {
            "student" => Role::Student,
            "staff" => Role::Staff,
            "pc" => Role::Pc,
            "admin" => Role::Admin,
            other => {
                tracing::warn!(role = other, "unrecognized role, routing as student");
                Role::Student
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Staff => "staff",
            Role::Pc => "pc",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One authenticated actor, as stored in `profiles`. The password hash is
/// never selected into this type.
#[derive(Debug, Serialize, Clone, FromRow, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub stream: Stream,
    pub department: Option<String>,
    pub reg_no: Option<String>,
    pub student_class: Option<String>,
    pub fcm_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Self-service profile update. Only the fields the clients actually edit:
/// students correct reg_no/class on their apply screen, and the mobile shell
/// registers its push token after login.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfile {
    pub reg_no: Option<String>,
    pub student_class: Option<String>,
    pub fcm_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_path_covers_every_role() {
        assert_eq!(Role::Student.home_path(), "/student");
        assert_eq!(Role::Staff.home_path(), "/staff");
        assert_eq!(Role::Pc.home_path(), "/pc");
        assert_eq!(Role::Admin.home_path(), "/admin");
    }

    #[test]
    fn unknown_role_routes_to_student_home() {
        assert_eq!(Role::parse_lenient("registrar"), Role::Student);
        assert_eq!(Role::parse_lenient(""), Role::Student);
    }

    #[test]
    fn known_roles_parse_exactly() {
        assert_eq!(Role::parse_lenient("pc"), Role::Pc);
        assert_eq!(Role::parse_lenient("admin"), Role::Admin);
        assert_eq!(Role::parse_lenient("staff"), Role::Staff);
    }
}
