//! Membership-based authorization.

use diesel::prelude::*;
use diesel::SqliteConnection;
use tracing::debug;

use crate::error::ServiceError;
use crate::models::{Member, MemberRole};
use crate::schema::members;
use crate::telemetry::record_guard_decision;

pub const ADMIN_ONLY: &[MemberRole] = &[MemberRole::Admin];
pub const TASK_MANAGERS: &[MemberRole] = &[MemberRole::Admin, MemberRole::Editor];
/// Any role, as long as the membership is active.
pub const ANY_ROLE: &[MemberRole] = &[];

pub struct MembershipGuard;

impl MembershipGuard {
    pub fn membership(
        conn: &mut SqliteConnection,
        user_id: i32,
        project_id: i32,
    ) -> QueryResult<Option<Member>> {
        members::table
            .filter(members::user_id.eq(user_id))
            .filter(members::project_id.eq(project_id))
            .select(Member::as_select())
            .first(conn)
            .optional()
    }

    pub fn authorize(
        conn: &mut SqliteConnection,
        user_id: i32,
        project_id: i32,
        required_roles: &[MemberRole],
        require_active: bool,
    ) -> QueryResult<bool> {
        let member = Self::membership(conn, user_id, project_id)?;
        Ok(permits(member.as_ref(), required_roles, require_active))
    }

    /// Returns the caller's active membership if its role is in `required_roles`.
    pub fn require(
        conn: &mut SqliteConnection,
        user_id: i32,
        project_id: i32,
        required_roles: &[MemberRole],
    ) -> Result<Member, ServiceError> {
        let member = Self::membership(conn, user_id, project_id)?;
        let allowed = permits(member.as_ref(), required_roles, true);
        record_guard_decision(allowed);

        match member {
            Some(member) if allowed => Ok(member),
            _ => {
                debug!(user_id, project_id, ?required_roles, "Membership check denied");
                Err(ServiceError::forbidden(denial_message(required_roles)))
            }
        }
    }
}

fn permits(member: Option<&Member>, required_roles: &[MemberRole], require_active: bool) -> bool {
    match member {
        None => false,
        Some(m) if require_active && !m.is_active() => false,
        Some(m) => required_roles.is_empty() || required_roles.contains(&m.role),
    }
}

fn denial_message(required_roles: &[MemberRole]) -> String {
    match required_roles {
        [] => "You are not an active member of this project".to_string(),
        [role] => format!("Only an active {} of this project can do this", role),
        roles => {
            let names: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
            format!(
                "Only an active member with role {} can do this",
                names.join(" or ")
            )
        }
    }
}
