//! Membership lifecycle: project creation, invitations, join requests, direct
//! adds, role updates, removal and leaving.
//!
//! A (user, project) pair owns at most one `members` row. Joining again
//! reactivates that row instead of inserting a second one, and leaving or
//! being removed flips it to `Inactive` while clearing the member's task
//! assignments and recent-opened entry in the same transaction.

use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::SqliteConnection;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::error::ServiceError;
use crate::models::{
    Invitation, InvitationStatus, JoinRequest, Member, MemberRole, MemberStatus, NewInvitation,
    NewJoinRequest, NewMember, NewProject, NotificationType, Project, ProjectStatus, RequestStatus,
    User,
};
use crate::pagination::Page;
use crate::schema::{
    assignees, invitations, members, projects, recent_opened_projects, requests, tasks, users,
};

use super::guard::{MembershipGuard, ADMIN_ONLY, ANY_ROLE};
use super::history::{self, HistoryScope};
use super::notifications::{NotificationScope, NotificationService};
use super::projects::ProjectService;
use super::{find_user, timestamp, Outcome, ServiceResult};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateProjectInput {
    #[schema(example = "Website relaunch")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    #[schema(example = "Marketing")]
    pub category: String,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Member row joined with the identity of its user.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemberView {
    pub member_id: i32,
    pub user_id: i32,
    pub project_id: i32,
    #[schema(example = "b@x.com")]
    pub email: String,
    #[schema(example = "Bea Ortiz")]
    pub name: String,
    pub role: MemberRole,
    pub status: MemberStatus,
    pub joined_at: chrono::NaiveDateTime,
}

impl MemberView {
    pub fn new(member: Member, user: &User) -> Self {
        Self {
            member_id: member.id,
            user_id: member.user_id,
            project_id: member.project_id,
            email: user.email.clone(),
            name: user.display_name(),
            role: member.role,
            status: member.status,
            joined_at: member.joined_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvitationView {
    pub invitation: Invitation,
    pub project_title: String,
    pub invited_by: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JoinRequestView {
    pub request: JoinRequest,
    pub email: String,
    pub name: String,
}

pub struct MembershipService;

impl MembershipService {
    /// Creates the project and its owner's Admin membership atomically.
    pub fn create_project(
        conn: &mut SqliteConnection,
        owner_id: i32,
        input: CreateProjectInput,
    ) -> ServiceResult<(Project, Member)> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(ServiceError::invalid("Project title is required"));
        }
        validate_dates(input.start_date, input.end_date)?;

        conn.immediate_transaction(|conn| {
            let owner = find_user(conn, owner_id)?;
            let now = timestamp();

            let project: Project = diesel::insert_into(projects::table)
                .values(&NewProject {
                    code: ProjectService::unique_code(conn)?,
                    title,
                    description: input.description,
                    category: input.category,
                    status: input.status.unwrap_or(ProjectStatus::Active),
                    start_date: input.start_date,
                    end_date: input.end_date,
                    owner_id: owner.id,
                    created_at: now,
                })
                .returning(Project::as_returning())
                .get_result(conn)?;

            let member: Member = diesel::insert_into(members::table)
                .values(&NewMember {
                    user_id: owner.id,
                    project_id: project.id,
                    role: MemberRole::Admin,
                    status: MemberStatus::Active,
                    joined_at: now,
                    added_by: None,
                })
                .returning(Member::as_returning())
                .get_result(conn)?;

            history::append(
                conn,
                HistoryScope::project(project.id),
                format!("{} created the project", owner.display_name()),
                None,
                Some(project.title.clone()),
            )?;

            info!(project_id = project.id, code = %project.code, owner_id = owner.id, "Created project");
            Ok((project, member))
        })
    }

    pub fn invite(
        conn: &mut SqliteConnection,
        admin_id: i32,
        project_id: i32,
        target_email: &str,
        message: Option<String>,
    ) -> ServiceResult<Outcome<Invitation>> {
        conn.immediate_transaction(|conn| {
            let project = find_project(conn, project_id)?;
            MembershipGuard::require(conn, admin_id, project.id, ADMIN_ONLY)?;
            let admin = find_user(conn, admin_id)?;

            let target: User = users::table
                .filter(users::email.eq(target_email.trim().to_lowercase()))
                .select(User::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| ServiceError::not_found("No user is registered with this email"))?;

            if target.id == admin.id {
                return Err(ServiceError::invalid("You cannot invite yourself"));
            }
            if is_active_member(conn, target.id, project.id)? {
                return Err(ServiceError::conflict(
                    "User is already a member of this project",
                ));
            }

            let invitation: Invitation = diesel::insert_into(invitations::table)
                .values(&NewInvitation {
                    project_id: project.id,
                    user_id: target.id,
                    created_by: admin.id,
                    status: InvitationStatus::Pending,
                    created_at: timestamp(),
                })
                .returning(Invitation::as_returning())
                .get_result(conn)?;

            let text = message
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| {
                    format!(
                        "{} invited you to join the project {}.",
                        admin.display_name(),
                        project.title
                    )
                });

            let delivery = NotificationService::record(
                conn,
                &target,
                admin.id,
                NotificationType::InvitationSent,
                text,
                NotificationScope::invitation(project.id, invitation.id),
            )?;

            info!(invitation_id = invitation.id, project_id = project.id, invited_user_id = target.id, "Sent invitation");
            Ok(Outcome::new(invitation, vec![delivery]))
        })
    }

    pub fn accept_invitation(
        conn: &mut SqliteConnection,
        user_id: i32,
        invitation_id: i32,
    ) -> ServiceResult<Outcome<Member>> {
        conn.immediate_transaction(|conn| {
            let invitation: Invitation = invitations::table
                .find(invitation_id)
                .select(Invitation::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| ServiceError::not_found("Invitation not found"))?;

            if invitation.user_id != user_id {
                return Err(ServiceError::forbidden("This invitation was sent to another user"));
            }
            let project = find_project(conn, invitation.project_id)?;

            if is_active_member(conn, user_id, project.id)? {
                return Err(ServiceError::conflict(
                    "You are already a member of this project",
                ));
            }
            if invitation.status == InvitationStatus::Accepted {
                return Err(ServiceError::conflict("Invitation has already been accepted"));
            }

            let user = find_user(conn, user_id)?;
            let inviter = find_user(conn, invitation.created_by)?;

            let member = converge_membership(conn, user.id, project.id, MemberRole::Member, inviter.id)?;
            settle_pending_invitations(conn, user.id, project.id)?;
            ProjectService::touch_recent(conn, user.id, project.id)?;

            history::append(
                conn,
                HistoryScope::project(project.id),
                format!(
                    "{} has accepted the invitation of {}.",
                    user.display_name(),
                    inviter.display_name()
                ),
                None,
                Some(user.display_name()),
            )?;

            let delivery = NotificationService::record(
                conn,
                &inviter,
                user.id,
                NotificationType::InvitationAccepted,
                format!(
                    "{} accepted your invitation to join {}.",
                    user.display_name(),
                    project.title
                ),
                NotificationScope::invitation(project.id, invitation.id),
            )?;

            info!(user_id = user.id, project_id = project.id, member_id = member.id, "Accepted invitation");
            Ok(Outcome::new(member, vec![delivery]))
        })
    }

    pub fn request_join(
        conn: &mut SqliteConnection,
        user_id: i32,
        project_code: &str,
    ) -> ServiceResult<Outcome<JoinRequest>> {
        conn.immediate_transaction(|conn| {
            let project: Project = projects::table
                .filter(projects::code.eq(project_code.trim()))
                .select(Project::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| ServiceError::not_found("No project matches this code"))?;

            if is_active_member(conn, user_id, project.id)? {
                return Err(ServiceError::conflict(
                    "You are already a member of this project",
                ));
            }

            let pending: Option<i32> = requests::table
                .filter(requests::user_id.eq(user_id))
                .filter(requests::project_id.eq(project.id))
                .filter(requests::status.eq(RequestStatus::Pending))
                .select(requests::id)
                .first(conn)
                .optional()?;
            if let Some(existing_id) = pending {
                return Err(ServiceError::conflict_with(
                    "A join request for this project is already pending",
                    existing_id,
                ));
            }

            let request: JoinRequest = diesel::insert_into(requests::table)
                .values(&NewJoinRequest {
                    user_id,
                    project_id: project.id,
                    status: RequestStatus::Pending,
                    created_at: timestamp(),
                })
                .returning(JoinRequest::as_returning())
                .get_result(conn)?;

            let deliveries = NotificationService::pending_request_deliveries(conn, project.id)?;

            info!(request_id = request.id, user_id, project_id = project.id, "Created join request");
            Ok(Outcome::new(request, deliveries))
        })
    }

    pub fn resolve_request(
        conn: &mut SqliteConnection,
        admin_id: i32,
        request_id: i32,
        status: RequestStatus,
    ) -> ServiceResult<Outcome<JoinRequest>> {
        conn.immediate_transaction(|conn| {
            let request: JoinRequest = requests::table
                .find(request_id)
                .select(JoinRequest::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| ServiceError::not_found("Request not found"))?;

            MembershipGuard::require(conn, admin_id, request.project_id, ADMIN_ONLY)?;

            if status == RequestStatus::Pending {
                return Err(ServiceError::invalid(
                    "A request can only be resolved as Accepted or Rejected",
                ));
            }
            if request.status != RequestStatus::Pending {
                return Err(ServiceError::conflict("Request has already been resolved"));
            }

            let project = find_project(conn, request.project_id)?;
            let admin = find_user(conn, admin_id)?;
            let requester = find_user(conn, request.user_id)?;

            let resolved: JoinRequest = diesel::update(requests::table.find(request.id))
                .set(requests::status.eq(status))
                .returning(JoinRequest::as_returning())
                .get_result(conn)?;

            let mut deliveries = Vec::new();
            if status == RequestStatus::Accepted {
                let member = converge_membership(
                    conn,
                    requester.id,
                    project.id,
                    MemberRole::Member,
                    admin.id,
                )?;
                settle_pending_invitations(conn, requester.id, project.id)?;
                ProjectService::touch_recent(conn, requester.id, project.id)?;

                history::append(
                    conn,
                    HistoryScope::project(project.id),
                    format!(
                        "{} accepted the join request of {}.",
                        admin.display_name(),
                        requester.display_name()
                    ),
                    None,
                    Some(requester.display_name()),
                )?;

                deliveries.push(NotificationService::record(
                    conn,
                    &requester,
                    admin.id,
                    NotificationType::RequestAccepted,
                    format!("Your request to join {} was accepted.", project.title),
                    NotificationScope::project(project.id),
                )?);
                info!(request_id = request.id, member_id = member.id, project_id = project.id, "Accepted join request");
            } else {
                deliveries.push(NotificationService::record(
                    conn,
                    &requester,
                    admin.id,
                    NotificationType::RequestRejected,
                    format!("Your request to join {} was rejected.", project.title),
                    NotificationScope::project(project.id),
                )?);
                info!(request_id = request.id, project_id = project.id, "Rejected join request");
            }

            deliveries.extend(NotificationService::pending_request_deliveries(conn, project.id)?);
            Ok(Outcome::new(resolved, deliveries))
        })
    }

    /// Direct add by an admin, without an invitation.
    pub fn add_member(
        conn: &mut SqliteConnection,
        admin_id: i32,
        project_id: i32,
        target_email: &str,
        role: MemberRole,
    ) -> ServiceResult<Outcome<MemberView>> {
        conn.immediate_transaction(|conn| {
            let project = find_project(conn, project_id)?;
            MembershipGuard::require(conn, admin_id, project.id, ADMIN_ONLY)?;
            let admin = find_user(conn, admin_id)?;

            let target: User = users::table
                .filter(users::email.eq(target_email.trim().to_lowercase()))
                .select(User::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| ServiceError::not_found("No user is registered with this email"))?;

            let member = converge_membership(conn, target.id, project.id, role, admin.id)?;
            settle_pending_invitations(conn, target.id, project.id)?;

            history::append(
                conn,
                HistoryScope::project(project.id),
                format!(
                    "{} added {} to the project",
                    admin.display_name(),
                    target.display_name()
                ),
                None,
                Some(role.to_string()),
            )?;

            let deliveries = NotificationService::notify_affected_users(
                conn,
                &[target.id],
                admin.id,
                NotificationType::AddedToProject,
                NotificationScope::project(project.id),
                |_| {
                    format!(
                        "{} added you to the project {} as {}.",
                        admin.display_name(),
                        project.title,
                        role
                    )
                },
            )?;

            info!(member_id = member.id, user_id = target.id, project_id = project.id, role = %role, "Added member");
            Ok(Outcome::new(MemberView::new(member, &target), deliveries))
        })
    }

    /// Sets role and status. Moving an active member to `Inactive` runs the
    /// same cascade as [`MembershipService::remove_member`].
    pub fn update_member(
        conn: &mut SqliteConnection,
        admin_id: i32,
        member_id: i32,
        role: MemberRole,
        status: MemberStatus,
    ) -> ServiceResult<Outcome<MemberView>> {
        conn.immediate_transaction(|conn| {
            let member = find_member(conn, member_id)?;
            MembershipGuard::require(conn, admin_id, member.project_id, ADMIN_ONLY)?;

            let project = find_project(conn, member.project_id)?;
            let admin = find_user(conn, admin_id)?;
            let user = find_user(conn, member.user_id)?;

            if member.is_active() && status == MemberStatus::Inactive {
                let updated = deactivate(conn, &member)?;
                let deliveries = record_removal(conn, &admin, &user, &project)?;
                info!(member_id = member.id, project_id = project.id, "Deactivated member");
                return Ok(Outcome::new(MemberView::new(updated, &user), deliveries));
            }

            if status == MemberStatus::Inactive && role != MemberRole::Member {
                return Err(ServiceError::invalid(
                    "Inactive members keep the Member role",
                ));
            }

            let updated: Member = diesel::update(members::table.find(member.id))
                .set((members::role.eq(role), members::status.eq(status)))
                .returning(Member::as_returning())
                .get_result(conn)?;

            let mut deliveries = Vec::new();
            if member.role != role {
                history::append(
                    conn,
                    HistoryScope::project(project.id),
                    format!(
                        "{} changed the role of {}",
                        admin.display_name(),
                        user.display_name()
                    ),
                    Some(member.role.to_string()),
                    Some(role.to_string()),
                )?;

                deliveries = NotificationService::notify_affected_users(
                    conn,
                    &[user.id],
                    admin.id,
                    NotificationType::RoleUpdated,
                    NotificationScope::project(project.id),
                    |_| {
                        format!(
                            "Your role in {} changed from {} to {}.",
                            project.title, member.role, role
                        )
                    },
                )?;
                info!(member_id = member.id, from = %member.role, to = %role, "Updated member role");
            }

            Ok(Outcome::new(MemberView::new(updated, &user), deliveries))
        })
    }

    pub fn remove_member(
        conn: &mut SqliteConnection,
        admin_id: i32,
        member_id: i32,
    ) -> ServiceResult<Outcome<MemberView>> {
        conn.immediate_transaction(|conn| {
            let member = find_member(conn, member_id)?;
            MembershipGuard::require(conn, admin_id, member.project_id, ADMIN_ONLY)?;

            if !member.is_active() {
                return Err(ServiceError::conflict("Member is already inactive"));
            }

            let project = find_project(conn, member.project_id)?;
            let admin = find_user(conn, admin_id)?;
            let user = find_user(conn, member.user_id)?;

            let updated = deactivate(conn, &member)?;
            let deliveries = record_removal(conn, &admin, &user, &project)?;

            info!(member_id = member.id, user_id = user.id, project_id = project.id, "Removed member");
            Ok(Outcome::new(MemberView::new(updated, &user), deliveries))
        })
    }

    pub fn leave_project(
        conn: &mut SqliteConnection,
        user_id: i32,
        project_id: i32,
    ) -> ServiceResult<Outcome<MemberView>> {
        conn.immediate_transaction(|conn| {
            let project = find_project(conn, project_id)?;
            let member = MembershipGuard::require(conn, user_id, project.id, ANY_ROLE)?;
            let user = find_user(conn, user_id)?;

            let updated = deactivate(conn, &member)?;

            history::append(
                conn,
                HistoryScope::project(project.id),
                format!("{} left the project", user.display_name()),
                Some(member.role.to_string()),
                Some(MemberStatus::Inactive.to_string()),
            )?;

            let admin_ids = NotificationService::active_admin_ids(conn, project.id)?;
            let deliveries = NotificationService::notify_affected_users(
                conn,
                &admin_ids,
                user.id,
                NotificationType::LeftFromProject,
                NotificationScope::project(project.id),
                |_| format!("{} left the project {}.", user.display_name(), project.title),
            )?;

            info!(member_id = member.id, user_id, project_id = project.id, "Member left project");
            Ok(Outcome::new(MemberView::new(updated, &user), deliveries))
        })
    }

    pub fn list_members(
        conn: &mut SqliteConnection,
        user_id: i32,
        project_id: i32,
        page: Page,
    ) -> ServiceResult<(Vec<MemberView>, i64)> {
        find_project(conn, project_id)?;
        MembershipGuard::require(conn, user_id, project_id, ANY_ROLE)?;

        let total: i64 = members::table
            .filter(members::project_id.eq(project_id))
            .filter(members::status.eq(MemberStatus::Active))
            .count()
            .get_result(conn)?;

        let (limit, offset) = page.limit_offset();
        let rows: Vec<(Member, User)> = members::table
            .inner_join(users::table.on(users::id.eq(members::user_id)))
            .filter(members::project_id.eq(project_id))
            .filter(members::status.eq(MemberStatus::Active))
            .order((members::joined_at.asc(), members::id.asc()))
            .limit(limit)
            .offset(offset)
            .select((Member::as_select(), User::as_select()))
            .load(conn)?;

        let data = rows
            .into_iter()
            .map(|(member, user)| MemberView::new(member, &user))
            .collect();
        Ok((data, total))
    }

    /// The caller's pending invitations, newest first.
    pub fn pending_invitations(
        conn: &mut SqliteConnection,
        user_id: i32,
    ) -> ServiceResult<Vec<InvitationView>> {
        let rows: Vec<(Invitation, String, User)> = invitations::table
            .inner_join(projects::table.on(projects::id.eq(invitations::project_id)))
            .inner_join(users::table.on(users::id.eq(invitations::created_by)))
            .filter(invitations::user_id.eq(user_id))
            .filter(invitations::status.eq(InvitationStatus::Pending))
            .order((invitations::created_at.desc(), invitations::id.desc()))
            .select((Invitation::as_select(), projects::title, User::as_select()))
            .load(conn)?;

        Ok(rows
            .into_iter()
            .map(|(invitation, project_title, inviter)| InvitationView {
                invitation,
                project_title,
                invited_by: inviter.display_name(),
            })
            .collect())
    }

    pub fn list_requests(
        conn: &mut SqliteConnection,
        admin_id: i32,
        project_id: i32,
        page: Page,
    ) -> ServiceResult<(Vec<JoinRequestView>, i64)> {
        find_project(conn, project_id)?;
        MembershipGuard::require(conn, admin_id, project_id, ADMIN_ONLY)?;

        let total: i64 = requests::table
            .filter(requests::project_id.eq(project_id))
            .count()
            .get_result(conn)?;

        let (limit, offset) = page.limit_offset();
        let rows: Vec<(JoinRequest, User)> = requests::table
            .inner_join(users::table.on(users::id.eq(requests::user_id)))
            .filter(requests::project_id.eq(project_id))
            .order((requests::created_at.desc(), requests::id.desc()))
            .limit(limit)
            .offset(offset)
            .select((JoinRequest::as_select(), User::as_select()))
            .load(conn)?;

        let data = rows
            .into_iter()
            .map(|(request, user)| JoinRequestView {
                request,
                name: user.display_name(),
                email: user.email,
            })
            .collect();
        Ok((data, total))
    }
}

pub(crate) fn find_project(conn: &mut SqliteConnection, project_id: i32) -> ServiceResult<Project> {
    projects::table
        .find(project_id)
        .select(Project::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ServiceError::not_found("Project not found"))
}

fn find_member(conn: &mut SqliteConnection, member_id: i32) -> ServiceResult<Member> {
    members::table
        .find(member_id)
        .select(Member::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ServiceError::not_found("Member not found"))
}

fn is_active_member(conn: &mut SqliteConnection, user_id: i32, project_id: i32) -> QueryResult<bool> {
    Ok(MembershipGuard::membership(conn, user_id, project_id)?
        .map(|m| m.is_active())
        .unwrap_or(false))
}

pub(crate) fn validate_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> ServiceResult<()> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(ServiceError::invalid(
            "End date cannot be before the start date",
        )),
        _ => Ok(()),
    }
}

/// Reactivates the pair's existing row or inserts the first one.
/// Fails with `Conflict` if the membership is already active.
fn converge_membership(
    conn: &mut SqliteConnection,
    user_id: i32,
    project_id: i32,
    role: MemberRole,
    added_by: i32,
) -> ServiceResult<Member> {
    let now = timestamp();
    match MembershipGuard::membership(conn, user_id, project_id)? {
        Some(existing) if existing.is_active() => Err(ServiceError::conflict(
            "User is already a member of this project",
        )),
        Some(existing) => Ok(diesel::update(members::table.find(existing.id))
            .set((
                members::status.eq(MemberStatus::Active),
                members::role.eq(role),
                members::added_by.eq(Some(added_by)),
                members::joined_at.eq(now),
            ))
            .returning(Member::as_returning())
            .get_result(conn)?),
        None => Ok(diesel::insert_into(members::table)
            .values(&NewMember {
                user_id,
                project_id,
                role,
                status: MemberStatus::Active,
                joined_at: now,
                added_by: Some(added_by),
            })
            .returning(Member::as_returning())
            .get_result(conn)?),
    }
}

fn settle_pending_invitations(
    conn: &mut SqliteConnection,
    user_id: i32,
    project_id: i32,
) -> QueryResult<usize> {
    diesel::update(
        invitations::table
            .filter(invitations::user_id.eq(user_id))
            .filter(invitations::project_id.eq(project_id))
            .filter(invitations::status.eq(InvitationStatus::Pending)),
    )
    .set(invitations::status.eq(InvitationStatus::Accepted))
    .execute(conn)
}

/// Flips the member to `Inactive` with role `Member`, then drops its task
/// assignments in this project and its recent-opened entry.
fn deactivate(conn: &mut SqliteConnection, member: &Member) -> QueryResult<Member> {
    let updated: Member = diesel::update(members::table.find(member.id))
        .set((
            members::status.eq(MemberStatus::Inactive),
            members::role.eq(MemberRole::Member),
        ))
        .returning(Member::as_returning())
        .get_result(conn)?;

    let project_tasks = tasks::table
        .filter(tasks::project_id.eq(member.project_id))
        .select(tasks::id);
    let cleared = diesel::delete(
        assignees::table
            .filter(assignees::member_id.eq(member.id))
            .filter(assignees::task_id.eq_any(project_tasks)),
    )
    .execute(conn)?;

    diesel::delete(
        recent_opened_projects::table
            .filter(recent_opened_projects::user_id.eq(member.user_id))
            .filter(recent_opened_projects::project_id.eq(member.project_id)),
    )
    .execute(conn)?;

    info!(member_id = member.id, cleared_assignments = cleared, "Deactivated membership");
    Ok(updated)
}

fn record_removal(
    conn: &mut SqliteConnection,
    admin: &User,
    user: &User,
    project: &Project,
) -> QueryResult<Vec<super::Delivery>> {
    history::append(
        conn,
        HistoryScope::project(project.id),
        format!(
            "{} removed {} from the project",
            admin.display_name(),
            user.display_name()
        ),
        Some(user.display_name()),
        Some(MemberStatus::Inactive.to_string()),
    )?;

    NotificationService::notify_affected_users(
        conn,
        &[user.id],
        admin.id,
        NotificationType::RemovedToProject,
        NotificationScope::project(project.id),
        |_| {
            format!(
                "{} removed you from the project {}.",
                admin.display_name(),
                project.title
            )
        },
    )
}
