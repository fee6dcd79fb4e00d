//! Project reads, recent-opened tracking and the project update pipeline.

use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::SqliteConnection;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::error::ServiceError;
use crate::models::{
    Member, MemberRole, MemberStatus, NewRecentOpenedProject, NotificationType, Project,
    ProjectStatus, TaskHistory,
};
use crate::pagination::Page;
use crate::schema::{members, projects, recent_opened_projects};

use super::guard::{MembershipGuard, ADMIN_ONLY, ANY_ROLE};
use super::history::{self, render_display, render_optional, render_text, ChangeSet, HistoryScope};
use super::membership::{find_project, validate_dates};
use super::notifications::{NotificationScope, NotificationService};
use super::{find_user, timestamp, Outcome, ServiceResult};

pub const CODE_LENGTH: usize = 8;

/// Full replacement of a project's editable fields.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateProjectInput {
    pub title: String,
    pub description: String,
    pub category: String,
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// A project together with the caller's role in it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    pub role: MemberRole,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecentProjectView {
    #[serde(flatten)]
    pub project: Project,
    pub last_accessed: chrono::NaiveDateTime,
}

pub struct ProjectService;

impl ProjectService {
    pub fn generate_code() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CODE_LENGTH)
            .map(char::from)
            .collect()
    }

    /// Draws codes until one is not taken.
    pub fn unique_code(conn: &mut SqliteConnection) -> QueryResult<String> {
        loop {
            let code = Self::generate_code();
            let taken: i64 = projects::table
                .filter(projects::code.eq(&code))
                .count()
                .get_result(conn)?;
            if taken == 0 {
                return Ok(code);
            }
        }
    }

    /// Inserts or refreshes the (user, project) recent-opened row.
    pub fn touch_recent(
        conn: &mut SqliteConnection,
        user_id: i32,
        project_id: i32,
    ) -> QueryResult<()> {
        let now = timestamp();
        diesel::insert_into(recent_opened_projects::table)
            .values(&NewRecentOpenedProject {
                user_id,
                project_id,
                last_accessed: now,
            })
            .on_conflict((
                recent_opened_projects::user_id,
                recent_opened_projects::project_id,
            ))
            .do_update()
            .set(recent_opened_projects::last_accessed.eq(now))
            .execute(conn)?;
        Ok(())
    }

    /// Diffs the editable fields, logs one history row per change and sends
    /// one aggregate notification to every other active member.
    pub fn update_project(
        conn: &mut SqliteConnection,
        admin_id: i32,
        project_id: i32,
        input: UpdateProjectInput,
    ) -> ServiceResult<Outcome<Project>> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(ServiceError::invalid("Project title is required"));
        }
        validate_dates(input.start_date, input.end_date)?;

        conn.immediate_transaction(|conn| {
            let project = find_project(conn, project_id)?;
            MembershipGuard::require(conn, admin_id, project.id, ADMIN_ONLY)?;
            let admin = find_user(conn, admin_id)?;

            let mut changes = ChangeSet::new();
            changes
                .track("title", &project.title, &title, render_text)
                .track("description", &project.description, &input.description, render_text)
                .track("category", &project.category, &input.category, render_text)
                .track("start date", &project.start_date, &input.start_date, render_optional)
                .track("end date", &project.end_date, &input.end_date, render_optional)
                .track("status", &project.status, &input.status, render_display);

            let updated: Project = diesel::update(projects::table.find(project.id))
                .set((
                    projects::title.eq(&title),
                    projects::description.eq(&input.description),
                    projects::category.eq(&input.category),
                    projects::status.eq(input.status),
                    projects::start_date.eq(input.start_date),
                    projects::end_date.eq(input.end_date),
                ))
                .returning(Project::as_returning())
                .get_result(conn)?;

            if changes.is_empty() {
                return Ok(Outcome::silent(updated));
            }

            changes.record(conn, &admin.display_name(), HistoryScope::project(project.id))?;

            let recipients: Vec<i32> = members::table
                .filter(members::project_id.eq(project.id))
                .filter(members::status.eq(MemberStatus::Active))
                .select(members::user_id)
                .load(conn)?;

            let message = project_update_message(&admin.display_name(), &updated.title, &changes);
            let deliveries = NotificationService::notify_affected_users(
                conn,
                &recipients,
                admin.id,
                NotificationType::ProjectUpdated,
                NotificationScope::project(project.id),
                |_| message.clone(),
            )?;

            info!(project_id = project.id, changed = %changes.summary(), "Updated project");
            Ok(Outcome::new(updated, deliveries))
        })
    }

    /// Records the open in the caller's recent list and returns the project.
    pub fn open_project(
        conn: &mut SqliteConnection,
        user_id: i32,
        project_id: i32,
    ) -> ServiceResult<ProjectView> {
        conn.immediate_transaction(|conn| {
            let project = find_project(conn, project_id)?;
            let member = MembershipGuard::require(conn, user_id, project.id, ANY_ROLE)?;
            Self::touch_recent(conn, user_id, project.id)?;
            Ok(ProjectView {
                project,
                role: member.role,
            })
        })
    }

    /// Projects where the caller is an active member, newest first.
    pub fn list_projects(
        conn: &mut SqliteConnection,
        user_id: i32,
    ) -> ServiceResult<Vec<ProjectView>> {
        let rows: Vec<(Project, Member)> = projects::table
            .inner_join(members::table)
            .filter(members::user_id.eq(user_id))
            .filter(members::status.eq(MemberStatus::Active))
            .order((projects::created_at.desc(), projects::id.desc()))
            .select((Project::as_select(), Member::as_select()))
            .load(conn)?;

        Ok(rows
            .into_iter()
            .map(|(project, member)| ProjectView {
                project,
                role: member.role,
            })
            .collect())
    }

    pub fn get_project(
        conn: &mut SqliteConnection,
        user_id: i32,
        project_id: i32,
    ) -> ServiceResult<ProjectView> {
        let project = find_project(conn, project_id)?;
        let member = MembershipGuard::require(conn, user_id, project.id, ANY_ROLE)?;
        Ok(ProjectView {
            project,
            role: member.role,
        })
    }

    /// Resolves a project code for a caller who is already an active member.
    pub fn authorize_code(
        conn: &mut SqliteConnection,
        user_id: i32,
        code: &str,
    ) -> ServiceResult<ProjectView> {
        let project: Project = projects::table
            .filter(projects::code.eq(code.trim()))
            .select(Project::as_select())
            .first(conn)
            .optional()?
            .ok_or_else(|| ServiceError::not_found("No project matches this code"))?;
        let member = MembershipGuard::require(conn, user_id, project.id, ANY_ROLE)?;
        Ok(ProjectView {
            project,
            role: member.role,
        })
    }

    pub fn recent_projects(
        conn: &mut SqliteConnection,
        user_id: i32,
    ) -> ServiceResult<Vec<RecentProjectView>> {
        let rows: Vec<(Project, chrono::NaiveDateTime)> = recent_opened_projects::table
            .inner_join(projects::table)
            .filter(recent_opened_projects::user_id.eq(user_id))
            .order((
                recent_opened_projects::last_accessed.desc(),
                recent_opened_projects::id.desc(),
            ))
            .select((Project::as_select(), recent_opened_projects::last_accessed))
            .load(conn)?;

        Ok(rows
            .into_iter()
            .map(|(project, last_accessed)| RecentProjectView {
                project,
                last_accessed,
            })
            .collect())
    }

    pub fn project_history(
        conn: &mut SqliteConnection,
        user_id: i32,
        project_id: i32,
        page: Page,
    ) -> ServiceResult<(Vec<TaskHistory>, i64)> {
        find_project(conn, project_id)?;
        MembershipGuard::require(conn, user_id, project_id, ANY_ROLE)?;
        Ok(history::list_for_project(conn, project_id, page)?)
    }
}

fn project_update_message(actor: &str, title: &str, changes: &ChangeSet) -> String {
    let details: Vec<String> = changes
        .changes()
        .iter()
        .map(|c| {
            format!(
                "{} from '{}' to '{}'",
                c.field,
                c.previous.as_deref().unwrap_or("none"),
                c.current.as_deref().unwrap_or("none")
            )
        })
        .collect();
    format!("{} updated the project {}: {}.", actor, title, details.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Notification;
    use crate::schema::{notifications, task_histories};
    use crate::testing;

    fn unchanged(project: &Project) -> UpdateProjectInput {
        UpdateProjectInput {
            title: project.title.clone(),
            description: project.description.clone(),
            category: project.category.clone(),
            status: project.status,
            start_date: project.start_date,
            end_date: project.end_date,
        }
    }

    fn history_rows(conn: &mut SqliteConnection, project_id: i32) -> i64 {
        task_histories::table
            .filter(task_histories::project_id.eq(project_id))
            .count()
            .get_result(conn)
            .unwrap()
    }

    #[test]
    fn test_generate_code_is_alphanumeric() {
        let code = ProjectService::generate_code();
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_identical_update_writes_nothing() {
        let mut conn = testing::connection();
        let admin = testing::user(&mut conn, "a@x.com");
        let other = testing::user(&mut conn, "o@x.com");
        let project = testing::project(&mut conn, &admin);
        testing::member(&mut conn, &other, &project, MemberRole::Member);
        let before = history_rows(&mut conn, project.id);

        let outcome =
            ProjectService::update_project(&mut conn, admin.id, project.id, unchanged(&project))
                .unwrap();

        assert!(outcome.deliveries.is_empty());
        assert_eq!(history_rows(&mut conn, project.id), before);
        assert_eq!(testing::notification_count(&mut conn, other.id), 0);
    }

    #[test]
    fn test_update_sends_one_aggregate_notification() {
        let mut conn = testing::connection();
        let admin = testing::user(&mut conn, "a@x.com");
        let other = testing::user(&mut conn, "o@x.com");
        let gone = testing::user(&mut conn, "g@x.com");
        let project = testing::project(&mut conn, &admin);
        testing::member(&mut conn, &other, &project, MemberRole::Editor);
        let left = testing::member(&mut conn, &gone, &project, MemberRole::Member);
        diesel::update(members::table.find(left.id))
            .set(members::status.eq(MemberStatus::Inactive))
            .execute(&mut conn)
            .unwrap();
        let before = history_rows(&mut conn, project.id);

        let mut input = unchanged(&project);
        input.title = "Renamed".to_string();
        input.status = ProjectStatus::OnHold;

        let outcome = ProjectService::update_project(&mut conn, admin.id, project.id, input).unwrap();
        assert_eq!(outcome.value.title, "Renamed");
        assert_eq!(history_rows(&mut conn, project.id), before + 2);
        assert_eq!(outcome.deliveries.len(), 1);
        assert_eq!(outcome.deliveries[0].recipient_email, "o@x.com");

        let note: Notification = notifications::table
            .filter(notifications::user_id.eq(other.id))
            .select(Notification::as_select())
            .first(&mut conn)
            .unwrap();
        assert_eq!(note.notification_type, NotificationType::ProjectUpdated);
        assert!(note.message.contains("title"));
        assert!(note.message.contains("On Hold"));
        assert_eq!(testing::notification_count(&mut conn, gone.id), 0);
        assert_eq!(testing::notification_count(&mut conn, admin.id), 0);
    }

    #[test]
    fn test_update_requires_admin() {
        let mut conn = testing::connection();
        let admin = testing::user(&mut conn, "a@x.com");
        let editor = testing::user(&mut conn, "e@x.com");
        let project = testing::project(&mut conn, &admin);
        testing::member(&mut conn, &editor, &project, MemberRole::Editor);

        let err = ProjectService::update_project(&mut conn, editor.id, project.id, unchanged(&project))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[test]
    fn test_open_project_upserts_recent_row() {
        let mut conn = testing::connection();
        let admin = testing::user(&mut conn, "a@x.com");
        let first = testing::project(&mut conn, &admin);
        let second = testing::project(&mut conn, &admin);

        ProjectService::open_project(&mut conn, admin.id, first.id).unwrap();
        ProjectService::open_project(&mut conn, admin.id, second.id).unwrap();
        ProjectService::open_project(&mut conn, admin.id, first.id).unwrap();

        let recent = ProjectService::recent_projects(&mut conn, admin.id).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].project.id, first.id);
    }

    #[test]
    fn test_listing_and_code_lookup_require_active_membership() {
        let mut conn = testing::connection();
        let admin = testing::user(&mut conn, "a@x.com");
        let outsider = testing::user(&mut conn, "o@x.com");
        let project = testing::project(&mut conn, &admin);

        let listed = ProjectService::list_projects(&mut conn, admin.id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].role, MemberRole::Admin);
        assert!(ProjectService::list_projects(&mut conn, outsider.id).unwrap().is_empty());

        let found = ProjectService::authorize_code(&mut conn, admin.id, &project.code).unwrap();
        assert_eq!(found.project.id, project.id);
        let err = ProjectService::authorize_code(&mut conn, outsider.id, &project.code).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }
}
