//! Fixtures for service-level unit tests: an in-memory store with the schema
//! applied, and shortcuts for the rows most tests need.

use diesel::prelude::*;
use diesel::SqliteConnection;
use diesel_migrations::MigrationHarness;

use crate::models::{
    Member, MemberRole, MemberStatus, NewMember, NewTask, NewUser, NotificationType, Project, Task,
    TaskPriority, TaskStatus, User,
};
use crate::schema::{members, notifications, tasks, users};
use crate::services::membership::{CreateProjectInput, MembershipService};
use crate::services::timestamp;
use crate::MIGRATIONS;

pub fn connection() -> SqliteConnection {
    let mut conn = SqliteConnection::establish(":memory:").expect("in-memory sqlite");
    diesel::sql_query("PRAGMA foreign_keys = ON")
        .execute(&mut conn)
        .expect("enable foreign keys");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("apply migrations");
    conn
}

pub fn user(conn: &mut SqliteConnection, email: &str) -> User {
    let local = email.split('@').next().unwrap_or(email);
    diesel::insert_into(users::table)
        .values(&NewUser {
            email: email.to_lowercase(),
            password_hash: None,
            first_name: local.to_string(),
            last_name: "Tester".to_string(),
        })
        .returning(User::as_returning())
        .get_result(conn)
        .expect("insert user")
}

/// A project owned by `owner`, who becomes its Admin.
pub fn project(conn: &mut SqliteConnection, owner: &User) -> Project {
    let (project, _) = MembershipService::create_project(
        conn,
        owner.id,
        CreateProjectInput {
            title: format!("{}'s project", owner.first_name),
            description: String::new(),
            category: "Testing".to_string(),
            status: None,
            start_date: None,
            end_date: None,
        },
    )
    .expect("create project");
    project
}

/// Inserts an active membership directly, bypassing the lifecycle.
pub fn member(
    conn: &mut SqliteConnection,
    user: &User,
    project: &Project,
    role: MemberRole,
) -> Member {
    diesel::insert_into(members::table)
        .values(&NewMember {
            user_id: user.id,
            project_id: project.id,
            role,
            status: MemberStatus::Active,
            joined_at: timestamp(),
            added_by: None,
        })
        .returning(Member::as_returning())
        .get_result(conn)
        .expect("insert member")
}

/// The existing membership row of `user` in `project`.
pub fn membership(conn: &mut SqliteConnection, user: &User, project: &Project) -> Member {
    members::table
        .filter(members::user_id.eq(user.id))
        .filter(members::project_id.eq(project.id))
        .select(Member::as_select())
        .first(conn)
        .expect("membership")
}

pub fn task(conn: &mut SqliteConnection, project: &Project, creator: &Member) -> Task {
    let now = timestamp();
    diesel::insert_into(tasks::table)
        .values(&NewTask {
            project_id: project.id,
            name: "Fixture task".to_string(),
            description: String::new(),
            priority: TaskPriority::Medium,
            status: TaskStatus::ToDo,
            start_date: None,
            due_date: None,
            creator_member_id: creator.id,
            created_at: now,
            updated_at: now,
        })
        .returning(Task::as_returning())
        .get_result(conn)
        .expect("insert task")
}

pub fn notification_count(conn: &mut SqliteConnection, user_id: i32) -> i64 {
    notifications::table
        .filter(notifications::user_id.eq(user_id))
        .count()
        .get_result(conn)
        .expect("count notifications")
}

pub fn notifications_of(conn: &mut SqliteConnection, user_id: i32, kind: NotificationType) -> i64 {
    notifications::table
        .filter(notifications::user_id.eq(user_id))
        .filter(notifications::notification_type.eq(kind))
        .count()
        .get_result(conn)
        .expect("count notifications")
}
