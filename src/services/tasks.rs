//! Task creation, diff-driven updates and logical deletion.
//!
//! `Deleted` is terminal. Any mutation on a deleted task is rejected with
//! `Invalid` before authorization runs, so no history or notification rows
//! are written for it.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::SqliteConnection;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::error::ServiceError;
use crate::models::{
    Assignee, Member, NewTask, NotificationType, Task, TaskHistory, TaskPriority,
    TaskStatus, User,
};
use crate::pagination::Page;
use crate::schema::{assignees, members, tasks, users};

use super::assignees::AssigneeReconciler;
use super::guard::{MembershipGuard, ANY_ROLE, TASK_MANAGERS};
use super::history::{self, render_display, render_optional, render_text, ChangeSet, HistoryScope};
use super::membership::find_project;
use super::notifications::{NotificationScope, NotificationService};
use super::{find_user, timestamp, Outcome, ServiceResult};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateTaskInput {
    #[schema(example = "Draft landing page copy")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub start_date: Option<NaiveDateTime>,
    pub due_date: Option<NaiveDateTime>,
    /// Member ids to assign on creation.
    #[serde(default)]
    pub assignees: Vec<i32>,
}

/// Full replacement of a task's editable fields.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateTaskInput {
    pub name: String,
    pub description: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub start_date: Option<NaiveDateTime>,
    pub due_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AssigneeView {
    pub assignee_id: i32,
    pub member_id: i32,
    pub user_id: i32,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub assignees: Vec<AssigneeView>,
}

pub struct TaskService;

impl TaskService {
    pub fn create_task(
        conn: &mut SqliteConnection,
        actor_id: i32,
        project_id: i32,
        input: CreateTaskInput,
    ) -> ServiceResult<Outcome<TaskView>> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::invalid("Task name is required"));
        }
        let status = input.status.unwrap_or(TaskStatus::ToDo);
        if status == TaskStatus::Deleted {
            return Err(ServiceError::invalid("A task cannot be created as Deleted"));
        }
        validate_schedule(input.start_date, input.due_date)?;

        conn.immediate_transaction(|conn| {
            let project = find_project(conn, project_id)?;
            let creator = MembershipGuard::require(conn, actor_id, project.id, TASK_MANAGERS)?;
            let actor = find_user(conn, actor_id)?;
            let now = timestamp();

            let task: Task = diesel::insert_into(tasks::table)
                .values(&NewTask {
                    project_id: project.id,
                    name,
                    description: input.description,
                    priority: input.priority.unwrap_or(TaskPriority::Medium),
                    status,
                    start_date: input.start_date,
                    due_date: input.due_date,
                    creator_member_id: creator.id,
                    created_at: now,
                    updated_at: now,
                })
                .returning(Task::as_returning())
                .get_result(conn)?;

            history::append(
                conn,
                HistoryScope::task(project.id, task.id),
                format!("{} created the task", actor.display_name()),
                None,
                Some(task.name.clone()),
            )?;

            let (_, deliveries) =
                AssigneeReconciler::reconcile(conn, &actor, &task, &input.assignees, &[])?;

            info!(task_id = task.id, project_id = project.id, member_id = creator.id, "Created task");
            let view = task_view(conn, task)?;
            Ok(Outcome::new(view, deliveries))
        })
    }

    /// Applies `input` in full and logs one history row per changed field.
    /// Assignees other than the actor hear about it only if something changed.
    pub fn update_task(
        conn: &mut SqliteConnection,
        actor_id: i32,
        task_id: i32,
        input: UpdateTaskInput,
    ) -> ServiceResult<Outcome<TaskView>> {
        conn.immediate_transaction(|conn| {
            let task = find_task(conn, task_id)?;
            let member = MembershipGuard::require(conn, actor_id, task.project_id, ANY_ROLE)?;
            if task.is_deleted() {
                return Err(ServiceError::invalid("Deleted tasks cannot be modified"));
            }
            let manager = TASK_MANAGERS.contains(&member.role);
            if !manager && !is_assignee(conn, member.id, task.id)? {
                return Err(ServiceError::forbidden(
                    "Only an Admin, an Editor or an assignee of this task can update it",
                ));
            }
            if !manager && input.status == TaskStatus::Deleted {
                return Err(ServiceError::forbidden(
                    "Only an Admin or Editor can delete a task",
                ));
            }

            let name = input.name.trim().to_string();
            if name.is_empty() {
                return Err(ServiceError::invalid("Task name is required"));
            }
            validate_schedule(input.start_date, input.due_date)?;

            let actor = find_user(conn, actor_id)?;
            let mut changes = ChangeSet::new();
            changes
                .track("name", &task.name, &name, render_text)
                .track("description", &task.description, &input.description, render_text)
                .track("priority", &task.priority, &input.priority, render_display)
                .track("status", &task.status, &input.status, render_display)
                .track("start date", &task.start_date, &input.start_date, render_optional)
                .track("due date", &task.due_date, &input.due_date, render_optional);

            let updated: Task = diesel::update(tasks::table.find(task.id))
                .set((
                    tasks::name.eq(&name),
                    tasks::description.eq(&input.description),
                    tasks::priority.eq(input.priority),
                    tasks::status.eq(input.status),
                    tasks::start_date.eq(input.start_date),
                    tasks::due_date.eq(input.due_date),
                    tasks::updated_at.eq(timestamp()),
                ))
                .returning(Task::as_returning())
                .get_result(conn)?;

            let mut deliveries = Vec::new();
            if !changes.is_empty() {
                changes.record(
                    conn,
                    &actor.display_name(),
                    HistoryScope::task(task.project_id, task.id),
                )?;

                let kind = if updated.is_deleted() {
                    NotificationType::TaskDeleted
                } else {
                    NotificationType::TaskUpdated
                };
                let recipients = assignee_user_ids(conn, task.id)?;
                let message = format!(
                    "{} updated the task {}: changed {}.",
                    actor.display_name(),
                    updated.name,
                    changes.summary()
                );
                deliveries = NotificationService::notify_affected_users(
                    conn,
                    &recipients,
                    actor.id,
                    kind,
                    NotificationScope::task(task.project_id, task.id),
                    |_| message.clone(),
                )?;
                info!(task_id = task.id, changed = %changes.summary(), "Updated task");
            }

            let view = task_view(conn, updated)?;
            Ok(Outcome::new(view, deliveries))
        })
    }

    /// Logical delete; restricted to Admin and Editor.
    pub fn delete_task(
        conn: &mut SqliteConnection,
        actor_id: i32,
        task_id: i32,
    ) -> ServiceResult<Outcome<Task>> {
        conn.immediate_transaction(|conn| {
            let task = find_task(conn, task_id)?;
            MembershipGuard::require(conn, actor_id, task.project_id, TASK_MANAGERS)?;
            if task.is_deleted() {
                return Err(ServiceError::invalid("Task is already deleted"));
            }
            let actor = find_user(conn, actor_id)?;

            let deleted: Task = diesel::update(tasks::table.find(task.id))
                .set((
                    tasks::status.eq(TaskStatus::Deleted),
                    tasks::updated_at.eq(timestamp()),
                ))
                .returning(Task::as_returning())
                .get_result(conn)?;

            history::append(
                conn,
                HistoryScope::task(task.project_id, task.id),
                format!("{} deleted the task", actor.display_name()),
                Some(task.status.to_string()),
                Some(TaskStatus::Deleted.to_string()),
            )?;

            let recipients = assignee_user_ids(conn, task.id)?;
            let deliveries = NotificationService::notify_affected_users(
                conn,
                &recipients,
                actor.id,
                NotificationType::TaskDeleted,
                NotificationScope::task(task.project_id, task.id),
                |_| format!("{} deleted the task {}.", actor.display_name(), task.name),
            )?;

            info!(task_id = task.id, project_id = task.project_id, "Deleted task");
            Ok(Outcome::new(deleted, deliveries))
        })
    }

    pub fn get_task(
        conn: &mut SqliteConnection,
        user_id: i32,
        task_id: i32,
    ) -> ServiceResult<TaskView> {
        let task = find_task(conn, task_id)?;
        MembershipGuard::require(conn, user_id, task.project_id, ANY_ROLE)?;
        Ok(task_view(conn, task)?)
    }

    /// Newest first; deleted tasks are left out unless `include_deleted`.
    pub fn list_tasks(
        conn: &mut SqliteConnection,
        user_id: i32,
        project_id: i32,
        include_deleted: bool,
        page: Page,
    ) -> ServiceResult<(Vec<TaskView>, i64)> {
        find_project(conn, project_id)?;
        MembershipGuard::require(conn, user_id, project_id, ANY_ROLE)?;

        let mut count_query = tasks::table
            .filter(tasks::project_id.eq(project_id))
            .into_boxed();
        let mut rows_query = tasks::table
            .filter(tasks::project_id.eq(project_id))
            .select(Task::as_select())
            .into_boxed();
        if !include_deleted {
            count_query = count_query.filter(tasks::status.ne(TaskStatus::Deleted));
            rows_query = rows_query.filter(tasks::status.ne(TaskStatus::Deleted));
        }

        let total: i64 = count_query.count().get_result(conn)?;
        let (limit, offset) = page.limit_offset();
        let rows: Vec<Task> = rows_query
            .order((tasks::created_at.desc(), tasks::id.desc()))
            .limit(limit)
            .offset(offset)
            .load(conn)?;

        Ok((task_views(conn, rows)?, total))
    }

    pub fn task_history(
        conn: &mut SqliteConnection,
        user_id: i32,
        task_id: i32,
        page: Page,
    ) -> ServiceResult<(Vec<TaskHistory>, i64)> {
        let task = find_task(conn, task_id)?;
        MembershipGuard::require(conn, user_id, task.project_id, ANY_ROLE)?;
        Ok(history::list_for_task(conn, task.id, page)?)
    }

}

pub(crate) fn find_task(conn: &mut SqliteConnection, task_id: i32) -> ServiceResult<Task> {
    tasks::table
        .find(task_id)
        .select(Task::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ServiceError::not_found("Task not found"))
}

fn validate_schedule(start: Option<NaiveDateTime>, due: Option<NaiveDateTime>) -> ServiceResult<()> {
    match (start, due) {
        (Some(start), Some(due)) if due < start => Err(ServiceError::invalid(
            "Due date cannot be before the start date",
        )),
        _ => Ok(()),
    }
}

fn is_assignee(conn: &mut SqliteConnection, member_id: i32, task_id: i32) -> QueryResult<bool> {
    let count: i64 = assignees::table
        .filter(assignees::member_id.eq(member_id))
        .filter(assignees::task_id.eq(task_id))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

pub(crate) fn assignee_user_ids(conn: &mut SqliteConnection, task_id: i32) -> QueryResult<Vec<i32>> {
    assignees::table
        .inner_join(members::table)
        .filter(assignees::task_id.eq(task_id))
        .select(members::user_id)
        .load(conn)
}

fn task_view(conn: &mut SqliteConnection, task: Task) -> QueryResult<TaskView> {
    let mut views = task_views(conn, vec![task])?;
    Ok(views.remove(0))
}

/// Loads assignees for every task in one query and keeps `tasks` order.
fn task_views(conn: &mut SqliteConnection, tasks: Vec<Task>) -> QueryResult<Vec<TaskView>> {
    let ids: Vec<i32> = tasks.iter().map(|t| t.id).collect();
    let rows: Vec<(Assignee, Member, User)> = assignees::table
        .inner_join(members::table)
        .inner_join(users::table.on(users::id.eq(members::user_id)))
        .filter(assignees::task_id.eq_any(ids))
        .order(assignees::id.asc())
        .select((Assignee::as_select(), Member::as_select(), User::as_select()))
        .load(conn)?;

    let mut by_task: HashMap<i32, Vec<AssigneeView>> = HashMap::new();
    for (assignee, member, user) in rows {
        by_task.entry(assignee.task_id).or_default().push(AssigneeView {
            assignee_id: assignee.id,
            member_id: member.id,
            user_id: user.id,
            name: user.display_name(),
            email: user.email,
        });
    }

    Ok(tasks
        .into_iter()
        .map(|task| TaskView {
            assignees: by_task.remove(&task.id).unwrap_or_default(),
            task,
        })
        .collect())
}
