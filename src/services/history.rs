//! Append-only activity log for tasks and projects.

use diesel::prelude::*;
use diesel::SqliteConnection;

use crate::models::{NewTaskHistory, TaskHistory};
use crate::pagination::Page;
use crate::schema::task_histories;

use super::timestamp;

/// Where a history row belongs. Project-level rows carry no task id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryScope {
    pub project_id: i32,
    pub task_id: Option<i32>,
}

impl HistoryScope {
    pub fn project(project_id: i32) -> Self {
        Self {
            project_id,
            task_id: None,
        }
    }

    pub fn task(project_id: i32, task_id: i32) -> Self {
        Self {
            project_id,
            task_id: Some(task_id),
        }
    }
}

pub fn append(
    conn: &mut SqliteConnection,
    scope: HistoryScope,
    action_description: impl Into<String>,
    prev_value: Option<String>,
    new_value: Option<String>,
) -> QueryResult<()> {
    diesel::insert_into(task_histories::table)
        .values(&NewTaskHistory {
            task_id: scope.task_id,
            project_id: scope.project_id,
            prev_value,
            new_value,
            action_description: action_description.into(),
            created_at: timestamp(),
        })
        .execute(conn)?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub previous: Option<String>,
    pub current: Option<String>,
}

/// Field-by-field diff between a stored entity and a proposed replacement.
#[derive(Debug, Default)]
pub struct ChangeSet {
    changes: Vec<FieldChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track<T: PartialEq>(
        &mut self,
        field: &'static str,
        previous: &T,
        current: &T,
        render: impl Fn(&T) -> Option<String>,
    ) -> &mut Self {
        if previous != current {
            self.changes.push(FieldChange {
                field,
                previous: render(previous),
                current: render(current),
            });
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn changes(&self) -> &[FieldChange] {
        &self.changes
    }

    /// Human-readable list of the changed fields, e.g. `"name, status"`.
    pub fn summary(&self) -> String {
        self.changes
            .iter()
            .map(|c| c.field)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Appends one `"<actor> changed the <field>"` row per change.
    pub fn record(
        &self,
        conn: &mut SqliteConnection,
        actor_name: &str,
        scope: HistoryScope,
    ) -> QueryResult<()> {
        for change in &self.changes {
            append(
                conn,
                scope,
                format!("{} changed the {}", actor_name, change.field),
                change.previous.clone(),
                change.current.clone(),
            )?;
        }
        Ok(())
    }
}

pub fn render_text(value: &String) -> Option<String> {
    Some(value.clone())
}

pub fn render_display<T: std::fmt::Display>(value: &T) -> Option<String> {
    Some(value.to_string())
}

pub fn render_optional<T: std::fmt::Display>(value: &Option<T>) -> Option<String> {
    value.as_ref().map(|v| v.to_string())
}

pub fn list_for_task(
    conn: &mut SqliteConnection,
    task_id: i32,
    page: Page,
) -> QueryResult<(Vec<TaskHistory>, i64)> {
    let total: i64 = task_histories::table
        .filter(task_histories::task_id.eq(task_id))
        .count()
        .get_result(conn)?;

    let (limit, offset) = page.limit_offset();
    let rows = task_histories::table
        .filter(task_histories::task_id.eq(task_id))
        .order((task_histories::created_at.desc(), task_histories::id.desc()))
        .limit(limit)
        .offset(offset)
        .select(TaskHistory::as_select())
        .load(conn)?;

    Ok((rows, total))
}

/// Every history row of a project, task-level rows included.
pub fn list_for_project(
    conn: &mut SqliteConnection,
    project_id: i32,
    page: Page,
) -> QueryResult<(Vec<TaskHistory>, i64)> {
    let total: i64 = task_histories::table
        .filter(task_histories::project_id.eq(project_id))
        .count()
        .get_result(conn)?;

    let (limit, offset) = page.limit_offset();
    let rows = task_histories::table
        .filter(task_histories::project_id.eq(project_id))
        .order((task_histories::created_at.desc(), task_histories::id.desc()))
        .limit(limit)
        .offset(offset)
        .select(TaskHistory::as_select())
        .load(conn)?;

    Ok((rows, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;

    #[test]
    fn test_change_set_skips_equal_fields() {
        let mut changes = ChangeSet::new();
        changes
            .track("name", &"a".to_string(), &"a".to_string(), render_text)
            .track("status", &TaskStatus::ToDo, &TaskStatus::ToDo, render_display);
        assert!(changes.is_empty());
        assert_eq!(changes.summary(), "");
    }

    #[test]
    fn test_change_set_renders_previous_and_current() {
        let mut changes = ChangeSet::new();
        changes
            .track("status", &TaskStatus::ToDo, &TaskStatus::Done, render_display)
            .track("due date", &None::<i32>, &Some(3), render_optional);

        assert_eq!(changes.len(), 2);
        assert_eq!(changes.summary(), "status, due date");
        assert_eq!(
            changes.changes()[0],
            FieldChange {
                field: "status",
                previous: Some("To Do".to_string()),
                current: Some("Done".to_string()),
            }
        );
        assert_eq!(changes.changes()[1].previous, None);
    }

    #[test]
    fn test_list_for_project_is_newest_first() {
        let mut conn = crate::testing::connection();
        let owner = crate::testing::user(&mut conn, "owner@x.com");
        let project = crate::testing::project(&mut conn, &owner);

        append(&mut conn, HistoryScope::project(project.id), "first", None, None).unwrap();
        append(&mut conn, HistoryScope::project(project.id), "second", None, None).unwrap();

        let (rows, total) = list_for_project(&mut conn, project.id, Page::first(5)).unwrap();
        // creation itself is logged first
        assert_eq!(total, 3);
        assert_eq!(rows[0].action_description, "second");
        assert_eq!(rows[1].action_description, "first");
        assert!(rows.iter().all(|r| r.task_id.is_none()));
    }
}
