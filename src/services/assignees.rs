//! Applies "add these members / remove these assignee rows" deltas to a task.
//!
//! Invalid ids are skipped rather than rejected: an add naming a member that
//! is not active in the task's project, or a removal naming a row that does
//! not exist on this task, is ignored and the rest of the delta still applies.

use diesel::prelude::*;
use diesel::SqliteConnection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::error::ServiceError;
use crate::models::{Assignee, Member, MemberStatus, NewAssignee, NotificationType, Task, User};
use crate::schema::{assignees, members, tasks, users};

use super::guard::{MembershipGuard, TASK_MANAGERS};
use super::history::{self, HistoryScope};
use super::notifications::{Delivery, NotificationScope, NotificationService};
use super::{find_user, Outcome, ServiceResult};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AssigneeDelta {
    /// Member ids to assign.
    #[serde(default)]
    pub add: Vec<i32>,
    /// Assignee row ids to drop.
    #[serde(default)]
    pub remove: Vec<i32>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ReconcileReport {
    pub added: Vec<Assignee>,
    pub removed: Vec<Assignee>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub struct AssigneeReconciler;

impl AssigneeReconciler {
    pub fn update_assignees(
        conn: &mut SqliteConnection,
        actor_id: i32,
        task_id: i32,
        delta: AssigneeDelta,
    ) -> ServiceResult<Outcome<ReconcileReport>> {
        conn.immediate_transaction(|conn| {
            let task: Task = tasks::table
                .find(task_id)
                .select(Task::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| ServiceError::not_found("Task not found"))?;

            MembershipGuard::require(conn, actor_id, task.project_id, TASK_MANAGERS)?;
            if task.is_deleted() {
                return Err(ServiceError::invalid("Deleted tasks cannot be reassigned"));
            }
            let actor = find_user(conn, actor_id)?;

            let (report, deliveries) = Self::reconcile(conn, &actor, &task, &delta.add, &delta.remove)?;
            info!(
                task_id = task.id,
                added = report.added.len(),
                removed = report.removed.len(),
                "Reconciled assignees"
            );
            Ok(Outcome::new(report, deliveries))
        })
    }

    /// Core delta application. The caller owns the transaction and has
    /// already authorized `actor` on the task's project.
    pub(crate) fn reconcile(
        conn: &mut SqliteConnection,
        actor: &User,
        task: &Task,
        add: &[i32],
        remove: &[i32],
    ) -> QueryResult<(ReconcileReport, Vec<Delivery>)> {
        let mut report = ReconcileReport::default();
        let mut deliveries = Vec::new();
        let actor_name = actor.display_name();
        let scope = HistoryScope::task(task.project_id, task.id);

        for &member_id in add {
            let Some((member, user)) = active_member(conn, member_id, task.project_id)? else {
                debug!(member_id, task_id = task.id, "Skipping assignee outside the project");
                continue;
            };

            let existing: i64 = assignees::table
                .filter(assignees::member_id.eq(member.id))
                .filter(assignees::task_id.eq(task.id))
                .count()
                .get_result(conn)?;
            if existing > 0 {
                continue;
            }

            let assignee: Assignee = diesel::insert_into(assignees::table)
                .values(&NewAssignee {
                    member_id: member.id,
                    task_id: task.id,
                })
                .returning(Assignee::as_returning())
                .get_result(conn)?;

            history::append(
                conn,
                scope,
                format!("{} added an assignee", actor_name),
                None,
                Some(user.display_name()),
            )?;

            deliveries.extend(NotificationService::notify_affected_users(
                conn,
                &[user.id],
                actor.id,
                NotificationType::TaskAssigned,
                NotificationScope::task(task.project_id, task.id),
                |_| format!("{} assigned you to the task {}.", actor_name, task.name),
            )?);
            report.added.push(assignee);
        }

        for &assignee_id in remove {
            let found: Option<(Assignee, User)> = assignees::table
                .inner_join(members::table)
                .inner_join(users::table.on(users::id.eq(members::user_id)))
                .filter(assignees::id.eq(assignee_id))
                .filter(assignees::task_id.eq(task.id))
                .select((Assignee::as_select(), User::as_select()))
                .first(conn)
                .optional()?;
            let Some((assignee, user)) = found else {
                debug!(assignee_id, task_id = task.id, "Skipping unknown assignee");
                continue;
            };

            diesel::delete(assignees::table.find(assignee.id)).execute(conn)?;

            history::append(
                conn,
                scope,
                format!("{} removed an assignee", actor_name),
                Some(user.display_name()),
                Some("Deleted".to_string()),
            )?;

            deliveries.extend(NotificationService::notify_affected_users(
                conn,
                &[user.id],
                actor.id,
                NotificationType::TaskRemoved,
                NotificationScope::task(task.project_id, task.id),
                |_| format!("{} removed you from the task {}.", actor_name, task.name),
            )?);
            report.removed.push(assignee);
        }

        Ok((report, deliveries))
    }
}

fn active_member(
    conn: &mut SqliteConnection,
    member_id: i32,
    project_id: i32,
) -> QueryResult<Option<(Member, User)>> {
    members::table
        .inner_join(users::table.on(users::id.eq(members::user_id)))
        .filter(members::id.eq(member_id))
        .filter(members::project_id.eq(project_id))
        .filter(members::status.eq(MemberStatus::Active))
        .select((Member::as_select(), User::as_select()))
        .first(conn)
        .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemberRole;
    use crate::schema::task_histories;
    use crate::testing;

    fn assigned_members(conn: &mut SqliteConnection, task_id: i32) -> Vec<i32> {
        assignees::table
            .filter(assignees::task_id.eq(task_id))
            .order(assignees::member_id.asc())
            .select(assignees::member_id)
            .load(conn)
            .unwrap()
    }

    #[test]
    fn test_assignee_delta_scenario() {
        let mut conn = testing::connection();
        let admin = testing::user(&mut conn, "a@x.com");
        let u1 = testing::user(&mut conn, "m1@x.com");
        let u2 = testing::user(&mut conn, "m2@x.com");
        let u3 = testing::user(&mut conn, "m3@x.com");
        let project = testing::project(&mut conn, &admin);
        let admin_member = testing::membership(&mut conn, &admin, &project);
        let m1 = testing::member(&mut conn, &u1, &project, MemberRole::Member);
        let m2 = testing::member(&mut conn, &u2, &project, MemberRole::Member);
        let m3 = testing::member(&mut conn, &u3, &project, MemberRole::Member);
        let task = testing::task(&mut conn, &project, &admin_member);

        let initial = AssigneeReconciler::update_assignees(
            &mut conn,
            admin.id,
            task.id,
            AssigneeDelta { add: vec![m1.id, m2.id], remove: vec![] },
        )
        .unwrap();
        let row_for_m1 = initial.value.added[0].id;
        let history_before: i64 = task_histories::table
            .filter(task_histories::task_id.eq(task.id))
            .count()
            .get_result(&mut conn)
            .unwrap();

        let outcome = AssigneeReconciler::update_assignees(
            &mut conn,
            admin.id,
            task.id,
            AssigneeDelta { add: vec![m3.id], remove: vec![row_for_m1] },
        )
        .unwrap();

        assert_eq!(assigned_members(&mut conn, task.id), vec![m2.id, m3.id]);
        assert_eq!(outcome.value.added.len(), 1);
        assert_eq!(outcome.value.removed.len(), 1);
        let history_after: i64 = task_histories::table
            .filter(task_histories::task_id.eq(task.id))
            .count()
            .get_result(&mut conn)
            .unwrap();
        assert_eq!(history_after - history_before, 2);
        assert_eq!(
            testing::notifications_of(&mut conn, u3.id, NotificationType::TaskAssigned),
            1
        );
        assert_eq!(
            testing::notifications_of(&mut conn, u1.id, NotificationType::TaskRemoved),
            1
        );
    }

    #[test]
    fn test_invalid_and_duplicate_ids_are_skipped() {
        let mut conn = testing::connection();
        let admin = testing::user(&mut conn, "a@x.com");
        let stranger = testing::user(&mut conn, "s@x.com");
        let project = testing::project(&mut conn, &admin);
        let other_project = testing::project(&mut conn, &stranger);
        let admin_member = testing::membership(&mut conn, &admin, &project);
        let foreign_member = testing::membership(&mut conn, &stranger, &other_project);
        let task = testing::task(&mut conn, &project, &admin_member);

        let outcome = AssigneeReconciler::update_assignees(
            &mut conn,
            admin.id,
            task.id,
            AssigneeDelta {
                add: vec![admin_member.id, admin_member.id, foreign_member.id, 9999],
                remove: vec![4242],
            },
        )
        .unwrap();

        assert_eq!(outcome.value.added.len(), 1);
        assert!(outcome.value.removed.is_empty());
        // self-assignment produces no notification
        assert!(outcome.deliveries.is_empty());
        assert_eq!(assigned_members(&mut conn, task.id), vec![admin_member.id]);
    }

    #[test]
    fn test_members_cannot_reassign() {
        let mut conn = testing::connection();
        let admin = testing::user(&mut conn, "a@x.com");
        let plain = testing::user(&mut conn, "p@x.com");
        let project = testing::project(&mut conn, &admin);
        let admin_member = testing::membership(&mut conn, &admin, &project);
        let plain_member = testing::member(&mut conn, &plain, &project, MemberRole::Member);
        let task = testing::task(&mut conn, &project, &admin_member);

        let err = AssigneeReconciler::update_assignees(
            &mut conn,
            plain.id,
            task.id,
            AssigneeDelta { add: vec![plain_member.id], remove: vec![] },
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert!(assigned_members(&mut conn, task.id).is_empty());
    }
}
