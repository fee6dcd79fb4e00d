//! Notification persistence, fan-out to affected users, and live delivery.

use std::collections::BTreeSet;
use std::sync::Arc;

use diesel::prelude::*;
use diesel::SqliteConnection;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::ServiceError;
use crate::models::{
    MemberRole, MemberStatus, NewNotification, Notification, NotificationType, RequestStatus, User,
};
use crate::pagination::Page;
use crate::realtime::ConnectionRegistry;
use crate::schema::{members, notifications, requests, users};
use crate::telemetry::{record_delivery, DeliveryOutcome};

use super::{timestamp, ServiceResult};

pub const TASK_NOTIFICATION_EVENT: &str = "ReceiveTaskNotification";
pub const REQUEST_NOTIFICATION_EVENT: &str = "ReceiveRequestNotification";

/// A live push queued for after the surrounding transaction commits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub recipient_email: String,
    pub event: &'static str,
    pub payload: serde_json::Value,
}

/// Entities a notification points at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationScope {
    pub project_id: Option<i32>,
    pub task_id: Option<i32>,
    pub invitation_id: Option<i32>,
}

impl NotificationScope {
    pub fn project(project_id: i32) -> Self {
        Self {
            project_id: Some(project_id),
            ..Default::default()
        }
    }

    pub fn task(project_id: i32, task_id: i32) -> Self {
        Self {
            project_id: Some(project_id),
            task_id: Some(task_id),
            ..Default::default()
        }
    }

    pub fn invitation(project_id: i32, invitation_id: i32) -> Self {
        Self {
            project_id: Some(project_id),
            invitation_id: Some(invitation_id),
            ..Default::default()
        }
    }
}

pub struct NotificationService;

impl NotificationService {
    /// Persists one notification for `recipient` and returns the push to attempt after commit.
    pub fn record(
        conn: &mut SqliteConnection,
        recipient: &User,
        actor_id: i32,
        kind: NotificationType,
        message: impl Into<String>,
        scope: NotificationScope,
    ) -> QueryResult<Delivery> {
        let notification: Notification = diesel::insert_into(notifications::table)
            .values(&NewNotification {
                message: message.into(),
                user_id: recipient.id,
                created_by: actor_id,
                task_id: scope.task_id,
                project_id: scope.project_id,
                invitation_id: scope.invitation_id,
                notification_type: kind,
                is_read: false,
                created_at: timestamp(),
            })
            .returning(Notification::as_returning())
            .get_result(conn)?;

        debug!(
            notification_id = notification.id,
            recipient_id = recipient.id,
            kind = %kind,
            "Recorded notification"
        );

        Ok(Delivery {
            recipient_email: recipient.email.clone(),
            event: TASK_NOTIFICATION_EVENT,
            payload: serde_json::to_value(&notification).unwrap_or_else(|_| json!({})),
        })
    }

    /// Notifies every recipient except the actor; duplicate ids collapse to one notification.
    pub fn notify_affected_users(
        conn: &mut SqliteConnection,
        recipient_ids: &[i32],
        actor_id: i32,
        kind: NotificationType,
        scope: NotificationScope,
        message: impl Fn(&User) -> String,
    ) -> QueryResult<Vec<Delivery>> {
        let ids: BTreeSet<i32> = recipient_ids
            .iter()
            .copied()
            .filter(|id| *id != actor_id)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let recipients: Vec<User> = users::table
            .filter(users::id.eq_any(ids))
            .order(users::id.asc())
            .select(User::as_select())
            .load(conn)?;

        recipients
            .iter()
            .map(|recipient| Self::record(conn, recipient, actor_id, kind, message(recipient), scope))
            .collect()
    }

    pub fn active_admin_ids(conn: &mut SqliteConnection, project_id: i32) -> QueryResult<Vec<i32>> {
        members::table
            .filter(members::project_id.eq(project_id))
            .filter(members::status.eq(MemberStatus::Active))
            .filter(members::role.eq(MemberRole::Admin))
            .select(members::user_id)
            .load(conn)
    }

    /// Push-only update of the pending join-request count for each active admin.
    pub fn pending_request_deliveries(
        conn: &mut SqliteConnection,
        project_id: i32,
    ) -> QueryResult<Vec<Delivery>> {
        let pending: i64 = requests::table
            .filter(requests::project_id.eq(project_id))
            .filter(requests::status.eq(RequestStatus::Pending))
            .count()
            .get_result(conn)?;

        let admin_ids = Self::active_admin_ids(conn, project_id)?;
        let emails: Vec<String> = users::table
            .filter(users::id.eq_any(admin_ids))
            .select(users::email)
            .load(conn)?;

        Ok(emails
            .into_iter()
            .map(|recipient_email| Delivery {
                recipient_email,
                event: REQUEST_NOTIFICATION_EVENT,
                payload: json!({ "project_id": project_id, "pending_requests": pending }),
            })
            .collect())
    }

    /// Newest first, with the total and unread counts for the recipient.
    pub fn list(
        conn: &mut SqliteConnection,
        user_id: i32,
        page: Page,
    ) -> QueryResult<(Vec<Notification>, i64, i64)> {
        let total: i64 = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .count()
            .get_result(conn)?;

        let unread: i64 = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::is_read.eq(false))
            .count()
            .get_result(conn)?;

        let (limit, offset) = page.limit_offset();
        let rows = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .order((notifications::created_at.desc(), notifications::id.desc()))
            .limit(limit)
            .offset(offset)
            .select(Notification::as_select())
            .load(conn)?;

        Ok((rows, total, unread))
    }

    pub fn mark_read(
        conn: &mut SqliteConnection,
        user_id: i32,
        notification_id: i32,
    ) -> ServiceResult<Notification> {
        let notification: Notification = notifications::table
            .find(notification_id)
            .select(Notification::as_select())
            .first(conn)
            .optional()?
            .ok_or_else(|| ServiceError::not_found("Notification not found"))?;

        if notification.user_id != user_id {
            return Err(ServiceError::forbidden(
                "Only the recipient can mark this notification as read",
            ));
        }

        Ok(diesel::update(notifications::table.find(notification_id))
            .set(notifications::is_read.eq(true))
            .returning(Notification::as_returning())
            .get_result(conn)?)
    }

    pub fn mark_all_read(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<usize> {
        diesel::update(
            notifications::table
                .filter(notifications::user_id.eq(user_id))
                .filter(notifications::is_read.eq(false)),
        )
        .set(notifications::is_read.eq(true))
        .execute(conn)
    }
}

/// Best-effort live delivery through the connection registry.
#[derive(Clone)]
pub struct NotificationDispatcher {
    registry: Arc<dyn ConnectionRegistry>,
}

impl NotificationDispatcher {
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<dyn ConnectionRegistry> {
        &self.registry
    }

    /// Pushes each delivery to its recipient's live connection, if any.
    /// Failures are logged and counted, never returned.
    pub fn deliver(&self, deliveries: Vec<Delivery>) -> usize {
        let mut delivered = 0;
        for delivery in deliveries {
            let outcome = match self.registry.lookup(&delivery.recipient_email) {
                None => DeliveryOutcome::Offline,
                Some(handle) => match handle.send(delivery.event, delivery.payload) {
                    Ok(()) => DeliveryOutcome::Delivered,
                    Err(e) => {
                        warn!(
                            recipient = %delivery.recipient_email,
                            event = delivery.event,
                            error = %e,
                            "Live notification push failed"
                        );
                        DeliveryOutcome::Failed
                    }
                },
            };

            if outcome == DeliveryOutcome::Delivered {
                delivered += 1;
            }
            record_delivery(delivery.event, outcome);
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::{ConnectionHandle, InMemoryConnectionRegistry};
    use crate::testing;

    fn dispatcher() -> (NotificationDispatcher, Arc<InMemoryConnectionRegistry>) {
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        (NotificationDispatcher::new(registry.clone()), registry)
    }

    #[test]
    fn test_notification_persists_without_live_connection() {
        let mut conn = testing::connection();
        let actor = testing::user(&mut conn, "actor@x.com");
        let recipient = testing::user(&mut conn, "offline@x.com");
        let (dispatcher, _registry) = dispatcher();

        let delivery = NotificationService::record(
            &mut conn,
            &recipient,
            actor.id,
            NotificationType::TaskUpdated,
            "Task changed",
            NotificationScope::default(),
        )
        .unwrap();

        assert_eq!(dispatcher.deliver(vec![delivery]), 0);

        let (rows, total, unread) =
            NotificationService::list(&mut conn, recipient.id, Page::first(10)).unwrap();
        assert_eq!(total, 1);
        assert_eq!(unread, 1);
        assert_eq!(rows[0].message, "Task changed");
    }

    #[test]
    fn test_live_connection_receives_payload() {
        let mut conn = testing::connection();
        let actor = testing::user(&mut conn, "actor@x.com");
        let recipient = testing::user(&mut conn, "live@x.com");
        let (dispatcher, registry) = dispatcher();
        let (handle, mut rx) = ConnectionHandle::new("LIVE@x.com");
        registry.on_connect(handle);

        let delivery = NotificationService::record(
            &mut conn,
            &recipient,
            actor.id,
            NotificationType::TaskAssigned,
            "You were assigned",
            NotificationScope::default(),
        )
        .unwrap();
        assert_eq!(dispatcher.deliver(vec![delivery]), 1);

        let pushed = rx.try_recv().unwrap();
        assert_eq!(pushed.event, TASK_NOTIFICATION_EVENT);
        assert_eq!(pushed.payload["message"], "You were assigned");
        assert_eq!(pushed.payload["notification_type"], "TaskAssigned");
    }

    #[test]
    fn test_closed_channel_is_swallowed() {
        let (dispatcher, registry) = dispatcher();
        let (handle, rx) = ConnectionHandle::new("gone@x.com");
        registry.on_connect(handle);
        drop(rx);

        let delivered = dispatcher.deliver(vec![Delivery {
            recipient_email: "gone@x.com".to_string(),
            event: TASK_NOTIFICATION_EVENT,
            payload: json!({}),
        }]);
        assert_eq!(delivered, 0);
    }

    #[test]
    fn test_fan_out_excludes_actor_and_duplicates() {
        let mut conn = testing::connection();
        let actor = testing::user(&mut conn, "actor@x.com");
        let other = testing::user(&mut conn, "other@x.com");

        let deliveries = NotificationService::notify_affected_users(
            &mut conn,
            &[actor.id, other.id, other.id],
            actor.id,
            NotificationType::ProjectUpdated,
            NotificationScope::default(),
            |u| format!("Hello {}", u.first_name),
        )
        .unwrap();

        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].recipient_email, "other@x.com");
        assert_eq!(testing::notification_count(&mut conn, actor.id), 0);
        assert_eq!(testing::notification_count(&mut conn, other.id), 1);
    }

    #[test]
    fn test_mark_read_is_recipient_only() {
        let mut conn = testing::connection();
        let actor = testing::user(&mut conn, "actor@x.com");
        let recipient = testing::user(&mut conn, "r@x.com");
        let delivery = NotificationService::record(
            &mut conn,
            &recipient,
            actor.id,
            NotificationType::RoleUpdated,
            "Role changed",
            NotificationScope::default(),
        )
        .unwrap();
        let id = delivery.payload["id"].as_i64().unwrap() as i32;

        let err = NotificationService::mark_read(&mut conn, actor.id, id).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let read = NotificationService::mark_read(&mut conn, recipient.id, id).unwrap();
        assert!(read.is_read);
        assert_eq!(NotificationService::mark_all_read(&mut conn, recipient.id).unwrap(), 0);
    }
}
