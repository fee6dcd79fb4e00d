//! Domain services: authorization, membership lifecycle, task and project
//! mutation pipelines, and notification fan-out.
//!
//! Every mutating entry point opens one `immediate_transaction` and returns an
//! [`Outcome`]: the committed value plus the live pushes to attempt once the
//! transaction has committed. Internal helpers take a connection that is already
//! inside that transaction.

pub mod assignees;
pub mod content;
pub mod guard;
pub mod history;
pub mod membership;
pub mod notifications;
pub mod projects;
pub mod tasks;

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::SqliteConnection;

use crate::error::ServiceError;
use crate::models::User;
use crate::schema::users;

pub use assignees::{AssigneeReconciler, ReconcileReport};
pub use content::ContentService;
pub use guard::MembershipGuard;
pub use membership::MembershipService;
pub use notifications::{Delivery, NotificationDispatcher, NotificationService};
pub use projects::ProjectService;
pub use tasks::TaskService;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result of a committed mutation together with its pending live deliveries.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub deliveries: Vec<Delivery>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, deliveries: Vec<Delivery>) -> Self {
        Self { value, deliveries }
    }

    pub fn silent(value: T) -> Self {
        Self::new(value, Vec::new())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            deliveries: self.deliveries,
        }
    }
}

pub(crate) fn timestamp() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub(crate) fn find_user(conn: &mut SqliteConnection, user_id: i32) -> ServiceResult<User> {
    users::table
        .find(user_id)
        .select(User::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ServiceError::not_found("User not found"))
}
