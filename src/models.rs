use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

/// Text-backed enum stored in a `TEXT` column and exchanged as its display string.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            serde::Serialize,
            serde::Deserialize,
            diesel::AsExpression,
            diesel::FromSqlRow,
            utoipa::ToSchema,
        )]
        #[diesel(sql_type = diesel::sql_types::Text)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl diesel::serialize::ToSql<diesel::sql_types::Text, diesel::sqlite::Sqlite> for $name {
            fn to_sql<'b>(
                &'b self,
                out: &mut diesel::serialize::Output<'b, '_, diesel::sqlite::Sqlite>,
            ) -> diesel::serialize::Result {
                out.set_value(self.as_str());
                Ok(diesel::serialize::IsNull::No)
            }
        }

        impl diesel::deserialize::FromSql<diesel::sql_types::Text, diesel::sqlite::Sqlite> for $name {
            fn from_sql(
                value: <diesel::sqlite::Sqlite as diesel::backend::Backend>::RawValue<'_>,
            ) -> diesel::deserialize::Result<Self> {
                let text = <String as diesel::deserialize::FromSql<
                    diesel::sql_types::Text,
                    diesel::sqlite::Sqlite,
                >>::from_sql(value)?;
                text.parse::<$name>().map_err(|e| e.to_string().into())
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl std::fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown {} value '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

text_enum!(MemberRole {
    Admin => "Admin",
    Editor => "Editor",
    Member => "Member",
});

text_enum!(MemberStatus {
    Active => "Active",
    Inactive => "Inactive",
});

text_enum!(ProjectStatus {
    Active => "Active",
    OnHold => "On Hold",
    Completed => "Completed",
    Archived => "Archived",
});

text_enum!(
    /// `Deleted` is terminal: a task in that state is kept only for history linkage.
    TaskStatus {
        ToDo => "To Do",
        InProgress => "In Progress",
        InReview => "In Review",
        Done => "Done",
        Deleted => "Deleted",
    }
);

text_enum!(TaskPriority {
    Low => "Low",
    Medium => "Medium",
    High => "High",
    Urgent => "Urgent",
});

text_enum!(InvitationStatus {
    Pending => "Pending",
    Accepted => "Accepted",
});

text_enum!(RequestStatus {
    Pending => "Pending",
    Accepted => "Accepted",
    Rejected => "Rejected",
});

text_enum!(NotificationType {
    InvitationSent => "InvitationSent",
    InvitationAccepted => "InvitationAccepted",
    RequestAccepted => "RequestAccepted",
    RequestRejected => "RequestRejected",
    AddedToProject => "AddedToProject",
    RoleUpdated => "RoleUpdated",
    RemovedToProject => "RemovedToProject",
    LeftFromProject => "LeftFromProject",
    TaskAssigned => "TaskAssigned",
    TaskRemoved => "TaskRemoved",
    TaskUpdated => "TaskUpdated",
    TaskDeleted => "TaskDeleted",
    ProjectUpdated => "ProjectUpdated",
    AttachmentAdded => "AttachmentAdded",
    AttachmentRemoved => "AttachmentRemoved",
});

#[derive(Debug, Queryable, Selectable, Identifiable, Clone)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub profile_picture: Option<Vec<u8>>,
    pub created_at: NaiveDateTime,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::projects)]
pub struct Project {
    pub id: i32,
    #[schema(example = "aZ4kP0qX")]
    pub code: String,
    #[schema(example = "Website relaunch")]
    pub title: String,
    pub description: String,
    #[schema(example = "Marketing")]
    pub category: String,
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub owner_id: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::projects)]
pub struct NewProject {
    pub code: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub owner_id: i32,
    pub created_at: NaiveDateTime,
}

/// The unit of authorization: one row per (user, project), toggled between
/// `Active` and `Inactive` instead of being deleted.
#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::members)]
pub struct Member {
    pub id: i32,
    pub user_id: i32,
    pub project_id: i32,
    pub role: MemberRole,
    pub status: MemberStatus,
    pub joined_at: NaiveDateTime,
    pub added_by: Option<i32>,
}

impl Member {
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::members)]
pub struct NewMember {
    pub user_id: i32,
    pub project_id: i32,
    pub role: MemberRole,
    pub status: MemberStatus,
    pub joined_at: NaiveDateTime,
    pub added_by: Option<i32>,
}

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::tasks)]
pub struct Task {
    pub id: i32,
    pub project_id: i32,
    pub name: String,
    pub description: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub start_date: Option<NaiveDateTime>,
    pub due_date: Option<NaiveDateTime>,
    pub creator_member_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Task {
    pub fn is_deleted(&self) -> bool {
        self.status == TaskStatus::Deleted
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::tasks)]
pub struct NewTask {
    pub project_id: i32,
    pub name: String,
    pub description: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub start_date: Option<NaiveDateTime>,
    pub due_date: Option<NaiveDateTime>,
    pub creator_member_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::assignees)]
pub struct Assignee {
    pub id: i32,
    pub member_id: i32,
    pub task_id: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::assignees)]
pub struct NewAssignee {
    pub member_id: i32,
    pub task_id: i32,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::task_histories)]
pub struct TaskHistory {
    pub id: i32,
    pub task_id: Option<i32>,
    pub project_id: i32,
    pub prev_value: Option<String>,
    pub new_value: Option<String>,
    pub action_description: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::task_histories)]
pub struct NewTaskHistory {
    pub task_id: Option<i32>,
    pub project_id: i32,
    pub prev_value: Option<String>,
    pub new_value: Option<String>,
    pub action_description: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::comments)]
pub struct Comment {
    pub id: i32,
    pub task_id: i32,
    pub member_id: i32,
    pub content: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::comments)]
pub struct NewComment {
    pub task_id: i32,
    pub member_id: i32,
    pub content: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::comment_attachments)]
pub struct CommentAttachment {
    pub id: i32,
    pub comment_id: i32,
    pub file_name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::comment_attachments)]
pub struct NewCommentAttachment {
    pub comment_id: i32,
    pub file_name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::task_attachments)]
pub struct TaskAttachment {
    pub id: i32,
    pub task_id: i32,
    pub file_name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::task_attachments)]
pub struct NewTaskAttachment {
    pub task_id: i32,
    pub file_name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::invitations)]
pub struct Invitation {
    pub id: i32,
    pub project_id: i32,
    pub user_id: i32,
    pub created_by: i32,
    pub status: InvitationStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::invitations)]
pub struct NewInvitation {
    pub project_id: i32,
    pub user_id: i32,
    pub created_by: i32,
    pub status: InvitationStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::requests)]
pub struct JoinRequest {
    pub id: i32,
    pub user_id: i32,
    pub project_id: i32,
    pub status: RequestStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::requests)]
pub struct NewJoinRequest {
    pub user_id: i32,
    pub project_id: i32,
    pub status: RequestStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::notifications)]
pub struct Notification {
    pub id: i32,
    pub message: String,
    pub user_id: i32,
    pub created_by: i32,
    pub task_id: Option<i32>,
    pub project_id: Option<i32>,
    pub invitation_id: Option<i32>,
    pub notification_type: NotificationType,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::notifications)]
pub struct NewNotification {
    pub message: String,
    pub user_id: i32,
    pub created_by: i32,
    pub task_id: Option<i32>,
    pub project_id: Option<i32>,
    pub invitation_id: Option<i32>,
    pub notification_type: NotificationType,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::recent_opened_projects)]
pub struct RecentOpenedProject {
    pub id: i32,
    pub user_id: i32,
    pub project_id: i32,
    pub last_accessed: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::recent_opened_projects)]
pub struct NewRecentOpenedProject {
    pub user_id: i32,
    pub project_id: i32,
    pub last_accessed: NaiveDateTime,
}
