//! Comments and file attachments on tasks.
//!
//! Payloads arrive base64-encoded and are stored as raw bytes next to their
//! mime type and file name.

use base64::Engine;
use diesel::prelude::*;
use diesel::SqliteConnection;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::error::ServiceError;
use crate::models::{
    Comment, CommentAttachment, Member, NewComment, NewCommentAttachment, NewTaskAttachment,
    NotificationType, TaskAttachment, User,
};
use crate::schema::{comment_attachments, comments, members, task_attachments, users};

use super::guard::{MembershipGuard, ADMIN_ONLY, ANY_ROLE, TASK_MANAGERS};
use super::history::{self, HistoryScope};
use super::notifications::{NotificationScope, NotificationService};
use super::tasks::{assignee_user_ids, find_task};
use super::{find_user, timestamp, Outcome, ServiceResult};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AttachmentUpload {
    #[schema(example = "notes.pdf")]
    pub file_name: String,
    #[schema(example = "application/pdf")]
    pub mime_type: String,
    /// Base64-encoded file content.
    pub data: String,
}

impl AttachmentUpload {
    fn decode(&self) -> ServiceResult<(String, String, Vec<u8>)> {
        let file_name = self.file_name.trim();
        if file_name.is_empty() {
            return Err(ServiceError::invalid("Attachment file name is required"));
        }
        let mime_type = match self.mime_type.trim() {
            "" => "application/octet-stream",
            other => other,
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(self.data.trim())
            .map_err(|_| ServiceError::invalid("Attachment data must be valid base64"))?;
        Ok((file_name.to_string(), mime_type.to_string(), bytes))
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCommentInput {
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentUpload>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttachmentMeta {
    pub id: i32,
    pub file_name: String,
    pub mime_type: String,
    pub size: usize,
}

impl From<&CommentAttachment> for AttachmentMeta {
    fn from(a: &CommentAttachment) -> Self {
        Self {
            id: a.id,
            file_name: a.file_name.clone(),
            mime_type: a.mime_type.clone(),
            size: a.content.len(),
        }
    }
}

impl From<&TaskAttachment> for AttachmentMeta {
    fn from(a: &TaskAttachment) -> Self {
        Self {
            id: a.id,
            file_name: a.file_name.clone(),
            mime_type: a.mime_type.clone(),
            size: a.content.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: String,
    pub attachments: Vec<AttachmentMeta>,
}

pub struct ContentService;

impl ContentService {
    pub fn add_comment(
        conn: &mut SqliteConnection,
        user_id: i32,
        task_id: i32,
        input: CreateCommentInput,
    ) -> ServiceResult<CommentView> {
        let content = input.content.trim().to_string();
        if content.is_empty() {
            return Err(ServiceError::invalid("Comment content is required"));
        }
        let uploads = input
            .attachments
            .iter()
            .map(AttachmentUpload::decode)
            .collect::<ServiceResult<Vec<_>>>()?;

        conn.immediate_transaction(|conn| {
            let task = find_task(conn, task_id)?;
            let member = MembershipGuard::require(conn, user_id, task.project_id, ANY_ROLE)?;
            if task.is_deleted() {
                return Err(ServiceError::invalid("Deleted tasks cannot be commented on"));
            }

            let comment: Comment = diesel::insert_into(comments::table)
                .values(&NewComment {
                    task_id: task.id,
                    member_id: member.id,
                    content,
                    created_at: timestamp(),
                })
                .returning(Comment::as_returning())
                .get_result(conn)?;

            let mut attachments = Vec::with_capacity(uploads.len());
            for (file_name, mime_type, content) in uploads {
                let stored: CommentAttachment = diesel::insert_into(comment_attachments::table)
                    .values(&NewCommentAttachment {
                        comment_id: comment.id,
                        file_name,
                        mime_type,
                        content,
                    })
                    .returning(CommentAttachment::as_returning())
                    .get_result(conn)?;
                attachments.push(AttachmentMeta::from(&stored));
            }

            let author = super::find_user(conn, user_id)?.display_name();
            info!(comment_id = comment.id, task_id = task.id, member_id = member.id, "Added comment");
            Ok(CommentView {
                comment,
                author,
                attachments,
            })
        })
    }

    /// Oldest first, as a conversation reads.
    pub fn list_comments(
        conn: &mut SqliteConnection,
        user_id: i32,
        task_id: i32,
    ) -> ServiceResult<Vec<CommentView>> {
        let task = find_task(conn, task_id)?;
        MembershipGuard::require(conn, user_id, task.project_id, ANY_ROLE)?;

        let rows: Vec<(Comment, Member, User)> = comments::table
            .inner_join(members::table)
            .inner_join(users::table.on(users::id.eq(members::user_id)))
            .filter(comments::task_id.eq(task.id))
            .order((comments::created_at.asc(), comments::id.asc()))
            .select((Comment::as_select(), Member::as_select(), User::as_select()))
            .load(conn)?;

        let ids: Vec<i32> = rows.iter().map(|(c, _, _)| c.id).collect();
        let files: Vec<CommentAttachment> = comment_attachments::table
            .filter(comment_attachments::comment_id.eq_any(ids))
            .order(comment_attachments::id.asc())
            .select(CommentAttachment::as_select())
            .load(conn)?;

        Ok(rows
            .into_iter()
            .map(|(comment, _, user)| CommentView {
                attachments: files
                    .iter()
                    .filter(|f| f.comment_id == comment.id)
                    .map(AttachmentMeta::from)
                    .collect(),
                author: user.display_name(),
                comment,
            })
            .collect())
    }

    pub fn comment_attachment(
        conn: &mut SqliteConnection,
        user_id: i32,
        attachment_id: i32,
    ) -> ServiceResult<CommentAttachment> {
        let (attachment, task_id): (CommentAttachment, i32) = comment_attachments::table
            .inner_join(comments::table)
            .filter(comment_attachments::id.eq(attachment_id))
            .select((CommentAttachment::as_select(), comments::task_id))
            .first(conn)
            .optional()?
            .ok_or_else(|| ServiceError::not_found("Attachment not found"))?;

        let task = find_task(conn, task_id)?;
        MembershipGuard::require(conn, user_id, task.project_id, ANY_ROLE)?;
        Ok(attachment)
    }

    /// Admins and Editors only. Assignees other than the uploader are notified.
    pub fn upload_task_attachment(
        conn: &mut SqliteConnection,
        user_id: i32,
        task_id: i32,
        upload: AttachmentUpload,
    ) -> ServiceResult<Outcome<AttachmentMeta>> {
        let (file_name, mime_type, content) = upload.decode()?;

        conn.immediate_transaction(|conn| {
            let task = find_task(conn, task_id)?;
            MembershipGuard::require(conn, user_id, task.project_id, TASK_MANAGERS)?;
            if task.is_deleted() {
                return Err(ServiceError::invalid("Deleted tasks cannot take attachments"));
            }
            let actor = find_user(conn, user_id)?;

            let stored: TaskAttachment = diesel::insert_into(task_attachments::table)
                .values(&NewTaskAttachment {
                    task_id: task.id,
                    file_name,
                    mime_type,
                    content,
                    created_at: timestamp(),
                })
                .returning(TaskAttachment::as_returning())
                .get_result(conn)?;

            history::append(
                conn,
                HistoryScope::task(task.project_id, task.id),
                format!("{} added an attachment", actor.display_name()),
                None,
                Some(stored.file_name.clone()),
            )?;

            let recipients = assignee_user_ids(conn, task.id)?;
            let deliveries = NotificationService::notify_affected_users(
                conn,
                &recipients,
                actor.id,
                NotificationType::AttachmentAdded,
                NotificationScope::task(task.project_id, task.id),
                |_| {
                    format!(
                        "{} attached {} to the task {}.",
                        actor.display_name(),
                        stored.file_name,
                        task.name
                    )
                },
            )?;

            info!(attachment_id = stored.id, task_id = task.id, size = stored.content.len(), "Stored task attachment");
            Ok(Outcome::new(AttachmentMeta::from(&stored), deliveries))
        })
    }

    /// Admin only. Removes the file row outright.
    pub fn delete_task_attachment(
        conn: &mut SqliteConnection,
        user_id: i32,
        attachment_id: i32,
    ) -> ServiceResult<Outcome<AttachmentMeta>> {
        conn.immediate_transaction(|conn| {
            let attachment = find_task_attachment(conn, attachment_id)?;
            let task = find_task(conn, attachment.task_id)?;
            MembershipGuard::require(conn, user_id, task.project_id, ADMIN_ONLY)?;
            let actor = find_user(conn, user_id)?;

            diesel::delete(task_attachments::table.find(attachment.id)).execute(conn)?;

            history::append(
                conn,
                HistoryScope::task(task.project_id, task.id),
                format!("{} removed an attachment", actor.display_name()),
                Some(attachment.file_name.clone()),
                Some("Deleted".to_string()),
            )?;

            let recipients = assignee_user_ids(conn, task.id)?;
            let deliveries = NotificationService::notify_affected_users(
                conn,
                &recipients,
                actor.id,
                NotificationType::AttachmentRemoved,
                NotificationScope::task(task.project_id, task.id),
                |_| {
                    format!(
                        "{} removed {} from the task {}.",
                        actor.display_name(),
                        attachment.file_name,
                        task.name
                    )
                },
            )?;

            info!(attachment_id = attachment.id, task_id = task.id, "Deleted task attachment");
            Ok(Outcome::new(AttachmentMeta::from(&attachment), deliveries))
        })
    }

    pub fn list_task_attachments(
        conn: &mut SqliteConnection,
        user_id: i32,
        task_id: i32,
    ) -> ServiceResult<Vec<AttachmentMeta>> {
        let task = find_task(conn, task_id)?;
        MembershipGuard::require(conn, user_id, task.project_id, ANY_ROLE)?;

        let rows: Vec<TaskAttachment> = task_attachments::table
            .filter(task_attachments::task_id.eq(task.id))
            .order((task_attachments::created_at.desc(), task_attachments::id.desc()))
            .select(TaskAttachment::as_select())
            .load(conn)?;
        Ok(rows.iter().map(AttachmentMeta::from).collect())
    }

    pub fn task_attachment(
        conn: &mut SqliteConnection,
        user_id: i32,
        attachment_id: i32,
    ) -> ServiceResult<TaskAttachment> {
        let attachment = find_task_attachment(conn, attachment_id)?;
        let task = find_task(conn, attachment.task_id)?;
        MembershipGuard::require(conn, user_id, task.project_id, ANY_ROLE)?;
        Ok(attachment)
    }
}

fn find_task_attachment(
    conn: &mut SqliteConnection,
    attachment_id: i32,
) -> ServiceResult<TaskAttachment> {
    task_attachments::table
        .find(attachment_id)
        .select(TaskAttachment::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ServiceError::not_found("Attachment not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemberRole, NewAssignee, TaskHistory};
    use crate::schema::{assignees, task_histories};
    use crate::testing;

    fn upload(data: &[u8]) -> AttachmentUpload {
        AttachmentUpload {
            file_name: "notes.txt".to_string(),
            mime_type: "text/plain".to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(data),
        }
    }

    #[test]
    fn test_comment_with_attachment_round_trip() {
        let mut conn = testing::connection();
        let admin = testing::user(&mut conn, "a@x.com");
        let project = testing::project(&mut conn, &admin);
        let member = testing::membership(&mut conn, &admin, &project);
        let task = testing::task(&mut conn, &project, &member);

        let view = ContentService::add_comment(
            &mut conn,
            admin.id,
            task.id,
            CreateCommentInput {
                content: "Looks good".to_string(),
                attachments: vec![upload(b"hello")],
            },
        )
        .unwrap();
        assert_eq!(view.attachments.len(), 1);
        assert_eq!(view.attachments[0].size, 5);

        let listed = ContentService::list_comments(&mut conn, admin.id, task.id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].comment.content, "Looks good");

        let file =
            ContentService::comment_attachment(&mut conn, admin.id, view.attachments[0].id).unwrap();
        assert_eq!(file.content, b"hello");
    }

    #[test]
    fn test_bad_base64_is_invalid() {
        let mut conn = testing::connection();
        let admin = testing::user(&mut conn, "a@x.com");
        let project = testing::project(&mut conn, &admin);
        let member = testing::membership(&mut conn, &admin, &project);
        let task = testing::task(&mut conn, &project, &member);

        let mut bad = upload(b"x");
        bad.data = "***".to_string();
        let err = ContentService::upload_task_attachment(&mut conn, admin.id, task.id, bad).unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(_)));
    }

    #[test]
    fn test_task_attachments_are_member_only() {
        let mut conn = testing::connection();
        let admin = testing::user(&mut conn, "a@x.com");
        let outsider = testing::user(&mut conn, "o@x.com");
        let viewer = testing::user(&mut conn, "v@x.com");
        let project = testing::project(&mut conn, &admin);
        let member = testing::membership(&mut conn, &admin, &project);
        testing::member(&mut conn, &viewer, &project, MemberRole::Member);
        let task = testing::task(&mut conn, &project, &member);

        let meta = ContentService::upload_task_attachment(&mut conn, admin.id, task.id, upload(b"abc"))
            .unwrap()
            .value;

        let listed = ContentService::list_task_attachments(&mut conn, viewer.id, task.id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].mime_type, "text/plain");

        let err = ContentService::task_attachment(&mut conn, outsider.id, meta.id).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    struct AttachmentFixture {
        conn: SqliteConnection,
        admin: User,
        editor: User,
        assignee: User,
        task: crate::models::Task,
    }

    fn attachment_fixture() -> AttachmentFixture {
        let mut conn = testing::connection();
        let admin = testing::user(&mut conn, "a@x.com");
        let editor = testing::user(&mut conn, "e@x.com");
        let assignee = testing::user(&mut conn, "m@x.com");
        let project = testing::project(&mut conn, &admin);
        let admin_member = testing::membership(&mut conn, &admin, &project);
        testing::member(&mut conn, &editor, &project, MemberRole::Editor);
        let assigned = testing::member(&mut conn, &assignee, &project, MemberRole::Member);
        let task = testing::task(&mut conn, &project, &admin_member);
        diesel::insert_into(assignees::table)
            .values(&NewAssignee { member_id: assigned.id, task_id: task.id })
            .execute(&mut conn)
            .unwrap();
        AttachmentFixture { conn, admin, editor, assignee, task }
    }

    fn latest_history(conn: &mut SqliteConnection, task_id: i32) -> TaskHistory {
        task_histories::table
            .filter(task_histories::task_id.eq(task_id))
            .order(task_histories::id.desc())
            .select(TaskHistory::as_select())
            .first(conn)
            .unwrap()
    }

    #[test]
    fn test_plain_members_cannot_upload_task_attachments() {
        let AttachmentFixture { mut conn, assignee, task, .. } = attachment_fixture();

        let err = ContentService::upload_task_attachment(&mut conn, assignee.id, task.id, upload(b"abc"))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let stored: i64 = task_attachments::table.count().get_result(&mut conn).unwrap();
        assert_eq!(stored, 0);
    }

    #[test]
    fn test_upload_records_history_and_notifies_assignees() {
        let AttachmentFixture { mut conn, editor, assignee, task, .. } = attachment_fixture();

        let outcome =
            ContentService::upload_task_attachment(&mut conn, editor.id, task.id, upload(b"abc")).unwrap();
        assert_eq!(outcome.value.file_name, "notes.txt");
        assert_eq!(outcome.deliveries.len(), 1);

        let entry = latest_history(&mut conn, task.id);
        assert!(entry.action_description.ends_with("added an attachment"));
        assert_eq!(entry.prev_value, None);
        assert_eq!(entry.new_value.as_deref(), Some("notes.txt"));

        assert_eq!(
            testing::notifications_of(&mut conn, assignee.id, NotificationType::AttachmentAdded),
            1
        );
        assert_eq!(testing::notification_count(&mut conn, editor.id), 0);
    }

    #[test]
    fn test_only_admins_delete_task_attachments() {
        let AttachmentFixture { mut conn, admin, editor, assignee, task } = attachment_fixture();
        let meta = ContentService::upload_task_attachment(&mut conn, editor.id, task.id, upload(b"abc"))
            .unwrap()
            .value;

        let err = ContentService::delete_task_attachment(&mut conn, editor.id, meta.id).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let outcome = ContentService::delete_task_attachment(&mut conn, admin.id, meta.id).unwrap();
        assert_eq!(outcome.value.id, meta.id);

        let entry = latest_history(&mut conn, task.id);
        assert!(entry.action_description.ends_with("removed an attachment"));
        assert_eq!(entry.prev_value.as_deref(), Some("notes.txt"));
        assert_eq!(entry.new_value.as_deref(), Some("Deleted"));

        assert_eq!(
            testing::notifications_of(&mut conn, assignee.id, NotificationType::AttachmentRemoved),
            1
        );
        let err = ContentService::task_attachment(&mut conn, admin.id, meta.id).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let err = ContentService::delete_task_attachment(&mut conn, admin.id, meta.id).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
