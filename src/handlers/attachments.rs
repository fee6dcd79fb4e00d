//! Task attachment handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use tracing::info;

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    handlers::{comments::file_response, respond, ApiResponse},
    middleware::AuthUser,
    services::{
        content::{AttachmentMeta, AttachmentUpload},
        ContentService,
    },
    AppState,
};

#[utoipa::path(
    post,
    path = "/tasks/{task_id}/attachments",
    tag = "Attachments",
    params(("task_id" = i32, Path, description = "Task id")),
    request_body = AttachmentUpload,
    responses(
        (status = 201, description = "Attachment stored", body = ApiResponse<AttachmentMeta>),
        (status = 400, description = "Bad payload or deleted task", body = ApiError),
        (status = 403, description = "Caller is not an active Admin or Editor", body = ApiError),
        (status = 404, description = "Task not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_attachment(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(task_id): Path<i32>,
    Json(payload): Json<AttachmentUpload>,
) -> ApiResult<(StatusCode, Json<ApiResponse<AttachmentMeta>>)> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let outcome = ContentService::upload_task_attachment(&mut conn, auth_user.id, task_id, payload)?;
    let pushed = state.dispatcher.deliver(outcome.deliveries);

    info!(task_id, user_id = auth_user.id, pushed, "Attachment upload handled");
    Ok((StatusCode::CREATED, respond("Attachment uploaded", outcome.value)))
}

#[utoipa::path(
    get,
    path = "/tasks/{task_id}/attachments",
    tag = "Attachments",
    params(("task_id" = i32, Path, description = "Task id")),
    responses(
        (status = 200, description = "Attachment metadata, newest first", body = ApiResponse<Vec<AttachmentMeta>>),
        (status = 403, description = "Not an active member", body = ApiError),
        (status = 404, description = "Task not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_attachments(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(task_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<Vec<AttachmentMeta>>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let files = ContentService::list_task_attachments(&mut conn, auth_user.id, task_id)?;
    Ok(respond("Attachments", files))
}

#[utoipa::path(
    get,
    path = "/attachments/{attachment_id}",
    tag = "Attachments",
    params(("attachment_id" = i32, Path, description = "Task attachment id")),
    responses(
        (status = 200, description = "Raw file content", content_type = "application/octet-stream"),
        (status = 403, description = "Not an active member", body = ApiError),
        (status = 404, description = "Attachment not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_attachment(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(attachment_id): Path<i32>,
) -> ApiResult<Response> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let file = ContentService::task_attachment(&mut conn, auth_user.id, attachment_id)?;
    Ok(file_response(&file.file_name, file.mime_type, file.content))
}

#[utoipa::path(
    delete,
    path = "/attachments/{attachment_id}",
    tag = "Attachments",
    params(("attachment_id" = i32, Path, description = "Task attachment id")),
    responses(
        (status = 200, description = "Attachment removed", body = ApiResponse<AttachmentMeta>),
        (status = 403, description = "Caller is not an active Admin", body = ApiError),
        (status = 404, description = "Attachment not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_attachment(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(attachment_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<AttachmentMeta>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let outcome = ContentService::delete_task_attachment(&mut conn, auth_user.id, attachment_id)?;
    state.dispatcher.deliver(outcome.deliveries);
    Ok(respond("Attachment deleted", outcome.value))
}
