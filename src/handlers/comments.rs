//! Task comment handlers.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    handlers::{respond, ApiResponse},
    middleware::AuthUser,
    services::{
        content::{CommentView, CreateCommentInput},
        ContentService,
    },
    AppState,
};

/// Raw file body with its stored content type and a download file name.
pub(crate) fn file_response(file_name: &str, mime_type: String, content: Vec<u8>) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        file_name.replace(['"', '\\', '\r', '\n'], "_")
    );
    (
        [
            (header::CONTENT_TYPE, mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        content,
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/tasks/{task_id}/comments",
    tag = "Comments",
    params(("task_id" = i32, Path, description = "Task id")),
    request_body = CreateCommentInput,
    responses(
        (status = 201, description = "Comment added", body = ApiResponse<CommentView>),
        (status = 400, description = "Empty comment, bad attachment or deleted task", body = ApiError),
        (status = 403, description = "Not an active member", body = ApiError),
        (status = 404, description = "Task not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(task_id): Path<i32>,
    Json(payload): Json<CreateCommentInput>,
) -> ApiResult<(StatusCode, Json<ApiResponse<CommentView>>)> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let comment = ContentService::add_comment(&mut conn, auth_user.id, task_id, payload)?;
    Ok((StatusCode::CREATED, respond("Comment added", comment)))
}

#[utoipa::path(
    get,
    path = "/tasks/{task_id}/comments",
    tag = "Comments",
    params(("task_id" = i32, Path, description = "Task id")),
    responses(
        (status = 200, description = "Comments, oldest first", body = ApiResponse<Vec<CommentView>>),
        (status = 403, description = "Not an active member", body = ApiError),
        (status = 404, description = "Task not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(task_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<Vec<CommentView>>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let comments = ContentService::list_comments(&mut conn, auth_user.id, task_id)?;
    Ok(respond("Comments", comments))
}

#[utoipa::path(
    get,
    path = "/comment-attachments/{attachment_id}",
    tag = "Comments",
    params(("attachment_id" = i32, Path, description = "Comment attachment id")),
    responses(
        (status = 200, description = "Raw file content", content_type = "application/octet-stream"),
        (status = 403, description = "Not an active member", body = ApiError),
        (status = 404, description = "Attachment not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_comment_attachment(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(attachment_id): Path<i32>,
) -> ApiResult<Response> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let file = ContentService::comment_attachment(&mut conn, auth_user.id, attachment_id)?;
    Ok(file_response(&file.file_name, file.mime_type, file.content))
}
