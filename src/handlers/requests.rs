//! Join-request handlers.
//!
//! Creating or resolving a request pushes the project's new pending count to its
//! admins; the count itself is never persisted as a notification.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    handlers::{respond, respond_paged, ApiResponse, PagedResponse},
    middleware::AuthUser,
    models::{JoinRequest, RequestStatus},
    pagination::PaginationParams,
    services::{membership::JoinRequestView, MembershipService},
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinRequestBody {
    #[schema(example = "K3V9QX2A")]
    pub project_code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveRequestBody {
    /// `Accepted` or `Rejected`.
    pub status: RequestStatus,
}

#[utoipa::path(
    post,
    path = "/requests",
    tag = "Requests",
    request_body = JoinRequestBody,
    responses(
        (status = 201, description = "Join request created", body = ApiResponse<JoinRequest>),
        (status = 404, description = "No project matches this code", body = ApiError),
        (status = 409, description = "Already a member, or a request is pending (see existing_id)", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn request_join(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<JoinRequestBody>,
) -> ApiResult<(StatusCode, Json<ApiResponse<JoinRequest>>)> {
    if payload.project_code.trim().is_empty() {
        return Err(ApiError::bad_request("Project code is required", "VALIDATION_ERROR"));
    }

    let mut conn = get_db_conn(&state.db_pool)?;
    let outcome = MembershipService::request_join(&mut conn, auth_user.id, &payload.project_code)?;
    let pushed = state.dispatcher.deliver(outcome.deliveries);

    info!(request_id = outcome.value.id, pushed, "Join request submitted");
    Ok((StatusCode::CREATED, respond("Request sent", outcome.value)))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}/requests",
    tag = "Requests",
    params(("project_id" = i32, Path, description = "Project id"), PaginationParams),
    responses(
        (status = 200, description = "Join requests of the project, newest first", body = PagedResponse<JoinRequestView>),
        (status = 403, description = "Caller is not an active Admin", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(project_id): Path<i32>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<PagedResponse<JoinRequestView>>> {
    let page = pagination.resolve(state.pages.requests);
    let mut conn = get_db_conn(&state.db_pool)?;
    let (requests, total) = MembershipService::list_requests(&mut conn, auth_user.id, project_id, page)?;
    Ok(respond_paged("Join requests", requests, page.into_metadata(total)))
}

#[utoipa::path(
    put,
    path = "/requests/{request_id}",
    tag = "Requests",
    params(("request_id" = i32, Path, description = "Join request id")),
    request_body = ResolveRequestBody,
    responses(
        (status = 200, description = "Request resolved", body = ApiResponse<JoinRequest>),
        (status = 400, description = "Status must be Accepted or Rejected", body = ApiError),
        (status = 403, description = "Caller is not an active Admin", body = ApiError),
        (status = 404, description = "Request not found", body = ApiError),
        (status = 409, description = "Request already resolved", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn resolve_request(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(request_id): Path<i32>,
    Json(payload): Json<ResolveRequestBody>,
) -> ApiResult<Json<ApiResponse<JoinRequest>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let outcome =
        MembershipService::resolve_request(&mut conn, auth_user.id, request_id, payload.status)?;
    state.dispatcher.deliver(outcome.deliveries);
    Ok(respond("Request resolved", outcome.value))
}
