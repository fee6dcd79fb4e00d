//! Membership handlers: listing, direct adds, role/status changes, removal and leaving.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    handlers::{respond, respond_paged, ApiResponse, PagedResponse},
    middleware::AuthUser,
    models::{MemberRole, MemberStatus},
    pagination::PaginationParams,
    services::{membership::MemberView, MembershipService},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddMemberRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "b@x.com")]
    pub email: String,
    #[serde(default = "default_role")]
    pub role: MemberRole,
}

fn default_role() -> MemberRole {
    MemberRole::Member
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMemberRequest {
    pub role: MemberRole,
    pub status: MemberStatus,
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}/members",
    tag = "Members",
    params(("project_id" = i32, Path, description = "Project id"), PaginationParams),
    responses(
        (status = 200, description = "Project members, oldest first", body = PagedResponse<MemberView>),
        (status = 403, description = "Not an active member", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(project_id): Path<i32>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<PagedResponse<MemberView>>> {
    let page = pagination.resolve(state.pages.members);
    let mut conn = get_db_conn(&state.db_pool)?;
    let (members, total) = MembershipService::list_members(&mut conn, auth_user.id, project_id, page)?;
    Ok(respond_paged("Members", members, page.into_metadata(total)))
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/members",
    tag = "Members",
    params(("project_id" = i32, Path, description = "Project id")),
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Member added", body = ApiResponse<MemberView>),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 403, description = "Caller is not an active Admin", body = ApiError),
        (status = 404, description = "Project or user not found", body = ApiError),
        (status = 409, description = "Already an active member", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_member(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(project_id): Path<i32>,
    Json(payload): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<MemberView>>)> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(
            format!("Validation error: {}", e),
            "VALIDATION_ERROR",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;
    let outcome = MembershipService::add_member(
        &mut conn,
        auth_user.id,
        project_id,
        &payload.email,
        payload.role,
    )?;
    state.dispatcher.deliver(outcome.deliveries);

    Ok((StatusCode::CREATED, respond("Member added", outcome.value)))
}

#[utoipa::path(
    put,
    path = "/members/{member_id}",
    tag = "Members",
    params(("member_id" = i32, Path, description = "Member id")),
    request_body = UpdateMemberRequest,
    responses(
        (status = 200, description = "Member updated", body = ApiResponse<MemberView>),
        (status = 400, description = "Invalid change", body = ApiError),
        (status = 403, description = "Caller is not an active Admin", body = ApiError),
        (status = 404, description = "Member not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_member(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(member_id): Path<i32>,
    Json(payload): Json<UpdateMemberRequest>,
) -> ApiResult<Json<ApiResponse<MemberView>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let outcome = MembershipService::update_member(
        &mut conn,
        auth_user.id,
        member_id,
        payload.role,
        payload.status,
    )?;
    state.dispatcher.deliver(outcome.deliveries);

    info!(member_id, role = %outcome.value.role, status = %outcome.value.status, "Member updated");
    Ok(respond("Member updated", outcome.value))
}

#[utoipa::path(
    delete,
    path = "/members/{member_id}",
    tag = "Members",
    params(("member_id" = i32, Path, description = "Member id")),
    responses(
        (status = 200, description = "Member removed", body = ApiResponse<MemberView>),
        (status = 403, description = "Caller is not an active Admin", body = ApiError),
        (status = 404, description = "Member not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(member_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<MemberView>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let outcome = MembershipService::remove_member(&mut conn, auth_user.id, member_id)?;
    state.dispatcher.deliver(outcome.deliveries);
    Ok(respond("Member removed", outcome.value))
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/leave",
    tag = "Members",
    params(("project_id" = i32, Path, description = "Project id")),
    responses(
        (status = 200, description = "Left the project", body = ApiResponse<MemberView>),
        (status = 403, description = "Not an active member", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn leave_project(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(project_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<MemberView>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let outcome = MembershipService::leave_project(&mut conn, auth_user.id, project_id)?;
    state.dispatcher.deliver(outcome.deliveries);
    Ok(respond("Left project", outcome.value))
}
