//! Invitation handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    handlers::{respond, ApiResponse},
    middleware::AuthUser,
    models::{Invitation, Member},
    services::{membership::InvitationView, MembershipService},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InviteRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "b@x.com")]
    pub email: String,
    /// Replaces the default notification text when present.
    #[validate(length(max = 500, message = "Message is too long"))]
    pub message: Option<String>,
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/invitations",
    tag = "Invitations",
    params(("project_id" = i32, Path, description = "Project id")),
    request_body = InviteRequest,
    responses(
        (status = 201, description = "Invitation sent", body = ApiResponse<Invitation>),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 403, description = "Caller is not an active Admin", body = ApiError),
        (status = 404, description = "Project or user not found", body = ApiError),
        (status = 409, description = "Already an active member", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn invite(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(project_id): Path<i32>,
    Json(payload): Json<InviteRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Invitation>>)> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(
            format!("Validation error: {}", e),
            "VALIDATION_ERROR",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;
    let outcome = MembershipService::invite(
        &mut conn,
        auth_user.id,
        project_id,
        &payload.email,
        payload.message,
    )?;
    state.dispatcher.deliver(outcome.deliveries);

    Ok((StatusCode::CREATED, respond("Invitation sent", outcome.value)))
}

#[utoipa::path(
    get,
    path = "/invitations",
    tag = "Invitations",
    responses(
        (status = 200, description = "Pending invitations addressed to the caller", body = ApiResponse<Vec<InvitationView>>),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn pending_invitations(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<ApiResponse<Vec<InvitationView>>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let invitations = MembershipService::pending_invitations(&mut conn, auth_user.id)?;
    Ok(respond("Pending invitations", invitations))
}

#[utoipa::path(
    post,
    path = "/invitations/{invitation_id}/accept",
    tag = "Invitations",
    params(("invitation_id" = i32, Path, description = "Invitation id")),
    responses(
        (status = 200, description = "Invitation accepted; membership is active", body = ApiResponse<Member>),
        (status = 403, description = "Invitation addressed to another user", body = ApiError),
        (status = 404, description = "Invitation not found", body = ApiError),
        (status = 409, description = "Already a member or already accepted", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn accept_invitation(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(invitation_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<Member>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let outcome = MembershipService::accept_invitation(&mut conn, auth_user.id, invitation_id)?;
    state.dispatcher.deliver(outcome.deliveries);
    Ok(respond("Invitation accepted", outcome.value))
}
