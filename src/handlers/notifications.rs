//! Notification inbox handlers.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::{
    error::{get_db_conn, ApiError, ApiResult, ServiceError},
    handlers::{respond, ApiResponse},
    middleware::AuthUser,
    models::Notification,
    pagination::{PaginationMeta, PaginationParams},
    services::NotificationService,
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationInbox {
    pub notifications: Vec<Notification>,
    #[schema(example = 3)]
    pub unread_count: i64,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkedRead {
    #[schema(example = 4)]
    pub updated: usize,
}

#[utoipa::path(
    get,
    path = "/notifications",
    tag = "Notifications",
    params(PaginationParams),
    responses(
        (status = 200, description = "The caller's notifications, newest first", body = ApiResponse<NotificationInbox>),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<ApiResponse<NotificationInbox>>> {
    let page = pagination.resolve(state.pages.notifications);
    let mut conn = get_db_conn(&state.db_pool)?;
    let (notifications, total, unread_count) =
        NotificationService::list(&mut conn, auth_user.id, page).map_err(ServiceError::from)?;

    Ok(respond(
        "Notifications",
        NotificationInbox {
            notifications,
            unread_count,
            pagination: page.into_metadata(total),
        },
    ))
}

#[utoipa::path(
    put,
    path = "/notifications/{notification_id}/read",
    tag = "Notifications",
    params(("notification_id" = i32, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification marked read", body = ApiResponse<Notification>),
        (status = 403, description = "Not the recipient", body = ApiError),
        (status = 404, description = "Notification not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(notification_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<Notification>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let notification = NotificationService::mark_read(&mut conn, auth_user.id, notification_id)?;
    Ok(respond("Notification marked as read", notification))
}

#[utoipa::path(
    put,
    path = "/notifications/read-all",
    tag = "Notifications",
    responses(
        (status = 200, description = "All unread notifications marked read", body = ApiResponse<MarkedRead>),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<ApiResponse<MarkedRead>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let updated =
        NotificationService::mark_all_read(&mut conn, auth_user.id).map_err(ServiceError::from)?;

    debug!(user_id = auth_user.id, updated, "Marked notifications read");
    Ok(respond("All notifications marked as read", MarkedRead { updated }))
}
