//! Project handlers: creation, reads, updates and the recent-opened list.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    handlers::{respond, respond_paged, ApiResponse, PagedResponse},
    middleware::AuthUser,
    models::{Member, Project, TaskHistory},
    pagination::PaginationParams,
    services::{
        membership::CreateProjectInput,
        projects::{ProjectView, RecentProjectView, UpdateProjectInput},
        MembershipService, ProjectService,
    },
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedProject {
    pub project: Project,
    pub membership: Member,
}

#[utoipa::path(
    post,
    path = "/projects",
    tag = "Projects",
    request_body = CreateProjectInput,
    responses(
        (status = 201, description = "Project created; the caller is its Admin", body = ApiResponse<CreatedProject>),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateProjectInput>,
) -> ApiResult<(StatusCode, Json<ApiResponse<CreatedProject>>)> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let (project, membership) = MembershipService::create_project(&mut conn, auth_user.id, payload)?;

    Ok((
        StatusCode::CREATED,
        respond("Project created", CreatedProject { project, membership }),
    ))
}

#[utoipa::path(
    get,
    path = "/projects",
    tag = "Projects",
    responses(
        (status = 200, description = "Projects where the caller is an active member", body = ApiResponse<Vec<ProjectView>>),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<ApiResponse<Vec<ProjectView>>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let projects = ProjectService::list_projects(&mut conn, auth_user.id)?;
    Ok(respond("Projects", projects))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}",
    tag = "Projects",
    params(("project_id" = i32, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project details", body = ApiResponse<ProjectView>),
        (status = 403, description = "Not an active member", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_project(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(project_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<ProjectView>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let project = ProjectService::get_project(&mut conn, auth_user.id, project_id)?;
    Ok(respond("Project", project))
}

#[utoipa::path(
    put,
    path = "/projects/{project_id}",
    tag = "Projects",
    params(("project_id" = i32, Path, description = "Project id")),
    request_body = UpdateProjectInput,
    responses(
        (status = 200, description = "Project updated", body = ApiResponse<Project>),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 403, description = "Caller is not an active Admin", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_project(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(project_id): Path<i32>,
    Json(payload): Json<UpdateProjectInput>,
) -> ApiResult<Json<ApiResponse<Project>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let outcome = ProjectService::update_project(&mut conn, auth_user.id, project_id, payload)?;
    let pushed = state.dispatcher.deliver(outcome.deliveries);

    info!(project_id, user_id = auth_user.id, pushed, "Project update handled");
    Ok(respond("Project updated", outcome.value))
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/open",
    tag = "Projects",
    params(("project_id" = i32, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project opened and recorded as recent", body = ApiResponse<ProjectView>),
        (status = 403, description = "Not an active member", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn open_project(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(project_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<ProjectView>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let project = ProjectService::open_project(&mut conn, auth_user.id, project_id)?;
    Ok(respond("Project opened", project))
}

#[utoipa::path(
    get,
    path = "/projects/recent",
    tag = "Projects",
    responses(
        (status = 200, description = "Recently opened projects, newest first", body = ApiResponse<Vec<RecentProjectView>>),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn recent_projects(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<ApiResponse<Vec<RecentProjectView>>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let projects = ProjectService::recent_projects(&mut conn, auth_user.id)?;
    Ok(respond("Recent projects", projects))
}

#[utoipa::path(
    get,
    path = "/projects/code/{code}",
    tag = "Projects",
    params(("code" = String, Path, description = "Project join code")),
    responses(
        (status = 200, description = "Project for a member holding its code", body = ApiResponse<ProjectView>),
        (status = 403, description = "Not an active member", body = ApiError),
        (status = 404, description = "No project with this code", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn project_by_code(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(code): Path<String>,
) -> ApiResult<Json<ApiResponse<ProjectView>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let project = ProjectService::authorize_code(&mut conn, auth_user.id, &code)?;
    Ok(respond("Project", project))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}/history",
    tag = "Projects",
    params(("project_id" = i32, Path, description = "Project id"), PaginationParams),
    responses(
        (status = 200, description = "Project activity, newest first", body = PagedResponse<TaskHistory>),
        (status = 403, description = "Not an active member", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn project_history(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(project_id): Path<i32>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<PagedResponse<TaskHistory>>> {
    let page = pagination.resolve(state.pages.history);
    let mut conn = get_db_conn(&state.db_pool)?;
    let (rows, total) = ProjectService::project_history(&mut conn, auth_user.id, project_id, page)?;
    Ok(respond_paged("Project history", rows, page.into_metadata(total)))
}
