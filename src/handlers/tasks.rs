//! Task handlers: the mutation pipeline, assignee reconciliation and task history.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    handlers::{respond, respond_paged, ApiResponse, PagedResponse},
    middleware::AuthUser,
    models::{Task, TaskHistory},
    pagination::PaginationParams,
    services::{
        assignees::AssigneeDelta,
        tasks::{CreateTaskInput, TaskView, UpdateTaskInput},
        AssigneeReconciler, ReconcileReport, TaskService,
    },
    AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TaskListQuery {
    /// Include soft-deleted tasks.
    #[serde(default)]
    pub include_deleted: bool,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl TaskListQuery {
    fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/tasks",
    tag = "Tasks",
    params(("project_id" = i32, Path, description = "Project id")),
    request_body = CreateTaskInput,
    responses(
        (status = 201, description = "Task created", body = ApiResponse<TaskView>),
        (status = 400, description = "Invalid task", body = ApiError),
        (status = 403, description = "Caller is not an active Admin or Editor", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(project_id): Path<i32>,
    Json(payload): Json<CreateTaskInput>,
) -> ApiResult<(StatusCode, Json<ApiResponse<TaskView>>)> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let outcome = TaskService::create_task(&mut conn, auth_user.id, project_id, payload)?;
    state.dispatcher.deliver(outcome.deliveries);
    Ok((StatusCode::CREATED, respond("Task created", outcome.value)))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}/tasks",
    tag = "Tasks",
    params(("project_id" = i32, Path, description = "Project id"), TaskListQuery),
    responses(
        (status = 200, description = "Tasks, newest first", body = PagedResponse<TaskView>),
        (status = 403, description = "Not an active member", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(project_id): Path<i32>,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<Json<PagedResponse<TaskView>>> {
    let page = query.pagination().resolve(state.pages.tasks);
    let mut conn = get_db_conn(&state.db_pool)?;
    let (tasks, total) = TaskService::list_tasks(
        &mut conn,
        auth_user.id,
        project_id,
        query.include_deleted,
        page,
    )?;
    Ok(respond_paged("Tasks", tasks, page.into_metadata(total)))
}

#[utoipa::path(
    get,
    path = "/tasks/{task_id}",
    tag = "Tasks",
    params(("task_id" = i32, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task with its assignees", body = ApiResponse<TaskView>),
        (status = 403, description = "Not an active member", body = ApiError),
        (status = 404, description = "Task not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(task_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<TaskView>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let task = TaskService::get_task(&mut conn, auth_user.id, task_id)?;
    Ok(respond("Task", task))
}

#[utoipa::path(
    put,
    path = "/tasks/{task_id}",
    tag = "Tasks",
    params(("task_id" = i32, Path, description = "Task id")),
    request_body = UpdateTaskInput,
    responses(
        (status = 200, description = "Task updated", body = ApiResponse<TaskView>),
        (status = 400, description = "Invalid change or deleted task", body = ApiError),
        (status = 403, description = "Caller may not modify this task", body = ApiError),
        (status = 404, description = "Task not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(task_id): Path<i32>,
    Json(payload): Json<UpdateTaskInput>,
) -> ApiResult<Json<ApiResponse<TaskView>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let outcome = TaskService::update_task(&mut conn, auth_user.id, task_id, payload)?;
    let pushed = state.dispatcher.deliver(outcome.deliveries);

    info!(task_id, user_id = auth_user.id, pushed, "Task update handled");
    Ok(respond("Task updated", outcome.value))
}

#[utoipa::path(
    delete,
    path = "/tasks/{task_id}",
    tag = "Tasks",
    params(("task_id" = i32, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task marked Deleted", body = ApiResponse<Task>),
        (status = 400, description = "Task already deleted", body = ApiError),
        (status = 403, description = "Caller is not an active Admin or Editor", body = ApiError),
        (status = 404, description = "Task not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(task_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<Task>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let outcome = TaskService::delete_task(&mut conn, auth_user.id, task_id)?;
    state.dispatcher.deliver(outcome.deliveries);
    Ok(respond("Task deleted", outcome.value))
}

#[utoipa::path(
    put,
    path = "/tasks/{task_id}/assignees",
    tag = "Tasks",
    params(("task_id" = i32, Path, description = "Task id")),
    request_body = AssigneeDelta,
    responses(
        (status = 200, description = "Assignees reconciled", body = ApiResponse<ReconcileReport>),
        (status = 400, description = "Deleted task", body = ApiError),
        (status = 403, description = "Caller is not an active Admin or Editor", body = ApiError),
        (status = 404, description = "Task not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_assignees(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(task_id): Path<i32>,
    Json(payload): Json<AssigneeDelta>,
) -> ApiResult<Json<ApiResponse<ReconcileReport>>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let outcome = AssigneeReconciler::update_assignees(&mut conn, auth_user.id, task_id, payload)?;
    state.dispatcher.deliver(outcome.deliveries);
    Ok(respond("Assignees updated", outcome.value))
}

#[utoipa::path(
    get,
    path = "/tasks/{task_id}/history",
    tag = "Tasks",
    params(("task_id" = i32, Path, description = "Task id"), PaginationParams),
    responses(
        (status = 200, description = "Task history, newest first", body = PagedResponse<TaskHistory>),
        (status = 403, description = "Not an active member", body = ApiError),
        (status = 404, description = "Task not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn task_history(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(task_id): Path<i32>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<PagedResponse<TaskHistory>>> {
    let page = pagination.resolve(state.pages.history);
    let mut conn = get_db_conn(&state.db_pool)?;
    let (rows, total) = TaskService::task_history(&mut conn, auth_user.id, task_id, page)?;
    Ok(respond_paged("Task history", rows, page.into_metadata(total)))
}
