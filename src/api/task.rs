use crate::api::session_guard::SessionUser;
use crate::domain::task::driving_ports::{TaskError, TaskPort};
use crate::external_connections::{ExternalConnectivity, TransactableExternalConnectivity};
use crate::routing_utils::{BasicErrorResponse, GenericErrorResponse, Json, Path, PlainErrorResponse, Query, ValidationErrorResponse};
use crate::{AppState, SharedData, domain, dto, persistence};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::ErrorResponse;
use axum::routing::{get, post};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::OpenApi;
use validator::Validate;

#[derive(OpenApi)]
#[openapi(paths(
    list_tasks,
    get_board,
    get_task,
    create_task,
    update_task,
    delete_task,
    move_task,
    toggle_checklist_item
))]
/// Defines the OpenAPI documentation for the task and board endpoints
pub struct TaskApi;
/// Constant used to group task endpoints in OpenAPI documentation
pub const TASK_API_GROUP: &str = "Tasks";

/// Adds routes under "/tasks" and the board view to the application router
pub fn task_routes() -> Router<Arc<SharedData>> {
    Router::new()
        .route(
            "/tasks",
            get(|State(app_state): AppState, SessionUser(user): SessionUser, Query(query): Query<dto::TaskQuery>| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let task_service = domain::task::TaskService {};

                list_tasks(user.id, query, &mut ext_cxn, &task_service).await
            })
            .post(|State(app_state): AppState, SessionUser(user): SessionUser, Json(new_task): Json<dto::NewTask>| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let task_service = domain::task::TaskService {};

                create_task(user.id, new_task, &mut ext_cxn, &task_service).await
            }),
        )
        .route(
            "/tasks/:task_id",
            get(|State(app_state): AppState, SessionUser(user): SessionUser, Path(task_id): Path<i32>| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let task_service = domain::task::TaskService {};

                get_task(user.id, task_id, &mut ext_cxn, &task_service).await
            })
            .patch(|State(app_state): AppState, SessionUser(user): SessionUser, Path(task_id): Path<i32>, Json(update): Json<dto::UpdateTask>| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let task_service = domain::task::TaskService {};

                update_task(user.id, task_id, update, &mut ext_cxn, &task_service).await
            })
            .delete(|State(app_state): AppState, SessionUser(user): SessionUser, Path(task_id): Path<i32>| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let task_service = domain::task::TaskService {};

                delete_task(user.id, task_id, &mut ext_cxn, &task_service).await
            }),
        )
        .route(
            "/tasks/:task_id/move",
            post(|State(app_state): AppState, SessionUser(user): SessionUser, Path(task_id): Path<i32>, Json(destination): Json<dto::MoveTask>| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let task_service = domain::task::TaskService {};

                move_task(user.id, task_id, destination, &mut ext_cxn, &task_service).await
            }),
        )
        .route(
            "/tasks/:task_id/checklist/:item_index/toggle",
            post(|State(app_state): AppState, SessionUser(user): SessionUser, Path((task_id, item_index)): Path<(i32, usize)>| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let task_service = domain::task::TaskService {};

                toggle_checklist_item(user.id, task_id, item_index, &mut ext_cxn, &task_service).await
            }),
        )
        .route(
            "/board",
            get(|State(app_state): AppState, SessionUser(user): SessionUser| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let task_service = domain::task::TaskService {};

                get_board(user.id, &mut ext_cxn, &task_service).await
            }),
        )
}

/// Maps a task operation failure onto the API's error responses. Only port failures get logged.
fn task_failure(task_err: TaskError, action: &str) -> ErrorResponse {
    match task_err {
        TaskError::TaskNotFound => {
            PlainErrorResponse::NotFound("The requested task could not be found.").into()
        }
        TaskError::ChecklistItemNotFound(_) => {
            PlainErrorResponse::NotFound("The requested checklist item could not be found.").into()
        }
        TaskError::Invalid(validation_errors) => ValidationErrorResponse::from(validation_errors).into(),
        TaskError::PortError(port_err) => {
            error!("Failed to {action}: {port_err}");
            GenericErrorResponse(port_err).into()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/tasks",
    tag = TASK_API_GROUP,
    params(dto::TaskQuery),
    responses(
        (status = 200, description = "The caller's tasks in board order", body = Vec<dto::Task>),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Lists the caller's tasks, optionally filtered
async fn list_tasks(
    user_id: i32,
    query: dto::TaskQuery,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<Json<Vec<dto::Task>>, ErrorResponse> {
    info!("Listing tasks for user {user_id}");
    let task_read = persistence::db_task_driven_ports::DbTaskReader;
    let filter = domain::task::TaskFilter::from(query);

    let tasks = task_service
        .list_tasks(user_id, &filter, &mut *ext_cxn, &task_read)
        .await
        .map_err(|task_err| task_failure(task_err, "list tasks"))?;

    Ok(Json(tasks.into_iter().map(dto::Task::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/board",
    tag = TASK_API_GROUP,
    responses(
        (status = 200, description = "The caller's tasks grouped by column", body = dto::Board),
        (status = 401, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Returns the caller's board
async fn get_board(
    user_id: i32,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<Json<dto::Board>, ErrorResponse> {
    let task_read = persistence::db_task_driven_ports::DbTaskReader;

    let board = task_service
        .board(user_id, &mut *ext_cxn, &task_read)
        .await
        .map_err(|task_err| task_failure(task_err, "load board"))?;

    Ok(Json(dto::Board::from(board)))
}

#[utoipa::path(
    get,
    path = "/api/tasks/{task_id}",
    tag = TASK_API_GROUP,
    params(("task_id" = i32, Path, description = "ID of the task")),
    responses(
        (status = 200, description = "The task", body = dto::Task),
        (status = 401, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Fetches one of the caller's tasks
async fn get_task(
    user_id: i32,
    task_id: i32,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<Json<dto::Task>, ErrorResponse> {
    let task_read = persistence::db_task_driven_ports::DbTaskReader;

    let task = task_service
        .task_by_id(user_id, task_id, &mut *ext_cxn, &task_read)
        .await
        .map_err(|task_err| task_failure(task_err, "fetch task"))?;

    Ok(Json(dto::Task::from(task)))
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    tag = TASK_API_GROUP,
    request_body = dto::NewTask,
    responses(
        (status = 201, description = "Task created at the end of its column", body = dto::Task),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Creates a task for the caller
async fn create_task(
    user_id: i32,
    new_task: dto::NewTask,
    ext_cxn: &mut impl TransactableExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<(StatusCode, Json<dto::Task>), ErrorResponse> {
    info!("Creating task for user {user_id}");
    new_task.validate().map_err(ValidationErrorResponse::from)?;

    let task_read = persistence::db_task_driven_ports::DbTaskReader;
    let task_write = persistence::db_task_driven_ports::DbTaskWriter;

    let created = task_service
        .create_task(user_id, new_task.into(), &mut *ext_cxn, &task_read, &task_write)
        .await
        .map_err(|task_err| task_failure(task_err, "create task"))?;

    Ok((StatusCode::CREATED, Json(dto::Task::from(created))))
}

#[utoipa::path(
    patch,
    path = "/api/tasks/{task_id}",
    tag = TASK_API_GROUP,
    params(("task_id" = i32, Path, description = "ID of the task")),
    request_body = dto::UpdateTask,
    responses(
        (status = 200, description = "The updated task", body = dto::Task),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Updates the content of a task
async fn update_task(
    user_id: i32,
    task_id: i32,
    task_data: dto::UpdateTask,
    ext_cxn: &mut impl TransactableExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<Json<dto::Task>, ErrorResponse> {
    info!("Updating task {task_id}");
    task_data.validate().map_err(ValidationErrorResponse::from)?;

    let domain_update = domain::task::TaskUpdate::from(task_data);
    let task_read = persistence::db_task_driven_ports::DbTaskReader;
    let task_write = persistence::db_task_driven_ports::DbTaskWriter;

    let updated = task_service
        .update_task(user_id, task_id, &domain_update, &mut *ext_cxn, &task_read, &task_write)
        .await
        .map_err(|task_err| task_failure(task_err, "update task"))?;

    Ok(Json(dto::Task::from(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{task_id}",
    tag = TASK_API_GROUP,
    params(("task_id" = i32, Path, description = "ID of the task")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 401, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Deletes a task
async fn delete_task(
    user_id: i32,
    task_id: i32,
    ext_cxn: &mut impl TransactableExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<StatusCode, ErrorResponse> {
    info!("Deleting task {task_id}");
    let task_read = persistence::db_task_driven_ports::DbTaskReader;
    let task_write = persistence::db_task_driven_ports::DbTaskWriter;

    task_service
        .delete_task(user_id, task_id, &mut *ext_cxn, &task_read, &task_write)
        .await
        .map_err(|task_err| task_failure(task_err, "delete task"))?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/tasks/{task_id}/move",
    tag = TASK_API_GROUP,
    params(("task_id" = i32, Path, description = "ID of the task")),
    request_body = dto::MoveTask,
    responses(
        (status = 200, description = "The task at its new place", body = dto::Task),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Drops a task into a column at a given slot
async fn move_task(
    user_id: i32,
    task_id: i32,
    destination: dto::MoveTask,
    ext_cxn: &mut impl TransactableExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<Json<dto::Task>, ErrorResponse> {
    info!("Moving task {task_id} to {:?} slot {}", destination.status, destination.position);
    let task_read = persistence::db_task_driven_ports::DbTaskReader;
    let task_write = persistence::db_task_driven_ports::DbTaskWriter;

    let moved = task_service
        .move_task(user_id, task_id, destination.into(), &mut *ext_cxn, &task_read, &task_write)
        .await
        .map_err(|task_err| task_failure(task_err, "move task"))?;

    Ok(Json(dto::Task::from(moved)))
}

#[utoipa::path(
    post,
    path = "/api/tasks/{task_id}/checklist/{item_index}/toggle",
    tag = TASK_API_GROUP,
    params(
        ("task_id" = i32, Path, description = "ID of the task"),
        ("item_index" = usize, Path, description = "Zero-based position of the checklist item"),
    ),
    responses(
        (status = 200, description = "The task with the item flipped", body = dto::Task),
        (status = 401, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Flips the checked state of one checklist item
async fn toggle_checklist_item(
    user_id: i32,
    task_id: i32,
    item_index: usize,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<Json<dto::Task>, ErrorResponse> {
    let task_read = persistence::db_task_driven_ports::DbTaskReader;
    let task_write = persistence::db_task_driven_ports::DbTaskWriter;

    let toggled = task_service
        .toggle_checklist_item(user_id, task_id, item_index, &mut *ext_cxn, &task_read, &task_write)
        .await
        .map_err(|task_err| task_failure(task_err, "toggle checklist item"))?;

    Ok(Json(dto::Task::from(toggled)))
}
