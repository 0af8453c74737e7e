use crate::api::session_guard::SessionUser;
use crate::domain::timeline::driving_ports::{TimelineError, TimelinePort};
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{BasicErrorResponse, GenericErrorResponse, Json, Query, ValidationErrorResponse};
use crate::{AppState, SharedData, domain, dto, persistence};
use axum::Router;
use axum::extract::State;
use axum::response::ErrorResponse;
use axum::routing::get;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(paths(get_timeline))]
/// Defines the OpenAPI documentation for the calendar view
pub struct TimelineApi;
/// Constant used to group timeline endpoints in OpenAPI documentation
pub const TIMELINE_API_GROUP: &str = "Timeline";

/// Creates a router for the calendar view of a user's tasks
pub fn timeline_routes() -> Router<Arc<SharedData>> {
    Router::new().route(
        "/timeline",
        get(|State(app_state): AppState, SessionUser(user): SessionUser, Query(range): Query<dto::TimelineQuery>| async move {
            let mut ext_cxn = app_state.ext_cxn.clone();
            let timeline_service = domain::timeline::TimelineService {};

            get_timeline(&user, range, &mut ext_cxn, &timeline_service).await
        }),
    )
}

#[utoipa::path(
    get,
    path = "/api/timeline",
    tag = TIMELINE_API_GROUP,
    params(dto::TimelineQuery),
    responses(
        (status = 200, description = "One cell per day with the tasks scheduled on it", body = dto::Timeline),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Lays the caller's scheduled tasks out on a calendar
async fn get_timeline(
    owner: &domain::user::User,
    range: dto::TimelineQuery,
    ext_cxn: &mut impl ExternalConnectivity,
    timeline_service: &impl TimelinePort,
) -> Result<Json<dto::Timeline>, ErrorResponse> {
    info!("Building timeline from {} to {} for user {}", range.from, range.to, owner.id);
    let task_read = persistence::db_task_driven_ports::DbTaskReader;

    let timeline_result = timeline_service
        .timeline(owner, range.from, range.to, &mut *ext_cxn, &task_read)
        .await;
    match timeline_result {
        Ok(timeline) => Ok(Json(dto::Timeline::from(timeline))),
        Err(TimelineError::Invalid(validation_errors)) => {
            Err(ValidationErrorResponse::from(validation_errors).into())
        }
        Err(TimelineError::PortError(port_err)) => {
            error!("Failed to build timeline: {port_err}");
            Err(GenericErrorResponse(port_err).into())
        }
    }
}
