use crate::routing_utils::{BasicErrorResponse, ExtraInfo, ValidationErrorSchema};
use serde::{Deserialize, Deserializer};
use std::borrow::Cow;
use utoipa::OpenApi;
use validator::ValidationError;

pub mod task;
pub mod timeline;
pub mod user;

pub use task::*;
pub use timeline::*;
pub use user::*;

/// Schemas shared by every part of the API
#[derive(OpenApi)]
#[openapi(
    components(
        schemas(
            ExtraInfo,
            ValidationErrorSchema,
            task::TaskStatus,
            task::Priority,
            task::ChecklistItem,
            task::Task,
            task::NewTask,
            task::UpdateTask,
            task::MoveTask,
            task::Board,
            timeline::TimelineTask,
            timeline::CalendarDay,
            timeline::LegendEntry,
            timeline::Timeline,
            user::RegisterUser,
            user::LoginRequest,
            user::User,
        ),
        responses(BasicErrorResponse),
    )
)]
pub struct OpenApiSchemas;

fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// Rejects strings that are only whitespace, since they're trimmed to nothing before storage
fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(validation_error("blank", "must contain more than whitespace"));
    }

    Ok(())
}

/// Distinguishes an explicit `null` from a missing field: missing stays `None` (via
/// `#[serde(default)]`) while `null` becomes `Some(None)`
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
