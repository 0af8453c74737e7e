use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_macros::{FromRequest, FromRequestParts};

use serde::Serialize;
use utoipa::openapi::{RefOr, Schema};
use utoipa::{openapi, ToResponse, ToSchema};

use validator::ValidationErrors;

/// Contains diagnostic information about an API failure
#[derive(Serialize, Debug, ToResponse)]
#[response(examples(
    ("Not Found" = (
        summary = "Entity could not be found or belongs to someone else (404)",
        value = json!({
            "error_code": "not_found",
            "error_description": "The requested task could not be found.",
            "extra_info": null
        })
    )),

    ("Unauthorized" = (
        summary = "No valid session cookie was sent (401)",
        value = json!({
            "error_code": "unauthorized",
            "error_description": "You must be logged in to do that.",
            "extra_info": null
        })
    )),

    ("Internal Failure" = (
        summary = "Something unexpected went wrong inside the server (500)",
        value = json!({
            "error_code": "internal_error",
            "error_description": "Could not access data to complete your request",
            "extra_info": null
        })
    )),

    ("Invalid Input" = (
        summary = "Invalid request body was passed (400)",
        value = json!({
            "error_code": "invalid_input",
            "error_description": "Submitted data was invalid.",
            "extra_info": {
                "title": [
                    {
                        "code": "blank",
                        "message": "must contain more than whitespace",
                        "params": {
                            "value": "  "
                        }
                    }
                ]
            }
        })
    )),

    ("Malformed JSON" = (
        summary = "Invalid JSON passed to server (400)",
        value = json!({
            "error_code": "invalid_json",
            "error_description": "The passed request body contained malformed or unreadable JSON.",
            "extra_info": "Failed to parse the request body as JSON: EOF while parsing an object at line 4 column 0"
        })
    ))
))]
pub struct BasicErrorResponse {
    error_code: String,
    error_description: String,
    extra_info: Option<ExtraInfo>,
}

impl BasicErrorResponse {
    fn plain(error_code: &str, error_description: &str) -> Self {
        BasicErrorResponse {
            error_code: error_code.to_owned(),
            error_description: error_description.to_owned(),
            extra_info: None,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(untagged)]
pub enum ExtraInfo {
    ValidationIssues(ValidationErrorSchema),
    Message(String),
}

/// Stand-in OpenAPI schema for [ValidationErrors] which just provides an empty object
#[derive(Serialize, Debug)]
#[serde(transparent)]
pub struct ValidationErrorSchema(ValidationErrors);

impl<'schem> ToSchema<'schem> for ValidationErrorSchema {
    fn schema() -> (&'schem str, RefOr<Schema>) {
        (
            "ValidationErrorSchema",
            openapi::ObjectBuilder::new().into(),
        )
    }
}

/// Response type for failures that are fully described by their error code
#[derive(Debug)]
pub enum PlainErrorResponse {
    Unauthorized,
    InvalidCredentials,
    NotFound(&'static str),
    EmailTaken,
}

impl IntoResponse for PlainErrorResponse {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                BasicErrorResponse::plain("unauthorized", "You must be logged in to do that."),
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                BasicErrorResponse::plain(
                    "invalid_credentials",
                    "The email or password was incorrect.",
                ),
            ),
            Self::NotFound(description) => (
                StatusCode::NOT_FOUND,
                BasicErrorResponse::plain("not_found", description),
            ),
            Self::EmailTaken => (
                StatusCode::CONFLICT,
                BasicErrorResponse::plain(
                    "email_taken",
                    "An account with that email already exists.",
                ),
            ),
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Response type for anything unexpected. The cause should be logged before this is returned;
/// it is never shown to the client.
pub struct GenericErrorResponse(pub anyhow::Error);

impl IntoResponse for GenericErrorResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(BasicErrorResponse::plain(
                "internal_error",
                "Could not access data to complete your request",
            )),
        )
            .into_response()
    }
}

/// Response type that wraps validation errors and turns them into [BasicErrorResponse]s
pub struct ValidationErrorResponse(ValidationErrors);

impl IntoResponse for ValidationErrorResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            axum::Json(BasicErrorResponse {
                error_code: "invalid_input".into(),
                error_description: "Submitted data was invalid.".to_owned(),
                extra_info: Some(ExtraInfo::ValidationIssues(ValidationErrorSchema(self.0))),
            }),
        )
            .into_response()
    }
}

impl From<ValidationErrors> for ValidationErrorResponse {
    fn from(value: ValidationErrors) -> Self {
        Self(value)
    }
}

/// Wrapper for [axum::Json] which customizes the error response to use our
/// data structure for API errors
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(JsonErrorResponse))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Response type representing JSON parse errors
pub struct JsonErrorResponse {
    parse_problem: String,
}

impl From<JsonRejection> for JsonErrorResponse {
    fn from(value: JsonRejection) -> Self {
        JsonErrorResponse {
            parse_problem: value.body_text(),
        }
    }
}

impl IntoResponse for JsonErrorResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            axum::Json(BasicErrorResponse {
                error_code: "invalid_json".into(),
                error_description:
                    "The passed request body contained malformed or unreadable JSON.".into(),
                extra_info: Some(ExtraInfo::Message(self.parse_problem)),
            }),
        )
            .into_response()
    }
}

/// Wrapper for [axum::extract::Query] that reports unparseable query strings with our
/// API error structure
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(QueryErrorResponse))]
pub struct Query<T>(pub T);

/// Response type representing query string parse errors
pub struct QueryErrorResponse {
    parse_problem: String,
}

impl From<QueryRejection> for QueryErrorResponse {
    fn from(value: QueryRejection) -> Self {
        QueryErrorResponse {
            parse_problem: value.body_text(),
        }
    }
}

impl IntoResponse for QueryErrorResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            axum::Json(BasicErrorResponse {
                error_code: "invalid_query".into(),
                error_description: "The query string could not be understood.".into(),
                extra_info: Some(ExtraInfo::Message(self.parse_problem)),
            }),
        )
            .into_response()
    }
}

/// Wrapper for [axum::extract::Path] so malformed path parameters get our API error structure
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(PathErrorResponse))]
pub struct Path<T>(pub T);

/// Response type representing path parameters that could not be parsed
pub struct PathErrorResponse {
    parse_problem: String,
}

impl From<PathRejection> for PathErrorResponse {
    fn from(value: PathRejection) -> Self {
        PathErrorResponse {
            parse_problem: value.body_text(),
        }
    }
}

impl IntoResponse for PathErrorResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            axum::Json(BasicErrorResponse {
                error_code: "invalid_path".into(),
                error_description: "A parameter in the request path could not be understood.".into(),
                extra_info: Some(ExtraInfo::Message(self.parse_problem)),
            }),
        )
            .into_response()
    }
}
