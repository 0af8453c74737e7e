use super::not_blank;
use crate::domain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// DTO for a user as seen by themselves
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, PartialEq, Eq, Debug))]
pub struct User {
    #[schema(example = 4)]
    pub id: i32,
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "Ada Lovelace")]
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<domain::user::User> for User {
    fn from(value: domain::user::User) -> Self {
        User {
            id: value.id,
            email: value.email,
            display_name: value.display_name,
            created_at: value.created_at,
        }
    }
}

/// DTO for signing up
#[derive(Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Clone))]
pub struct RegisterUser {
    #[schema(example = "ada@example.com")]
    #[validate(email)]
    pub email: String,
    #[schema(example = "correct horse battery staple")]
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[schema(example = "Ada Lovelace")]
    #[validate(length(min = 1, max = 80), custom = "not_blank")]
    pub display_name: String,
}

impl From<RegisterUser> for domain::user::NewUser {
    fn from(value: RegisterUser) -> Self {
        domain::user::NewUser {
            email: value.email,
            password: value.password,
            display_name: value.display_name,
        }
    }
}

/// DTO for logging in
#[derive(Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    #[validate(length(min = 1, max = 320))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}
