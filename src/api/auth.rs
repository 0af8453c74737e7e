use crate::api::session_guard::SessionUser;
use crate::app_env::SessionConfig;
use crate::domain::session::driving_ports::SessionPort;
use crate::domain::user::driving_ports::{AuthenticateError, RegisterError, UserPort};
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{BasicErrorResponse, GenericErrorResponse, Json, PlainErrorResponse, ValidationErrorResponse};
use crate::{AppState, SharedData, credentials, domain, dto, persistence};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::ErrorResponse;
use axum::routing::{get, post};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::OpenApi;
use validator::Validate;

#[derive(OpenApi)]
#[openapi(paths(register, login, logout, me))]
/// Defines the OpenAPI documentation for account and session endpoints
pub struct AuthApi;
/// Constant used to group auth endpoints in OpenAPI documentation
pub const AUTH_API_GROUP: &str = "Auth";

/// Builds a router for signing up, logging in and out, and looking up the current user
pub fn auth_routes() -> Router<Arc<SharedData>> {
    Router::new()
        .route(
            "/register",
            post(|State(app_state): AppState, Json(new_user): Json<dto::RegisterUser>| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let user_service = domain::user::UserService {};

                register(new_user, &mut ext_cxn, &user_service).await
            }),
        )
        .route(
            "/login",
            post(|State(app_state): AppState, jar: CookieJar, Json(login_request): Json<dto::LoginRequest>| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let user_service = domain::user::UserService {};
                let session_service = domain::session::SessionService {};

                login(login_request, jar, &app_state.session, &mut ext_cxn, &user_service, &session_service).await
            }),
        )
        .route(
            "/logout",
            post(|State(app_state): AppState, jar: CookieJar| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let session_service = domain::session::SessionService {};

                logout(jar, &app_state.session, &mut ext_cxn, &session_service).await
            }),
        )
        .route("/me", get(|SessionUser(user): SessionUser| async move { me(user) }))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = AUTH_API_GROUP,
    request_body = dto::RegisterUser,
    responses(
        (status = 201, description = "Account created", body = dto::User),
        (status = 400, response = BasicErrorResponse),
        (status = 409, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Creates an account
async fn register(
    new_user: dto::RegisterUser,
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl UserPort,
) -> Result<(StatusCode, Json<dto::User>), ErrorResponse> {
    info!("Registering a new user");
    new_user.validate().map_err(ValidationErrorResponse::from)?;

    let user_detect = persistence::db_user_driven_ports::DbDetectUser;
    let user_write = persistence::db_user_driven_ports::DbWriteUsers;
    let hasher = credentials::Argon2PasswordHasher;

    let register_result = user_service
        .register(new_user.into(), &mut *ext_cxn, &user_detect, &user_write, &hasher)
        .await;
    match register_result {
        Ok(user) => Ok((StatusCode::CREATED, Json(dto::User::from(user)))),
        Err(RegisterError::EmailTaken) => Err(PlainErrorResponse::EmailTaken.into()),
        Err(RegisterError::PortError(port_err)) => {
            error!("User registration failure: {port_err}");
            Err(GenericErrorResponse(port_err).into())
        }
    }
}

/// Builds the cookie that carries a session token back to the browser
fn session_cookie(config: &SessionConfig, token: String) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(config.secure_cookie)
        .build()
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = AUTH_API_GROUP,
    request_body = dto::LoginRequest,
    responses(
        (status = 200, description = "Logged in. The session token is set as an HTTP-only cookie.", body = dto::User),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Checks credentials and opens a session
async fn login(
    login_request: dto::LoginRequest,
    jar: CookieJar,
    session_config: &SessionConfig,
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl UserPort,
    session_service: &impl SessionPort,
) -> Result<(CookieJar, Json<dto::User>), ErrorResponse> {
    login_request.validate().map_err(ValidationErrorResponse::from)?;

    let user_read = persistence::db_user_driven_ports::DbReadUsers;
    let hasher = credentials::Argon2PasswordHasher;
    let auth_result = user_service
        .authenticate(&login_request.email, &login_request.password, &mut *ext_cxn, &user_read, &hasher)
        .await;
    let user = match auth_result {
        Ok(user) => user,
        Err(AuthenticateError::InvalidCredentials) => {
            info!("Rejected login attempt");
            return Err(PlainErrorResponse::InvalidCredentials.into());
        }
        Err(AuthenticateError::PortError(port_err)) => {
            error!("Failed to check credentials: {port_err}");
            return Err(GenericErrorResponse(port_err).into());
        }
    };

    let session_store = persistence::db_session_driven_ports::DbSessionStore;
    let session = session_service
        .open_session(user.id, session_config.lifetime(), &mut *ext_cxn, &session_store)
        .await
        .map_err(|port_err| {
            error!("Failed to open session for user {}: {port_err}", user.id);
            GenericErrorResponse(port_err)
        })?;

    info!(user_id = user.id, expires_at = %session.expires_at, "User logged in");
    let jar = jar.add(session_cookie(session_config, session.token));
    Ok((jar, Json(dto::User::from(user))))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = AUTH_API_GROUP,
    responses(
        (status = 204, description = "Session ended and cookie cleared. Succeeds without a session too."),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Ends the caller's session, if any
async fn logout(
    jar: CookieJar,
    session_config: &SessionConfig,
    ext_cxn: &mut impl ExternalConnectivity,
    session_service: &impl SessionPort,
) -> Result<(CookieJar, StatusCode), ErrorResponse> {
    if let Some(token) = jar.get(&session_config.cookie_name).map(|cookie| cookie.value().to_owned()) {
        let session_store = persistence::db_session_driven_ports::DbSessionStore;
        session_service
            .close_session(&token, &mut *ext_cxn, &session_store)
            .await
            .map_err(|port_err| {
                error!("Failed to close session: {port_err}");
                GenericErrorResponse(port_err)
            })?;
    }

    let removal = Cookie::build((session_config.cookie_name.clone(), "")).path("/");
    Ok((jar.remove(removal), StatusCode::NO_CONTENT))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = AUTH_API_GROUP,
    responses(
        (status = 200, description = "The logged in user", body = dto::User),
        (status = 401, response = BasicErrorResponse),
    ),
)]
/// Returns the user the session belongs to
fn me(user: domain::user::User) -> Json<dto::User> {
    Json(dto::User::from(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_util::{deserialize_body, expect_error, set_cookies};
    use crate::domain::session::IssuedSession;
    use crate::domain::session::test_util::MockSessionService;
    use crate::domain::user::test_util::{MockUserService, new_user_default, user_from_new};
    use crate::external_connections;
    use anyhow::anyhow;
    use axum::http::{HeaderMap, header};
    use axum::response::IntoResponse;
    use chrono::{Duration, Utc};
    use speculoos::prelude::*;
    use std::sync::Mutex;

    fn register_dto() -> dto::RegisterUser {
        let new_user = new_user_default();
        dto::RegisterUser {
            email: new_user.email,
            password: new_user.password,
            display_name: new_user.display_name,
        }
    }

    fn login_dto() -> dto::LoginRequest {
        dto::LoginRequest {
            email: "first@example.com".to_owned(),
            password: "hunter22".to_owned(),
        }
    }

    fn jar_with_session(token: &str) -> CookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            format!("board_session={token}").parse().expect("invalid cookie header"),
        );
        CookieJar::from_headers(&headers)
    }

    mod register {
        use super::*;

        #[tokio::test]
        async fn happy_path() {
            let mut user_service_raw = MockUserService::new();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            user_service_raw
                .register_result
                .set_returned_result(Ok(user_from_new(&new_user_default(), 7)));
            let user_service = Mutex::new(user_service_raw);

            let response = register(register_dto(), &mut ext_cxn, &user_service).await.into_response();
            assert_eq!(StatusCode::CREATED, response.status());
            let body: dto::User = deserialize_body(response.into_body()).await;
            assert_eq!(7, body.id);
            assert_eq!("First Last", body.display_name);

            let locked_service = user_service.lock().expect("user service mutex poisoned");
            assert!(matches!(
                locked_service.register_result.calls(),
                [domain::user::NewUser { email, .. }] if email == "first@example.com"
            ));
        }

        #[tokio::test]
        async fn taken_email_is_conflict() {
            let mut user_service_raw = MockUserService::new();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            user_service_raw
                .register_result
                .set_returned_result(Err(RegisterError::EmailTaken));
            let user_service = Mutex::new(user_service_raw);

            let response = register(register_dto(), &mut ext_cxn, &user_service).await.into_response();
            let body = expect_error(response, StatusCode::CONFLICT).await;
            assert_eq!("email_taken", body.error_code);
        }

        #[tokio::test]
        async fn short_password_is_rejected_before_service() {
            let user_service = Mutex::new(MockUserService::new());
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let response = register(
                dto::RegisterUser {
                    password: "short".to_owned(),
                    ..register_dto()
                },
                &mut ext_cxn,
                &user_service,
            )
            .await
            .into_response();
            let body = expect_error(response, StatusCode::BAD_REQUEST).await;
            assert_eq!("invalid_input", body.error_code);

            let locked_service = user_service.lock().expect("user service mutex poisoned");
            assert!(locked_service.register_result.calls().is_empty());
        }

        #[tokio::test]
        async fn port_failure_is_internal_error() {
            let mut user_service_raw = MockUserService::new();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            user_service_raw
                .register_result
                .set_returned_result(Err(RegisterError::PortError(anyhow!("no database"))));
            let user_service = Mutex::new(user_service_raw);

            let response = register(register_dto(), &mut ext_cxn, &user_service).await.into_response();
            let body = expect_error(response, StatusCode::INTERNAL_SERVER_ERROR).await;
            assert_eq!("internal_error", body.error_code);
        }
    }

    mod login {
        use super::*;

        #[tokio::test]
        async fn sets_session_cookie() {
            let mut user_service_raw = MockUserService::new();
            let mut session_service_raw = MockSessionService::new();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            user_service_raw
                .authenticate_result
                .set_returned_result(Ok(user_from_new(&new_user_default(), 3)));
            session_service_raw
                .open_session_result
                .set_returned_anyhow(Ok(IssuedSession {
                    token: "token-abc".to_owned(),
                    user_id: 3,
                    expires_at: Utc::now() + Duration::hours(168),
                }));
            let user_service = Mutex::new(user_service_raw);
            let session_service = Mutex::new(session_service_raw);

            let response = login(
                login_dto(),
                CookieJar::new(),
                &SessionConfig::default(),
                &mut ext_cxn,
                &user_service,
                &session_service,
            )
            .await
            .into_response();
            assert_eq!(StatusCode::OK, response.status());

            let cookies = set_cookies(&response);
            assert_that!(cookies).has_length(1);
            let cookie = &cookies[0];
            assert!(cookie.starts_with("board_session=token-abc"));
            assert!(cookie.contains("HttpOnly"));
            assert!(cookie.contains("SameSite=Lax"));
            assert!(cookie.contains("Path=/"));
            assert!(!cookie.contains("Secure"));

            let body: dto::User = deserialize_body(response.into_body()).await;
            assert_eq!(3, body.id);

            let locked_sessions = session_service.lock().expect("session service mutex poisoned");
            assert_eq!([(3, Duration::hours(168))], locked_sessions.open_session_result.calls());
        }

        #[tokio::test]
        async fn secure_flag_follows_config() {
            let mut user_service_raw = MockUserService::new();
            let mut session_service_raw = MockSessionService::new();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            user_service_raw
                .authenticate_result
                .set_returned_result(Ok(user_from_new(&new_user_default(), 3)));
            session_service_raw
                .open_session_result
                .set_returned_anyhow(Ok(IssuedSession {
                    token: "token-abc".to_owned(),
                    user_id: 3,
                    expires_at: Utc::now(),
                }));
            let session_config = SessionConfig {
                secure_cookie: true,
                ..SessionConfig::default()
            };

            let response = login(
                login_dto(),
                CookieJar::new(),
                &session_config,
                &mut ext_cxn,
                &Mutex::new(user_service_raw),
                &Mutex::new(session_service_raw),
            )
            .await
            .into_response();

            let cookies = set_cookies(&response);
            assert!(cookies[0].contains("Secure"));
        }

        #[tokio::test]
        async fn bad_credentials_are_unauthorized_without_session() {
            let mut user_service_raw = MockUserService::new();
            let session_service = Mutex::new(MockSessionService::new());
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            user_service_raw
                .authenticate_result
                .set_returned_result(Err(AuthenticateError::InvalidCredentials));

            let response = login(
                login_dto(),
                CookieJar::new(),
                &SessionConfig::default(),
                &mut ext_cxn,
                &Mutex::new(user_service_raw),
                &session_service,
            )
            .await
            .into_response();
            assert!(set_cookies(&response).is_empty());
            let body = expect_error(response, StatusCode::UNAUTHORIZED).await;
            assert_eq!("invalid_credentials", body.error_code);

            let locked_sessions = session_service.lock().expect("session service mutex poisoned");
            assert!(locked_sessions.open_session_result.calls().is_empty());
        }

        #[tokio::test]
        async fn failed_session_creation_is_internal_error() {
            let mut user_service_raw = MockUserService::new();
            let mut session_service_raw = MockSessionService::new();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            user_service_raw
                .authenticate_result
                .set_returned_result(Ok(user_from_new(&new_user_default(), 3)));
            session_service_raw
                .open_session_result
                .set_returned_anyhow(Err(anyhow!("insert failed")));

            let response = login(
                login_dto(),
                CookieJar::new(),
                &SessionConfig::default(),
                &mut ext_cxn,
                &Mutex::new(user_service_raw),
                &Mutex::new(session_service_raw),
            )
            .await
            .into_response();
            let body = expect_error(response, StatusCode::INTERNAL_SERVER_ERROR).await;
            assert_eq!("internal_error", body.error_code);
        }
    }

    mod logout {
        use super::*;

        #[tokio::test]
        async fn closes_session_and_clears_cookie() {
            let mut session_service_raw = MockSessionService::new();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            session_service_raw.close_session_result.set_returned_anyhow(Ok(()));
            let session_service = Mutex::new(session_service_raw);

            let response = logout(
                jar_with_session("token-abc"),
                &SessionConfig::default(),
                &mut ext_cxn,
                &session_service,
            )
            .await
            .into_response();
            assert_eq!(StatusCode::NO_CONTENT, response.status());

            let cookies = set_cookies(&response);
            assert_that!(cookies).has_length(1);
            assert!(cookies[0].starts_with("board_session="));
            assert!(cookies[0].contains("Max-Age=0"));

            let locked_sessions = session_service.lock().expect("session service mutex poisoned");
            assert_eq!(["token-abc".to_owned()], locked_sessions.close_session_result.calls());
        }

        #[tokio::test]
        async fn succeeds_without_a_session() {
            let session_service = Mutex::new(MockSessionService::new());
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let response = logout(CookieJar::new(), &SessionConfig::default(), &mut ext_cxn, &session_service)
                .await
                .into_response();
            assert_eq!(StatusCode::NO_CONTENT, response.status());

            let locked_sessions = session_service.lock().expect("session service mutex poisoned");
            assert!(locked_sessions.close_session_result.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn me_returns_session_user() {
        let user = user_from_new(&new_user_default(), 9);

        let response = me(user).into_response();
        assert_eq!(StatusCode::OK, response.status());
        let body: dto::User = deserialize_body(response.into_body()).await;
        assert_eq!(9, body.id);
        assert_eq!("first@example.com", body.email);
    }
}
