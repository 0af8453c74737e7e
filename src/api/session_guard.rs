use crate::domain::session::driving_ports::SessionPort;
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{GenericErrorResponse, PlainErrorResponse};
use crate::{SharedData, domain, persistence};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use tracing::{debug, error};

/// The user whose session cookie came with the request. Extracting this rejects the request
/// with a 401 before the handler body runs if there's no live session.
pub struct SessionUser(pub domain::user::User);

#[async_trait]
impl FromRequestParts<Arc<SharedData>> for SessionUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<SharedData>,
    ) -> Result<Self, Self::Rejection> {
        let mut ext_cxn = state.ext_cxn.clone();
        let session_service = domain::session::SessionService {};

        resolve_session_user(
            &parts.headers,
            &state.session.cookie_name,
            &mut ext_cxn,
            &session_service,
        )
        .await
        .map(SessionUser)
    }
}

/// Reads the session token out of the request cookies, if there is one
fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|cookie| cookie.value().to_owned())
        .filter(|token| !token.is_empty())
}

/// Looks up the user behind the request's session cookie
async fn resolve_session_user(
    headers: &HeaderMap,
    cookie_name: &str,
    ext_cxn: &mut impl ExternalConnectivity,
    session_service: &impl SessionPort,
) -> Result<domain::user::User, Response> {
    let Some(token) = session_token(headers, cookie_name) else {
        debug!("Request had no session cookie");
        return Err(PlainErrorResponse::Unauthorized.into_response());
    };
    let session_store = persistence::db_session_driven_ports::DbSessionStore;

    let resolve_result = session_service
        .resolve_session(&token, &mut *ext_cxn, &session_store)
        .await;
    match resolve_result {
        Ok(Some(user)) => Ok(user),
        Ok(None) => {
            debug!("Session cookie did not match a live session");
            Err(PlainErrorResponse::Unauthorized.into_response())
        }
        Err(port_err) => {
            error!("Failed to resolve session: {port_err}");
            Err(GenericErrorResponse(port_err).into_response())
        }
    }
}
