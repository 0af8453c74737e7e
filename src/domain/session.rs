//! Login sessions. The client holds a random token; only its SHA-256 digest is stored, so a
//! leaked sessions table can't be replayed as cookies.

use crate::domain::session::driven_ports::SessionStore;
use crate::domain::user::User;
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

/// A session as handed to the client. `token` only exists in memory and in the cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    pub token: String,
    pub user_id: i32,
    pub expires_at: DateTime<Utc>,
}

/// A session as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub token_digest: String,
    pub user_id: i32,
    pub expires_at: DateTime<Utc>,
}

pub fn digest_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

pub mod driven_ports {
    use super::*;

    pub trait SessionStore: Sync {
        async fn insert_session(
            &self,
            session: &StoredSession,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;

        /// The owner of an unexpired session with the given digest
        async fn user_for_session(
            &self,
            token_digest: &str,
            now: DateTime<Utc>,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<User>, anyhow::Error>;

        async fn delete_session(
            &self,
            token_digest: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;

        /// Returns how many sessions were purged
        async fn delete_expired_sessions(
            &self,
            now: DateTime<Utc>,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<u64, anyhow::Error>;
    }
}

pub mod driving_ports {
    use super::*;

    pub trait SessionPort {
        async fn open_session(
            &self,
            user_id: i32,
            lifetime: Duration,
            ext_cxn: &mut impl ExternalConnectivity,
            store: &impl SessionStore,
        ) -> Result<IssuedSession, anyhow::Error>;

        async fn resolve_session(
            &self,
            token: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            store: &impl SessionStore,
        ) -> Result<Option<User>, anyhow::Error>;

        async fn close_session(
            &self,
            token: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            store: &impl SessionStore,
        ) -> Result<(), anyhow::Error>;
    }
}

pub struct SessionService {}

impl driving_ports::SessionPort for SessionService {
    async fn open_session(
        &self,
        user_id: i32,
        lifetime: Duration,
        ext_cxn: &mut impl ExternalConnectivity,
        store: &impl SessionStore,
    ) -> Result<IssuedSession, anyhow::Error> {
        let now = Utc::now();
        let purged = store
            .delete_expired_sessions(now, &mut *ext_cxn)
            .await
            .context("purging expired sessions")?;
        if purged > 0 {
            debug!(purged, "purged expired sessions");
        }

        let token = Uuid::new_v4().simple().to_string();
        let expires_at = now
            .checked_add_signed(lifetime)
            .context("session lifetime runs past the end of the calendar")?;
        store
            .insert_session(
                &StoredSession {
                    token_digest: digest_token(&token),
                    user_id,
                    expires_at,
                },
                &mut *ext_cxn,
            )
            .await
            .context("storing a new session")?;

        info!(user_id, %expires_at, "opened session");
        Ok(IssuedSession {
            token,
            user_id,
            expires_at,
        })
    }

    async fn resolve_session(
        &self,
        token: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        store: &impl SessionStore,
    ) -> Result<Option<User>, anyhow::Error> {
        store
            .user_for_session(&digest_token(token), Utc::now(), ext_cxn)
            .await
            .context("resolving a session token")
    }

    async fn close_session(
        &self,
        token: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        store: &impl SessionStore,
    ) -> Result<(), anyhow::Error> {
        store
            .delete_session(&digest_token(token), ext_cxn)
            .await
            .context("deleting a session")
    }
}
