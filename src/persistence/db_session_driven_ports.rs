use crate::domain;
use crate::domain::session::StoredSession;
use crate::domain::user::User;
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, query, query_as};

pub struct DbSessionStore;

#[derive(FromRow)]
struct SessionUserRow {
    id: i32,
    email: String,
    display_name: String,
    created_at: DateTime<Utc>,
}

impl domain::session::driven_ports::SessionStore for DbSessionStore {
    async fn insert_session(
        &self,
        session: &StoredSession,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        query("INSERT INTO user_session(token_digest, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.token_digest)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(cxn.borrow_connection())
            .await
            .context("trying to store a new session")?;

        Ok(())
    }

    async fn user_for_session(
        &self,
        token_digest: &str,
        now: DateTime<Utc>,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<User>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let user = query_as::<_, SessionUserRow>(
            "SELECT bu.id, bu.email, bu.display_name, bu.created_at \
             FROM user_session us JOIN board_user bu ON bu.id = us.user_id \
             WHERE us.token_digest = $1 AND us.expires_at > $2",
        )
        .bind(token_digest)
        .bind(now)
        .fetch_optional(cxn.borrow_connection())
        .await
        .context("trying to look up the owner of a session")?;

        Ok(user.map(|row| User {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            created_at: row.created_at,
        }))
    }

    async fn delete_session(
        &self,
        token_digest: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        query("DELETE FROM user_session WHERE token_digest = $1")
            .bind(token_digest)
            .execute(cxn.borrow_connection())
            .await
            .context("trying to remove a session")?;

        Ok(())
    }

    async fn delete_expired_sessions(
        &self,
        now: DateTime<Utc>,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<u64, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let result = query("DELETE FROM user_session WHERE expires_at <= $1")
            .bind(now)
            .execute(cxn.borrow_connection())
            .await
            .context("trying to purge expired sessions")?;

        Ok(result.rows_affected())
    }
}
