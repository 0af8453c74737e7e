use super::Count;
use crate::domain;
use crate::domain::user::{CreateUser, User, UserCredentials};
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, query_as};

pub struct DbDetectUser;

impl domain::user::driven_ports::DetectUser for DbDetectUser {
    async fn user_with_email_exists(
        &self,
        email: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let mut connection = ext_cxn.database_cxn().await?;

        let users_with_email = query_as::<_, Count>(
            "SELECT count(*) AS count FROM board_user bu WHERE bu.email = $1",
        )
        .bind(email)
        .fetch_one(connection.borrow_connection())
        .await
        .context("Detecting user with email")?;

        Ok(users_with_email.count() > 0)
    }
}

#[derive(FromRow)]
struct BoardUserRow {
    id: i32,
    email: String,
    display_name: String,
    created_at: DateTime<Utc>,
}

impl From<BoardUserRow> for User {
    fn from(value: BoardUserRow) -> Self {
        User {
            id: value.id,
            email: value.email,
            display_name: value.display_name,
            created_at: value.created_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    user: BoardUserRow,
    password_hash: String,
}

pub struct DbReadUsers;

impl domain::user::driven_ports::UserReader for DbReadUsers {
    async fn credentials_by_email(
        &self,
        email: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<UserCredentials>, Error> {
        let mut cxn_handle = ext_cxn.database_cxn().await?;

        let credentials = query_as::<_, CredentialsRow>(
            "SELECT bu.id, bu.email, bu.display_name, bu.created_at, bu.password_hash \
             FROM board_user bu WHERE bu.email = $1",
        )
        .bind(email)
        .fetch_optional(cxn_handle.borrow_connection())
        .await
        .context("Fetching login credentials by email")?;

        Ok(credentials.map(|row| UserCredentials {
            user: User::from(row.user),
            password_hash: row.password_hash,
        }))
    }
}

pub struct DbWriteUsers;

impl domain::user::driven_ports::UserWriter for DbWriteUsers {
    async fn create_user(
        &self,
        user: &CreateUser,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<User>, Error> {
        let mut cxn_handle = ext_cxn.database_cxn().await?;

        let created = query_as::<_, BoardUserRow>(
            "INSERT INTO board_user(email, display_name, password_hash) VALUES ($1, $2, $3) \
             ON CONFLICT (email) DO NOTHING \
             RETURNING id, email, display_name, created_at",
        )
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .fetch_optional(cxn_handle.borrow_connection())
        .await
        .context("Inserting new user")?;

        Ok(created.map(User::from))
    }
}
