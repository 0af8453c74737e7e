use crate::domain::user::driven_ports::{DetectUser, PasswordHasher, UserReader, UserWriter};
use crate::domain::user::driving_ports::{AuthenticateError, RegisterError};
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// A user along with the stored hash of their password
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Registration request as received from the outside world, password still in plain text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

/// What actually gets stored for a new user
pub struct CreateUser {
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
}

/// Emails are compared case-insensitively, so they're stored lower-cased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub mod driven_ports {
    use super::*;

    pub trait UserReader: Sync {
        async fn credentials_by_email(
            &self,
            email: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<UserCredentials>, anyhow::Error>;
    }

    pub trait UserWriter: Sync {
        /// Stores the user, returning None if the email was claimed in the meantime
        async fn create_user(
            &self,
            user: &CreateUser,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<User>, anyhow::Error>;
    }

    pub trait DetectUser: Sync {
        async fn user_with_email_exists(
            &self,
            email: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error>;
    }

    /// One-way password hashing
    pub trait PasswordHasher: Sync {
        async fn hash_password(&self, password: &str) -> Result<String, anyhow::Error>;

        async fn verify_password(
            &self,
            password: &str,
            password_hash: &str,
        ) -> Result<bool, anyhow::Error>;
    }
}

pub mod driving_ports {
    use super::*;

    #[derive(Debug, Error)]
    pub enum RegisterError {
        #[error("a user with that email already exists")]
        EmailTaken,
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    #[derive(Debug, Error)]
    pub enum AuthenticateError {
        #[error("the email or password was incorrect")]
        InvalidCredentials,
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }


    pub trait UserPort {
        async fn register(
            &self,
            new_user: NewUser,
            ext_cxn: &mut impl ExternalConnectivity,
            u_detect: &impl DetectUser,
            u_write: &impl UserWriter,
            hasher: &impl PasswordHasher,
        ) -> Result<User, RegisterError>;

        async fn authenticate(
            &self,
            email: &str,
            password: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            u_read: &impl UserReader,
            hasher: &impl PasswordHasher,
        ) -> Result<User, AuthenticateError>;
    }
}

pub struct UserService {}

impl driving_ports::UserPort for UserService {
    async fn register(
        &self,
        new_user: NewUser,
        ext_cxn: &mut impl ExternalConnectivity,
        u_detect: &impl DetectUser,
        u_write: &impl UserWriter,
        hasher: &impl PasswordHasher,
    ) -> Result<User, RegisterError> {
        let email = normalize_email(&new_user.email);
        let email_taken = u_detect
            .user_with_email_exists(&email, &mut *ext_cxn)
            .await
            .context("checking for an existing account")?;
        if email_taken {
            return Err(RegisterError::EmailTaken);
        }

        let password_hash = hasher
            .hash_password(&new_user.password)
            .await
            .context("hashing a new password")?;
        let created = u_write
            .create_user(
                &CreateUser {
                    email,
                    password_hash,
                    display_name: new_user.display_name.trim().to_owned(),
                },
                &mut *ext_cxn,
            )
            .await
            .context("storing a new user")?
            .ok_or(RegisterError::EmailTaken)?;

        info!(user_id = created.id, "registered user");
        Ok(created)
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        u_read: &impl UserReader,
        hasher: &impl PasswordHasher,
    ) -> Result<User, AuthenticateError> {
        let Some(credentials) = u_read
            .credentials_by_email(&normalize_email(email), &mut *ext_cxn)
            .await
            .context("looking up login credentials")?
        else {
            warn!("login attempt for unknown email");
            // Unknown emails cost the same argon2 work as wrong passwords
            hasher
                .hash_password(password)
                .await
                .context("hashing a password for an unknown email")?;
            return Err(AuthenticateError::InvalidCredentials);
        };

        let password_matches = hasher
            .verify_password(password, &credentials.password_hash)
            .await
            .context("verifying a password")?;
        if !password_matches {
            warn!(user_id = credentials.user.id, "login attempt with wrong password");
            return Err(AuthenticateError::InvalidCredentials);
        }

        Ok(credentials.user)
    }
}
