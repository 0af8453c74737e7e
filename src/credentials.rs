use crate::domain::user::driven_ports::PasswordHasher;
use anyhow::{Context, anyhow};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, PasswordHash, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Argon2id with the crate's default parameters. Hashing is CPU-bound, so it runs on the
/// blocking pool instead of stalling the request executor.
pub struct Argon2PasswordHasher;

impl PasswordHasher for Argon2PasswordHasher {
    async fn hash_password(&self, password: &str) -> Result<String, anyhow::Error> {
        let password = password.to_owned();
        let hashed = tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            password_hash::PasswordHasher::hash_password(
                &Argon2::default(),
                password.as_bytes(),
                &salt,
            )
            .map(|hash| hash.to_string())
        })
        .await
        .context("password hashing task did not finish")?;

        hashed.map_err(|err| anyhow!("could not hash password: {err}"))
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, anyhow::Error> {
        let password = password.to_owned();
        let password_hash = password_hash.to_owned();
        let verified = tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&password_hash)?;
            match Argon2::default().verify_password(password.as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(password_hash::Error::Password) => Ok(false),
                Err(err) => Err(err),
            }
        })
        .await
        .context("password verification task did not finish")?;

        verified.map_err(|err| anyhow!("stored password hash was unusable: {err}"))
    }
}
