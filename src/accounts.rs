use std::sync::Arc;

use anyhow::anyhow;
use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

use crate::error::{LibError, Result};
use crate::models::{
    LoginResponse, NewUserAccount, RegisterResponse, UserProfile, UserProfileInput,
};
use crate::store::AccountStore;

/// Hashes `password` into a PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| LibError::unknown("Failed to hash password", anyhow!("{}", err)))
}

/// A malformed stored hash is an error, not a failed match.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|err| {
        LibError::unknown("Stored password hash is invalid", anyhow!("{}", err))
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Clone)]
pub struct AccountOperations {
    store: Arc<dyn AccountStore>,
}

impl AccountOperations {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Logs in when the email is known, registers otherwise.
    pub async fn register(&self, input: UserProfileInput) -> Result<RegisterResponse> {
        let (email, password) = input.credentials()?;

        if let Some(existing) = self.store.find_by_email(&email).await? {
            if !verify_password(password, &existing.password_hash)? {
                return Err(LibError::unauthorized(
                    "Incorrect password for existing account",
                    anyhow!("password mismatch for {}", existing.id),
                ));
            }
            tracing::info!(user_id = %existing.id, "existing user logged in via register");
            return Ok(RegisterResponse::new(
                "User logged in successfully",
                &existing,
            ));
        }

        let profile = input.profile_update();
        let account = self
            .store
            .insert(NewUserAccount {
                email,
                password_hash: hash_password(password)?,
                address: profile.address,
                about: profile.about,
                birthdate: profile.birthdate,
            })
            .await?;
        tracing::info!(user_id = %account.id, "registered user");
        Ok(RegisterResponse::new(
            "User registered successfully",
            &account,
        ))
    }

    pub async fn login_and_update_profile(&self, input: UserProfileInput) -> Result<LoginResponse> {
        let (email, password) = input.credentials()?;

        let Some(existing) = self.store.find_by_email(&email).await? else {
            return Err(LibError::not_found(
                "User not found",
                anyhow!("no account for {}", email),
            ));
        };
        if !verify_password(password, &existing.password_hash)? {
            return Err(LibError::unauthorized(
                "Incorrect password",
                anyhow!("password mismatch for {}", existing.id),
            ));
        }

        let update = input.profile_update();
        if update.is_empty() {
            return Ok(LoginResponse {
                message: "Login successful",
                user_id: existing.id,
                updated_at: existing.updated_at,
            });
        }

        let updated = self.store.update_profile(existing.id, &update).await?;
        tracing::info!(user_id = %updated.id, "updated user profile");
        Ok(LoginResponse {
            message: "Login successful and profile updated",
            user_id: updated.id,
            updated_at: updated.updated_at,
        })
    }

    pub async fn list_users(&self) -> Result<Vec<UserProfile>> {
        let accounts = self.store.list().await?;
        if accounts.is_empty() {
            return Err(LibError::not_found(
                "No users found in the database.",
                anyhow!("user table is empty"),
            ));
        }
        Ok(accounts.iter().map(UserProfile::from).collect())
    }
}
