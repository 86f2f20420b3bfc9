//! Persistence seams for configurations and accounts.
//!
//! [`ConfigurationStore`] and [`AccountStore`] are implemented twice: by the
//! Postgres backends in [`crate::db`] and by the in-memory backends here, which
//! keep the same ordering and atomicity guarantees for tests and local runs.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{LibError, Result};
use crate::models::{
    ConfigurationId, ConfigurationRecord, NewUserAccount, ProfileUpdate, UserAccount, UserId,
    Verdict,
};

#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    /// Appends a record. `created_at` is never earlier than any timestamp this
    /// store handed out before.
    async fn store(
        &self,
        name: &str,
        verdict: Verdict,
        configuration: &Value,
    ) -> Result<ConfigurationRecord>;

    /// The record with the greatest `created_at`; equal timestamps resolve to
    /// the highest id.
    async fn fetch_latest(&self) -> Result<ConfigurationRecord>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>>;

    /// Fails with a conflict when the email is already registered.
    async fn insert(&self, account: NewUserAccount) -> Result<UserAccount>;

    async fn update_profile(&self, user_id: UserId, update: &ProfileUpdate)
    -> Result<UserAccount>;

    async fn list(&self) -> Result<Vec<UserAccount>>;
}

pub(crate) fn no_configurations() -> LibError {
    LibError::not_found(
        "No configurations found",
        anyhow!("configuration store is empty"),
    )
}

pub(crate) fn duplicate_email(email: &str) -> LibError {
    LibError::conflict(
        "An account with this email already exists",
        anyhow!("email {} already registered", email),
    )
}

pub(crate) fn missing_user(user_id: UserId) -> LibError {
    LibError::not_found("User not found", anyhow!("user {} not found", user_id))
}

#[derive(Debug, Default)]
struct ConfigurationLog {
    records: Vec<ConfigurationRecord>,
    next_id: i64,
    last_created_at: Option<DateTime<Utc>>,
}

/// Append-only configuration log behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryConfigurationStore {
    log: Mutex<ConfigurationLog>,
}

impl MemoryConfigurationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.log.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert_at(
        &self,
        name: &str,
        verdict: Verdict,
        configuration: &Value,
        now: DateTime<Utc>,
    ) -> ConfigurationRecord {
        let mut log = self.log.lock();
        let created_at = log.last_created_at.map_or(now, |last| last.max(now));
        log.next_id += 1;
        let record = ConfigurationRecord {
            id: ConfigurationId(log.next_id),
            name: name.to_string(),
            is_acyclic: verdict.is_acyclic,
            created_at,
            configuration: configuration.clone(),
        };
        log.last_created_at = Some(created_at);
        log.records.push(record.clone());
        record
    }
}

#[async_trait]
impl ConfigurationStore for MemoryConfigurationStore {
    async fn store(
        &self,
        name: &str,
        verdict: Verdict,
        configuration: &Value,
    ) -> Result<ConfigurationRecord> {
        Ok(self.insert_at(name, verdict, configuration, Utc::now()))
    }

    async fn fetch_latest(&self) -> Result<ConfigurationRecord> {
        self.log
            .lock()
            .records
            .iter()
            .max_by_key(|record| (record.created_at, record.id))
            .cloned()
            .ok_or_else(no_configurations)
    }
}

#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<Vec<UserAccount>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>> {
        Ok(self
            .accounts
            .lock()
            .iter()
            .find(|account| account.email == email)
            .cloned())
    }

    async fn insert(&self, account: NewUserAccount) -> Result<UserAccount> {
        let mut accounts = self.accounts.lock();
        if accounts.iter().any(|existing| existing.email == account.email) {
            return Err(duplicate_email(&account.email));
        }

        let now = Utc::now();
        let stored = UserAccount {
            id: UserId(Uuid::new_v4()),
            email: account.email,
            password_hash: account.password_hash,
            address: account.address,
            about: account.about,
            birthdate: account.birthdate,
            created_at: now,
            updated_at: Some(now),
        };
        accounts.push(stored.clone());
        Ok(stored)
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<UserAccount> {
        let mut accounts = self.accounts.lock();
        let account = accounts
            .iter_mut()
            .find(|account| account.id == user_id)
            .ok_or_else(|| missing_user(user_id))?;

        if let Some(address) = &update.address {
            account.address = Some(address.clone());
        }
        if let Some(about) = &update.about {
            account.about = Some(about.clone());
        }
        if let Some(birthdate) = update.birthdate {
            account.birthdate = Some(birthdate);
        }
        account.updated_at = Some(Utc::now());
        Ok(account.clone())
    }

    async fn list(&self) -> Result<Vec<UserAccount>> {
        Ok(self.accounts.lock().clone())
    }
}
