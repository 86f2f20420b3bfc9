use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use serde_json::Value;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{LibError, Result};
use crate::models::{
    ConfigurationId, ConfigurationRecord, NewUserAccount, ProfileUpdate, UserAccount, UserId,
    Verdict,
};
use crate::store::{self, AccountStore, ConfigurationStore};

pub static MIGRATOR: Lazy<Migrator> = Lazy::new(|| {
    let mut migrator = sqlx::migrate!("./migrations");
    migrator.set_ignore_missing(true);
    migrator
});

/// Serializes configuration inserts so `created_at` stays monotonic.
const CONFIGURATION_INSERT_LOCK: i64 = 0x6772_6170_6863_6667;

pub async fn create_tables(pool: &PgPool) -> std::result::Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[derive(Debug, Clone, FromRow)]
struct ConfigurationRow {
    id: i64,
    name: String,
    is_acyclic: bool,
    created_at: DateTime<Utc>,
    configuration: Value,
}

impl From<ConfigurationRow> for ConfigurationRecord {
    fn from(value: ConfigurationRow) -> Self {
        Self {
            id: ConfigurationId(value.id),
            name: value.name,
            is_acyclic: value.is_acyclic,
            created_at: value.created_at,
            configuration: value.configuration,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    address: Option<String>,
    about: Option<String>,
    birthdate: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for UserAccount {
    fn from(value: UserRow) -> Self {
        Self {
            id: UserId(value.id),
            email: value.email,
            password_hash: value.password_hash,
            address: value.address,
            about: value.about,
            birthdate: value.birthdate,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

fn db_err(public: &'static str, err: sqlx::Error) -> LibError {
    LibError::database(public, anyhow!(err))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[derive(Debug, Clone)]
pub struct PgConfigurationStore {
    pool: PgPool,
}

impl PgConfigurationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigurationStore for PgConfigurationStore {
    async fn store(
        &self,
        name: &str,
        verdict: Verdict,
        configuration: &Value,
    ) -> Result<ConfigurationRecord> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| db_err("Failed to start transaction", err))?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(CONFIGURATION_INSERT_LOCK)
            .execute(&mut *tx)
            .await
            .map_err(|err| db_err("Failed to lock configuration log", err))?;

        let row = sqlx::query_as::<_, ConfigurationRow>(
            r#"
            INSERT INTO graph_config.configurations (name, is_acyclic, created_at, configuration)
            SELECT $1, $2, GREATEST(clock_timestamp(), COALESCE(MAX(created_at), '-infinity')), $3
            FROM graph_config.configurations
            RETURNING id, name, is_acyclic, created_at, configuration
            "#,
        )
        .bind(name)
        .bind(verdict.is_acyclic)
        .bind(configuration)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| db_err("Error storing graph configuration", err))?;

        tx.commit()
            .await
            .map_err(|err| db_err("Failed to commit transaction", err))?;

        Ok(row.into())
    }

    async fn fetch_latest(&self) -> Result<ConfigurationRecord> {
        let row = sqlx::query_as::<_, ConfigurationRow>(
            r#"
            SELECT id, name, is_acyclic, created_at, configuration
            FROM graph_config.configurations
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| db_err("Failed to query graph configurations", err))?;

        row.map(ConfigurationRecord::from)
            .ok_or_else(store::no_configurations)
    }
}

#[derive(Debug, Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, address, about, birthdate, created_at, updated_at
            FROM graph_config.user_profiles
            WHERE email = $1
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| db_err("Failed to query user", err))?;

        Ok(row.map(UserAccount::from))
    }

    async fn insert(&self, account: NewUserAccount) -> Result<UserAccount> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO graph_config.user_profiles (
                id,
                email,
                password_hash,
                address,
                about,
                birthdate,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, CURRENT_TIMESTAMP)
            RETURNING id, email, password_hash, address, about, birthdate, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.address)
        .bind(&account.about)
        .bind(account.birthdate)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                store::duplicate_email(&account.email)
            } else {
                db_err("Error registering user", err)
            }
        })?;

        Ok(row.into())
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<UserAccount> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE graph_config.user_profiles
            SET address = COALESCE($1, address),
                about = COALESCE($2, about),
                birthdate = COALESCE($3, birthdate),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $4
            RETURNING id, email, password_hash, address, about, birthdate, created_at, updated_at
            "#,
        )
        .bind(&update.address)
        .bind(&update.about)
        .bind(update.birthdate)
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| db_err("Error updating profile", err))?;

        row.map(UserAccount::from)
            .ok_or_else(|| store::missing_user(user_id))
    }

    async fn list(&self) -> Result<Vec<UserAccount>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, address, about, birthdate, created_at, updated_at
            FROM graph_config.user_profiles
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|err| db_err("Error retrieving user data", err))?;

        Ok(rows.into_iter().map(UserAccount::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};
    use serde_json::json;
    use sqlx::PgPool;
    use sqlx::postgres::PgPoolOptions;

    use super::{PgConfigurationStore, create_tables};
    use crate::models::Verdict;
    use crate::store::ConfigurationStore;

    /// Runs against `DATABASE_URL` when it is set; skipped otherwise.
    async fn test_pool() -> Option<PgPool> {
        let database_url = std::env::var("DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&database_url)
            .await
            .expect("DATABASE_URL should be reachable");
        create_tables(&pool).await.expect("migrations should apply");
        Some(pool)
    }

    #[tokio::test]
    async fn pg_store_keeps_timestamps_monotonic_and_breaks_ties_by_id() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let store = PgConfigurationStore::new(pool.clone());

        let ahead = Utc::now() + Duration::hours(1);
        let (ahead_id, ahead_at): (i64, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO graph_config.configurations (name, is_acyclic, created_at, configuration)
            VALUES ('clock-ahead', TRUE, $1, '{"nodes": [], "edges": []}')
            RETURNING id, created_at
            "#,
        )
        .bind(ahead)
        .fetch_one(&pool)
        .await
        .expect("seed row");

        let configuration = json!({
            "nodes": [{"id": "A"}],
            "edges": [{"source": "A", "target": "A"}]
        });
        let first = store
            .store("after-ahead", Verdict { is_acyclic: false }, &configuration)
            .await
            .expect("store first");
        let second = store
            .store("after-first", Verdict { is_acyclic: true }, &configuration)
            .await
            .expect("store second");

        assert!(first.id.0 > ahead_id);
        assert!(first.created_at >= ahead_at);
        assert!(second.created_at >= first.created_at);
        assert!(second.id > first.id);
        assert_eq!(first.configuration, configuration);

        let latest = store.fetch_latest().await.expect("latest exists");
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.name, "after-first");

        sqlx::query("DELETE FROM graph_config.configurations WHERE id = ANY($1)")
            .bind(vec![ahead_id, first.id.0, second.id.0])
            .execute(&pool)
            .await
            .expect("cleanup");
    }
}
