use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use crate::accounts::AccountOperations;
use crate::error::{ErrorKind, LibError};
use crate::models::{SaveConfigurationPayload, SaveConfigurationResponse, UserProfileInput};
use crate::operations::ConfigOperations;
use crate::store::{AccountStore, ConfigurationStore, MemoryAccountStore, MemoryConfigurationStore};

#[derive(Debug)]
pub struct AppError(pub LibError);

impl From<LibError> for AppError {
    fn from(value: LibError) -> Self {
        Self(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.kind {
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Database => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(kind = ?self.0.kind, error = %self.0.source, "request failed");
        } else {
            tracing::warn!(kind = ?self.0.kind, error = %self.0.source, "request rejected");
        }
        (
            status,
            Json(json!({
                "error": {
                    "code": self.0.code,
                    "message": self.0.public
                }
            })),
        )
            .into_response()
    }
}

/// Turns an unreadable body into the same JSON error shape as every other failure.
fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    code: &'static str,
    public: &'static str,
) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| {
            AppError(LibError::invalid_with_code(code, public, anyhow!(rejection)))
        })
}

pub trait HasStores {
    fn configurations(&self) -> Arc<dyn ConfigurationStore>;
    fn accounts(&self) -> Arc<dyn AccountStore>;
}

#[derive(Clone)]
pub struct AppState {
    configurations: Arc<dyn ConfigurationStore>,
    accounts: Arc<dyn AccountStore>,
}

impl AppState {
    pub fn new(
        configurations: Arc<dyn ConfigurationStore>,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        Self {
            configurations,
            accounts,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryConfigurationStore::new()),
            Arc::new(MemoryAccountStore::new()),
        )
    }

    #[cfg(feature = "sqlx")]
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        use crate::db::{PgAccountStore, PgConfigurationStore};

        Self::new(
            Arc::new(PgConfigurationStore::new(pool.clone())),
            Arc::new(PgAccountStore::new(pool)),
        )
    }
}

impl HasStores for AppState {
    fn configurations(&self) -> Arc<dyn ConfigurationStore> {
        Arc::clone(&self.configurations)
    }

    fn accounts(&self) -> Arc<dyn AccountStore> {
        Arc::clone(&self.accounts)
    }
}

async fn save_config_handler<S>(
    State(app): State<S>,
    payload: Result<Json<SaveConfigurationPayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError>
where
    S: HasStores + Clone + Send + Sync + 'static,
{
    let payload = json_body(
        payload,
        "malformed_configuration",
        "Request body must be a JSON object with a name and a configuration",
    )?;
    let record = ConfigOperations::new(app.configurations())
        .save_configuration(payload)
        .await?;
    Ok(Json(SaveConfigurationResponse {
        message: "Graph configuration validated and stored successfully.",
        id: record.id,
        is_acyclic: record.is_acyclic,
    }))
}

async fn get_config_handler<S>(State(app): State<S>) -> Result<impl IntoResponse, AppError>
where
    S: HasStores + Clone + Send + Sync + 'static,
{
    let record = ConfigOperations::new(app.configurations())
        .latest_configuration()
        .await?;
    Ok(Json(record))
}

async fn register_handler<S>(
    State(app): State<S>,
    input: Result<Json<UserProfileInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError>
where
    S: HasStores + Clone + Send + Sync + 'static,
{
    let input = json_body(
        input,
        "invalid_input",
        "Request body must be a JSON object with an email and a password",
    )?;
    let response = AccountOperations::new(app.accounts())
        .register(input)
        .await?;
    Ok(Json(response))
}

async fn login_update_profile_handler<S>(
    State(app): State<S>,
    input: Result<Json<UserProfileInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError>
where
    S: HasStores + Clone + Send + Sync + 'static,
{
    let input = json_body(
        input,
        "invalid_input",
        "Request body must be a JSON object with an email and a password",
    )?;
    let response = AccountOperations::new(app.accounts())
        .login_and_update_profile(input)
        .await?;
    Ok(Json(response))
}

async fn list_users_handler<S>(State(app): State<S>) -> Result<impl IntoResponse, AppError>
where
    S: HasStores + Clone + Send + Sync + 'static,
{
    let users = AccountOperations::new(app.accounts()).list_users().await?;
    Ok(Json(users))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "ok": true
    }))
}

pub fn routes<S>() -> Router<S>
where
    S: HasStores + Clone + Send + Sync + 'static,
{
    tracing::info!("Registering route /save-config/ [POST]");
    tracing::info!("Registering route /get-config/ [GET]");
    tracing::info!("Registering route /register/ [POST]");
    tracing::info!("Registering route /login/update-profile/ [POST]");
    tracing::info!("Registering route /data/ [GET]");

    Router::new()
        .route("/healthz", get(health_handler))
        .route("/save-config/", post(save_config_handler::<S>))
        .route("/get-config/", get(get_config_handler::<S>))
        .route("/register/", post(register_handler::<S>))
        .route(
            "/login/update-profile/",
            post(login_update_profile_handler::<S>),
        )
        .route("/data/", get(list_users_handler::<S>))
}
