pub mod accounts;
#[cfg(feature = "api")]
pub mod api;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod models;
pub mod operations;
pub mod store;
pub mod validation;

pub mod prelude {
    pub use crate::accounts::{AccountOperations, hash_password, verify_password};
    #[cfg(feature = "api")]
    pub use crate::api::{AppError, AppState, HasStores};
    #[cfg(feature = "sqlx")]
    pub use crate::db::{PgAccountStore, PgConfigurationStore, create_tables};
    pub use crate::error::{ErrorKind, LibError, Result};
    pub use crate::models::{
        ConfigurationId, ConfigurationRecord, GraphDocument, NodeId, SaveConfigurationPayload,
        UserId, UserProfile, UserProfileInput, Verdict,
    };
    pub use crate::operations::ConfigOperations;
    pub use crate::store::{
        AccountStore, ConfigurationStore, MemoryAccountStore, MemoryConfigurationStore,
    };
    pub use crate::validation::{has_cycle, validate, validate_document};
}
