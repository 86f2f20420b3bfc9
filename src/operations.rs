use std::sync::Arc;

use anyhow::anyhow;

use crate::error::{LibError, Result};
use crate::models::{ConfigurationRecord, GraphDocument, SaveConfigurationPayload};
use crate::store::ConfigurationStore;
use crate::validation;

/// Validate-then-store and fetch-latest over any [`ConfigurationStore`].
///
/// No lock spans validation and the insert: two concurrent saves under the
/// same name both persist.
#[derive(Clone)]
pub struct ConfigOperations {
    store: Arc<dyn ConfigurationStore>,
}

impl ConfigOperations {
    pub fn new(store: Arc<dyn ConfigurationStore>) -> Self {
        Self { store }
    }

    pub async fn save_configuration(
        &self,
        payload: SaveConfigurationPayload,
    ) -> Result<ConfigurationRecord> {
        let name = payload.name.trim();
        if name.is_empty() {
            return Err(LibError::invalid(
                "Configuration name is required",
                anyhow!("empty configuration name"),
            ));
        }

        let document = GraphDocument::from_value(&payload.configuration)?;
        let verdict = validation::validate_document(&document)?;

        let record = self
            .store
            .store(name, verdict, &payload.configuration)
            .await?;
        tracing::info!(
            id = %record.id,
            name = %record.name,
            is_acyclic = record.is_acyclic,
            nodes = document.nodes.len(),
            edges = document.edges.len(),
            "stored graph configuration"
        );
        Ok(record)
    }

    pub async fn latest_configuration(&self) -> Result<ConfigurationRecord> {
        self.store.fetch_latest().await
    }
}
