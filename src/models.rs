use std::fmt;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{LibError, Result};

/// Identity of a node within one submitted graph.
///
/// Graph documents come from a browser editor that emits either numeric or
/// string ids, so both are accepted. `1` and `"1"` are different nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Int(i64),
    Text(String),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Int(value) => write!(f, "{}", value),
            NodeId::Text(value) => write!(f, "{:?}", value),
        }
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId::Text(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        NodeId::Text(value)
    }
}

impl From<i64> for NodeId {
    fn from(value: i64) -> Self {
        NodeId::Int(value)
    }
}

/// The fields of a node that validation reads. Everything else the editor
/// stores on a node stays in the raw document.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphNodeRef {
    pub id: NodeId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphEdgeRef {
    pub source: NodeId,
    pub target: NodeId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<GraphNodeRef>,
    pub edges: Vec<GraphEdgeRef>,
}

impl GraphDocument {
    /// Serde would also read the struct and its elements from JSON arrays, so
    /// the object shape is checked before deserializing.
    pub fn from_value(configuration: &Value) -> Result<Self> {
        let Some(object) = configuration.as_object() else {
            return Err(malformed_configuration(anyhow!(
                "configuration is not an object"
            )));
        };
        for key in ["nodes", "edges"] {
            if let Some(Value::Array(items)) = object.get(key) {
                if let Some(index) = items.iter().position(|item| !item.is_object()) {
                    return Err(malformed_configuration(anyhow!(
                        "{}[{}] is not an object",
                        key,
                        index
                    )));
                }
            }
        }

        GraphDocument::deserialize(configuration)
            .map_err(|err| malformed_configuration(anyhow!(err)))
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|node| node.id.clone()).collect()
    }

    pub fn arcs(&self) -> Vec<(NodeId, NodeId)> {
        self.edges
            .iter()
            .map(|edge| (edge.source.clone(), edge.target.clone()))
            .collect()
    }
}

fn malformed_configuration(source: anyhow::Error) -> LibError {
    LibError::invalid_with_code(
        "malformed_configuration",
        "Configuration must contain nodes with ids and edges with source and target",
        source,
    )
}

/// Outcome of validating a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_acyclic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigurationId(pub i64);

impl fmt::Display for ConfigurationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationRecord {
    pub id: ConfigurationId,
    pub name: String,
    pub is_acyclic: bool,
    pub created_at: DateTime<Utc>,
    pub configuration: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveConfigurationPayload {
    pub name: String,
    pub configuration: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveConfigurationResponse {
    pub message: &'static str,
    pub id: ConfigurationId,
    pub is_acyclic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// A stored account. The password hash never leaves the crate through serde.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub address: Option<String>,
    pub about: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewUserAccount {
    pub email: String,
    pub password_hash: String,
    pub address: Option<String>,
    pub about: Option<String>,
    pub birthdate: Option<NaiveDate>,
}

/// Profile fields to overwrite. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub address: Option<String>,
    pub about: Option<String>,
    pub birthdate: Option<NaiveDate>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.address.is_none() && self.about.is_none() && self.birthdate.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfileInput {
    pub email: String,
    pub password: String,
    pub address: Option<String>,
    pub about: Option<String>,
    pub birthdate: Option<NaiveDate>,
}

impl UserProfileInput {
    /// Trims the email and rejects blank credentials.
    pub fn credentials(&self) -> Result<(String, &str)> {
        let email = self.email.trim().to_string();
        if email.is_empty() {
            return Err(LibError::invalid(
                "Email is required",
                anyhow!("empty email"),
            ));
        }
        if self.password.is_empty() {
            return Err(LibError::invalid(
                "Password is required",
                anyhow!("empty password for {}", email),
            ));
        }
        Ok((email, self.password.as_str()))
    }

    /// Blank strings count as "not provided".
    pub fn profile_update(&self) -> ProfileUpdate {
        ProfileUpdate {
            address: non_blank(self.address.as_deref()),
            about: non_blank(self.about.as_deref()),
            birthdate: self.birthdate,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .filter(|value| !value.trim().is_empty())
        .map(|value| value.to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub email: String,
    pub address: Option<String>,
    pub about: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&UserAccount> for UserProfile {
    fn from(value: &UserAccount) -> Self {
        Self {
            user_id: value.id,
            email: value.email.clone(),
            address: value.address.clone(),
            about: value.about.clone(),
            birthdate: value.birthdate,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user_id: UserId,
    pub email: String,
    pub address: Option<String>,
    pub about: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl RegisterResponse {
    pub fn new(message: &'static str, account: &UserAccount) -> Self {
        Self {
            message,
            user_id: account.id,
            email: account.email.clone(),
            address: account.address.clone(),
            about: account.about.clone(),
            birthdate: account.birthdate,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub user_id: UserId,
    pub updated_at: Option<DateTime<Utc>>,
}
