//! Remote collaborators: the managed agent platform and the secret store
//!
//! The core only talks to these traits; the REST clients behind them own
//! transport, authentication headers and long-running operation polling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

pub mod secrets;
pub mod vertex;

pub use secrets::{SecretManagerClient, SecretStore};
pub use vertex::VertexProvider;

/// Remote platform errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("remote API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("remote resource not found: {0}")]
    NotFound(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error("operation {operation} failed: {message}")]
    OperationFailed { operation: String, message: String },

    #[error("operation {0} did not finish in time")]
    OperationTimeout(String),

    #[error("cannot decode secret payload: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// The platform's view of a deployed agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteResource {
    /// Full resource name, e.g. `projects/p/locations/l/reasoningEngines/123`
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

impl RemoteResource {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            description: None,
            state: None,
            create_time: None,
            update_time: None,
        }
    }

    /// Trailing identifier of the resource name
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// Kinds of resources owned by a deployed agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildKind {
    Session,
    Memory,
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildKind::Session => write!(f, "session"),
            ChildKind::Memory => write!(f, "memory"),
        }
    }
}

/// A dependent resource that blocks non-forced deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildResource {
    pub name: String,
    pub kind: ChildKind,
}

impl ChildResource {
    pub fn new(name: impl Into<String>, kind: ChildKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

impl fmt::Display for ChildResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// Create/update payload
///
/// Only fields that are `Some` (and non-empty `extra` entries) are sent; an
/// absent field is never transmitted as a "clear".
#[derive(Clone, Default, PartialEq, Serialize)]
pub struct DeploymentRequest {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Serialized agent definition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gcs_dir_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_packages: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_vars: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_instances: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_instances: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_limits: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_concurrency: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psc_interface_config: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_framework: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl DeploymentRequest {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..Default::default()
        }
    }

    /// Names of the fields carried by this request, in declaration order
    pub fn present_fields(&self) -> Vec<String> {
        let flags = [
            ("display_name", true),
            ("description", self.description.is_some()),
            ("agent", self.agent.is_some()),
            ("gcs_dir_name", self.gcs_dir_name.is_some()),
            ("staging_bucket", self.staging_bucket.is_some()),
            ("requirements", self.requirements.is_some()),
            ("extra_packages", self.extra_packages.is_some()),
            ("env_vars", self.env_vars.is_some()),
            ("labels", self.labels.is_some()),
            ("identity_type", self.identity_type.is_some()),
            ("service_account", self.service_account.is_some()),
            ("min_instances", self.min_instances.is_some()),
            ("max_instances", self.max_instances.is_some()),
            ("resource_limits", self.resource_limits.is_some()),
            ("container_concurrency", self.container_concurrency.is_some()),
            ("psc_interface_config", self.psc_interface_config.is_some()),
            ("agent_framework", self.agent_framework.is_some()),
        ];

        flags
            .iter()
            .filter(|(_, present)| *present)
            .map(|(name, _)| name.to_string())
            .chain(self.extra.keys().cloned())
            .collect()
    }
}

// Env values may come from the secret store; only their keys are printed.
impl fmt::Debug for DeploymentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Option<Vec<&String>> = self.env_vars.as_ref().map(|env| env.keys().collect());
        f.debug_struct("DeploymentRequest")
            .field("display_name", &self.display_name)
            .field("description", &self.description)
            .field("agent", &self.agent)
            .field("gcs_dir_name", &self.gcs_dir_name)
            .field("staging_bucket", &self.staging_bucket)
            .field("requirements", &self.requirements)
            .field("extra_packages", &self.extra_packages)
            .field("env_vars", &env_keys)
            .field("labels", &self.labels)
            .field("identity_type", &self.identity_type)
            .field("service_account", &self.service_account)
            .field("min_instances", &self.min_instances)
            .field("max_instances", &self.max_instances)
            .field("resource_limits", &self.resource_limits)
            .field("container_concurrency", &self.container_concurrency)
            .field("psc_interface_config", &self.psc_interface_config)
            .field("agent_framework", &self.agent_framework)
            .field("extra", &self.extra)
            .finish()
    }
}

/// One conversational turn against a deployed agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub message: String,
    pub session_id: String,
    pub user_id: Option<String>,
}

/// Events returned by a query, exactly as the platform sent them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub events: Vec<Value>,
}

impl QueryResponse {
    /// Text parts of every event, in order
    pub fn texts(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| event["content"]["parts"].as_array())
            .flatten()
            .filter_map(|part| part["text"].as_str())
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Managed agent resource operations
#[async_trait]
pub trait AgentEngineApi: Send + Sync {
    /// Resources in listing order, optionally restricted to one display name
    async fn list(&self, display_name: Option<&str>) -> Result<Vec<RemoteResource>>;
    async fn create(&self, request: &DeploymentRequest) -> Result<RemoteResource>;
    async fn update(&self, resource_name: &str, request: &DeploymentRequest)
        -> Result<RemoteResource>;
    async fn delete(&self, resource_name: &str, force: bool) -> Result<()>;
    async fn list_children(&self, resource_name: &str) -> Result<Vec<ChildResource>>;
    /// Start a session and return its id
    async fn create_session(&self, resource_name: &str, user_id: Option<&str>) -> Result<String>;
    async fn query(&self, resource_name: &str, params: QueryParams) -> Result<QueryResponse>;
}
