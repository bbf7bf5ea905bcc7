//! Fully resolved deployment specification

use aectl_config::{SecretReference, VertexSettings};
use aectl_provider::DeploymentRequest;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::registry::AgentDefinition;
use crate::Result;

/// Environment variable value after secret resolution
#[derive(Clone, PartialEq, Eq)]
pub enum EnvVarValue {
    Plain(String),
    /// Value fetched from the secret store; never printed
    Secret {
        reference: SecretReference,
        value: String,
    },
}

impl EnvVarValue {
    pub fn value(&self) -> &str {
        match self {
            EnvVarValue::Plain(value) => value,
            EnvVarValue::Secret { value, .. } => value,
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, EnvVarValue::Secret { .. })
    }
}

impl fmt::Debug for EnvVarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvVarValue::Plain(value) => write!(f, "{:?}", value),
            EnvVarValue::Secret { reference, .. } => write!(f, "***({})", reference),
        }
    }
}

/// Where the agent definition came from
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedAgent {
    /// Looked up by `agent_engine.instance_path`
    Instance {
        path: String,
        agent: Arc<AgentDefinition>,
    },
    /// Built from the inline `agent_engine` fields
    Inline(Arc<AgentDefinition>),
}

impl ResolvedAgent {
    pub fn definition(&self) -> &AgentDefinition {
        match self {
            ResolvedAgent::Instance { agent, .. } => agent,
            ResolvedAgent::Inline(agent) => agent,
        }
    }
}

/// The merged, secret-resolved configuration for one deploy
///
/// `None` means the field was set by no layer and is left to the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentSpec {
    pub profile: String,
    pub display_name: String,
    pub description: Option<String>,
    pub gcs_dir_name: Option<String>,
    pub vertex: VertexSettings,
    pub agent: Option<ResolvedAgent>,
    pub env_vars: Option<BTreeMap<String, EnvVarValue>>,
    pub requirements: Option<Vec<String>>,
    pub extra_packages: Option<Vec<String>>,
    pub labels: Option<BTreeMap<String, String>>,
    pub identity_type: Option<String>,
    pub service_account: Option<String>,
    pub min_instances: Option<u32>,
    pub max_instances: Option<u32>,
    pub resource_limits: Option<BTreeMap<String, String>>,
    pub container_concurrency: Option<u32>,
    pub psc_interface_config: Option<Value>,
    pub agent_framework: Option<String>,
    pub extra: BTreeMap<String, Value>,
}

impl DeploymentSpec {
    pub fn new(profile: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            display_name: display_name.into(),
            description: None,
            gcs_dir_name: None,
            vertex: VertexSettings::default(),
            agent: None,
            env_vars: None,
            requirements: None,
            extra_packages: None,
            labels: None,
            identity_type: None,
            service_account: None,
            min_instances: None,
            max_instances: None,
            resource_limits: None,
            container_concurrency: None,
            psc_interface_config: None,
            agent_framework: None,
            extra: BTreeMap::new(),
        }
    }

    /// Literal env mapping as sent to the platform
    pub fn env_values(&self) -> Option<BTreeMap<String, String>> {
        self.env_vars.as_ref().map(|env| {
            env.iter()
                .map(|(key, value)| (key.clone(), value.value().to_string()))
                .collect()
        })
    }

    /// Remote payload carrying exactly the fields present in this spec
    pub fn to_request(&self) -> Result<DeploymentRequest> {
        let agent = match &self.agent {
            Some(agent) => Some(serde_json::to_value(agent.definition())?),
            None => None,
        };

        Ok(DeploymentRequest {
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            agent,
            gcs_dir_name: self.gcs_dir_name.clone(),
            staging_bucket: self.vertex.staging_bucket_uri(),
            requirements: self.requirements.clone(),
            extra_packages: self.extra_packages.clone(),
            env_vars: self.env_values(),
            labels: self.labels.clone(),
            identity_type: self.identity_type.clone(),
            service_account: self.service_account.clone(),
            min_instances: self.min_instances,
            max_instances: self.max_instances,
            resource_limits: self.resource_limits.clone(),
            container_concurrency: self.container_concurrency,
            psc_interface_config: self.psc_interface_config.clone(),
            agent_framework: self.agent_framework.clone(),
            extra: self.extra.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_values_are_redacted() {
        let mut spec = DeploymentSpec::new("default", "agent-a");
        spec.env_vars = Some(BTreeMap::from([
            ("MODE".to_string(), EnvVarValue::Plain("prod".to_string())),
            (
                "TOKEN".to_string(),
                EnvVarValue::Secret {
                    reference: SecretReference::new("api-token", "3"),
                    value: "hunter2".to_string(),
                },
            ),
        ]));

        let debug = format!("{:?}", spec);
        assert!(debug.contains("\"prod\""));
        assert!(debug.contains("***(api-token@3)"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_request_carries_resolved_values() {
        let mut spec = DeploymentSpec::new("default", "agent-a");
        spec.vertex.staging_bucket = Some("my-bucket".to_string());
        spec.env_vars = Some(BTreeMap::from([(
            "TOKEN".to_string(),
            EnvVarValue::Secret {
                reference: SecretReference::new("api-token", "latest"),
                value: "v".to_string(),
            },
        )]));
        spec.agent = Some(ResolvedAgent::Inline(Arc::new(
            AgentDefinition::new("root").with_model("gemini-2.0-flash"),
        )));

        let request = spec.to_request().unwrap();
        assert_eq!(request.staging_bucket.as_deref(), Some("gs://my-bucket"));
        assert_eq!(request.env_vars.unwrap()["TOKEN"], "v");
        assert_eq!(request.agent.unwrap()["model"], "gemini-2.0-flash");
        assert!(request.requirements.is_none());
        assert!(request.labels.is_none());
    }
}
