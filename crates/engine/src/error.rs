//! Engine error taxonomy

use aectl_config::ConfigError;
use aectl_provider::{ChildResource, ProviderError};
use thiserror::Error;

use crate::registry::ImportError;

/// Errors surfaced by resolution, reconciliation, messaging and deletion
#[derive(Error, Debug)]
pub enum EngineError {
    /// Missing file or profile, malformed YAML, wrong field shape, missing field
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to resolve secret {reference} for env var '{key}': {source}")]
    SecretResolution {
        key: String,
        reference: String,
        #[source]
        source: ProviderError,
    },

    #[error("Failed to resolve agent instance: {0}")]
    InstanceResolution(#[from] ImportError),

    #[error("Invalid module manifest {origin}: {message}")]
    Manifest { origin: String, message: String },

    #[error("Agent engine '{0}' not found")]
    ResourceNotFound(String),

    #[error(
        "Agent engine {resource} has {} dependent resource(s): {}; use --force to delete them",
        .dependents.len(),
        join(.dependents)
    )]
    DependentResources {
        resource: String,
        dependents: Vec<ChildResource>,
    },

    #[error("Failed to {operation} agent engine '{display_name}': {source}")]
    Deployment {
        operation: &'static str,
        display_name: String,
        #[source]
        source: ProviderError,
    },

    #[error(
        "{} agent engines share the display name '{display_name}': {}",
        .matches.len(),
        .matches.join(", ")
    )]
    AmbiguousMatch {
        display_name: String,
        matches: Vec<String>,
    },

    #[error("Failed to {operation} {target}: {source}")]
    Remote {
        operation: &'static str,
        target: String,
        #[source]
        source: ProviderError,
    },

    #[error("Failed to serialize agent definition: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn join(dependents: &[ChildResource]) -> String {
    dependents
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl EngineError {
    pub fn remote(
        operation: &'static str,
        target: impl Into<String>,
        source: ProviderError,
    ) -> Self {
        EngineError::Remote {
            operation,
            target: target.into(),
            source,
        }
    }

    pub fn is_config_not_found(&self) -> bool {
        matches!(self, EngineError::Config(e) if e.is_not_found())
    }

    pub fn is_config_parse(&self) -> bool {
        matches!(self, EngineError::Config(e) if e.is_parse())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
