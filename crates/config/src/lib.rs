//! Deployment profile configuration
//!
//! Loads the multi-profile YAML document and merges profile layers into a
//! single partial specification.

use std::path::PathBuf;
use thiserror::Error;

pub mod document;
pub mod paths;
pub mod profile;

pub use document::{ProfileDocument, DEFAULT_PROFILE};
pub use paths::{find_config_file, find_config_file_in, resolve_config_path, CONFIG_FILE_NAME};
pub use profile::{
    AgentEngineSection, EnvValue, ProfileSpec, SecretReference, VertexSettings,
    DEFAULT_SECRET_VERSION, ENV_LOCATION, ENV_PROJECT, ENV_STAGING_BUCKET,
};

/// Errors raised while locating, reading or interpreting the profile document
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Configuration file '{0}' not found in the working directory or home directory")]
    NotDiscovered(String),

    #[error("Error parsing YAML file {origin}: {message}")]
    Parse { origin: String, message: String },

    #[error("Profile '{profile}' not found. Available profiles: [{}]", .available.join(", "))]
    ProfileNotFound {
        profile: String,
        available: Vec<String>,
    },

    #[error("Invalid profile '{profile}': {message}")]
    InvalidProfile { profile: String, message: String },

    #[error("{field} must be provided in profile '{profile}'")]
    MissingField {
        profile: String,
        field: &'static str,
    },
}

impl ConfigError {
    /// True for the "no such profile / no such file" family
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ConfigError::FileNotFound(_)
                | ConfigError::NotDiscovered(_)
                | ConfigError::ProfileNotFound { .. }
        )
    }

    /// True for malformed YAML or a field of the wrong shape
    pub fn is_parse(&self) -> bool {
        matches!(
            self,
            ConfigError::Parse { .. } | ConfigError::InvalidProfile { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
