//! Multi-profile YAML document

use serde_yaml_ng::Value as YamlValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::profile::ProfileSpec;
use crate::{ConfigError, Result};

/// Name of the base layer every profile inherits from
pub const DEFAULT_PROFILE: &str = "default";

/// Profile name to raw profile body, immutable once loaded
///
/// Bodies are kept as raw YAML and typed on selection, so a malformed
/// profile only fails the invocations that use it.
#[derive(Debug, Clone, Default)]
pub struct ProfileDocument {
    source: Option<PathBuf>,
    profiles: BTreeMap<String, YamlValue>,
}

impl ProfileDocument {
    /// Read and parse the document at `path`
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        debug!("◆ Reading profiles from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let mut document = Self::parse(&content, &path.display().to_string())?;
        document.source = Some(path.to_path_buf());
        info!(
            "◆ Loaded {} profile(s) from {}",
            document.profiles.len(),
            path.display()
        );
        Ok(document)
    }

    /// Parse a document held in memory
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Self::parse(content, "<string>")
    }

    fn parse(content: &str, origin: &str) -> Result<Self> {
        let blank = content
            .lines()
            .map(str::trim)
            .all(|line| line.is_empty() || line.starts_with('#'));
        if blank {
            return Ok(Self::default());
        }

        let profiles: Option<BTreeMap<String, YamlValue>> = serde_yaml_ng::from_str(content)
            .map_err(|e| ConfigError::Parse {
                origin: origin.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            source: None,
            profiles: profiles.unwrap_or_default(),
        })
    }

    /// File the document was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Typed body of a single profile, without inheritance
    pub fn profile(&self, name: &str) -> Result<ProfileSpec> {
        let raw = self
            .profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                profile: name.to_string(),
                available: self.profile_names(),
            })?;

        if raw.is_null() {
            return Ok(ProfileSpec::default());
        }

        serde_yaml_ng::from_value(raw.clone()).map_err(|e| ConfigError::InvalidProfile {
            profile: name.to_string(),
            message: e.to_string(),
        })
    }

    /// `default` merged with `name`; `default` alone when `name` is `default`
    pub fn layered(&self, name: &str) -> Result<ProfileSpec> {
        if !self.contains(name) {
            return Err(ConfigError::ProfileNotFound {
                profile: name.to_string(),
                available: self.profile_names(),
            });
        }

        let base = if name != DEFAULT_PROFILE && self.contains(DEFAULT_PROFILE) {
            self.profile(DEFAULT_PROFILE)?
        } else {
            ProfileSpec::default()
        };

        Ok(base.merge(self.profile(name)?))
    }
}
