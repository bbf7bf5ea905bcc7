//! Profile schema and layered merge rules
//!
//! Every field is optional: absence means "inherit from the layer below".
//! Scalars and nested sections merge field by field, `env_vars` and `labels`
//! merge key by key, and sequences are replaced wholesale.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value as YamlValue;
use std::collections::BTreeMap;

/// Secret version used when a reference omits one
pub const DEFAULT_SECRET_VERSION: &str = "latest";

/// Fallback for `vertex_ai.project`
pub const ENV_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
/// Fallback for `vertex_ai.location`
pub const ENV_LOCATION: &str = "GOOGLE_CLOUD_LOCATION";
/// Fallback for `vertex_ai.staging_bucket`
pub const ENV_STAGING_BUCKET: &str = "GOOGLE_CLOUD_STAGING_BUCKET";

fn default_secret_version() -> String {
    DEFAULT_SECRET_VERSION.to_string()
}

/// Pointer into the secret store; never a value itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretReference {
    pub secret: String,
    #[serde(default = "default_secret_version")]
    pub version: String,
}

impl SecretReference {
    pub fn new(secret: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for SecretReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.secret, self.version)
    }
}

/// Environment variable value as written in a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    Secret(SecretReference),
}

impl EnvValue {
    pub fn literal(value: impl Into<String>) -> Self {
        EnvValue::Literal(value.into())
    }

    pub fn secret(secret: impl Into<String>, version: impl Into<String>) -> Self {
        EnvValue::Secret(SecretReference::new(secret, version))
    }

    fn from_yaml(key: &str, value: YamlValue) -> Result<Self, String> {
        match value {
            YamlValue::String(literal) => Ok(EnvValue::Literal(literal)),
            YamlValue::Mapping(_) => serde_yaml_ng::from_value::<SecretReference>(value)
                .map(EnvValue::Secret)
                .map_err(|e| format!("env_vars.{key}: expected a {{secret, version}} mapping ({e})")),
            other => Err(format!(
                "env_vars.{key}: expected a string or a {{secret, version}} mapping, found {}",
                yaml_kind(&other)
            )),
        }
    }
}

fn yaml_kind(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "null",
        YamlValue::Bool(_) => "a boolean",
        YamlValue::Number(_) => "a number",
        YamlValue::String(_) => "a string",
        YamlValue::Sequence(_) => "a sequence",
        YamlValue::Mapping(_) => "a mapping",
        YamlValue::Tagged(_) => "a tagged value",
    }
}

fn deserialize_env_vars<'de, D>(
    deserializer: D,
) -> Result<Option<BTreeMap<String, EnvValue>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, YamlValue>> = Option::deserialize(deserializer)?;
    raw.map(|entries| {
        entries
            .into_iter()
            .map(|(key, value)| EnvValue::from_yaml(&key, value).map(|value| (key, value)))
            .collect::<Result<BTreeMap<_, _>, String>>()
    })
    .transpose()
    .map_err(de::Error::custom)
}

/// Labels and resource limits are string maps on the wire; accept bare scalars
fn deserialize_string_map<'de, D>(
    deserializer: D,
) -> Result<Option<BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, YamlValue>> = Option::deserialize(deserializer)?;
    raw.map(|entries| {
        entries
            .into_iter()
            .map(|(key, value)| {
                let text = match value {
                    YamlValue::String(s) => s,
                    YamlValue::Number(n) => n.to_string(),
                    YamlValue::Bool(b) => b.to_string(),
                    other => {
                        return Err(format!(
                            "{key}: expected a scalar value, found {}",
                            yaml_kind(&other)
                        ))
                    }
                };
                Ok((key, text))
            })
            .collect::<Result<BTreeMap<_, _>, String>>()
    })
    .transpose()
    .map_err(de::Error::custom)
}

/// Cloud connection settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_bucket: Option<String>,
}

impl VertexSettings {
    /// Later layer wins per field
    pub fn merge(self, over: VertexSettings) -> VertexSettings {
        VertexSettings {
            project: over.project.or(self.project),
            location: over.location.or(self.location),
            staging_bucket: over.staging_bucket.or(self.staging_bucket),
        }
    }

    /// Settings taken from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Settings taken from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        Self {
            project: get(ENV_PROJECT),
            location: get(ENV_LOCATION),
            staging_bucket: get(ENV_STAGING_BUCKET),
        }
    }

    /// Fill fields that are still unset from `fallback`
    pub fn with_fallback(self, fallback: VertexSettings) -> VertexSettings {
        fallback.merge(self)
    }

    /// Staging bucket as a `gs://` URI
    pub fn staging_bucket_uri(&self) -> Option<String> {
        self.staging_bucket.as_ref().map(|bucket| {
            if bucket.starts_with("gs://") {
                bucket.clone()
            } else {
                format!("gs://{}", bucket)
            }
        })
    }
}

/// Agent definition: an `instance_path` reference, or inline fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEngineSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
}

impl AgentEngineSection {
    pub fn merge(self, over: AgentEngineSection) -> AgentEngineSection {
        AgentEngineSection {
            instance_path: over.instance_path.or(self.instance_path),
            name: over.name.or(self.name),
            description: over.description.or(self.description),
            model: over.model.or(self.model),
            instruction: over.instruction.or(self.instruction),
            tools: over.tools.or(self.tools),
        }
    }
}

/// Partial deployment configuration; one layer of the merge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcs_dir_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertex_ai: Option<VertexSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_engine: Option<AgentEngineSection>,
    #[serde(
        default,
        deserialize_with = "deserialize_env_vars",
        skip_serializing_if = "Option::is_none"
    )]
    pub env_vars: Option<BTreeMap<String, EnvValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_packages: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_string_map",
        skip_serializing_if = "Option::is_none"
    )]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_instances: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_instances: Option<u32>,
    #[serde(
        default,
        deserialize_with = "deserialize_string_map",
        skip_serializing_if = "Option::is_none"
    )]
    pub resource_limits: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_concurrency: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psc_interface_config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_framework: Option<String>,
    /// Keys this schema does not know; passed through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ProfileSpec {
    /// Apply `over` on top of `self`
    pub fn merge(self, over: ProfileSpec) -> ProfileSpec {
        let mut extra = self.extra;
        extra.extend(over.extra);

        ProfileSpec {
            display_name: over.display_name.or(self.display_name),
            description: over.description.or(self.description),
            gcs_dir_name: over.gcs_dir_name.or(self.gcs_dir_name),
            vertex_ai: merge_nested(self.vertex_ai, over.vertex_ai, VertexSettings::merge),
            agent_engine: merge_nested(
                self.agent_engine,
                over.agent_engine,
                AgentEngineSection::merge,
            ),
            env_vars: merge_maps(self.env_vars, over.env_vars),
            requirements: over.requirements.or(self.requirements),
            extra_packages: over.extra_packages.or(self.extra_packages),
            labels: merge_maps(self.labels, over.labels),
            identity_type: over.identity_type.or(self.identity_type),
            service_account: over.service_account.or(self.service_account),
            min_instances: over.min_instances.or(self.min_instances),
            max_instances: over.max_instances.or(self.max_instances),
            resource_limits: over.resource_limits.or(self.resource_limits),
            container_concurrency: over.container_concurrency.or(self.container_concurrency),
            psc_interface_config: over.psc_interface_config.or(self.psc_interface_config),
            agent_framework: over.agent_framework.or(self.agent_framework),
            extra,
        }
    }

    /// Fold layers lowest-precedence first
    pub fn layered(layers: impl IntoIterator<Item = ProfileSpec>) -> ProfileSpec {
        layers
            .into_iter()
            .fold(ProfileSpec::default(), ProfileSpec::merge)
    }

    /// Connection settings, empty when the section is absent
    pub fn vertex(&self) -> VertexSettings {
        self.vertex_ai.clone().unwrap_or_default()
    }
}

fn merge_nested<T>(base: Option<T>, over: Option<T>, merge: fn(T, T) -> T) -> Option<T> {
    match (base, over) {
        (Some(base), Some(over)) => Some(merge(base, over)),
        (base, over) => over.or(base),
    }
}

fn merge_maps<V>(
    base: Option<BTreeMap<String, V>>,
    over: Option<BTreeMap<String, V>>,
) -> Option<BTreeMap<String, V>> {
    match (base, over) {
        (Some(mut base), Some(over)) => {
            base.extend(over);
            Some(base)
        }
        (base, over) => over.or(base),
    }
}
