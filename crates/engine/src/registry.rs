//! Instance registry
//!
//! Dotted references such as `my_pkg.agents.root_agent` resolve against
//! modules registered at startup instead of being imported at runtime. A
//! reference is split at the longest registered module prefix; the rest is
//! the attribute path inside that module.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, info};

use crate::{EngineError, Result};

/// A callable exposed to an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_parameters")]
    pub parameters: Value,
}

fn empty_parameters() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// An agent as shipped to the platform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Arc<ToolDefinition>>,
}

impl AgentDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            model: None,
            instruction: None,
            tools: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_tool(mut self, tool: Arc<ToolDefinition>) -> Self {
        self.tools.push(tool);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Agent,
    Tool,
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportKind::Agent => write!(f, "agent"),
            ExportKind::Tool => write!(f, "tool"),
        }
    }
}

/// A live object held by a module
#[derive(Debug, Clone, PartialEq)]
pub enum Export {
    Agent(Arc<AgentDefinition>),
    Tool(Arc<ToolDefinition>),
}

impl Export {
    pub fn kind(&self) -> ExportKind {
        match self {
            Export::Agent(_) => ExportKind::Agent,
            Export::Tool(_) => ExportKind::Tool,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("'{0}' is not a dotted reference of the form module.attribute")]
    InvalidPath(String),

    #[error("No module found for '{path}' (registered modules: [{}])", .registered.join(", "))]
    ModuleNotFound {
        path: String,
        registered: Vec<String>,
    },

    #[error("Module '{module}' has no attribute '{attribute}'")]
    AttributeNotFound { module: String, attribute: String },

    #[error("'{path}' is a {found}, expected a {expected}")]
    WrongKind {
        path: String,
        expected: ExportKind,
        found: ExportKind,
    },
}

/// Resolves a dotted reference to a live object
pub trait InstanceLoader: Send + Sync {
    fn load(&self, path: &str) -> std::result::Result<Export, ImportError>;

    fn load_agent(&self, path: &str) -> std::result::Result<Arc<AgentDefinition>, ImportError> {
        match self.load(path)? {
            Export::Agent(agent) => Ok(agent),
            other => Err(ImportError::WrongKind {
                path: path.to_string(),
                expected: ExportKind::Agent,
                found: other.kind(),
            }),
        }
    }

    fn load_tool(&self, path: &str) -> std::result::Result<Arc<ToolDefinition>, ImportError> {
        match self.load(path)? {
            Export::Tool(tool) => Ok(tool),
            other => Err(ImportError::WrongKind {
                path: path.to_string(),
                expected: ExportKind::Tool,
                found: other.kind(),
            }),
        }
    }
}

type Constructor = Box<dyn Fn() -> Export + Send + Sync>;

/// Constructor plus the instance it produced on first use
struct Entry {
    constructor: Constructor,
    instance: OnceLock<Export>,
}

impl Entry {
    fn get(&self) -> Export {
        self.instance.get_or_init(|| (self.constructor)()).clone()
    }
}

/// Module name to attribute name to export
#[derive(Default)]
pub struct InstanceRegistry {
    modules: HashMap<String, HashMap<String, Entry>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, module: &str, attribute: &str, constructor: Constructor) {
        debug!("◆ Registering {}.{}", module, attribute);
        self.modules.entry(module.to_string()).or_default().insert(
            attribute.to_string(),
            Entry {
                constructor,
                instance: OnceLock::new(),
            },
        );
    }

    pub fn register_agent<F>(&mut self, module: &str, attribute: &str, constructor: F)
    where
        F: Fn() -> AgentDefinition + Send + Sync + 'static,
    {
        self.insert(
            module,
            attribute,
            Box::new(move || Export::Agent(Arc::new(constructor()))),
        );
    }

    pub fn register_tool<F>(&mut self, module: &str, attribute: &str, constructor: F)
    where
        F: Fn() -> ToolDefinition + Send + Sync + 'static,
    {
        self.insert(
            module,
            attribute,
            Box::new(move || Export::Tool(Arc::new(constructor()))),
        );
    }

    pub fn has_module(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    /// Registered module names, sorted
    pub fn module_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }

    /// Populate a registry from a YAML module manifest
    ///
    /// ```yaml
    /// my_pkg.tools:
    ///   tools:
    ///     search: { name: search, description: Web search }
    /// my_pkg.agents:
    ///   agents:
    ///     root_agent:
    ///       name: root
    ///       model: gemini-2.0-flash
    ///       tools: [my_pkg.tools.search]
    /// ```
    ///
    /// Every module in the file is declared, and its tools registered,
    /// before any agent, so agents may reference tools from any module in
    /// the file.
    pub fn from_manifest_str(content: &str, origin: &str) -> Result<Self> {
        let manifest: Option<BTreeMap<String, ModuleManifest>> = serde_yaml_ng::from_str(content)
            .map_err(|e| EngineError::Manifest {
                origin: origin.to_string(),
                message: e.to_string(),
            })?;
        let manifest = manifest.unwrap_or_default();

        let mut registry = Self::new();
        for (module, body) in &manifest {
            registry.modules.entry(module.clone()).or_default();
            for (attribute, tool) in &body.tools {
                let tool = tool.clone();
                registry.register_tool(module, attribute, move || tool.clone());
            }
        }

        for (module, body) in manifest {
            for (attribute, agent) in body.agents {
                let mut definition = AgentDefinition::new(agent.name);
                definition.description = agent.description;
                definition.model = agent.model;
                definition.instruction = agent.instruction;
                for reference in &agent.tools {
                    definition.tools.push(registry.load_tool(reference)?);
                }
                registry.register_agent(&module, &attribute, move || definition.clone());
            }
        }

        info!(
            "◆ Loaded {} module(s) from {}",
            registry.modules.len(),
            origin
        );
        Ok(registry)
    }

    pub async fn load_manifest(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| EngineError::Manifest {
                origin: path.display().to_string(),
                message: e.to_string(),
            })?;
        Self::from_manifest_str(&content, &path.display().to_string())
    }
}

impl InstanceLoader for InstanceRegistry {
    fn load(&self, path: &str) -> std::result::Result<Export, ImportError> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.len() < 2 || segments.iter().any(|s| s.trim().is_empty()) {
            return Err(ImportError::InvalidPath(path.to_string()));
        }

        for split in (1..segments.len()).rev() {
            let module = segments[..split].join(".");
            let Some(exports) = self.modules.get(&module) else {
                continue;
            };

            let attribute = segments[split..].join(".");
            return match exports.get(&attribute) {
                Some(entry) => {
                    debug!("◆ Resolved {} in module {}", attribute, module);
                    Ok(entry.get())
                }
                None => Err(ImportError::AttributeNotFound { module, attribute }),
            };
        }

        Err(ImportError::ModuleNotFound {
            path: path.to_string(),
            registered: self.module_names(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModuleManifest {
    #[serde(default)]
    tools: BTreeMap<String, ToolDefinition>,
    #[serde(default)]
    agents: BTreeMap<String, AgentManifest>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentManifest {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    instruction: Option<String>,
    #[serde(default)]
    tools: Vec<String>,
}
