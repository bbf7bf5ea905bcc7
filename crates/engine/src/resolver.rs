//! Profile selection, layering and reference resolution

use aectl_config::{AgentEngineSection, ConfigError, ProfileDocument, ProfileSpec, VertexSettings};
use aectl_provider::SecretStore;
use std::sync::Arc;
use tracing::{debug, info};

use crate::registry::{AgentDefinition, InstanceLoader};
use crate::secrets::SecretResolver;
use crate::spec::{DeploymentSpec, ResolvedAgent};
use crate::Result;

/// Produces a [`DeploymentSpec`] from `default` ← named profile ← overrides
pub struct ProfileResolver {
    secrets: SecretResolver,
    loader: Arc<dyn InstanceLoader>,
    env_fallback: VertexSettings,
}

impl ProfileResolver {
    pub fn new(store: Arc<dyn SecretStore>, loader: Arc<dyn InstanceLoader>) -> Self {
        Self {
            secrets: SecretResolver::new(store),
            loader,
            env_fallback: VertexSettings::from_env(),
        }
    }

    /// Replace the process-environment fallback for connection settings
    pub fn with_env_fallback(mut self, fallback: VertexSettings) -> Self {
        self.env_fallback = fallback;
        self
    }

    /// The three layers merged, before any reference is resolved
    pub fn merge(
        document: &ProfileDocument,
        profile: &str,
        overrides: ProfileSpec,
    ) -> Result<ProfileSpec> {
        Ok(document.layered(profile)?.merge(overrides))
    }

    /// Connection settings for `profile` with environment fallbacks applied
    pub fn vertex_settings(
        &self,
        document: &ProfileDocument,
        profile: &str,
    ) -> Result<VertexSettings> {
        Ok(document
            .layered(profile)?
            .vertex()
            .with_fallback(self.env_fallback.clone()))
    }

    pub async fn resolve(
        &self,
        document: &ProfileDocument,
        profile: &str,
        overrides: ProfileSpec,
    ) -> Result<DeploymentSpec> {
        let merged = Self::merge(document, profile, overrides)?;
        debug!("◆ Merged profile '{}'", profile);

        // Agent references first: a bad reference stops everything else
        let agent = match &merged.agent_engine {
            Some(section) => Some(self.resolve_agent(profile, section)?),
            None => None,
        };

        let display_name = merged
            .display_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                profile: profile.to_string(),
                field: "display_name",
            })?;

        let env_vars = match &merged.env_vars {
            Some(env) => Some(self.secrets.resolve_env(env).await?),
            None => None,
        };

        let vertex = merged.vertex().with_fallback(self.env_fallback.clone());
        let spec = DeploymentSpec {
            profile: profile.to_string(),
            display_name,
            description: merged.description,
            gcs_dir_name: merged.gcs_dir_name,
            vertex,
            agent,
            env_vars,
            requirements: merged.requirements,
            extra_packages: merged.extra_packages,
            labels: merged.labels,
            identity_type: merged.identity_type,
            service_account: merged.service_account,
            min_instances: merged.min_instances,
            max_instances: merged.max_instances,
            resource_limits: merged.resource_limits,
            container_concurrency: merged.container_concurrency,
            psc_interface_config: merged.psc_interface_config,
            agent_framework: merged.agent_framework,
            extra: merged.extra,
        };

        info!(
            "◆ Resolved profile '{}' to agent engine '{}'",
            profile, spec.display_name
        );
        debug!("◆ Effective spec: {:?}", spec);
        Ok(spec)
    }

    /// An `agent_engine` section must name an instance or an inline agent
    fn resolve_agent(&self, profile: &str, section: &AgentEngineSection) -> Result<ResolvedAgent> {
        if let Some(path) = &section.instance_path {
            let agent = self.loader.load_agent(path)?;
            return Ok(ResolvedAgent::Instance {
                path: path.clone(),
                agent,
            });
        }

        let Some(name) = section.name.as_ref().filter(|n| !n.trim().is_empty()) else {
            return Err(ConfigError::MissingField {
                profile: profile.to_string(),
                field: "agent_engine.instance_path or agent_engine.name",
            }
            .into());
        };

        let mut agent = AgentDefinition::new(name.clone());
        agent.description = section.description.clone();
        agent.model = section.model.clone();
        agent.instruction = section.instruction.clone();
        for reference in section.tools.iter().flatten() {
            agent.tools.push(self.loader.load_tool(reference)?);
        }
        Ok(ResolvedAgent::Inline(Arc::new(agent)))
    }
}

