//! Programmatic entry point
//!
//! One `Deployer` serves one profile of one loaded document. Every call
//! re-resolves the profile; nothing is cached between calls.

use aectl_config::{ConfigError, ProfileDocument, ProfileSpec, VertexSettings};
use aectl_provider::{AgentEngineApi, RemoteResource, SecretStore};
use std::sync::Arc;
use tracing::info;

use crate::deletion::{DeletionOutcome, DeletionPlanner, DeletionTarget};
use crate::lookup::MatchPolicy;
use crate::messaging::{MessageReply, MessagingGateway};
use crate::reconcile::{ReconcileOutcome, ReconciliationEngine};
use crate::registry::InstanceLoader;
use crate::resolver::ProfileResolver;
use crate::spec::DeploymentSpec;
use crate::{EngineError, Result};

pub struct Deployer {
    document: ProfileDocument,
    profile: String,
    api: Arc<dyn AgentEngineApi>,
    resolver: ProfileResolver,
    policy: MatchPolicy,
}

impl Deployer {
    pub fn new(
        document: ProfileDocument,
        profile: impl Into<String>,
        api: Arc<dyn AgentEngineApi>,
        secrets: Arc<dyn SecretStore>,
        loader: Arc<dyn InstanceLoader>,
    ) -> Self {
        Self {
            document,
            profile: profile.into(),
            api,
            resolver: ProfileResolver::new(secrets, loader),
            policy: MatchPolicy::default(),
        }
    }

    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_env_fallback(mut self, fallback: VertexSettings) -> Self {
        self.resolver = self.resolver.with_env_fallback(fallback);
        self
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn document(&self) -> &ProfileDocument {
        &self.document
    }

    /// Effective spec for this deployer's profile
    pub async fn resolve(&self, overrides: ProfileSpec) -> Result<DeploymentSpec> {
        self.resolver
            .resolve(&self.document, &self.profile, overrides)
            .await
    }

    /// `display_name` of the merged profile, without resolving references
    pub fn display_name(&self) -> Result<String> {
        ProfileResolver::merge(&self.document, &self.profile, ProfileSpec::default())?
            .display_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| {
                EngineError::from(ConfigError::MissingField {
                    profile: self.profile.clone(),
                    field: "display_name",
                })
            })
    }

    pub async fn create_or_update_from_yaml(
        &self,
        dry_run: bool,
        overrides: ProfileSpec,
    ) -> Result<ReconcileOutcome> {
        let spec = self.resolve(overrides).await?;
        ReconciliationEngine::new(self.api.clone())
            .with_policy(self.policy)
            .reconcile(&spec, dry_run)
            .await
    }

    /// Delete the agent engine named by this profile's `display_name`
    pub async fn delete_agent_engine_from_yaml(
        &self,
        force: bool,
        dry_run: bool,
    ) -> Result<DeletionOutcome> {
        let display_name = self.display_name()?;
        self.delete_agent_engine(&display_name, force, dry_run).await
    }

    pub async fn delete_agent_engine(
        &self,
        display_name: &str,
        force: bool,
        dry_run: bool,
    ) -> Result<DeletionOutcome> {
        DeletionPlanner::new(self.api.clone())
            .with_policy(self.policy)
            .delete(DeletionTarget::Name(display_name), force, dry_run)
            .await
    }

    /// Message an agent; `display_name` defaults to this profile's
    pub async fn send_message(
        &self,
        message: &str,
        display_name: Option<&str>,
        session_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<MessageReply> {
        let display_name = match display_name {
            Some(name) => name.to_string(),
            None => self.display_name()?,
        };
        MessagingGateway::new(self.api.clone())
            .with_policy(self.policy)
            .send(message, &display_name, session_id, user_id)
            .await
    }

    pub async fn list_agent_engine(&self) -> Result<Vec<RemoteResource>> {
        let resources = self
            .api
            .list(None)
            .await
            .map_err(|e| EngineError::remote("list", "agent engines", e))?;
        info!("◆ Found {} agent engine(s)", resources.len());
        Ok(resources)
    }
}
