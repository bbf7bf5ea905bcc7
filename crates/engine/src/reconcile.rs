//! Create-or-update reconciliation
//!
//! `LOOKUP` lists resources by display name and picks `CREATE` or `UPDATE`.
//! A dry run stops right after that decision, so it always reports the
//! branch a real run would take against the same remote state, together
//! with the effective payload.

use aectl_provider::{AgentEngineApi, DeploymentRequest, RemoteResource};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::lookup::{find_by_display_name, MatchPolicy};
use crate::spec::DeploymentSpec;
use crate::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    Create,
    Update { resource_name: String },
}

impl ReconcileAction {
    pub fn operation(&self) -> &'static str {
        match self {
            ReconcileAction::Create => "create",
            ReconcileAction::Update { .. } => "update",
        }
    }
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileAction::Create => write!(f, "create"),
            ReconcileAction::Update { resource_name } => write!(f, "update {}", resource_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub display_name: String,
    pub action: ReconcileAction,
    pub dry_run: bool,
    /// Effective payload; its `Debug` omits env var values
    pub request: DeploymentRequest,
    /// Resource returned by the platform; `None` on a dry run
    pub resource: Option<RemoteResource>,
}

pub struct ReconciliationEngine {
    api: Arc<dyn AgentEngineApi>,
    policy: MatchPolicy,
}

impl ReconciliationEngine {
    pub fn new(api: Arc<dyn AgentEngineApi>) -> Self {
        Self {
            api,
            policy: MatchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// LOOKUP: the transition a deploy of `spec` would take
    pub async fn plan(&self, spec: &DeploymentSpec) -> Result<ReconcileAction> {
        let existing =
            find_by_display_name(self.api.as_ref(), &spec.display_name, self.policy).await?;
        Ok(match existing {
            Some(resource) => ReconcileAction::Update {
                resource_name: resource.name,
            },
            None => ReconcileAction::Create,
        })
    }

    pub async fn reconcile(
        &self,
        spec: &DeploymentSpec,
        dry_run: bool,
    ) -> Result<ReconcileOutcome> {
        let request = spec.to_request()?;
        info!("◆ Effective spec: {:?}", request);
        let action = self.plan(spec).await?;

        if dry_run {
            info!(
                "◆ Dry run: would {} agent engine '{}'",
                action, spec.display_name
            );
            return Ok(ReconcileOutcome {
                display_name: spec.display_name.clone(),
                action,
                dry_run: true,
                request,
                resource: None,
            });
        }

        let result = match &action {
            ReconcileAction::Create => {
                info!("◆ Creating agent engine '{}'", spec.display_name);
                self.api.create(&request).await
            }
            ReconcileAction::Update { resource_name } => {
                info!(
                    "◆ Updating agent engine '{}' ({})",
                    spec.display_name, resource_name
                );
                self.api.update(resource_name, &request).await
            }
        };

        let resource = result.map_err(|source| EngineError::Deployment {
            operation: action.operation(),
            display_name: spec.display_name.clone(),
            source,
        })?;

        info!("◆ Agent engine ready: {}", resource.name);
        Ok(ReconcileOutcome {
            display_name: spec.display_name.clone(),
            action,
            dry_run: false,
            request,
            resource: Some(resource),
        })
    }
}
