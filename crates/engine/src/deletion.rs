//! Guarded deletion of deployed agents

use aectl_provider::{AgentEngineApi, ChildResource, RemoteResource};
use std::sync::Arc;
use tracing::{info, warn};

use crate::lookup::{find_by_display_name, MatchPolicy};
use crate::spec::DeploymentSpec;
use crate::{EngineError, Result};

/// What to delete: an explicit display name or a resolved profile
#[derive(Debug, Clone, Copy)]
pub enum DeletionTarget<'a> {
    Name(&'a str),
    Spec(&'a DeploymentSpec),
}

impl DeletionTarget<'_> {
    pub fn display_name(&self) -> &str {
        match self {
            DeletionTarget::Name(name) => name,
            DeletionTarget::Spec(spec) => &spec.display_name,
        }
    }
}

/// Resource plus everything removed along with it
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionPlan {
    pub resource: RemoteResource,
    pub dependents: Vec<ChildResource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletionOutcome {
    pub plan: DeletionPlan,
    pub dry_run: bool,
}

pub struct DeletionPlanner {
    api: Arc<dyn AgentEngineApi>,
    policy: MatchPolicy,
}

impl DeletionPlanner {
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

    /// Locate the target and its dependents without changing anything
    pub async fn plan(&self, target: DeletionTarget<'_>) -> Result<DeletionPlan> {
        let display_name = target.display_name();
        let resource = find_by_display_name(self.api.as_ref(), display_name, self.policy)
            .await?
            .ok_or_else(|| EngineError::ResourceNotFound(display_name.to_string()))?;

        let dependents = self
            .api
            .list_children(&resource.name)
            .await
            .map_err(|e| EngineError::remote("list dependents of", &resource.name, e))?;

        Ok(DeletionPlan {
            resource,
            dependents,
        })
    }

    /// Delete the target; refuses while dependents exist unless `force`
    pub async fn delete(
        &self,
        target: DeletionTarget<'_>,
        force: bool,
        dry_run: bool,
    ) -> Result<DeletionOutcome> {
        let plan = self.plan(target).await?;

        if !plan.dependents.is_empty() && !force {
            return Err(EngineError::DependentResources {
                resource: plan.resource.name,
                dependents: plan.dependents,
            });
        }

        if dry_run {
            info!(
                "◆ Dry run: would delete {} and {} dependent resource(s)",
                plan.resource.name,
                plan.dependents.len()
            );
            return Ok(DeletionOutcome {
                plan,
                dry_run: true,
            });
        }

        if !plan.dependents.is_empty() {
            warn!(
                "◆ Force-deleting {} with {} dependent resource(s)",
                plan.resource.name,
                plan.dependents.len()
            );
        }
        self.api
            .delete(&plan.resource.name, force)
            .await
            .map_err(|e| EngineError::remote("delete", &plan.resource.name, e))?;
        info!("◆ Deleted agent engine {}", plan.resource.name);

        Ok(DeletionOutcome {
            plan,
            dry_run: false,
        })
    }
}
