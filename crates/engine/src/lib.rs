//! Configuration resolution and reconciliation
//!
//! Turns a selected profile into a fully resolved [`DeploymentSpec`] and
//! drives the create/update, messaging and deletion flows against an
//! [`AgentEngineApi`](aectl_provider::AgentEngineApi).

pub mod deletion;
pub mod deployer;
pub mod error;
pub mod lookup;
pub mod messaging;
pub mod reconcile;
pub mod registry;
pub mod resolver;
pub mod secrets;
pub mod spec;

pub use deletion::{DeletionOutcome, DeletionPlan, DeletionPlanner, DeletionTarget};
pub use deployer::Deployer;
pub use error::{EngineError, Result};
pub use lookup::MatchPolicy;
pub use messaging::{MessageReply, MessagingGateway};
pub use reconcile::{ReconcileAction, ReconcileOutcome, ReconciliationEngine};
pub use registry::{
    AgentDefinition, Export, ExportKind, ImportError, InstanceLoader, InstanceRegistry,
    ToolDefinition,
};
pub use resolver::ProfileResolver;
pub use secrets::SecretResolver;
pub use spec::{DeploymentSpec, EnvVarValue, ResolvedAgent};
