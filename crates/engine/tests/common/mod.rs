//! Shared fakes for engine integration tests
#![allow(dead_code)]

use aectl_config::{ProfileDocument, VertexSettings};
use aectl_engine::{Deployer, InstanceRegistry};
use aectl_provider::{
    AgentEngineApi, ChildResource, DeploymentRequest, ProviderError, QueryParams, QueryResponse,
    RemoteResource, SecretStore,
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const PARENT: &str = "projects/test/locations/us-central1/reasoningEngines";

/// Every call the fake platform received, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List(Option<String>),
    Create(String),
    Update(String),
    Delete { name: String, force: bool },
    ListChildren(String),
    CreateSession(String),
    Query { name: String, session_id: String },
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(self, Call::Create(_) | Call::Update(_) | Call::Delete { .. })
    }
}

#[derive(Default)]
struct State {
    resources: Vec<RemoteResource>,
    children: HashMap<String, Vec<ChildResource>>,
    calls: Vec<Call>,
    requests: Vec<DeploymentRequest>,
    next_id: u32,
    fail_mutations: Option<String>,
}

/// In-memory platform that remembers what it created
#[derive(Default)]
pub struct FakeEngineApi {
    state: Mutex<State>,
}

impl FakeEngineApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an existing resource and return its full name
    pub fn with_resource(&self, display_name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let name = format!("{}/{}", PARENT, 1000 + state.next_id);
        state
            .resources
            .push(RemoteResource::new(name.clone(), display_name));
        name
    }

    pub fn with_child(&self, resource_name: &str, child: ChildResource) {
        self.state
            .lock()
            .unwrap()
            .children
            .entry(resource_name.to_string())
            .or_default()
            .push(child);
    }

    pub fn fail_mutations(&self, message: &str) {
        self.state.lock().unwrap().fail_mutations = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn resources(&self) -> Vec<RemoteResource> {
        self.state.lock().unwrap().resources.clone()
    }

    pub fn last_request(&self) -> Option<DeploymentRequest> {
        self.state.lock().unwrap().requests.last().cloned()
    }

    fn failure(state: &State) -> Result<(), ProviderError> {
        match &state.fail_mutations {
            Some(message) => Err(ProviderError::Api {
                status: 500,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AgentEngineApi for FakeEngineApi {
    async fn list(
        &self,
        display_name: Option<&str>,
    ) -> Result<Vec<RemoteResource>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::List(display_name.map(str::to_string)));
        Ok(state
            .resources
            .iter()
            .filter(|r| display_name.map_or(true, |name| r.display_name == name))
            .cloned()
            .collect())
    }

    async fn create(&self, request: &DeploymentRequest) -> Result<RemoteResource, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Create(request.display_name.clone()));
        state.requests.push(request.clone());
        Self::failure(&state)?;

        state.next_id += 1;
        let resource = RemoteResource::new(
            format!("{}/{}", PARENT, 1000 + state.next_id),
            request.display_name.clone(),
        );
        state.resources.push(resource.clone());
        Ok(resource)
    }

    async fn update(
        &self,
        resource_name: &str,
        request: &DeploymentRequest,
    ) -> Result<RemoteResource, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Update(resource_name.to_string()));
        state.requests.push(request.clone());
        Self::failure(&state)?;

        let resource = state
            .resources
            .iter_mut()
            .find(|r| r.name == resource_name)
            .ok_or_else(|| ProviderError::NotFound(resource_name.to_string()))?;
        resource.display_name = request.display_name.clone();
        resource.description = request.description.clone();
        Ok(resource.clone())
    }

    async fn delete(&self, resource_name: &str, force: bool) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete {
            name: resource_name.to_string(),
            force,
        });
        Self::failure(&state)?;
        state.resources.retain(|r| r.name != resource_name);
        state.children.remove(resource_name);
        Ok(())
    }

    async fn list_children(
        &self,
        resource_name: &str,
    ) -> Result<Vec<ChildResource>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::ListChildren(resource_name.to_string()));
        Ok(state
            .children
            .get(resource_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_session(
        &self,
        resource_name: &str,
        _user_id: Option<&str>,
    ) -> Result<String, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(Call::CreateSession(resource_name.to_string()));
        Ok("session-1".to_string())
    }

    async fn query(
        &self,
        resource_name: &str,
        params: QueryParams,
    ) -> Result<QueryResponse, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Query {
            name: resource_name.to_string(),
            session_id: params.session_id.clone(),
        });
        Ok(QueryResponse {
            events: vec![json!({
                "author": "root",
                "content": {"parts": [{"text": format!("echo: {}", params.message)}]},
                "invocation_id": "inv-1"
            })],
        })
    }
}

/// Secret store backed by a map of `secret@version` to value
#[derive(Default)]
pub struct FakeSecretStore {
    values: HashMap<String, String>,
    accessed: Mutex<Vec<String>>,
}

impl FakeSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, secret: &str, version: &str, value: &str) -> Self {
        self.values
            .insert(format!("{}@{}", secret, version), value.to_string());
        self
    }

    pub fn accessed(&self) -> Vec<String> {
        self.accessed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn access(&self, secret: &str, version: &str) -> Result<String, ProviderError> {
        let key = format!("{}@{}", secret, version);
        self.accessed.lock().unwrap().push(key.clone());
        self.values
            .get(&key)
            .cloned()
            .ok_or(ProviderError::NotFound(key))
    }
}

pub fn document(yaml: &str) -> ProfileDocument {
    ProfileDocument::from_yaml_str(yaml).unwrap()
}

/// Deployer over fakes with no environment fallback
pub fn deployer(
    yaml: &str,
    profile: &str,
    api: Arc<FakeEngineApi>,
    secrets: Arc<FakeSecretStore>,
) -> Deployer {
    Deployer::new(
        document(yaml),
        profile,
        api,
        secrets,
        Arc::new(InstanceRegistry::new()),
    )
    .with_env_fallback(VertexSettings::default())
}
