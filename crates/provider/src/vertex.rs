//! Vertex AI reasoning engine client
//!
//! REST access to `projects/*/locations/*/reasoningEngines`. Mutations return
//! long-running operations which are polled until done; failures are
//! surfaced as-is, never retried.

use crate::*;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, trace};

const API_VERSION: &str = "v1beta1";
const PAGE_SIZE: &str = "100";

/// Vertex AI agent engine node
pub struct VertexProvider {
    client: Client,
    endpoint: String,
    project: Option<String>,
    location: Option<String>,
    access_token: Option<String>,
    poll_interval: Duration,
    operation_timeout: Duration,
}

impl VertexProvider {
    pub fn new(project: Option<String>, location: Option<String>) -> Self {
        let endpoint = location
            .as_deref()
            .map(|l| format!("https://{}-aiplatform.googleapis.com", l))
            .unwrap_or_else(|| "https://aiplatform.googleapis.com".to_string());

        Self {
            client: Client::new(),
            endpoint,
            project,
            location,
            access_token: None,
            poll_interval: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(30 * 60),
        }
    }

    /// Point at a different API host
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    fn parent(&self) -> Result<String> {
        let project = self
            .project
            .as_deref()
            .ok_or(ProviderError::NotConfigured("project"))?;
        let location = self
            .location
            .as_deref()
            .ok_or(ProviderError::NotConfigured("location"))?;
        Ok(format!("projects/{}/locations/{}", project, location))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.endpoint, API_VERSION, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value> {
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| text.clone());
            if status.as_u16() == 404 {
                return Err(ProviderError::NotFound(message));
            }
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// GET every page of a collection
    async fn list_collection(
        &self,
        path: &str,
        field: &str,
        filter: Option<String>,
    ) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = vec![("pageSize", PAGE_SIZE.to_string())];
            if let Some(filter) = &filter {
                query.push(("filter", filter.clone()));
            }
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let page = self.send(self.request(Method::GET, path).query(&query)).await?;
            if let Some(batch) = page[field].as_array() {
                items.extend(batch.iter().cloned());
            }

            match page["nextPageToken"].as_str() {
                Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(items)
    }

    /// Poll a long-running operation until it reports `done`
    async fn wait_operation(&self, operation: Value) -> Result<Value> {
        let name = operation["name"].as_str().unwrap_or_default().to_string();
        let started = tokio::time::Instant::now();
        let mut current = operation;

        loop {
            if current["done"].as_bool().unwrap_or(false) {
                if let Some(error) = current.get("error") {
                    return Err(ProviderError::OperationFailed {
                        operation: name,
                        message: error["message"]
                            .as_str()
                            .unwrap_or("unknown error")
                            .to_string(),
                    });
                }
                return Ok(current.get("response").cloned().unwrap_or(Value::Null));
            }

            if name.is_empty() {
                return Err(ProviderError::InvalidResponse(
                    "operation without a name".to_string(),
                ));
            }
            if started.elapsed() >= self.operation_timeout {
                return Err(ProviderError::OperationTimeout(name));
            }

            trace!("◆ Waiting on operation {}", name);
            tokio::time::sleep(self.poll_interval).await;
            current = self.send(self.request(Method::GET, &name)).await?;
        }
    }

    fn package_uri(&self, request: &DeploymentRequest, file: &str) -> Option<String> {
        let bucket = request.staging_bucket.as_deref()?;
        let bucket = bucket.trim_end_matches('/');
        Some(match request.gcs_dir_name.as_deref() {
            Some(dir) => format!("{}/{}/{}", bucket, dir.trim_matches('/'), file),
            None => format!("{}/{}", bucket, file),
        })
    }

    /// ReasoningEngine resource body for a request
    ///
    /// Artifacts (pickled agent, requirements, extra packages) are staged
    /// under `<staging_bucket>/<gcs_dir_name>/` before this call.
    pub fn build_body(&self, request: &DeploymentRequest) -> Value {
        let mut body = json!({ "displayName": request.display_name });
        if let Some(description) = &request.description {
            body["description"] = json!(description);
        }
        if let Some(labels) = &request.labels {
            body["labels"] = json!(labels);
        }

        let mut spec = serde_json::Map::new();
        if let Some(framework) = &request.agent_framework {
            spec.insert("agentFramework".into(), json!(framework));
        }
        if let Some(account) = &request.service_account {
            spec.insert("serviceAccount".into(), json!(account));
        }
        if let Some(identity) = &request.identity_type {
            spec.insert("identityType".into(), json!(identity));
        }

        let mut package = serde_json::Map::new();
        if request.agent.is_some() {
            if let Some(uri) = self.package_uri(request, "agent_engine.pkl") {
                package.insert("pickleObjectGcsUri".into(), json!(uri));
            }
        }
        if request.requirements.is_some() {
            if let Some(uri) = self.package_uri(request, "requirements.txt") {
                package.insert("requirementsGcsUri".into(), json!(uri));
            }
        }
        if request.extra_packages.is_some() {
            if let Some(uri) = self.package_uri(request, "dependencies.tar.gz") {
                package.insert("dependencyFilesGcsUri".into(), json!(uri));
            }
        }
        if !package.is_empty() {
            spec.insert("packageSpec".into(), Value::Object(package));
        }

        let mut deployment = serde_json::Map::new();
        if let Some(env) = &request.env_vars {
            let env: Vec<Value> = env
                .iter()
                .map(|(name, value)| json!({"name": name, "value": value}))
                .collect();
            deployment.insert("env".into(), json!(env));
        }
        if let Some(min) = request.min_instances {
            deployment.insert("minInstances".into(), json!(min));
        }
        if let Some(max) = request.max_instances {
            deployment.insert("maxInstances".into(), json!(max));
        }
        if let Some(limits) = &request.resource_limits {
            deployment.insert("resourceLimits".into(), json!(limits));
        }
        if let Some(concurrency) = request.container_concurrency {
            deployment.insert("containerConcurrency".into(), json!(concurrency));
        }
        if let Some(psc) = &request.psc_interface_config {
            deployment.insert("pscInterfaceConfig".into(), psc.clone());
        }
        if !deployment.is_empty() {
            spec.insert("deploymentSpec".into(), Value::Object(deployment));
        }

        for (key, value) in &request.extra {
            spec.insert(key.clone(), value.clone());
        }
        if !spec.is_empty() {
            body["spec"] = Value::Object(spec);
        }

        body
    }

    /// `updateMask` paths for the fields a request carries
    pub fn update_mask(request: &DeploymentRequest) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for field in request.present_fields() {
            let path = match field.as_str() {
                "display_name" | "description" | "labels" => field.clone(),
                "agent" => "spec.package_spec.pickle_object_gcs_uri".to_string(),
                "requirements" => "spec.package_spec.requirements_gcs_uri".to_string(),
                "extra_packages" => "spec.package_spec.dependency_files_gcs_uri".to_string(),
                "env_vars" => "spec.deployment_spec.env".to_string(),
                "min_instances" | "max_instances" | "resource_limits"
                | "container_concurrency" | "psc_interface_config" => {
                    format!("spec.deployment_spec.{}", field)
                }
                "service_account" | "identity_type" | "agent_framework" => {
                    format!("spec.{}", field)
                }
                "gcs_dir_name" | "staging_bucket" => continue,
                other => format!("spec.{}", other),
            };
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }

    fn parse_resource(value: Value) -> Result<RemoteResource> {
        if value.is_null() {
            return Err(ProviderError::InvalidResponse(
                "operation finished without a resource".to_string(),
            ));
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Split `data: {...}` server-sent lines and bare JSON lines into events
pub fn parse_event_stream(body: &str) -> Result<Vec<Value>> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.strip_prefix("data:").map(str::trim).unwrap_or(line))
        .map(|line| {
            serde_json::from_str(line)
                .map_err(|e| ProviderError::InvalidResponse(format!("bad event: {}", e)))
        })
        .collect()
}

/// `display_name="..."` with `\` and `"` escaped inside the quotes
fn display_name_filter(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("display_name=\"{}\"", escaped)
}

#[async_trait::async_trait]
impl AgentEngineApi for VertexProvider {
    async fn list(&self, display_name: Option<&str>) -> Result<Vec<RemoteResource>> {
        let path = format!("{}/reasoningEngines", self.parent()?);
        let filter = display_name.map(display_name_filter);
        debug!("◆ Listing agent engines under {} (filter: {:?})", path, filter);

        self.list_collection(&path, "reasoningEngines", filter)
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(ProviderError::from))
            .collect()
    }

    async fn create(&self, request: &DeploymentRequest) -> Result<RemoteResource> {
        let path = format!("{}/reasoningEngines", self.parent()?);
        info!("◆ Creating agent engine '{}'", request.display_name);

        let body = self.build_body(request);
        let operation = self
            .send(self.request(Method::POST, &path).json(&body))
            .await?;
        let resource = self.wait_operation(operation).await?;
        Self::parse_resource(resource)
    }

    async fn update(
        &self,
        resource_name: &str,
        request: &DeploymentRequest,
    ) -> Result<RemoteResource> {
        let mask = Self::update_mask(request).join(",");
        info!("◆ Updating agent engine {} (mask: {})", resource_name, mask);

        let body = self.build_body(request);
        let operation = self
            .send(
                self.request(Method::PATCH, resource_name)
                    .query(&[("updateMask", mask)])
                    .json(&body),
            )
            .await?;
        let resource = self.wait_operation(operation).await?;
        Self::parse_resource(resource)
    }

    async fn delete(&self, resource_name: &str, force: bool) -> Result<()> {
        info!("◆ Deleting agent engine {} (force: {})", resource_name, force);

        let operation = self
            .send(
                self.request(Method::DELETE, resource_name)
                    .query(&[("force", force.to_string())]),
            )
            .await?;
        self.wait_operation(operation).await?;
        Ok(())
    }

    async fn list_children(&self, resource_name: &str) -> Result<Vec<ChildResource>> {
        let mut children = Vec::new();
        let collections = [("sessions", ChildKind::Session), ("memories", ChildKind::Memory)];
        for (collection, kind) in collections {
            let path = format!("{}/{}", resource_name, collection);
            let items = match self.list_collection(&path, collection, None).await {
                Ok(items) => items,
                Err(ProviderError::NotFound(_)) => Vec::new(),
                Err(e) => return Err(e),
            };
            children.extend(
                items
                    .iter()
                    .filter_map(|item| item["name"].as_str())
                    .map(|name| ChildResource::new(name, kind)),
            );
        }
        debug!("◆ {} has {} child resource(s)", resource_name, children.len());
        Ok(children)
    }

    async fn create_session(&self, resource_name: &str, user_id: Option<&str>) -> Result<String> {
        let path = format!("{}/sessions", resource_name);
        let mut body = json!({});
        if let Some(user) = user_id {
            body["userId"] = json!(user);
        }

        let operation = self
            .send(self.request(Method::POST, &path).json(&body))
            .await?;
        // Operation names look like `.../sessions/<id>/operations/<op>`
        let operation_name = operation["name"].as_str().unwrap_or_default().to_string();
        let response = self.wait_operation(operation).await?;

        let session_name = response["name"]
            .as_str()
            .map(str::to_string)
            .or_else(|| {
                operation_name
                    .split_once("/operations/")
                    .map(|(session, _)| session.to_string())
            })
            .ok_or_else(|| {
                ProviderError::InvalidResponse("session response without a name".into())
            })?;

        let session_id = session_name
            .rsplit('/')
            .next()
            .unwrap_or(&session_name)
            .to_string();
        debug!("◆ Started session {}", session_id);
        Ok(session_id)
    }

    async fn query(&self, resource_name: &str, params: QueryParams) -> Result<QueryResponse> {
        let path = format!("{}:streamQuery", resource_name);
        let mut input = json!({
            "message": params.message,
            "session_id": params.session_id,
        });
        if let Some(user) = &params.user_id {
            input["user_id"] = json!(user);
        }
        let body = json!({
            "class_method": "async_stream_query",
            "input": input,
        });

        let response = self
            .request(Method::POST, &path)
            .query(&[("alt", "sse")])
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        Ok(QueryResponse {
            events: parse_event_stream(&text)?,
        })
    }
}
