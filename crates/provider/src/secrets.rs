//! Secret Manager access

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use tracing::debug;

use crate::{ProviderError, Result};

/// Resolves a secret reference to its plaintext value
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn access(&self, secret: &str, version: &str) -> Result<String>;
}

/// Google Secret Manager REST client
pub struct SecretManagerClient {
    client: Client,
    endpoint: String,
    project: Option<String>,
    access_token: Option<String>,
}

impl SecretManagerClient {
    pub fn new(project: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: "https://secretmanager.googleapis.com".to_string(),
            project,
            access_token: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|t| !t.is_empty());
        self
    }

    /// Full version resource name; short names are scoped to the project
    pub fn version_name(&self, secret: &str, version: &str) -> Result<String> {
        if secret.starts_with("projects/") {
            if secret.contains("/versions/") {
                return Ok(secret.to_string());
            }
            return Ok(format!("{}/versions/{}", secret, version));
        }

        let project = self
            .project
            .as_deref()
            .ok_or(ProviderError::NotConfigured("project"))?;
        Ok(format!(
            "projects/{}/secrets/{}/versions/{}",
            project, secret, version
        ))
    }

    fn decode_payload(data: &str) -> Result<String> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SecretStore for SecretManagerClient {
    async fn access(&self, secret: &str, version: &str) -> Result<String> {
        let name = self.version_name(secret, version)?;
        debug!("◆ Accessing secret {}", name);

        let url = format!("{}/v1/{}:access", self.endpoint, name);
        let mut builder = self.client.get(&url);
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(text);
            if status.as_u16() == 404 {
                return Err(ProviderError::NotFound(name));
            }
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let json: serde_json::Value = serde_json::from_str(&text)?;
        let data = json["payload"]["data"]
            .as_str()
            .ok_or_else(|| ProviderError::InvalidResponse("secret without payload".into()))?;
        Self::decode_payload(data)
    }
}
