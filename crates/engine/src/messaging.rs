//! Conversational messages to a deployed agent

use aectl_provider::{AgentEngineApi, QueryParams, QueryResponse};
use std::sync::Arc;
use tracing::{debug, info};

use crate::lookup::{find_by_display_name, MatchPolicy};
use crate::{EngineError, Result};

/// Platform reply plus the session it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct MessageReply {
    pub resource_name: String,
    pub session_id: String,
    pub response: QueryResponse,
}

pub struct MessagingGateway {
    api: Arc<dyn AgentEngineApi>,
    policy: MatchPolicy,
}

impl MessagingGateway {
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

    /// Send `message` to the agent named `display_name`
    ///
    /// Without `session_id` a new session is started first.
    pub async fn send(
        &self,
        message: &str,
        display_name: &str,
        session_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<MessageReply> {
        let resource = find_by_display_name(self.api.as_ref(), display_name, self.policy)
            .await?
            .ok_or_else(|| EngineError::ResourceNotFound(display_name.to_string()))?;

        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => {
                let id = self
                    .api
                    .create_session(&resource.name, user_id)
                    .await
                    .map_err(|e| EngineError::remote("create a session on", &resource.name, e))?;
                info!("◆ Started session {} on '{}'", id, display_name);
                id
            }
        };

        debug!("◆ Sending message to {} (session {})", resource.name, session_id);
        let response = self
            .api
            .query(
                &resource.name,
                QueryParams {
                    message: message.to_string(),
                    session_id: session_id.clone(),
                    user_id: user_id.map(str::to_string),
                },
            )
            .await
            .map_err(|e| EngineError::remote("query", &resource.name, e))?;

        Ok(MessageReply {
            resource_name: resource.name,
            session_id,
            response,
        })
    }
}
