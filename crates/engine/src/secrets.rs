//! Secret-backed environment variables

use aectl_config::{EnvValue, SecretReference};
use aectl_provider::SecretStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::spec::EnvVarValue;
use crate::{EngineError, Result};

pub struct SecretResolver {
    store: Arc<dyn SecretStore>,
}

impl SecretResolver {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, reference: &SecretReference) -> aectl_provider::Result<String> {
        debug!("◆ Resolving secret {}", reference);
        self.store
            .access(&reference.secret, &reference.version)
            .await
    }

    /// Resolve every secret reference in `env`
    ///
    /// The first failure aborts the whole mapping; no partially resolved
    /// environment is returned.
    pub async fn resolve_env(
        &self,
        env: &BTreeMap<String, EnvValue>,
    ) -> Result<BTreeMap<String, EnvVarValue>> {
        let mut resolved = BTreeMap::new();
        for (key, value) in env {
            let value = match value {
                EnvValue::Literal(literal) => EnvVarValue::Plain(literal.clone()),
                EnvValue::Secret(reference) => {
                    let value = self.resolve(reference).await.map_err(|source| {
                        EngineError::SecretResolution {
                            key: key.clone(),
                            reference: reference.to_string(),
                            source,
                        }
                    })?;
                    EnvVarValue::Secret {
                        reference: reference.clone(),
                        value,
                    }
                }
            };
            resolved.insert(key.clone(), value);
        }
        Ok(resolved)
    }
}
