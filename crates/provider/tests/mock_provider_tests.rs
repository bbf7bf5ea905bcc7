//! Mock SecretStore tests
//!
//! Verifies the secret store trait can be mocked and used as a trait object.

use async_trait::async_trait;
use mockall::mock;
use aectl_provider::{ProviderError, SecretStore};

mock! {
    pub Store {}

    #[async_trait]
    impl SecretStore for Store {
        async fn access(&self, secret: &str, version: &str) -> Result<String, ProviderError>;
    }
}

#[tokio::test]
async fn test_mock_store_returns_value() {
    let mut mock = MockStore::new();
    mock.expect_access()
        .withf(|secret, version| secret == "webhook" && version == "latest")
        .times(1)
        .returning(|_, _| Ok("https://hooks.example".to_string()));

    let store: &dyn SecretStore = &mock;
    assert_eq!(
        store.access("webhook", "latest").await.unwrap(),
        "https://hooks.example"
    );
}

#[tokio::test]
async fn test_mock_store_returns_error() {
    let mut mock = MockStore::new();
    mock.expect_access()
        .times(1)
        .returning(|_, _| Err(ProviderError::NotFound("webhook".to_string())));

    let result = mock.access("webhook", "latest").await;
    assert!(matches!(result, Err(ProviderError::NotFound(name)) if name == "webhook"));
}
