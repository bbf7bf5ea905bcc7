//! HTTP-level tests for the Vertex AI and Secret Manager clients

use aectl_provider::{
    AgentEngineApi, ChildKind, DeploymentRequest, ProviderError, QueryParams, SecretManagerClient,
    SecretStore, VertexProvider,
};
use mockito::Matcher;
use serde_json::json;
use std::time::Duration;

const PARENT: &str = "/v1beta1/projects/p/locations/us-central1/reasoningEngines";
const ENGINE: &str = "projects/p/locations/us-central1/reasoningEngines/1";

fn provider(server: &mockito::ServerGuard) -> VertexProvider {
    VertexProvider::new(Some("p".into()), Some("us-central1".into()))
        .with_endpoint(server.url())
        .with_access_token(Some("token".into()))
        .with_poll_interval(Duration::from_millis(1))
}

#[tokio::test]
async fn test_list_filters_by_display_name() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", PARENT)
        .match_query(Matcher::UrlEncoded(
            "filter".into(),
            "display_name=\"agent-a\"".into(),
        ))
        .match_header("authorization", "Bearer token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "reasoningEngines": [
                    {"name": ENGINE, "displayName": "agent-a"}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let resources = provider(&server).list(Some("agent-a")).await.unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].name, ENGINE);
    assert_eq!(resources[0].display_name, "agent-a");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_list_follows_page_tokens() {
    let mut server = mockito::Server::new_async().await;
    let first = server
        .mock("GET", PARENT)
        .match_query(Matcher::Regex("^pageSize=100$".into()))
        .with_status(200)
        .with_body(
            json!({
                "reasoningEngines": [{"name": "e/1", "displayName": "a"}],
                "nextPageToken": "t2"
            })
            .to_string(),
        )
        .create_async()
        .await;
    let second = server
        .mock("GET", PARENT)
        .match_query(Matcher::Regex("pageToken=t2".into()))
        .with_status(200)
        .with_body(json!({"reasoningEngines": [{"name": "e/2", "displayName": "b"}]}).to_string())
        .create_async()
        .await;

    let resources = provider(&server).list(None).await.unwrap();
    let names: Vec<&str> = resources.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["e/1", "e/2"]);
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_create_polls_operation_until_done() {
    let mut server = mockito::Server::new_async().await;
    let create = server
        .mock("POST", PARENT)
        .match_body(Matcher::PartialJson(json!({"displayName": "agent-a"})))
        .with_status(200)
        .with_body(json!({"name": format!("{}/operations/op1", ENGINE), "done": false}).to_string())
        .create_async()
        .await;
    let poll = server
        .mock("GET", format!("/v1beta1/{}/operations/op1", ENGINE).as_str())
        .with_status(200)
        .with_body(
            json!({
                "name": format!("{}/operations/op1", ENGINE),
                "done": true,
                "response": {"name": ENGINE, "displayName": "agent-a"}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let resource = provider(&server)
        .create(&DeploymentRequest::new("agent-a"))
        .await
        .unwrap();
    assert_eq!(resource.name, ENGINE);
    create.assert_async().await;
    poll.assert_async().await;
}

#[tokio::test]
async fn test_update_sends_update_mask() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PATCH", format!("/v1beta1/{}", ENGINE).as_str())
        .match_query(Matcher::UrlEncoded(
            "updateMask".into(),
            "display_name,description".into(),
        ))
        .with_status(200)
        .with_body(
            json!({
                "name": "op",
                "done": true,
                "response": {"name": ENGINE, "displayName": "agent-a"}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let mut request = DeploymentRequest::new("agent-a");
    request.description = Some("new".into());
    provider(&server).update(ENGINE, &request).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_failed_operation_surfaces_message() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PARENT)
        .with_status(200)
        .with_body(
            json!({
                "name": "op",
                "done": true,
                "error": {"code": 3, "message": "bad requirements"}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let err = provider(&server)
        .create(&DeploymentRequest::new("agent-a"))
        .await
        .unwrap_err();
    match err {
        ProviderError::OperationFailed { message, .. } => assert_eq!(message, "bad requirements"),
        other => panic!("Expected OperationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_api_error_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", PARENT)
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body(json!({"error": {"message": "permission denied"}}).to_string())
        .create_async()
        .await;

    match provider(&server).list(None).await {
        Err(ProviderError::Api { status, message }) => {
            assert_eq!(status, 403);
            assert_eq!(message, "permission denied");
        }
        other => panic!("Expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_passes_force_flag() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("DELETE", format!("/v1beta1/{}", ENGINE).as_str())
        .match_query(Matcher::UrlEncoded("force".into(), "true".into()))
        .with_status(200)
        .with_body(json!({"name": "op", "done": true}).to_string())
        .create_async()
        .await;

    provider(&server).delete(ENGINE, true).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_list_children_tolerates_missing_collection() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", format!("/v1beta1/{}/sessions", ENGINE).as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({"sessions": [{"name": format!("{}/sessions/9", ENGINE)}]}).to_string())
        .create_async()
        .await;
    server
        .mock("GET", format!("/v1beta1/{}/memories", ENGINE).as_str())
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(json!({"error": {"message": "not found"}}).to_string())
        .create_async()
        .await;

    let children = provider(&server).list_children(ENGINE).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].kind, ChildKind::Session);
    assert!(children[0].name.ends_with("/sessions/9"));
}

#[tokio::test]
async fn test_create_session_returns_id() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", format!("/v1beta1/{}/sessions", ENGINE).as_str())
        .match_body(Matcher::PartialJson(json!({"userId": "alice"})))
        .with_status(200)
        .with_body(
            json!({
                "name": format!("{}/sessions/42/operations/7", ENGINE),
                "done": true,
                "response": {"name": format!("{}/sessions/42", ENGINE)}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let session = provider(&server)
        .create_session(ENGINE, Some("alice"))
        .await
        .unwrap();
    assert_eq!(session, "42");
}

#[tokio::test]
async fn test_query_returns_events_unmodified() {
    let mut server = mockito::Server::new_async().await;
    let body = format!(
        "data: {}\n\ndata: {}\n\n",
        json!({"content": {"parts": [{"text": "Hello"}]}, "author": "root"}),
        json!({"content": {"parts": [{"text": "there"}]}})
    );
    server
        .mock("POST", format!("/v1beta1/{}:streamQuery", ENGINE).as_str())
        .match_query(Matcher::UrlEncoded("alt".into(), "sse".into()))
        .match_body(Matcher::PartialJson(json!({
            "input": {"message": "hi", "session_id": "42", "user_id": "alice"}
        })))
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let response = provider(&server)
        .query(
            ENGINE,
            QueryParams {
                message: "hi".into(),
                session_id: "42".into(),
                user_id: Some("alice".into()),
            },
        )
        .await
        .unwrap();

    assert_eq!(response.events.len(), 2);
    assert_eq!(response.events[0]["author"], "root");
    assert_eq!(response.texts(), vec!["Hello", "there"]);
}

#[tokio::test]
async fn test_secret_manager_access() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/projects/p/secrets/s/versions/latest:access")
        .with_status(200)
        .with_body(json!({"payload": {"data": "dg=="}}).to_string())
        .create_async()
        .await;

    let client = SecretManagerClient::new(Some("p".into())).with_endpoint(server.url());
    assert_eq!(client.access("s", "latest").await.unwrap(), "v");
}

#[tokio::test]
async fn test_secret_manager_missing_secret() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/projects/p/secrets/gone/versions/1:access")
        .with_status(404)
        .with_body(json!({"error": {"message": "Secret not found"}}).to_string())
        .create_async()
        .await;

    let client = SecretManagerClient::new(Some("p".into())).with_endpoint(server.url());
    assert!(matches!(
        client.access("gone", "1").await,
        Err(ProviderError::NotFound(_))
    ));
}

/// Quotes in a display name are escaped inside the list filter
#[tokio::test]
async fn test_list_filter_escapes_quotes() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", PARENT)
        .match_query(Matcher::UrlEncoded(
            "filter".into(),
            r#"display_name="say \"hi\"""#.into(),
        ))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let resources = provider(&server).list(Some(r#"say "hi""#)).await.unwrap();
    assert!(resources.is_empty());
    mock.assert_async().await;
}

/// A non-JSON error page keeps its HTTP status
#[tokio::test]
async fn test_secret_manager_html_error_keeps_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/projects/p/secrets/s/versions/latest:access")
        .with_status(502)
        .with_header("content-type", "text/html")
        .with_body("<html><body>Bad Gateway</body></html>")
        .create_async()
        .await;

    let client = SecretManagerClient::new(Some("p".into())).with_endpoint(server.url());
    match client.access("s", "latest").await {
        Err(ProviderError::Api { status, message }) => {
            assert_eq!(status, 502);
            assert!(message.contains("Bad Gateway"));
        }
        other => panic!("Expected an Api error, got {:?}", other),
    }
}
