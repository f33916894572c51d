use super::*;
use crate::test_support::{principal, RecordingTransport, StaticIdentity};

#[tokio::test]
async fn unauthenticated_session_resolves_to_none() {
    let client = TodoClient::new(StaticIdentity::signed_out(), RecordingTransport::new());
    assert_eq!(client.resolve_principal().await.expect("resolve"), None);
}

#[tokio::test]
async fn signed_in_session_resolves_to_the_principal() {
    let client = TodoClient::new(StaticIdentity::signed_in("token"), RecordingTransport::new());
    assert_eq!(
        client.resolve_principal().await.expect("resolve"),
        Some(principal())
    );
}

#[tokio::test]
async fn failed_sign_out_becomes_an_error_notice() {
    let identity = Arc::new(StaticIdentity {
        token: Some("token".to_string()),
        fail_sign_out: true,
    });
    let client = TodoClient::new(identity, RecordingTransport::new());

    let notice = client.sign_out().await.expect("notice");

    assert_eq!(notice.kind, NoticeKind::Error);
    assert!(notice.text.starts_with("Failed to sign out"));
}

#[tokio::test]
async fn successful_sign_out_is_silent() {
    let client = TodoClient::new(StaticIdentity::signed_in("token"), RecordingTransport::new());
    assert_eq!(client.sign_out().await, None);
}

#[tokio::test]
async fn mutations_go_through_the_shared_transport() {
    let transport = RecordingTransport::new();
    let client = TodoClient::new(StaticIdentity::signed_in("token"), transport.clone());

    let outcome = client
        .mutations()
        .toggle_complete(&crate::test_support::todo("t-1", "Walk"))
        .await;

    assert!(outcome.is_success());
    assert_eq!(transport.operations(), vec!["UpdateTodo"]);
}

#[test]
fn settings_with_an_unsupported_scheme_fail_to_build() {
    let settings = Settings {
        region: "eu-west-1".to_string(),
        user_pool_id: "pool".to_string(),
        user_pool_client_id: "client".to_string(),
        graphql_endpoint: "ftp://example.com/graphql".to_string(),
        ..Settings::default()
    };

    assert!(matches!(
        TodoClient::from_settings(&settings),
        Err(ClientError::Endpoint(_))
    ));
}

#[test]
fn settings_build_a_client() {
    let settings = Settings {
        region: "eu-west-1".to_string(),
        user_pool_id: "pool".to_string(),
        user_pool_client_id: "client".to_string(),
        graphql_endpoint: "https://example.com/graphql".to_string(),
        ..Settings::default()
    };

    assert!(TodoClient::from_settings(&settings).is_ok());
}
