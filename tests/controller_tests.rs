use std::sync::Arc;
use std::time::Duration;

use postwave::controller::{
    ActionError, ActionOutcome, ApiKeyCredentials, AuthenticatedUser, ConnectionController,
    PlatformAction,
};
use postwave::platforms::ProviderId;
use postwave::store::{ConnectionStore, StoreError};
use postwave::webhook::{EventType, WebhookNotifier, WebhookSettings};
use uuid::Uuid;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

mod test_utils;
use test_utils::{
    AUTH_BASE, RETURN_URL, RecordingSink, break_table, pending_states, setup_test_db,
    test_redirector, test_store,
};

fn user() -> AuthenticatedUser {
    AuthenticatedUser {
        id: Uuid::new_v4(),
        email: "riley@example.com".to_string(),
    }
}

fn click(name: &str, is_connected: bool) -> PlatformAction {
    PlatformAction {
        name: name.to_string(),
        is_connected,
    }
}

fn rss_key() -> Option<ApiKeyCredentials> {
    Some(ApiKeyCredentials {
        api_key: "rss-key".to_string(),
        api_secret: None,
    })
}

#[tokio::test]
async fn platform_without_provider_asks_for_manual_setup() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let sink = RecordingSink::new();
    let controller = ConnectionController::new(store.clone(), test_redirector(), sink.clone());
    let user = user();

    let outcome = controller
        .handle_platform_action(Some(&user), &click("CustomRSS", false), None)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ActionOutcome::ManualSetupRequired {
            platform: "CustomRSS".to_string()
        }
    );
    assert!(!store.list_connections(user.id).await.unwrap().is_connected("CustomRSS"));
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn manual_credentials_connect_and_notify() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let sink = RecordingSink::new();
    let controller = ConnectionController::new(store.clone(), test_redirector(), sink.clone());
    let user = user();

    let outcome = controller
        .handle_platform_action(Some(&user), &click("CustomRSS", false), rss_key())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ActionOutcome::Connected {
            platform: "CustomRSS".to_string()
        }
    );
    assert!(store.list_connections(user.id).await.unwrap().is_connected("CustomRSS"));

    let events = sink.of_type(EventType::PlatformConnected);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].platform.as_deref(), Some("CustomRSS"));
    assert_eq!(events[0].user_email, "riley@example.com");
}

#[tokio::test]
async fn oauth_platform_redirects_without_storing_a_connection() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let sink = RecordingSink::new();
    let controller = ConnectionController::new(store.clone(), test_redirector(), sink.clone());
    let user = user();

    let outcome = controller
        .handle_platform_action(Some(&user), &click("LinkedIn", false), None)
        .await
        .unwrap();

    let ActionOutcome::Redirecting {
        platform,
        provider,
        authorize_url,
    } = outcome
    else {
        panic!("expected a redirect");
    };
    assert_eq!(platform, "LinkedIn");
    assert_eq!(provider, ProviderId::LinkedinOidc);
    let url = url::Url::parse(&authorize_url).unwrap();
    assert!(authorize_url.starts_with(&format!("{}/authorize", AUTH_BASE)));
    assert!(
        url.query_pairs()
            .any(|(k, v)| k == "redirect_to" && v == RETURN_URL)
    );

    assert!(store.list_connections(user.id).await.unwrap().connected_names().is_empty());
    assert_eq!(pending_states(&db, user.id).await.unwrap().len(), 1);
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn connected_platform_is_disconnected() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let sink = RecordingSink::new();
    let controller = ConnectionController::new(store.clone(), test_redirector(), sink.clone());
    let user = user();

    controller
        .handle_platform_action(Some(&user), &click("CustomRSS", false), rss_key())
        .await
        .unwrap();
    let outcome = controller
        .handle_platform_action(Some(&user), &click("CustomRSS", true), None)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ActionOutcome::Disconnected {
            platform: "CustomRSS".to_string()
        }
    );
    assert!(!store.list_connections(user.id).await.unwrap().is_connected("CustomRSS"));
    assert_eq!(sink.of_type(EventType::PlatformDisconnected).len(), 1);
}

#[tokio::test]
async fn anonymous_action_does_nothing() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let sink = RecordingSink::new();
    let controller = ConnectionController::new(store.clone(), test_redirector(), sink.clone());

    for action in [click("YouTube", false), click("YouTube", true)] {
        let err = controller
            .handle_platform_action(None, &action, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::AuthRequired));
    }

    let err = controller.sync_dashboard(None).await.unwrap_err();
    assert!(matches!(err, ActionError::AuthRequired));
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn failed_disconnect_reports_error_and_stays_silent() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let sink = RecordingSink::new();
    let controller = ConnectionController::new(store.clone(), test_redirector(), sink.clone());
    let user = user();

    break_table(&db, "oauth_connections").await.unwrap();

    let err = controller
        .handle_platform_action(Some(&user), &click("YouTube", true), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Store(StoreError::Write(_))));
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn sync_sends_connected_platform_names() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let sink = RecordingSink::new();
    let controller = ConnectionController::new(store.clone(), test_redirector(), sink.clone());
    let user = user();

    controller
        .handle_platform_action(Some(&user), &click("TikTok", false), rss_key())
        .await
        .unwrap();

    let listing = controller.sync_dashboard(Some(&user)).await.unwrap();
    assert_eq!(listing.connected_names(), vec!["TikTok".to_string()]);

    let syncs = sink.of_type(EventType::DashboardSync);
    assert_eq!(syncs.len(), 1);
    assert_eq!(syncs[0].connected_platforms, Some(vec!["TikTok".to_string()]));
}

#[tokio::test]
async fn webhook_failure_does_not_fail_the_action() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let notifier = WebhookNotifier::new(WebhookSettings {
        url: Some(format!("{}/hook", mock_server.uri())),
        signing_secret: None,
        timeout: Duration::from_secs(2),
        source: "postwave".to_string(),
        allow_http: true,
    })
    .unwrap();

    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let controller = ConnectionController::new(store.clone(), test_redirector(), Arc::new(notifier));
    let user = user();

    let outcome = controller
        .handle_platform_action(Some(&user), &click("CustomRSS", false), rss_key())
        .await
        .unwrap();
    assert!(matches!(outcome, ActionOutcome::Connected { .. }));
    assert!(store.list_connections(user.id).await.unwrap().is_connected("CustomRSS"));

    // Let the spawned delivery reach the mock before it verifies.
    for _ in 0..50 {
        if !mock_server.received_requests().await.unwrap_or_default().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn unreachable_webhook_does_not_fail_the_action() {
    let notifier = WebhookNotifier::new(WebhookSettings {
        url: Some("http://127.0.0.1:9/unreachable".to_string()),
        signing_secret: None,
        timeout: Duration::from_millis(200),
        source: "postwave".to_string(),
        allow_http: true,
    })
    .unwrap();

    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let controller = ConnectionController::new(store.clone(), test_redirector(), Arc::new(notifier));
    let user = user();

    controller
        .handle_platform_action(Some(&user), &click("CustomRSS", false), rss_key())
        .await
        .unwrap();
    let outcome = controller
        .handle_platform_action(Some(&user), &click("CustomRSS", true), None)
        .await
        .unwrap();
    assert!(matches!(outcome, ActionOutcome::Disconnected { .. }));
}
