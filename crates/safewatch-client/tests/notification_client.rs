//! Notification client tests against a mock email endpoint.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use safewatch_client::{NotificationClient, NotifyConfig, NotifyError};
use safewatch_models::ViolationSummary;

fn config_for(server: &MockServer) -> NotifyConfig {
    NotifyConfig {
        url: format!("{}/send-email/", server.uri()),
        recipients: vec!["safety@example.com".to_string()],
        subject: "Safety violation alert".to_string(),
        api_key: None,
        timeout: Duration::from_secs(5),
    }
}

fn summary() -> ViolationSummary {
    [("no_helmet", 3u64)].into_iter().collect()
}

#[tokio::test]
async fn test_send_posts_report_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send-email/"))
        .and(body_partial_json(json!({
            "to": ["safety@example.com"],
            "subject": "Safety violation alert"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "sent"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = NotificationClient::new(config_for(&server)).unwrap();
    let request = client.violation_report(&summary());

    client.send(&request).await.unwrap();

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    let html = body["body"].as_str().unwrap();
    assert!(html.contains("no_helmet"));
    assert!(html.contains("<td>3</td>"));
}

#[tokio::test]
async fn test_api_key_sent_as_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer secret-key"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let config = NotifyConfig {
        api_key: Some("secret-key".to_string()),
        ..config_for(&server)
    };
    let client = NotificationClient::new(config).unwrap();

    client.send(&client.violation_report(&summary())).await.unwrap();
}

#[tokio::test]
async fn test_rejected_status_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("smtp down"))
        .mount(&server)
        .await;

    let client = NotificationClient::new(config_for(&server)).unwrap();
    let err = client
        .send(&client.violation_report(&summary()))
        .await
        .unwrap_err();

    match err {
        NotifyError::Rejected { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "smtp down");
        }
        other => panic!("Expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_no_recipients_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = NotifyConfig {
        recipients: vec![],
        ..config_for(&server)
    };
    let client = NotificationClient::new(config).unwrap();
    let err = client
        .send(&client.violation_report(&summary()))
        .await
        .unwrap_err();

    assert!(matches!(err, NotifyError::NoRecipients));
}
