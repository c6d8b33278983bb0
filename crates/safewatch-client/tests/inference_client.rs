//! Inference client tests against a mock backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use safewatch_client::progress::{COMPLETE, HEADERS_RECEIVED, UPLOAD_PHASE_MAX};
use safewatch_client::{
    DetectionProfile, InferenceClient, InferenceConfig, SubmissionRequest, SubmitError,
    UploadProgress,
};
use safewatch_models::{DisplayUrl, MediaAsset, MediaKind};

fn asset(filename: &str, mime: &str, data: Vec<u8>) -> MediaAsset {
    MediaAsset {
        filename: filename.to_string(),
        mime: mime.to_string(),
        kind: MediaKind::from_mime(mime).expect("test asset must be image or video"),
        data: Arc::from(data),
        display_url: DisplayUrl::new("blob:safewatch/test"),
    }
}

fn client_for(server: &MockServer) -> InferenceClient {
    InferenceClient::new(InferenceConfig::with_base_url(server.uri())).unwrap()
}

fn recording_progress() -> (UploadProgress, Arc<Mutex<Vec<u8>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let progress = UploadProgress::with_observer(move |v| sink.lock().unwrap().push(v));
    (progress, seen)
}

#[tokio::test]
async fn test_submit_sends_multipart_file_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict/"))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("filename=\"sample.jpg\""))
        .and(body_string_contains("fake-jpeg-bytes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "detections": [{"class": "helmet", "confidence": 0.92}],
            "summary": {"no_helmet": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = SubmissionRequest::new(
        DetectionProfile::Ppe,
        asset("sample.jpg", "image/jpeg", b"fake-jpeg-bytes".to_vec()),
    );
    let progress = UploadProgress::new();

    let response = client.submit(&request, &progress).await.unwrap();

    assert_eq!(response.status, 200);
    assert!(response.is_json());
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["summary"]["no_helmet"], 1);
    assert_eq!(progress.current(), COMPLETE);
}

#[tokio::test]
async fn test_machine_profile_uses_machine_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict_machine/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"checkpoints": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = SubmissionRequest::new(
        DetectionProfile::Machine,
        asset("line.mp4", "video/mp4", b"fake-video".to_vec()),
    );

    client.submit(&request, &UploadProgress::new()).await.unwrap();
}

#[tokio::test]
async fn test_progress_is_monotonic_and_completes_last() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0xFF, 0xD8, 0xFF], "image/jpeg"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = SubmissionRequest::new(
        DetectionProfile::Ppe,
        asset("big.jpg", "image/jpeg", vec![7u8; 200 * 1024]),
    );
    let (progress, seen) = recording_progress();

    client.submit(&request, &progress).await.unwrap();

    let seen = seen.lock().unwrap().clone();
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "progress went backwards: {seen:?}");
    assert_eq!(seen.last(), Some(&COMPLETE));
    assert_eq!(seen.iter().filter(|v| **v == COMPLETE).count(), 1);
    assert!(seen.contains(&UPLOAD_PHASE_MAX));
    assert!(seen.contains(&HEADERS_RECEIVED));
    // 200 KiB in 64 KiB chunks reports intermediate steps
    assert!(seen.iter().any(|v| *v > 0 && *v < UPLOAD_PHASE_MAX));
}

#[tokio::test]
async fn test_binary_response_is_returned_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1u8, 2, 3, 4], "image/png"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = SubmissionRequest::new(
        DetectionProfile::Ppe,
        asset("a.png", "image/png", b"png".to_vec()),
    );

    let response = client.submit(&request, &UploadProgress::new()).await.unwrap();
    assert!(!response.is_json());
    assert_eq!(response.mime(), Some("image/png"));
    assert_eq!(response.body, vec![1u8, 2, 3, 4]);
}

#[tokio::test]
async fn test_server_error_carries_detail_and_never_completes_progress() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict/"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"detail": "model not loaded"})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = SubmissionRequest::new(
        DetectionProfile::Ppe,
        asset("a.jpg", "image/jpeg", b"jpg".to_vec()),
    );
    let (progress, seen) = recording_progress();

    let err = client.submit(&request, &progress).await.unwrap_err();

    match err {
        SubmitError::Server { status, detail } => {
            assert_eq!(status, 500);
            assert_eq!(detail, "model not loaded");
        }
        other => panic!("Expected server error, got {other:?}"),
    }
    assert!(seen.lock().unwrap().iter().all(|v| *v < COMPLETE));
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"detections": []}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let config = InferenceConfig {
        timeout: Duration::from_millis(200),
        ..InferenceConfig::with_base_url(server.uri())
    };
    let client = InferenceClient::new(config).unwrap();
    let request = SubmissionRequest::new(
        DetectionProfile::Ppe,
        asset("a.jpg", "image/jpeg", b"jpg".to_vec()),
    );
    let progress = UploadProgress::new();

    let err = client.submit(&request, &progress).await.unwrap_err();

    assert!(matches!(err, SubmitError::Timeout(_)), "got {err:?}");
    assert!(progress.current() < COMPLETE);
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let client =
        InferenceClient::new(InferenceConfig::with_base_url("http://127.0.0.1:1")).unwrap();
    let request = SubmissionRequest::new(
        DetectionProfile::Ppe,
        asset("a.jpg", "image/jpeg", b"jpg".to_vec()),
    );

    let err = client.submit(&request, &UploadProgress::new()).await.unwrap_err();
    assert!(matches!(err, SubmitError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "running"})))
        .mount(&server)
        .await;

    assert!(client_for(&server).health_check().await);

    let down = InferenceClient::new(InferenceConfig::with_base_url("http://127.0.0.1:1")).unwrap();
    assert!(!down.health_check().await);
}
