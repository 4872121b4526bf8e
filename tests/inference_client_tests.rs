// Integration tests for the inference client and the analysis session
//
// Each test runs a stub inference service on a random local port.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::Multipart,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use ser_capture::audio::encode_wav;
use ser_capture::client::HEALTH_PATH;
use ser_capture::config::BackendConfig;
use ser_capture::emotion::Emotion;
use ser_capture::error::SerError;
use ser_capture::{AnalysisSession, InferenceClient, Upload, ViewState};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct Received {
    field: String,
    file_name: Option<String>,
    content_type: Option<String>,
    len: usize,
}

type Log = Arc<Mutex<Vec<Received>>>;

async fn spawn(app: Router) -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{}", addr))
}

async fn record_fields(log: &Log, mut multipart: Multipart) {
    while let Ok(Some(field)) = multipart.next_field().await {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let len = field.bytes().await.map(|b| b.len()).unwrap_or(0);
        log.lock().unwrap().push(Received {
            field: field_name,
            file_name,
            content_type,
            len,
        });
    }
}

/// Stub service answering every upload with a fixed status and JSON body
async fn json_backend(status: StatusCode, body: Value) -> Result<(String, Log)> {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route(
            "/predict",
            post(move |State(log): State<Log>, multipart: Multipart| {
                let body = body.clone();
                async move {
                    record_fields(&log, multipart).await;
                    (status, Json(body))
                }
            }),
        )
        .with_state(Arc::clone(&log));
    Ok((spawn(app).await?, log))
}

async fn text_backend(status: StatusCode, body: &'static str) -> Result<String> {
    let app = Router::new().route("/predict", post(move || async move { (status, body) }));
    spawn(app).await
}

fn client_for(base_url: &str) -> Result<InferenceClient> {
    Ok(InferenceClient::new(&BackendConfig {
        base_url: base_url.to_string(),
        timeout_secs: 5,
    })?)
}

fn wav_upload() -> Result<Upload> {
    let wav = encode_wav(&vec![0.1f32; 1600], 16000)?;
    Ok(Upload::recording(wav))
}

async fn unreachable_url() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{}", addr))
}

#[tokio::test]
async fn test_predict_maps_results() -> Result<()> {
    let (url, log) = json_backend(
        StatusCode::OK,
        json!({
            "results": [
                { "label": "Happy", "score": 0.73 },
                { "label": "excited", "score": 0.5 },
                { "label": "sad", "score": 0.2 }
            ],
            "dominant": { "label": "Happy", "score": 0.73 }
        }),
    )
    .await?;

    let result = client_for(&url)?.predict(wav_upload()?).await?;

    assert_eq!(result.get(Emotion::Happy), 73);
    assert_eq!(result.get(Emotion::Sad), 20);
    assert_eq!(result.dominant(), (Emotion::Happy, 73));

    let received = log.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].field, "file");
    assert_eq!(received[0].file_name.as_deref(), Some("recording.wav"));
    assert_eq!(received[0].content_type.as_deref(), Some("audio/wav"));
    assert_eq!(received[0].len, 44 + 3200);
    Ok(())
}

#[tokio::test]
async fn test_user_file_keeps_name_and_mime() -> Result<()> {
    let (url, log) = json_backend(StatusCode::OK, json!({ "results": [] })).await?;

    let upload = Upload::file("voice memo.ogg", "audio/ogg", vec![1, 2, 3, 4])?;
    let result = client_for(&url)?.predict(upload).await?;
    assert_eq!(result.dominant(), (Emotion::Angry, 0));

    let received = log.lock().unwrap().clone();
    assert_eq!(received[0].file_name.as_deref(), Some("voice memo.ogg"));
    assert_eq!(received[0].content_type.as_deref(), Some("audio/ogg"));
    assert_eq!(received[0].len, 4);
    Ok(())
}

#[tokio::test]
async fn test_upstream_error_uses_error_field() -> Result<()> {
    let (url, _) = json_backend(
        StatusCode::BAD_REQUEST,
        json!({ "error": "failed to process audio", "message": "ValueError: empty" }),
    )
    .await?;

    let err = client_for(&url)?.predict(wav_upload()?).await.unwrap_err();
    match err {
        SerError::UpstreamError(msg) => assert_eq!(msg, "failed to process audio"),
        other => panic!("unexpected error: {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_upstream_error_without_json_gets_generic_message() -> Result<()> {
    let url = text_backend(StatusCode::INTERNAL_SERVER_ERROR, "<html>boom</html>").await?;

    let err = client_for(&url)?.predict(wav_upload()?).await.unwrap_err();
    assert!(matches!(err, SerError::UpstreamError(ref m) if m == "Request failed"));
    Ok(())
}

#[tokio::test]
async fn test_non_json_success_is_invalid_response() -> Result<()> {
    let url = text_backend(StatusCode::OK, "definitely not json").await?;

    let err = client_for(&url)?.predict(wav_upload()?).await.unwrap_err();
    assert!(matches!(err, SerError::InvalidResponse(ref m) if m == "Request failed"));
    Ok(())
}

#[tokio::test]
async fn test_missing_results_is_invalid_response() -> Result<()> {
    let (url, _) = json_backend(StatusCode::OK, json!({ "error": "model not loaded" })).await?;

    let err = client_for(&url)?.predict(wav_upload()?).await.unwrap_err();
    assert!(matches!(err, SerError::InvalidResponse(ref m) if m == "model not loaded"));
    Ok(())
}

#[tokio::test]
async fn test_unreachable_backend_is_network_failure() -> Result<()> {
    let url = unreachable_url().await?;

    let err = client_for(&url)?.predict(wav_upload()?).await.unwrap_err();
    assert!(matches!(err, SerError::NetworkFailure(_)));
    Ok(())
}

#[tokio::test]
async fn test_slow_backend_times_out() -> Result<()> {
    let app = Router::new().route(
        "/predict",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({ "results": [] }))
        }),
    );
    let url = spawn(app).await?;
    let client = InferenceClient::new(&BackendConfig {
        base_url: url,
        timeout_secs: 1,
    })?;

    let err = client.predict(wav_upload()?).await.unwrap_err();
    assert!(matches!(err, SerError::NetworkFailure(_)));
    Ok(())
}

#[tokio::test]
async fn test_health_reports_live_backend() -> Result<()> {
    let app = Router::new().route(HEALTH_PATH, get(|| async { Json(json!({ "status": "ok" })) }));
    let url = spawn(app).await?;

    assert!(client_for(&url)?.health(HEALTH_PATH).await);
    Ok(())
}

#[tokio::test]
async fn test_health_fails_on_error_status() -> Result<()> {
    let app = Router::new().route(
        HEALTH_PATH,
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "loading model") }),
    );
    let url = spawn(app).await?;

    assert!(!client_for(&url)?.health(HEALTH_PATH).await);
    Ok(())
}

#[tokio::test]
async fn test_health_fails_when_unreachable() -> Result<()> {
    let url = unreachable_url().await?;
    assert!(!client_for(&url)?.health(HEALTH_PATH).await);
    Ok(())
}

#[tokio::test]
async fn test_session_moves_to_results() -> Result<()> {
    let (url, _) = json_backend(
        StatusCode::OK,
        json!({ "results": [{ "label": "calm", "score": 0.9 }] }),
    )
    .await?;
    let session = AnalysisSession::new(client_for(&url)?);
    assert_eq!(session.view(), ViewState::Home { error: None });

    let result = session.submit(wav_upload()?).await?;

    assert_eq!(session.view(), ViewState::Results(result));
    assert!(!session.is_busy());

    session.back()?;
    assert_eq!(session.view(), ViewState::Home { error: None });
    Ok(())
}

#[tokio::test]
async fn test_session_failure_returns_home_with_message() -> Result<()> {
    let (url, _) = json_backend(StatusCode::BAD_GATEWAY, json!({ "error": "backend fetch failed" })).await?;
    let session = AnalysisSession::new(client_for(&url)?);

    assert!(session.submit(wav_upload()?).await.is_err());
    assert_eq!(
        session.view(),
        ViewState::Home {
            error: Some("backend fetch failed".to_string())
        }
    );

    // A manual retry is allowed right away
    assert!(!session.is_busy());
    Ok(())
}

#[tokio::test]
async fn test_session_rejects_overlapping_uploads() -> Result<()> {
    let app = Router::new().route(
        "/predict",
        post(|| async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Json(json!({ "results": [{ "label": "fear", "score": 1.0 }] }))
        }),
    );
    let url = spawn(app).await?;
    let session = Arc::new(AnalysisSession::new(client_for(&url)?));

    let first = {
        let session = Arc::clone(&session);
        let upload = wav_upload()?;
        tokio::spawn(async move { session.submit(upload).await })
    };

    tokio::time::timeout(Duration::from_secs(2), async {
        while !session.is_busy() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;
    assert_eq!(session.view(), ViewState::Loading);

    let second = session.submit(wav_upload()?).await;
    assert!(matches!(second, Err(SerError::Busy)));
    assert!(matches!(session.back(), Err(SerError::Busy)));

    let result = first.await??;
    assert_eq!(result.dominant(), (Emotion::Fear, 100));
    assert_eq!(session.view(), ViewState::Results(result));
    Ok(())
}
