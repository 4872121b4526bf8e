use super::state::AppState;
use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use reqwest::multipart::{Form, Part};
use serde_json::json;
use tracing::{error, info, warn};

/// File name used when the client did not send one
pub const DEFAULT_UPLOAD_NAME: &str = "audio.webm";

/// Longest slice of a non-JSON backend body echoed back for diagnosis
const BODY_PREVIEW_CHARS: usize = 500;

/// The `file` field pulled out of an incoming form
struct UploadedFile {
    name: String,
    content_type: Option<String>,
    data: Bytes,
}

fn json_error(status: StatusCode, body: serde_json::Value) -> Response {
    (status, Json(body)).into_response()
}

async fn read_file_field(mut multipart: Multipart) -> Result<Option<UploadedFile>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_UPLOAD_NAME)
            .to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?;
        return Ok(Some(UploadedFile {
            name,
            content_type,
            data,
        }));
    }
    Ok(None)
}

fn file_part(file: &UploadedFile) -> Part {
    let part = Part::bytes(file.data.to_vec()).file_name(file.name.clone());
    match file.content_type.as_deref() {
        Some(ct) => match part.mime_str(ct) {
            Ok(part) => part,
            Err(e) => {
                warn!("Dropping unparseable content type {:?}: {}", ct, e);
                Part::bytes(file.data.to_vec()).file_name(file.name.clone())
            }
        },
        None => part,
    }
}

/// POST /api/ser (alias: POST /predict)
/// Forward the uploaded `file` field to the inference backend unchanged
pub async fn relay_predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let file = match multipart {
        Ok(multipart) => match read_file_field(multipart).await {
            Ok(Some(file)) => file,
            Ok(None) => return json_error(StatusCode::BAD_REQUEST, json!({ "error": "no file" })),
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                warn!("Upload exceeds {} bytes: {}", state.max_upload_bytes, e.body_text());
                return json_error(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    json!({ "error": "file too large", "message": e.body_text() }),
                );
            }
            Err(e) => {
                warn!("Malformed multipart body: {}", e.body_text());
                return json_error(
                    StatusCode::BAD_REQUEST,
                    json!({ "error": "no file", "message": e.body_text() }),
                );
            }
        },
        Err(rejection) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                json!({ "error": "no file", "message": rejection.body_text() }),
            )
        }
    };

    let url = state.predict_url();
    info!(
        "Relaying {} ({} bytes, {}) to {}",
        file.name,
        file.data.len(),
        file.content_type.as_deref().unwrap_or("no content type"),
        url
    );

    let form = Form::new().part("file", file_part(&file));

    let response = match state.client.post(&url).multipart(form).send().await {
        Ok(r) => r,
        Err(e) => {
            error!("Backend fetch failed: {}", e);
            return json_error(
                StatusCode::BAD_GATEWAY,
                json!({ "error": "backend fetch failed", "message": e.to_string() }),
            );
        }
    };

    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to read backend body: {}", e);
            return json_error(
                StatusCode::BAD_GATEWAY,
                json!({ "error": "backend fetch failed", "message": e.to_string() }),
            );
        }
    };

    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(data) => {
            info!("Backend answered {}", status);
            (status, Json(data)).into_response()
        }
        Err(_) => {
            warn!("Backend returned non-JSON body with status {}", status);
            let preview: String = text.chars().take(BODY_PREVIEW_CHARS).collect();
            json_error(
                StatusCode::BAD_GATEWAY,
                json!({
                    "error": "invalid backend response",
                    "status": status.as_u16(),
                    "body": preview,
                }),
            )
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
