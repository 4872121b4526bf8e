//! Inference service client
//!
//! Uploads one clip as `multipart/form-data` (field `file`) to
//! `<base_url>/predict` and maps the JSON reply into an `EmotionResult`.

mod upload;

pub use upload::{mime_for_path, Upload};

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::emotion::{EmotionResult, LabelScore};
use crate::error::{Result, SerError};

/// Path checked by `health`; the inference service answers on its root
pub const HEALTH_PATH: &str = "/";

/// Message used when the reply carries no `error` field
pub const GENERIC_FAILURE: &str = "Request failed";

#[derive(Debug, Deserialize)]
struct PredictResponse {
    results: Option<Vec<LabelScore>>,
    error: Option<serde_json::Value>,
}

fn error_message(error: Option<&serde_json::Value>) -> String {
    match error {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => GENERIC_FAILURE.to_string(),
        Some(other) => other.to_string(),
    }
}

#[derive(Clone)]
pub struct InferenceClient {
    client: Client,
    base_url: String,
}

impl InferenceClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SerError::NetworkFailure(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload a clip and map the per-emotion scores
    pub async fn predict(&self, upload: Upload) -> Result<EmotionResult> {
        let url = format!("{}/predict", self.base_url);
        info!(
            "Uploading {} ({}, {} bytes) to {}",
            upload.file_name(),
            upload.mime(),
            upload.len(),
            url
        );

        let form = reqwest::multipart::Form::new().part("file", upload.into_part()?);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SerError::NetworkFailure(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SerError::NetworkFailure(e.to_string()))?;
        debug!("Inference reply {}: {} bytes", status, text.len());

        let parsed = serde_json::from_str::<PredictResponse>(&text).ok();

        if !status.is_success() {
            let msg = error_message(parsed.as_ref().and_then(|p| p.error.as_ref()));
            warn!("Inference service returned {}: {}", status, msg);
            return Err(SerError::UpstreamError(msg));
        }

        match parsed {
            Some(PredictResponse {
                results: Some(results),
                ..
            }) => {
                let mapped = EmotionResult::from_scores(&results);
                let (dominant, pct) = mapped.dominant();
                info!("Dominant emotion: {} ({}%)", dominant, pct);
                Ok(mapped)
            }
            Some(PredictResponse { error, .. }) => {
                Err(SerError::InvalidResponse(error_message(error.as_ref())))
            }
            None => Err(SerError::InvalidResponse(GENERIC_FAILURE.to_string())),
        }
    }

    /// Probe `<base_url><path>`; true on any 2xx
    pub async fn health(&self, path: &str) -> bool {
        let url = format!("{}{}", self.base_url, path);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Health probe {} failed: {}", url, e);
                false
            }
        }
    }
}
