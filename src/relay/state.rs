use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::Config;

/// Shared application state for relay handlers
#[derive(Clone)]
pub struct AppState {
    /// HTTP client used to reach the inference backend
    pub client: reqwest::Client,

    /// Inference backend base URL (no trailing slash)
    pub backend_url: String,

    /// Allowed CORS origins (`*` = any)
    pub cors_origins: Vec<String>,

    /// Largest accepted upload body
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(backend_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build backend HTTP client")?;

        Ok(Self {
            client,
            backend_url: backend_url.into().trim_end_matches('/').to_string(),
            cors_origins: vec!["*".to_string()],
            max_upload_bytes: 25 * 1024 * 1024,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let mut state = Self::new(
            cfg.backend.base_url.clone(),
            Duration::from_secs(cfg.backend.timeout_secs),
        )?;
        state.cors_origins = cfg.relay.cors_origins.clone();
        state.max_upload_bytes = cfg.relay.max_upload_bytes;
        Ok(state)
    }

    pub fn predict_url(&self) -> String {
        format!("{}/predict", self.backend_url)
    }
}
