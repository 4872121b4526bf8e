use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Default location of the optional config file (extension resolved by the loader)
pub const DEFAULT_CONFIG_PATH: &str = "config/ser-capture";

/// Variables that override `backend.base_url`, first non-empty wins
pub const BACKEND_URL_VARS: [&str; 3] = ["BACKEND_URL", "NEXT_API_URL", "NEXT_PUBLIC_API_URL"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub relay: RelayConfig,
    pub backend: BackendConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub http: HttpConfig,
    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
    /// Largest accepted upload body
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Inference service base URL; `/predict` is appended
    pub base_url: String,
    /// Whole-request timeout
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Samples per block for file replay
    pub block_size: usize,
    /// Level meter refresh cadence
    pub meter_interval_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            cors_origins: vec!["*".to_string()],
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            block_size: 2048,
            meter_interval_ms: 16,
        }
    }
}

impl Config {
    /// Load defaults, then the optional file at `path`, then environment overrides
    pub fn load(path: &str) -> Result<Self> {
        Self::load_with(path, std::env::vars().collect())
    }

    /// Same as `load`, reading overrides from `env` instead of the process
    ///
    /// `SER_<SECTION>__<KEY>` sets any field (`SER_RELAY__HTTP__PORT=8080`).
    /// The first non-empty variable in `BACKEND_URL_VARS` replaces the backend URL.
    pub fn load_with(path: &str, env: HashMap<String, String>) -> Result<Self> {
        let backend_url = BACKEND_URL_VARS
            .iter()
            .filter_map(|var| env.get(*var))
            .find(|url| !url.is_empty())
            .cloned();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("SER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(env)),
            )
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        let mut cfg: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        if let Some(url) = backend_url {
            cfg.backend.base_url = url;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.backend.base_url.starts_with("http://") || self.backend.base_url.starts_with("https://")) {
            anyhow::bail!("backend.base_url must be an http(s) URL, got {}", self.backend.base_url);
        }
        if self.backend.timeout_secs == 0 {
            anyhow::bail!("backend.timeout_secs must be positive");
        }
        if self.audio.block_size == 0 {
            anyhow::bail!("audio.block_size must be positive");
        }
        Ok(())
    }

    pub fn relay_addr(&self) -> String {
        format!("{}:{}", self.relay.http.bind, self.relay.http.port)
    }
}
