use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::Result;

/// One block of mono audio as delivered by the platform callback
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Milliseconds since the tap started
    pub timestamp_ms: u64,
}

/// Configuration for audio backends
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Samples per delivered block
    pub block_size: usize,
    /// Pace file replay at real-time speed
    pub realtime: bool,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            block_size: 2048,
            realtime: false,
        }
    }
}

/// Audio tap trait
///
/// Implementations:
/// - Microphone: cpal input stream (feature `microphone`)
/// - File: replay a WAV file as blocks (headless runs and tests)
#[async_trait::async_trait]
pub trait AudioBackend: Send {
    /// Acquire the device and start the tap
    ///
    /// Returns a channel receiver that will receive audio blocks until released
    async fn acquire(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop the tap and free the device. Must be idempotent and must close
    /// the frame channel returned by `acquire`.
    fn release(&mut self);

    /// Sample rate of the delivered blocks
    fn sample_rate(&self) -> u32;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Owned audio resource: acquire once, released on every exit path
pub struct AudioResourceHandle {
    backend: Box<dyn AudioBackend>,
    held: bool,
}

impl AudioResourceHandle {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self {
            backend,
            held: false,
        }
    }

    pub async fn acquire(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        match self.backend.acquire().await {
            Ok(rx) => {
                self.held = true;
                info!("Acquired audio tap: {}", self.backend.name());
                Ok(rx)
            }
            Err(e) => {
                // A partially started tap must not outlive a failed acquire
                self.backend.release();
                Err(e)
            }
        }
    }

    pub fn release(&mut self) {
        if self.held {
            self.backend.release();
            self.held = false;
            info!("Released audio tap: {}", self.backend.name());
        }
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn sample_rate(&self) -> u32 {
        self.backend.sample_rate()
    }

    pub fn name(&self) -> &str {
        self.backend.name()
    }
}

impl Drop for AudioResourceHandle {
    fn drop(&mut self) {
        if self.held {
            debug!("Releasing audio tap on drop: {}", self.backend.name());
            self.release();
        }
    }
}

/// Audio source type
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Default input device
    Microphone,
    /// WAV file replay
    File(PathBuf),
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create audio backend based on source and build features
    pub fn create(source: AudioSource, config: AudioBackendConfig) -> Result<Box<dyn AudioBackend>> {
        match source {
            AudioSource::Microphone => {
                #[cfg(feature = "microphone")]
                {
                    let backend = super::microphone::MicrophoneBackend::new(config)?;
                    Ok(Box::new(backend))
                }

                #[cfg(not(feature = "microphone"))]
                {
                    let _ = config;
                    Err(crate::error::SerError::DeviceUnavailable(
                        "built without the `microphone` feature".to_string(),
                    ))
                }
            }

            AudioSource::File(path) => {
                let backend = super::file::FileBackend::open(&path, config)?;
                Ok(Box::new(backend))
            }
        }
    }
}
