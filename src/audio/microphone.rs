//! Microphone tap through cpal
//!
//! cpal streams are not `Send`, so the stream lives on a dedicated thread that
//! owns it from build to drop. The callback only pushes blocks into a bounded
//! channel and never waits on the consumer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use super::file::downmix;
use crate::error::{Result, SerError};

/// Longest `release` waits for the stream thread before detaching it
const RELEASE_TIMEOUT: Duration = Duration::from_millis(500);

/// Map a cpal failure onto the acquisition taxonomy
fn classify(err: impl std::fmt::Display) -> SerError {
    let msg = err.to_string();
    let lower = msg.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
        SerError::PermissionDenied(msg)
    } else {
        SerError::DeviceUnavailable(msg)
    }
}

/// List input device names on the default host
pub fn list_input_devices() -> Vec<String> {
    let host = cpal::default_host();
    host.input_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default()
}

/// The stream thread plus a channel that disconnects when it exits
struct StreamThread {
    handle: JoinHandle<()>,
    done_rx: std::sync::mpsc::Receiver<()>,
}

impl StreamThread {
    /// Join if the thread finishes within `limit`, otherwise leave it detached
    ///
    /// `release` runs on async workers and in `Drop`, so it must not block
    /// indefinitely on a wedged audio driver. Returns true when joined.
    fn join_within(self, limit: Duration) -> bool {
        match self.done_rx.recv_timeout(limit) {
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => false,
            Ok(()) | Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    error!("Microphone thread panicked");
                }
                true
            }
        }
    }
}

pub struct MicrophoneBackend {
    name: String,
    sample_rate: u32,
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
    thread: Option<StreamThread>,
    dropped_blocks: Arc<AtomicU64>,
}

impl MicrophoneBackend {
    pub fn new(_config: AudioBackendConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| SerError::DeviceUnavailable("no default input device".to_string()))?;
        let name = device.name().unwrap_or_else(|_| "default".to_string());
        let supported = device.default_input_config().map_err(classify)?;

        info!(
            "Microphone: {} ({}Hz, {} channels, {:?})",
            name,
            supported.sample_rate().0,
            supported.channels(),
            supported.sample_format()
        );

        Ok(Self {
            name: format!("microphone:{}", name),
            sample_rate: supported.sample_rate().0,
            stop_tx: None,
            thread: None,
            dropped_blocks: Arc::new(AtomicU64::new(0)),
        })
    }
}

/// Build and run the input stream until `stop_rx` fires or disconnects
fn run_stream(
    tx: mpsc::Sender<AudioFrame>,
    ready_tx: oneshot::Sender<Result<()>>,
    stop_rx: std::sync::mpsc::Receiver<()>,
    dropped: Arc<AtomicU64>,
) {
    let setup = || -> Result<cpal::Stream> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| SerError::DeviceUnavailable("no default input device".to_string()))?;
        let supported = device.default_input_config().map_err(classify)?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.config();
        let channels = config.channels;
        let sample_rate = config.sample_rate.0;
        let started = Instant::now();

        let push = move |mono: Vec<f32>| {
            let frame = AudioFrame {
                samples: mono,
                sample_rate,
                timestamp_ms: started.elapsed().as_millis() as u64,
            };
            if tx.try_send(frame).is_err() {
                dropped.fetch_add(1, Ordering::Relaxed);
            }
        };

        let err_fn = |err| error!("Audio stream error: {}", err);

        let stream = match sample_format {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| push(downmix(data, channels)),
                err_fn,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let floats: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                    push(downmix(&floats, channels))
                },
                err_fn,
                None,
            ),
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    let floats: Vec<f32> =
                        data.iter().map(|&s| (s as f32 - 32768.0) / 32768.0).collect();
                    push(downmix(&floats, channels))
                },
                err_fn,
                None,
            ),
            other => {
                return Err(SerError::DeviceUnavailable(format!(
                    "unsupported sample format: {:?}",
                    other
                )))
            }
        }
        .map_err(classify)?;

        stream.play().map_err(classify)?;
        Ok(stream)
    };

    match setup() {
        Ok(stream) => {
            let _ = ready_tx.send(Ok(()));
            // Blocks until release() sends or drops the stop sender
            let _ = stop_rx.recv();
            drop(stream);
            info!("Microphone stream closed");
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn acquire(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let (tx, rx) = mpsc::channel(256);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel();
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        let dropped = Arc::clone(&self.dropped_blocks);

        let handle = std::thread::Builder::new()
            .name("ser-microphone".to_string())
            .spawn(move || {
                let _done = done_tx;
                run_stream(tx, ready_tx, stop_rx, dropped)
            })?;

        self.stop_tx = Some(stop_tx);
        self.thread = Some(StreamThread { handle, done_rx });

        match ready_rx.await {
            Ok(Ok(())) => Ok(rx),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SerError::DeviceUnavailable("audio thread exited".to_string())),
        }
    }

    fn release(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if !thread.join_within(RELEASE_TIMEOUT) {
                warn!(
                    "Microphone thread still running after {:?}; detaching it",
                    RELEASE_TIMEOUT
                );
            }
        }
        let dropped = self.dropped_blocks.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            warn!("Dropped {} audio blocks while the consumer lagged", dropped);
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> &str {
        &self.name
    }
}
