use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::summary::{CaptureOutput, CaptureState, RecordingSummary};
use crate::audio::{encode_wav, AudioBackend, AudioFrame, AudioResourceHandle};
use crate::error::{Result, SerError};

/// Manages one recording attempt: Idle → Recording → Stopped
///
/// The tap is the only producer into the sample buffer and the encoder is the
/// only consumer, after the accumulation task has been joined.
pub struct CaptureController {
    session_id: String,
    state: CaptureState,
    resource: AudioResourceHandle,
    sample_rate: u32,
    started: Option<Instant>,
    started_at: Option<DateTime<Utc>>,
    accumulator: Option<JoinHandle<Vec<f32>>>,
    level_tx: Arc<watch::Sender<Vec<f32>>>,
}

impl CaptureController {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        let resource = AudioResourceHandle::new(backend);
        let sample_rate = resource.sample_rate();
        let (level_tx, _) = watch::channel(Vec::new());

        Self {
            session_id: format!("capture-{}", uuid::Uuid::new_v4()),
            state: CaptureState::Idle,
            resource,
            sample_rate,
            started: None,
            started_at: None,
            accumulator: None,
            level_tx: Arc::new(level_tx),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Most recent audio block, for the level meter
    pub fn level_feed(&self) -> watch::Receiver<Vec<f32>> {
        self.level_tx.subscribe()
    }

    /// Acquire the tap and begin accumulating samples
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            CaptureState::Recording => {
                debug!("Capture {} already recording", self.session_id);
                return Ok(());
            }
            CaptureState::Stopped => return Err(SerError::SessionFinished),
            CaptureState::Idle => {}
        }

        info!("Starting capture session: {}", self.session_id);

        let frames = self.resource.acquire().await?;
        self.sample_rate = self.resource.sample_rate();

        self.accumulator = Some(tokio::spawn(accumulate(
            frames,
            self.sample_rate,
            Arc::clone(&self.level_tx),
        )));
        self.started = Some(Instant::now());
        self.started_at = Some(Utc::now());
        self.state = CaptureState::Recording;

        info!(
            "Capture session {} recording from {} at {}Hz",
            self.session_id,
            self.resource.name(),
            self.sample_rate
        );

        Ok(())
    }

    /// Stop recording, release the tap and encode the clip
    ///
    /// Returns `None` when there was nothing recording.
    pub async fn stop(&mut self) -> Result<Option<CaptureOutput>> {
        if self.state != CaptureState::Recording {
            debug!("Capture {} not recording ({:?})", self.session_id, self.state);
            return Ok(None);
        }

        let duration = self.started.map(|s| s.elapsed()).unwrap_or_default();
        self.state = CaptureState::Stopped;

        info!("Stopping capture session: {}", self.session_id);

        // Releasing the tap closes the frame channel, which ends the accumulator
        self.resource.release();

        let samples = match self.accumulator.take() {
            Some(task) => task.await.map_err(|e| {
                error!("Accumulation task failed: {}", e);
                SerError::DeviceUnavailable(format!("capture task failed: {}", e))
            })?,
            None => Vec::new(),
        };

        let wav = encode_wav(&samples, self.sample_rate)?;

        let summary = RecordingSummary {
            session_id: self.session_id.clone(),
            started_at: self.started_at.unwrap_or_else(Utc::now),
            duration,
            sample_rate: self.sample_rate,
            sample_count: samples.len(),
        };

        info!(
            "Capture session {} stopped: {:.2}s, {} samples, {} WAV bytes",
            self.session_id,
            duration.as_secs_f64(),
            summary.sample_count,
            wav.len()
        );

        Ok(Some(CaptureOutput { wav, summary }))
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        if let Some(task) = self.accumulator.take() {
            warn!("Capture {} dropped while recording", self.session_id);
            task.abort();
        }
        // AudioResourceHandle releases the tap in its own Drop
    }
}

/// Drain frames into the session buffer until the tap closes
async fn accumulate(
    mut frames: mpsc::Receiver<AudioFrame>,
    sample_rate: u32,
    level_tx: Arc<watch::Sender<Vec<f32>>>,
) -> Vec<f32> {
    let mut samples = Vec::new();

    while let Some(frame) = frames.recv().await {
        if frame.sample_rate != sample_rate {
            warn!(
                "Frame sample rate mismatch: expected {}, got {}. Dropping frame.",
                sample_rate, frame.sample_rate
            );
            continue;
        }

        samples.extend_from_slice(&frame.samples);
        level_tx.send_replace(frame.samples);
    }

    debug!("Accumulated {} samples", samples.len());
    samples
}
