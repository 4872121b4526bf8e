// Integration tests for the capture session controller
//
// A scripted backend stands in for the microphone so the state machine,
// resource release and sample accumulation can be checked without hardware.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use ser_capture::audio::{
    AudioBackend, AudioBackendConfig, AudioFile, AudioFrame, FileBackend, WAV_HEADER_LEN,
};
use ser_capture::error::SerError;
use ser_capture::{CaptureController, CaptureState};
use tempfile::TempDir;
use tokio::sync::{mpsc, watch};

#[derive(Clone, Copy)]
enum Failure {
    Permission,
    NoDevice,
}

struct ScriptedBackend {
    frames: Vec<AudioFrame>,
    sample_rate: u32,
    sender: Option<mpsc::Sender<AudioFrame>>,
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    failure: Option<Failure>,
}

struct Counters {
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

fn block(value: f32, len: usize, sample_rate: u32, timestamp_ms: u64) -> AudioFrame {
    AudioFrame {
        samples: vec![value; len],
        sample_rate,
        timestamp_ms,
    }
}

fn scripted(frames: Vec<AudioFrame>, failure: Option<Failure>) -> (Box<dyn AudioBackend>, Counters) {
    let acquired = Arc::new(AtomicUsize::new(0));
    let released = Arc::new(AtomicUsize::new(0));
    let backend = ScriptedBackend {
        frames,
        sample_rate: 16000,
        sender: None,
        acquired: Arc::clone(&acquired),
        released: Arc::clone(&released),
        failure,
    };
    (Box::new(backend), Counters { acquired, released })
}

#[async_trait::async_trait]
impl AudioBackend for ScriptedBackend {
    async fn acquire(&mut self) -> ser_capture::error::Result<mpsc::Receiver<AudioFrame>> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Some(Failure::Permission) => {
                return Err(SerError::PermissionDenied("user said no".to_string()))
            }
            Some(Failure::NoDevice) => {
                return Err(SerError::DeviceUnavailable("nothing plugged in".to_string()))
            }
            None => {}
        }

        let (tx, rx) = mpsc::channel(self.frames.len() + 1);
        for frame in self.frames.drain(..) {
            tx.try_send(frame).expect("channel sized for every frame");
        }
        self.sender = Some(tx);
        Ok(rx)
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.sender = None;
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

async fn wait_for_block(feed: &mut watch::Receiver<Vec<f32>>, expected: &[f32]) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while feed.borrow_and_update().as_slice() != expected {
            if feed.changed().await.is_err() {
                break;
            }
        }
    })
    .await
    .expect("level feed never showed the expected block");
}

#[tokio::test]
async fn test_start_stop_encodes_every_sample() -> Result<()> {
    let frames = vec![
        block(0.5, 160, 16000, 0),
        block(-0.5, 160, 16000, 10),
        block(0.0, 80, 16000, 20),
    ];
    let (backend, counters) = scripted(frames, None);
    let mut controller = CaptureController::new(backend);
    assert_eq!(controller.state(), CaptureState::Idle);

    controller.start().await?;
    assert_eq!(controller.state(), CaptureState::Recording);

    tokio::time::sleep(Duration::from_millis(30)).await;

    let output = controller.stop().await?.expect("recording output");
    assert_eq!(controller.state(), CaptureState::Stopped);

    assert_eq!(output.summary.sample_count, 400);
    assert_eq!(output.summary.sample_rate, 16000);
    assert_eq!(output.wav.len(), WAV_HEADER_LEN + 800);
    assert!(output.summary.duration >= Duration::from_millis(30));
    assert!(output.summary.session_id.starts_with("capture-"));

    let pcm = output.wav.pcm()?;
    assert_eq!(pcm[0], 16383);
    assert_eq!(pcm[160], -16384);
    assert_eq!(pcm[399], 0);

    assert_eq!(counters.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(counters.released.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_duration_comes_from_clock_not_samples() -> Result<()> {
    // 10 samples at 16kHz is under a millisecond of audio
    let (backend, _) = scripted(vec![block(0.1, 10, 16000, 0)], None);
    let mut controller = CaptureController::new(backend);

    controller.start().await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let output = controller.stop().await?.expect("recording output");

    assert!(output.summary.duration >= Duration::from_millis(50));
    assert!(output.wav.duration() < Duration::from_millis(1));
    Ok(())
}

#[tokio::test]
async fn test_start_while_recording_is_noop() -> Result<()> {
    let (backend, counters) = scripted(vec![block(0.2, 32, 16000, 0)], None);
    let mut controller = CaptureController::new(backend);

    controller.start().await?;
    controller.start().await?;

    assert_eq!(controller.state(), CaptureState::Recording);
    assert_eq!(counters.acquired.load(Ordering::SeqCst), 1);

    let output = controller.stop().await?.expect("recording output");
    assert_eq!(output.summary.sample_count, 32);
    Ok(())
}

#[tokio::test]
async fn test_stop_while_idle_is_noop() -> Result<()> {
    let (backend, counters) = scripted(Vec::new(), None);
    let mut controller = CaptureController::new(backend);

    assert!(controller.stop().await?.is_none());
    assert_eq!(controller.state(), CaptureState::Idle);
    assert_eq!(counters.released.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_stopped_is_terminal() -> Result<()> {
    let (backend, counters) = scripted(vec![block(0.2, 8, 16000, 0)], None);
    let mut controller = CaptureController::new(backend);

    controller.start().await?;
    controller.stop().await?;

    assert!(matches!(controller.start().await, Err(SerError::SessionFinished)));
    assert!(controller.stop().await?.is_none());
    assert_eq!(counters.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(counters.released.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_empty_recording_yields_header_only() -> Result<()> {
    let (backend, _) = scripted(Vec::new(), None);
    let mut controller = CaptureController::new(backend);

    controller.start().await?;
    let output = controller.stop().await?.expect("recording output");

    assert_eq!(output.summary.sample_count, 0);
    assert_eq!(output.wav.len(), WAV_HEADER_LEN);
    Ok(())
}

#[tokio::test]
async fn test_permission_denied_leaves_session_idle_and_released() {
    let (backend, counters) = scripted(Vec::new(), Some(Failure::Permission));
    let mut controller = CaptureController::new(backend);

    let err = controller.start().await.unwrap_err();
    assert!(matches!(err, SerError::PermissionDenied(_)));
    assert_eq!(controller.state(), CaptureState::Idle);
    assert_eq!(counters.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_device_unavailable_is_reported() {
    let (backend, _) = scripted(Vec::new(), Some(Failure::NoDevice));
    let mut controller = CaptureController::new(backend);

    let err = controller.start().await.unwrap_err();
    assert!(matches!(err, SerError::DeviceUnavailable(_)));
    assert_eq!(err.user_message(), "No microphone available");
}

#[tokio::test]
async fn test_drop_while_recording_releases_device() -> Result<()> {
    let (backend, counters) = scripted(vec![block(0.3, 64, 16000, 0)], None);
    {
        let mut controller = CaptureController::new(backend);
        controller.start().await?;
        assert_eq!(counters.released.load(Ordering::SeqCst), 0);
    }
    assert_eq!(counters.released.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_level_feed_sees_latest_block() -> Result<()> {
    let frames = vec![block(0.1, 16, 16000, 0), block(0.7, 16, 16000, 1)];
    let (backend, _) = scripted(frames, None);
    let mut controller = CaptureController::new(backend);
    let mut feed = controller.level_feed();

    controller.start().await?;
    wait_for_block(&mut feed, &[0.7; 16]).await;
    controller.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_frames_with_wrong_rate_are_dropped() -> Result<()> {
    let frames = vec![
        block(0.5, 100, 16000, 0),
        block(0.5, 100, 44100, 5),
        block(0.5, 50, 16000, 10),
    ];
    let (backend, _) = scripted(frames, None);
    let mut controller = CaptureController::new(backend);

    controller.start().await?;
    let output = controller.stop().await?.expect("recording output");

    assert_eq!(output.summary.sample_count, 150);
    Ok(())
}

fn write_stereo_wav(dir: &TempDir, frames: usize) -> Result<std::path::PathBuf> {
    let path = dir.path().join("stereo.wav");
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 22050,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    for _ in 0..frames {
        writer.write_sample(16384i16)?;
        writer.write_sample(-16384i16)?;
    }
    writer.finalize()?;
    Ok(path)
}

#[test]
fn test_audio_file_downmixes_to_mono() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_stereo_wav(&dir, 2205)?;

    let audio = AudioFile::open(&path)?;

    assert_eq!(audio.channels, 2);
    assert_eq!(audio.sample_rate, 22050);
    assert_eq!(audio.samples.len(), 2205);
    assert!(audio.samples.iter().all(|&s| s == 0.0), "L and R cancel out");
    assert!((audio.duration_seconds - 0.1).abs() < 1e-9);
    Ok(())
}

/// 16-bit mono PCM file whose header claims a 0 Hz sample rate
///
/// Written by hand because hound refuses to produce one.
fn write_zero_rate_wav(dir: &TempDir) -> Result<std::path::PathBuf> {
    let path = dir.path().join("zero-rate.wav");
    let samples: [i16; 4] = [100, -100, 200, 0];
    let data_len = (samples.len() * 2) as u32;

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&0u32.to_le_bytes()); // sample rate
    bytes.extend_from_slice(&0u32.to_le_bytes()); // byte rate
    bytes.extend_from_slice(&2u16.to_le_bytes()); // block align
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }

    std::fs::write(&path, bytes)?;
    Ok(path)
}

#[test]
fn test_audio_file_with_zero_rate_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_zero_rate_wav(&dir)?;

    let err = AudioFile::open(&path).err().expect("zero-rate file must not open");
    assert!(matches!(err, SerError::InvalidAudio(_)), "got {:?}", err);
    Ok(())
}

#[test]
fn test_file_backend_with_zero_rate_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_zero_rate_wav(&dir)?;

    let result = FileBackend::open(&path, AudioBackendConfig::default());
    assert!(matches!(result, Err(SerError::InvalidAudio(_))));
    Ok(())
}

#[test]
fn test_audio_file_nonexistent() {
    assert!(AudioFile::open("/nonexistent/path/to/audio.wav").is_err());
}

#[tokio::test]
async fn test_file_backend_replays_through_controller() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_stereo_wav(&dir, 1000)?;

    let config = AudioBackendConfig {
        block_size: 256,
        realtime: false,
    };
    let backend = FileBackend::open(&path, config)?;
    assert_eq!(backend.duration().as_millis(), 45);

    let mut controller = CaptureController::new(Box::new(backend));
    let mut feed = controller.level_feed();
    controller.start().await?;

    // 1000 = 3 * 256 + 232; wait for the short tail block
    wait_for_block(&mut feed, &[0.0; 232]).await;

    let output = controller.stop().await?.expect("recording output");
    assert_eq!(output.summary.sample_rate, 22050);
    assert_eq!(output.summary.sample_count, 1000);
    assert_eq!(output.wav.header()?.sample_rate, 22050);
    Ok(())
}
