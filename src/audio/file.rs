use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use crate::error::{Result, SerError};

/// A WAV file decoded to mono `f32` samples
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        if spec.sample_rate == 0 {
            return Err(SerError::InvalidAudio(format!(
                "{} declares a sample rate of 0",
                path.display()
            )));
        }
        if spec.channels == 0 {
            return Err(SerError::InvalidAudio(format!("{} declares no channels", path.display())));
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        let samples = downmix(&interleaved, spec.channels);
        let duration_seconds = samples.len() as f64 / spec.sample_rate as f64;

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }
}

/// Average interleaved channels down to mono
pub fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let n = channels as usize;
    interleaved
        .chunks_exact(n)
        .map(|frame| frame.iter().sum::<f32>() / n as f32)
        .collect()
}

/// Replays a WAV file through the audio tap interface
pub struct FileBackend {
    name: String,
    audio: std::sync::Arc<AudioFile>,
    config: AudioBackendConfig,
    task: Option<JoinHandle<()>>,
}

impl FileBackend {
    pub fn open(path: impl AsRef<Path>, config: AudioBackendConfig) -> Result<Self> {
        let audio = AudioFile::open(path)?;
        if config.block_size == 0 {
            return Err(SerError::DeviceUnavailable("block size must be non-zero".to_string()));
        }
        Ok(Self {
            name: format!("file:{}", audio.path),
            audio: std::sync::Arc::new(audio),
            config,
            task: None,
        })
    }

    /// Length of the replayed clip
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.audio.duration_seconds.max(0.0))
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn acquire(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let (tx, rx) = mpsc::channel(100);
        let audio = std::sync::Arc::clone(&self.audio);
        let block_size = self.config.block_size;
        let realtime = self.config.realtime;

        self.task = Some(tokio::spawn(async move {
            let rate = audio.sample_rate;
            let block_duration = Duration::from_secs_f64(block_size as f64 / rate as f64);

            for (i, block) in audio.samples.chunks(block_size).enumerate() {
                let frame = AudioFrame {
                    samples: block.to_vec(),
                    sample_rate: rate,
                    timestamp_ms: (i * block_size) as u64 * 1000 / rate as u64,
                };
                if tx.send(frame).await.is_err() {
                    break;
                }
                if realtime {
                    tokio::time::sleep(block_duration).await;
                }
            }
            debug!("File replay finished");
        }));

        Ok(rx)
    }

    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn sample_rate(&self) -> u32 {
        self.audio.sample_rate
    }

    fn name(&self) -> &str {
        &self.name
    }
}
