use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audio::WavBuffer;

/// Lifecycle of one capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    Idle,
    Recording,
    /// Terminal; a new session must be constructed to record again
    Stopped,
}

/// Statistics about a finished capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSummary {
    /// Session identifier used in logs
    pub session_id: String,

    /// Wall-clock time the recording started
    pub started_at: DateTime<Utc>,

    /// Elapsed time between start and stop, from the monotonic clock
    #[serde(with = "duration_secs")]
    pub duration: Duration,

    /// Sample rate of the captured audio
    pub sample_rate: u32,

    /// Number of mono samples captured
    pub sample_count: usize,
}

/// Result of stopping a recording: the encoded clip plus its summary
#[derive(Debug, Clone)]
pub struct CaptureOutput {
    pub wav: WavBuffer,
    pub summary: RecordingSummary,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
