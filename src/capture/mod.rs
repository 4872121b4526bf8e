//! Capture session management
//!
//! `CaptureController` owns one recording attempt:
//! - Acquiring and releasing the audio tap
//! - Accumulating blocks into an append-only buffer
//! - Publishing the latest block for the level meter
//! - Encoding the finished buffer to WAV on stop

mod controller;
mod summary;

pub use controller::CaptureController;
pub use summary::{CaptureOutput, CaptureState, RecordingSummary};
