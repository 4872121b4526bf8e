pub mod audio;
pub mod capture;
pub mod client;
pub mod config;
pub mod emotion;
pub mod error;
pub mod relay;
pub mod report;
pub mod session;

pub use audio::{
    encode_wav, AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFile, AudioFrame,
    AudioResourceHandle, AudioSource, LevelMeter, WavBuffer, WavHeader,
};
pub use capture::{CaptureController, CaptureOutput, CaptureState, RecordingSummary};
pub use client::{InferenceClient, Upload};
pub use config::Config;
pub use emotion::{Emotion, EmotionResult, LabelScore};
pub use error::SerError;
pub use relay::{create_router, AppState};
pub use session::{AnalysisSession, Predictor, ViewState};
