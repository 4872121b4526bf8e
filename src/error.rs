use thiserror::Error;

/// Errors surfaced by capture, encoding and the inference round trip
#[derive(Error, Debug)]
pub enum SerError {
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Upstream error: {0}")]
    UpstreamError(String),

    #[error("Another request is already in flight")]
    Busy,

    #[error("Capture session already finished")]
    SessionFinished,

    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),

    #[error("Invalid audio: {0}")]
    InvalidAudio(String),

    #[error("WAV encoding failed: {0}")]
    Encode(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SerError {
    /// Short message shown to the user after a failed attempt
    pub fn user_message(&self) -> String {
        match self {
            SerError::PermissionDenied(_) => "Microphone access was denied".to_string(),
            SerError::DeviceUnavailable(_) => "No microphone available".to_string(),
            SerError::NetworkFailure(_) => "Could not reach the analysis service".to_string(),
            SerError::InvalidResponse(msg) | SerError::UpstreamError(msg) => msg.clone(),
            SerError::Busy => "Still processing the previous clip".to_string(),
            SerError::UnsupportedMedia(_) => "Please choose an audio file".to_string(),
            SerError::SessionFinished => "Start a new recording".to_string(),
            SerError::InvalidAudio(_) | SerError::Encode(_) | SerError::Io(_) => {
                "Could not prepare the audio".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, SerError>;
