use std::path::Path;

use crate::audio::{WavBuffer, WAV_FILE_NAME, WAV_MIME};
use crate::error::{Result, SerError};

/// A clip ready to be posted as the `file` form field
#[derive(Debug, Clone)]
pub struct Upload {
    file_name: String,
    mime: String,
    bytes: Vec<u8>,
}

/// Guess an audio MIME type from the file extension
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let mime = match ext.as_str() {
        "wav" | "wave" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "webm" => "audio/webm",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        _ => return None,
    };
    Some(mime)
}

impl Upload {
    /// A freshly encoded recording
    pub fn recording(wav: WavBuffer) -> Self {
        Self {
            file_name: WAV_FILE_NAME.to_string(),
            mime: WAV_MIME.to_string(),
            bytes: wav.into_bytes(),
        }
    }

    /// A user-selected file; the MIME type must be `audio/*`
    pub fn file(file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let mime = mime.into();
        if !mime.starts_with("audio/") {
            return Err(SerError::UnsupportedMedia(mime));
        }
        Ok(Self {
            file_name: file_name.into(),
            mime,
            bytes,
        })
    }

    /// Read a file from disk, keeping its original name
    pub fn from_path(path: &Path) -> Result<Self> {
        let mime = mime_for_path(path)
            .ok_or_else(|| SerError::UnsupportedMedia(path.display().to_string()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let bytes = std::fs::read(path)?;
        Self::file(file_name, mime, bytes)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn into_part(self) -> Result<reqwest::multipart::Part> {
        reqwest::multipart::Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(&self.mime)
            .map_err(|e| SerError::UnsupportedMedia(e.to_string()))
    }
}
