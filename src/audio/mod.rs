pub mod backend;
pub mod file;
pub mod meter;
pub mod wav;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use backend::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioResourceHandle,
    AudioSource,
};
pub use file::{AudioFile, FileBackend};
pub use meter::{block_level, LevelMeter, METER_FLOOR, METER_WIDTH};
pub use wav::{encode_wav, quantize, WavBuffer, WavHeader, WAV_FILE_NAME, WAV_HEADER_LEN, WAV_MIME};
