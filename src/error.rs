//! Error types for the speech, playback and deck layers.

use std::path::PathBuf;

/// Failures of the pronunciation pipeline. None of these reach the UI;
/// the speech controller turns them into a fallback or a log line.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("Nothing to speak")]
    EmptyText,

    #[error("Remote speech disabled")]
    RemoteDisabled,

    #[error("Speech request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Speech API returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("Unsupported speech response: {0}")]
    UnsupportedResponse(String),

    #[error("Speech response carried no audio")]
    EmptyAudio,

    #[error("Invalid audio data URL: {0}")]
    DataUrl(String),

    #[error("Native speech synthesis failed: {0}")]
    Native(String),

    #[error("Playback failed: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Speech cancelled")]
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("No audio output device: {0}")]
    NoOutput(String),

    #[error("Failed to decode {mime} clip: {reason}")]
    Decode { mime: &'static str, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    #[error("Failed to read deck {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse deck {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Deck {0} contains no words")]
    Empty(PathBuf),
}
