//! Configuration management for word-typer-rs.
//!
//! Loads config from YAML files in standard locations. Every section
//! falls back to its defaults, and a broken file falls back to the
//! defaults as a whole.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::deck::GameMode;

/// Pronunciation accent, sent to the speech API as its `type` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accent {
    Us,
    Uk,
}

impl Accent {
    pub fn type_code(self) -> u8 {
        match self {
            Accent::Uk => 1,
            Accent::Us => 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    pub api_url: String,
    pub language: String,
    pub voice: Option<String>,
    pub accent: Option<Accent>,
    pub timeout_secs: u64,
    pub volume: u8,
    pub native_fallback: bool,
    pub native_command: String,
    pub native_args: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: "http://localhost:3000/speech/audio".into(),
            language: "en-US".into(),
            voice: None,
            accent: Some(Accent::Us),
            timeout_secs: 10,
            volume: 100,
            native_fallback: true,
            native_command: "espeak-ng".into(),
            native_args: vec![],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    pub enabled: bool,
    pub volume: u8,
    pub typing_path: PathBuf,
    pub success_path: PathBuf,
    pub error_path: PathBuf,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 60,
            typing_path: "sounds/typing.mp3".into(),
            success_path: "sounds/right.mp3".into(),
            error_path: "sounds/error.mp3".into(),
        }
    }
}

/// Key bindings such as `"ctrl+r"`, `"shift+right"` or `"home"`.
///
/// Many terminals send Ctrl+Backspace as Ctrl+H, which also clears the
/// input; binding `ctrl+h` here takes it over.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    pub reset: String,
    pub hint: String,
    pub pronounce: String,
    pub jump_first: String,
    pub jump_last: String,
    pub clear: String,
    pub next: String,
    pub prev: String,
    pub quit: String,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            reset: "ctrl+r".into(),
            hint: "ctrl+t".into(),
            pronounce: "ctrl+p".into(),
            jump_first: "home".into(),
            jump_last: "end".into(),
            clear: "esc".into(),
            next: "shift+right".into(),
            prev: "shift+left".into(),
            quit: "ctrl+q".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PracticeConfig {
    pub deck: Option<PathBuf>,
    pub mode: GameMode,
    pub hint_duration_ms: u64,
    pub shortcut_throttle_ms: u64,
    pub pronounce_throttle_ms: u64,
    /// Speak each phrase when it is loaded.
    pub auto_pronounce: bool,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            deck: None,
            mode: GameMode::Dictation,
            hint_duration_ms: 1500,
            shortcut_throttle_ms: 300,
            pronounce_throttle_ms: 500,
            auto_pronounce: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    /// Defaults to ~/.word-typer-history
    pub dir: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Defaults to ~/.word-typer-rs/word-typer.log
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub speech: SpeechConfig,
    pub sound: SoundConfig,
    pub keys: KeysConfig,
    pub practice: PracticeConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

/// Where the loaded configuration came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigOrigin {
    Defaults,
    File(PathBuf),
    /// A file was found but could not be used; defaults were applied.
    Invalid { path: PathBuf, reason: String },
}

impl ConfigOrigin {
    pub fn log(&self) {
        match self {
            ConfigOrigin::Defaults => info!("No config file found, using defaults"),
            ConfigOrigin::File(path) => info!("Loaded config from {}", path.display()),
            ConfigOrigin::Invalid { path, reason } => {
                warn!("Failed to load {} ({reason}), using defaults", path.display())
            }
        }
    }
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./word-typer.yaml
    /// 2. ~/.config/word-typer/config.yaml
    /// 3. /etc/word-typer/config.yaml
    ///
    /// Runs before logging is set up (the log path is configurable), so
    /// the outcome is returned for the caller to log.
    pub fn load(path: Option<&Path>) -> (Self, ConfigOrigin) {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("word-typer.yaml")),
                dirs::home_dir().map(|h| h.join(".config/word-typer/config.yaml")),
                Some(PathBuf::from("/etc/word-typer/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            return (Self::default(), ConfigOrigin::Defaults);
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match serde_yml::from_str(&contents) {
                Ok(config) => (config, ConfigOrigin::File(config_path)),
                Err(e) => (
                    Self::default(),
                    ConfigOrigin::Invalid {
                        path: config_path,
                        reason: format!("parse error: {e}"),
                    },
                ),
            },
            Err(e) => (
                Self::default(),
                ConfigOrigin::Invalid {
                    path: config_path,
                    reason: format!("read error: {e}"),
                },
            ),
        }
    }

    pub fn log_file(&self) -> PathBuf {
        self.logging.file.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_default()
                .join(".word-typer-rs")
                .join("word-typer.log")
        })
    }

    pub fn history_dir(&self) -> PathBuf {
        self.history.dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_default()
                .join(".word-typer-history")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "speech:\n  api_url: http://tts.local/speech/audio\n  accent: uk\nsound:\n  volume: 20\npractice:\n  mode: translation"
        )
        .unwrap();

        let (config, origin) = Config::load(Some(file.path()));
        assert_eq!(origin, ConfigOrigin::File(file.path().to_path_buf()));
        assert_eq!(config.speech.api_url, "http://tts.local/speech/audio");
        assert_eq!(config.speech.accent, Some(Accent::Uk));
        assert_eq!(config.speech.native_command, "espeak-ng");
        assert_eq!(config.sound.volume, 20);
        assert!(config.sound.enabled);
        assert_eq!(config.practice.mode, GameMode::Translation);
        assert_eq!(config.practice.hint_duration_ms, 1500);
        assert_eq!(config.keys.reset, "ctrl+r");
    }

    #[test]
    fn unparsable_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "speech: [not, a, map").unwrap();

        let (config, origin) = Config::load(Some(file.path()));
        assert!(matches!(
            origin,
            ConfigOrigin::Invalid { ref path, ref reason }
                if path == file.path() && reason.starts_with("parse error")
        ));
        assert_eq!(config.speech.timeout_secs, 10);
        assert_eq!(config.keys.pronounce, "ctrl+p");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, origin) = Config::load(Some(&dir.path().join("nope.yaml")));
        assert!(matches!(origin, ConfigOrigin::Invalid { ref reason, .. } if reason.starts_with("read error")));
        assert_eq!(config.practice.shortcut_throttle_ms, 300);
    }

    #[test]
    fn accent_type_codes() {
        assert_eq!(Accent::Us.type_code(), 2);
        assert_eq!(Accent::Uk.type_code(), 1);
    }
}
