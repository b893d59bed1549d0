//! Word decks and game modes.
//!
//! A deck is a YAML or JSON file holding a list of words, either bare or
//! under a `words:` key. Field names are accepted in camelCase or
//! snake_case.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::DeckError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub word: String,
    #[serde(default)]
    pub meaning: String,
    #[serde(default, alias = "us_phonetic")]
    pub us_phonetic: Option<String>,
    #[serde(default, alias = "uk_phonetic")]
    pub uk_phonetic: Option<String>,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl Word {
    pub fn new(word: impl Into<String>, meaning: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            meaning: meaning.into(),
            us_phonetic: None,
            uk_phonetic: None,
            example: None,
            language: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum GameMode {
    /// See the meaning, hear the word, type the word.
    #[default]
    Dictation,
    /// See and hear the word, type its meaning.
    Translation,
    /// Only hear the word, type it.
    AudioWriting,
    /// See the meaning without audio, type the word.
    SilentTranslation,
    /// Say the word aloud. Not available in a terminal.
    Speaking,
}

impl GameMode {
    pub fn label(self) -> &'static str {
        match self {
            GameMode::Dictation => "dictation",
            GameMode::Translation => "translation",
            GameMode::AudioWriting => "audio writing",
            GameMode::SilentTranslation => "silent translation",
            GameMode::Speaking => "speaking",
        }
    }

    pub fn is_available(self) -> bool {
        !matches!(self, GameMode::Speaking)
    }

    /// Unavailable modes fall back to dictation.
    pub fn resolve(self) -> Self {
        if self.is_available() {
            self
        } else {
            warn!("{} mode is not available, using dictation", self.label());
            GameMode::Dictation
        }
    }

    /// The text the learner must type.
    pub fn target(self, word: &Word) -> &str {
        match self {
            GameMode::Translation if !word.meaning.trim().is_empty() => &word.meaning,
            _ => &word.word,
        }
    }

    /// What is shown above the typing line, if anything.
    pub fn prompt(self, word: &Word) -> Option<&str> {
        match self {
            GameMode::Dictation | GameMode::SilentTranslation | GameMode::Speaking => {
                Some(word.meaning.as_str()).filter(|m| !m.trim().is_empty())
            }
            GameMode::Translation => Some(word.word.as_str()),
            GameMode::AudioWriting => None,
        }
    }

    pub fn plays_audio(self) -> bool {
        !matches!(self, GameMode::SilentTranslation)
    }
}

impl std::fmt::Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DeckFile {
    List(Vec<Word>),
    Wrapped { words: Vec<Word> },
}

#[derive(Debug, Clone)]
pub struct Deck {
    words: Vec<Word>,
    position: usize,
}

impl Deck {
    pub fn from_words(words: Vec<Word>) -> Self {
        Self { words, position: 0 }
    }

    pub fn load(path: &Path) -> Result<Self, DeckError> {
        let contents = std::fs::read_to_string(path).map_err(|source| DeckError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed: DeckFile = if is_json {
            serde_json::from_str(&contents).map_err(|e| e.to_string())
        } else {
            serde_yml::from_str(&contents).map_err(|e| e.to_string())
        }
        .map_err(|reason| DeckError::Parse {
            path: path.to_path_buf(),
            reason,
        })?;

        let words: Vec<Word> = match parsed {
            DeckFile::List(words) | DeckFile::Wrapped { words } => words,
        }
        .into_iter()
        .filter(|w| !w.word.trim().is_empty())
        .collect();

        if words.is_empty() {
            return Err(DeckError::Empty(path.to_path_buf()));
        }

        info!("Loaded {} words from {}", words.len(), path.display());
        Ok(Self::from_words(words))
    }

    /// Built-in words used when no deck file is configured.
    pub fn sample() -> Self {
        Self::from_words(vec![
            Word {
                us_phonetic: Some("həˈloʊ".into()),
                uk_phonetic: Some("həˈləʊ".into()),
                example: Some("Hello, how are you?".into()),
                language: Some("en".into()),
                ..Word::new("hello", "a greeting")
            },
            Word {
                example: Some("Practice makes perfect.".into()),
                language: Some("en".into()),
                ..Word::new("practice makes perfect", "repetition builds skill")
            },
        ])
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn current(&self) -> Option<&Word> {
        self.words.get(self.position)
    }

    /// Advance, wrapping to the first word after the last.
    pub fn next(&mut self) -> Option<&Word> {
        if self.words.is_empty() {
            return None;
        }
        self.position = (self.position + 1) % self.words.len();
        self.current()
    }

    /// Step back, wrapping to the last word before the first.
    pub fn prev(&mut self) -> Option<&Word> {
        if self.words.is_empty() {
            return None;
        }
        self.position = self
            .position
            .checked_sub(1)
            .unwrap_or(self.words.len() - 1);
        self.current()
    }
}
