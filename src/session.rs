//! One practice phrase at a time: keyboard input in, state changes,
//! sounds, speech and practice events out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use crossterm::event::KeyEvent;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::{Config, SpeechConfig};
use crate::deck::{GameMode, Word};
use crate::history::PracticeRecord;
use crate::keymap::{Command, Keymap, Throttle};
use crate::sounds::{SoundEffects, SoundKind};
use crate::speech::{SpeechController, SpeechRequest};
use crate::word_state::{InputUpdate, SubmitOutcome, WordStates};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    /// Text is being composed outside the session (an IME or a bracketed
    /// paste); keys are held until it ends.
    CompositionStart,
    /// Composition committed. Control characters are dropped.
    CompositionEnd(String),
}

/// Notifications for whoever drives the deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PracticeEvent {
    Completed(bool),
    Next,
    Prev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Copy)]
struct PhraseStats {
    started: Instant,
    mistakes: u32,
    hints: u32,
    pronunciations: u32,
}

impl PhraseStats {
    fn new(now: Instant) -> Self {
        Self {
            started: now,
            mistakes: 0,
            hints: 0,
            pronunciations: 0,
        }
    }
}

pub struct TypingSession {
    words: WordStates,
    word: Word,
    mode: GameMode,
    keymap: Keymap,
    throttle: Throttle,
    sounds: SoundEffects,
    speech: Option<Arc<SpeechController>>,
    speech_config: SpeechConfig,
    auto_pronounce: bool,
    hint_duration: Duration,
    hint_until: Option<Instant>,
    composing: bool,
    stats: PhraseStats,
    events: mpsc::UnboundedSender<PracticeEvent>,
}

impl TypingSession {
    pub fn new(
        config: &Config,
        mode: GameMode,
        sounds: SoundEffects,
        speech: Option<Arc<SpeechController>>,
        events: mpsc::UnboundedSender<PracticeEvent>,
    ) -> Self {
        Self {
            words: WordStates::default(),
            word: Word::new("", ""),
            mode: mode.resolve(),
            keymap: Keymap::from_config(&config.keys),
            throttle: Throttle::from_config(&config.practice),
            sounds,
            speech,
            speech_config: config.speech.clone(),
            auto_pronounce: config.practice.auto_pronounce,
            hint_duration: Duration::from_millis(config.practice.hint_duration_ms),
            hint_until: None,
            composing: false,
            stats: PhraseStats::new(Instant::now()),
            events,
        }
    }

    /// Start practising `word`. Any speech for the previous word stops.
    pub fn load_word(&mut self, word: Word, now: Instant) {
        if let Some(speech) = &self.speech {
            speech.cancel();
        }
        self.words = WordStates::new(self.mode.target(&word));
        self.word = word;
        self.hint_until = None;
        self.composing = false;
        self.stats = PhraseStats::new(now);
        info!("Practising \"{}\" ({})", self.words.phrase(), self.mode);

        if self.auto_pronounce && self.mode.plays_audio() {
            self.speak(false);
        }
    }

    pub fn words(&self) -> &WordStates {
        &self.words
    }

    pub fn word(&self) -> &Word {
        &self.word
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    pub fn is_speaking(&self) -> bool {
        self.speech.as_ref().is_some_and(|s| s.is_speaking())
    }

    /// Ghost text for the active token while the hint timer runs.
    pub fn visible_hint(&self, now: Instant) -> Option<&str> {
        match self.hint_until {
            Some(until) if now < until => self.words.hint(),
            _ => None,
        }
    }

    /// Expire the hint. Returns true if something changed on screen.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.hint_until {
            Some(until) if now >= until => {
                self.hint_until = None;
                true
            }
            _ => false,
        }
    }

    pub fn handle_input(&mut self, event: InputEvent, now: Instant) -> SessionAction {
        match event {
            InputEvent::Key(key) => return self.handle_key(key, now),
            InputEvent::CompositionStart => self.composing = true,
            InputEvent::CompositionEnd(text) => {
                self.composing = false;
                let text: String = text.chars().filter(|c| !c.is_control()).collect();
                self.insert(&text);
            }
        }
        SessionAction::Continue
    }

    fn handle_key(&mut self, key: KeyEvent, now: Instant) -> SessionAction {
        let Some(command) = self.keymap.resolve(&key, self.composing) else {
            return SessionAction::Continue;
        };
        if !self.throttle.allow(command, now) {
            debug!("Throttled {command:?}");
            return SessionAction::Continue;
        }

        match command {
            Command::Quit => return SessionAction::Quit,
            Command::Reset => {
                self.words.reset();
                self.hint_until = None;
                debug!("Phrase reset");
            }
            Command::Hint => {
                if !self.words.is_complete() {
                    self.hint_until = Some(now + self.hint_duration);
                    self.stats.hints += 1;
                }
            }
            Command::JumpFirst => {
                self.words.jump_to_first_incomplete();
            }
            Command::JumpLast => {
                self.words.jump_to_last_incomplete();
            }
            Command::Clear | Command::ClearInput => self.words.clear_active_input(),
            Command::Navigate(direction) => {
                self.words.navigate(direction);
            }
            Command::Backspace => {
                if self.words.input().is_empty() {
                    self.words.backspace_merge();
                } else {
                    let mut value = self.words.input().to_string();
                    value.pop();
                    self.words.update_active_input(&value);
                }
            }
            Command::Submit => self.submit(),
            Command::Prev => self.emit(PracticeEvent::Prev),
            Command::Next => self.emit(PracticeEvent::Next),
            Command::Pronounce => {
                self.stats.pronunciations += 1;
                self.speak(true);
            }
            Command::Insert(c) => {
                if self.words.is_complete() {
                    return SessionAction::Continue;
                }
                self.sounds.play(SoundKind::Typing);
                let mut buf = [0u8; 4];
                self.insert(c.encode_utf8(&mut buf));
            }
        }
        SessionAction::Continue
    }

    fn insert(&mut self, text: &str) {
        if text.is_empty() || self.words.is_complete() {
            return;
        }
        let value = format!("{}{}", self.words.input(), text);
        if self.words.update_active_input(&value) == InputUpdate::Rejected {
            self.stats.mistakes += 1;
            self.sounds.play(SoundKind::Error);
        }
    }

    fn submit(&mut self) {
        if self.words.is_complete() {
            self.emit(PracticeEvent::Next);
            return;
        }
        if self.words.input_matches() {
            self.sounds.play(SoundKind::Typing);
        }
        if self.words.has_error() {
            self.words.acknowledge_error();
            return;
        }

        match self.words.submit() {
            SubmitOutcome::PhraseComplete => {
                self.hint_until = None;
                self.sounds.play(SoundKind::Success);
                info!("Completed \"{}\"", self.words.phrase());
                self.emit(PracticeEvent::Completed(true));
            }
            SubmitOutcome::Mismatch => {
                self.stats.mistakes += 1;
                self.sounds.play(SoundKind::Error);
            }
            SubmitOutcome::Advanced { to } => debug!("Advanced to token {to}"),
            SubmitOutcome::Ignored => {}
        }
    }

    fn speak(&self, force: bool) {
        let Some(speech) = &self.speech else {
            return;
        };
        if !self.speech_config.enabled {
            return;
        }

        let request = SpeechRequest {
            language: self
                .word
                .language
                .clone()
                .or_else(|| Some(self.speech_config.language.clone()))
                .filter(|l| !l.is_empty()),
            voice: self.speech_config.voice.clone(),
            accent: self.speech_config.accent,
            ..SpeechRequest::new(self.word.word.clone())
        };
        let speech = Arc::clone(speech);
        tokio::spawn(async move {
            let outcome = speech.speak(request, force).await;
            debug!("Pronunciation finished: {outcome:?}");
        });
    }

    fn emit(&self, event: PracticeEvent) {
        if self.events.send(event).is_err() {
            debug!("Practice event {event:?} dropped, no listener");
        }
    }

    /// Summarize the current phrase for the history log.
    pub fn record(&self, correct: bool, now: Instant) -> PracticeRecord {
        PracticeRecord {
            timestamp: Local::now().to_rfc3339(),
            phrase: self.words.phrase().to_string(),
            word: self.word.word.clone(),
            mode: self.mode,
            correct,
            mistakes: self.stats.mistakes,
            hints: self.stats.hints,
            pronunciations: self.stats.pronunciations,
            duration_ms: now.saturating_duration_since(self.stats.started).as_millis() as u64,
        }
    }

    pub fn shutdown(&self) {
        if let Some(speech) = &self.speech {
            speech.cancel();
        }
        self.sounds.stop_all();
    }
}
