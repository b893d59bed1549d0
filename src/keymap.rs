//! Key bindings and keyboard dispatch.
//!
//! Bindings are written as `"ctrl+r"`, `"shift+right"`, `"home"`, `"esc"`.
//! `Keymap::resolve` maps a terminal key event to at most one `Command`,
//! checking bindings in a fixed priority order.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::warn;

use crate::config::{KeysConfig, PracticeConfig};
use crate::word_state::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

const MODIFIER_MASK: KeyModifiers = KeyModifiers::CONTROL
    .union(KeyModifiers::SHIFT)
    .union(KeyModifiers::ALT);

impl KeyChord {
    pub const fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    /// Parse `"ctrl+shift+p"`, `"home"`, `"f5"`. Case-insensitive.
    pub fn parse(binding: &str) -> Option<Self> {
        let mut modifiers = KeyModifiers::NONE;
        let mut code = None;

        for part in binding.split('+').map(|p| p.trim().to_ascii_lowercase()) {
            match part.as_str() {
                "ctrl" | "control" => modifiers |= KeyModifiers::CONTROL,
                "shift" => modifiers |= KeyModifiers::SHIFT,
                "alt" | "option" => modifiers |= KeyModifiers::ALT,
                name if code.is_none() => code = Some(resolve_key(name)?),
                _ => return None,
            }
        }

        code.map(|code| Self { code, modifiers })
    }

    pub fn matches(&self, key: &KeyEvent) -> bool {
        normalize_code(key.code) == self.code && key.modifiers & MODIFIER_MASK == self.modifiers
    }
}

/// Resolve a key name like "home" or "r" to a crossterm key code.
fn resolve_key(name: &str) -> Option<KeyCode> {
    let code = match name {
        "esc" | "escape" => KeyCode::Esc,
        "enter" | "return" => KeyCode::Enter,
        "space" => KeyCode::Char(' '),
        "tab" => KeyCode::Tab,
        "backspace" => KeyCode::Backspace,
        "delete" | "del" => KeyCode::Delete,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "pageup" => KeyCode::PageUp,
        "pagedown" => KeyCode::PageDown,
        f if f.len() > 1 && f.starts_with('f') => KeyCode::F(f[1..].parse().ok()?),
        c if c.chars().count() == 1 => KeyCode::Char(c.chars().next()?),
        _ => return None,
    };
    Some(code)
}

fn normalize_code(code: KeyCode) -> KeyCode {
    match code {
        KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Quit,
    Reset,
    Hint,
    JumpFirst,
    JumpLast,
    Clear,
    Navigate(Direction),
    Backspace,
    ClearInput,
    Submit,
    Prev,
    Next,
    Pronounce,
    Insert(char),
}

#[derive(Debug, Clone)]
pub struct Keymap {
    quit: KeyChord,
    reset: KeyChord,
    hint: KeyChord,
    jump_first: KeyChord,
    jump_last: KeyChord,
    clear: KeyChord,
    prev: KeyChord,
    next: KeyChord,
    pronounce: KeyChord,
}

impl Default for Keymap {
    fn default() -> Self {
        Self::from_config(&KeysConfig::default())
    }
}

impl Keymap {
    pub fn from_config(keys: &KeysConfig) -> Self {
        let defaults = KeysConfig::default();
        let bind = |value: &str, fallback: &str| {
            KeyChord::parse(value).unwrap_or_else(|| {
                warn!("Invalid key binding \"{value}\", using \"{fallback}\"");
                KeyChord::parse(fallback).unwrap_or(KeyChord::new(KeyCode::Null, KeyModifiers::NONE))
            })
        };

        Self {
            quit: bind(&keys.quit, &defaults.quit),
            reset: bind(&keys.reset, &defaults.reset),
            hint: bind(&keys.hint, &defaults.hint),
            jump_first: bind(&keys.jump_first, &defaults.jump_first),
            jump_last: bind(&keys.jump_last, &defaults.jump_last),
            clear: bind(&keys.clear, &defaults.clear),
            prev: bind(&keys.prev, &defaults.prev),
            next: bind(&keys.next, &defaults.next),
            pronounce: bind(&keys.pronounce, &defaults.pronounce),
        }
    }

    /// First match wins. While `composing`, keys that would edit or move
    /// through the phrase are left to the input method.
    pub fn resolve(&self, key: &KeyEvent, composing: bool) -> Option<Command> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if self.quit.matches(key) || (ctrl && key.code == KeyCode::Char('c')) {
            return Some(Command::Quit);
        }
        if self.reset.matches(key) {
            return Some(Command::Reset);
        }
        if self.hint.matches(key) {
            return Some(Command::Hint);
        }
        if composing {
            return None;
        }
        if self.jump_first.matches(key) {
            return Some(Command::JumpFirst);
        }
        if self.jump_last.matches(key) {
            return Some(Command::JumpLast);
        }
        if self.clear.matches(key) {
            return Some(Command::Clear);
        }

        let bare = key.modifiers & MODIFIER_MASK == KeyModifiers::NONE;
        match key.code {
            KeyCode::Left if bare => return Some(Command::Navigate(Direction::Left)),
            KeyCode::Right if bare => return Some(Command::Navigate(Direction::Right)),
            KeyCode::Backspace if ctrl => return Some(Command::ClearInput),
            // Ctrl+Backspace as 0x08
            KeyCode::Char('h') if key.modifiers & MODIFIER_MASK == KeyModifiers::CONTROL => {
                return Some(Command::ClearInput)
            }
            KeyCode::Backspace => return Some(Command::Backspace),
            KeyCode::Enter | KeyCode::Char(' ') if !ctrl => return Some(Command::Submit),
            _ => {}
        }

        if self.prev.matches(key) {
            return Some(Command::Prev);
        }
        if self.next.matches(key) {
            return Some(Command::Next);
        }
        if self.pronounce.matches(key) {
            return Some(Command::Pronounce);
        }

        match key.code {
            KeyCode::Char(c) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
                Some(Command::Insert(c))
            }
            _ => None,
        }
    }
}

/// Swallows key-repeat storms on shortcut commands.
#[derive(Debug)]
pub struct Throttle {
    shortcut: Duration,
    pronounce: Duration,
    last: HashMap<Command, Instant>,
}

impl Throttle {
    pub fn new(shortcut: Duration, pronounce: Duration) -> Self {
        Self {
            shortcut,
            pronounce,
            last: HashMap::new(),
        }
    }

    pub fn from_config(practice: &PracticeConfig) -> Self {
        Self::new(
            Duration::from_millis(practice.shortcut_throttle_ms),
            Duration::from_millis(practice.pronounce_throttle_ms),
        )
    }

    fn window(&self, command: Command) -> Option<Duration> {
        match command {
            Command::Reset | Command::Hint | Command::Prev | Command::Next => Some(self.shortcut),
            Command::Pronounce => Some(self.pronounce),
            _ => None,
        }
    }

    pub fn allow(&mut self, command: Command, now: Instant) -> bool {
        let Some(window) = self.window(command) else {
            return true;
        };
        match self.last.get(&command) {
            Some(&at) if now.saturating_duration_since(at) < window => false,
            _ => {
                self.last.insert(command, now);
                true
            }
        }
    }
}
