//! Per-token state for one practice phrase.
//!
//! EDITING → COMPLETE
//!
//! The machine owns the tokens, the active index and the shared input
//! buffer the learner is typing into. Every operation returns an outcome
//! instead of performing side effects; the session decides which sound to
//! play or which callback to fire.

use std::fmt;

use crate::text::is_word;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordToken {
    pub id: usize,
    pub text: String,
    pub user_input: String,
    pub is_active: bool,
    pub incorrect: bool,
    pub completed: bool,
}

impl WordToken {
    fn new(id: usize, text: &str) -> Self {
        Self {
            id,
            text: text.to_string(),
            user_input: String::new(),
            is_active: id == 0,
            incorrect: false,
            completed: false,
        }
    }

    pub fn is_word(&self) -> bool {
        is_word(&self.text)
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseState {
    Editing,
    Complete,
}

impl fmt::Display for PhraseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Editing => write!(f, "EDITING"),
            Self::Complete => write!(f, "COMPLETE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputUpdate {
    Accepted,
    /// Longer than the token; nothing was stored.
    Rejected,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Advanced { to: usize },
    PhraseComplete,
    Mismatch,
    /// Phrase already complete, or there is no word token to submit.
    Ignored,
}

#[derive(Debug, Clone, Default)]
pub struct WordStates {
    phrase: String,
    tokens: Vec<WordToken>,
    active: usize,
    input: String,
    error_pending: bool,
    complete: bool,
}

impl WordStates {
    pub fn new(phrase: &str) -> Self {
        let mut states = Self::default();
        states.initialize(phrase);
        states
    }

    /// Rebuild every token from `phrase` and make index 0 active.
    pub fn initialize(&mut self, phrase: &str) {
        self.phrase = phrase.to_string();
        self.tokens = phrase
            .split(' ')
            .enumerate()
            .map(|(i, text)| WordToken::new(i, text))
            .collect();
        self.active = 0;
        self.input.clear();
        self.error_pending = false;
        // A phrase without any word token has nothing to type.
        self.complete = !self.tokens.iter().any(WordToken::is_word);
    }

    pub fn reset(&mut self) {
        let phrase = std::mem::take(&mut self.phrase);
        self.initialize(&phrase);
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn tokens(&self) -> &[WordToken] {
        &self.tokens
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active(&self) -> Option<&WordToken> {
        self.tokens.get(self.active)
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn has_error(&self) -> bool {
        self.error_pending
    }

    pub fn state(&self) -> PhraseState {
        if self.complete {
            PhraseState::Complete
        } else {
            PhraseState::Editing
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// True when the buffer already spells the active token.
    pub fn input_matches(&self) -> bool {
        self.active()
            .is_some_and(|t| self.input.trim() == t.text)
    }

    /// Characters of the active token not yet typed.
    pub fn hint(&self) -> Option<&str> {
        let token = self.active()?;
        if !token.is_word() {
            return None;
        }
        let typed = token.user_input.chars().count();
        let start = token
            .text
            .char_indices()
            .nth(typed)
            .map_or(token.text.len(), |(i, _)| i);
        Some(&token.text[start..])
    }

    pub fn update_active_input(&mut self, value: &str) -> InputUpdate {
        if self.complete {
            return InputUpdate::Ignored;
        }
        let Some(token) = self.tokens.get_mut(self.active) else {
            return InputUpdate::Ignored;
        };

        if value.chars().count() > token.char_len() {
            token.incorrect = true;
            self.error_pending = true;
            return InputUpdate::Rejected;
        }

        token.user_input = value.to_string();
        token.completed = value.trim() == token.text;
        token.incorrect = false;
        if self.error_pending && !value.is_empty() {
            self.error_pending = false;
        }
        self.input = value.to_string();
        InputUpdate::Accepted
    }

    pub fn submit(&mut self) -> SubmitOutcome {
        if self.complete {
            return SubmitOutcome::Ignored;
        }
        let current = self.active;
        let Some(token) = self.tokens.get_mut(current) else {
            return SubmitOutcome::Ignored;
        };

        if self.input.trim() != token.text {
            token.incorrect = true;
            self.error_pending = true;
            return SubmitOutcome::Mismatch;
        }

        token.completed = true;
        token.user_input = token.text.clone();
        token.incorrect = false;
        self.error_pending = false;

        if self.tokens.iter().all(|t| t.completed || !t.is_word()) {
            self.complete = true;
            self.input.clear();
            return SubmitOutcome::PhraseComplete;
        }

        match self.next_incomplete(current) {
            Some(next) => {
                self.switch_to(next);
                SubmitOutcome::Advanced { to: next }
            }
            None => SubmitOutcome::Ignored,
        }
    }

    /// Forward from `from + 1` to the end, then wrap through `0..from`.
    fn next_incomplete(&self, from: usize) -> Option<usize> {
        let pending = |i: &usize| {
            let t = &self.tokens[*i];
            !t.completed && t.is_word()
        };
        (from + 1..self.tokens.len())
            .find(pending)
            .or_else(|| (0..from).find(pending))
    }

    /// Nearest word token strictly on one side. No wraparound.
    fn neighbour(&self, from: usize, direction: Direction) -> Option<usize> {
        match direction {
            Direction::Left => (0..from).rev().find(|&i| self.tokens[i].is_word()),
            Direction::Right => (from + 1..self.tokens.len()).find(|&i| self.tokens[i].is_word()),
        }
    }

    fn switch_to(&mut self, index: usize) {
        if let Some(old) = self.tokens.get_mut(self.active) {
            old.incorrect = false;
        }
        for (i, token) in self.tokens.iter_mut().enumerate() {
            token.is_active = i == index;
        }
        self.active = index;
        self.input = self.tokens[index].user_input.clone();
        self.error_pending = false;
    }

    pub fn navigate(&mut self, direction: Direction) -> bool {
        if self.complete {
            return false;
        }
        match self.neighbour(self.active, direction) {
            Some(target) => {
                self.switch_to(target);
                true
            }
            None => false,
        }
    }

    /// Delete across a token boundary: with an empty buffer, step back to
    /// the previous word token and drop its last character.
    pub fn backspace_merge(&mut self) -> bool {
        if self.complete || !self.input.is_empty() || self.active == 0 {
            return false;
        }
        let Some(target) = self.neighbour(self.active, Direction::Left) else {
            return false;
        };
        self.switch_to(target);

        let token = &mut self.tokens[target];
        token.user_input.pop();
        token.completed = token.user_input.trim() == token.text;
        token.incorrect = false;
        self.input = token.user_input.clone();
        true
    }

    pub fn jump_to_first_incomplete(&mut self) -> bool {
        let found = self
            .tokens
            .iter()
            .position(|t| !t.completed && t.is_word());
        self.jump(found)
    }

    pub fn jump_to_last_incomplete(&mut self) -> bool {
        let found = self
            .tokens
            .iter()
            .rposition(|t| !t.completed && t.is_word());
        self.jump(found)
    }

    fn jump(&mut self, target: Option<usize>) -> bool {
        if self.complete {
            return false;
        }
        match target {
            Some(i) if i != self.active => {
                self.switch_to(i);
                true
            }
            _ => false,
        }
    }

    /// Empty the active token without moving.
    pub fn clear_active_input(&mut self) {
        if self.complete {
            return;
        }
        if let Some(token) = self.tokens.get_mut(self.active) {
            token.user_input.clear();
            token.completed = false;
            token.incorrect = false;
        }
        self.input.clear();
        self.error_pending = false;
    }

    /// Drop the buffer and pending error after a failed submission.
    pub fn acknowledge_error(&mut self) {
        self.clear_active_input();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_word(states: &mut WordStates, word: &str) {
        let mut buf = String::new();
        for c in word.chars() {
            buf.push(c);
            assert_eq!(states.update_active_input(&buf), InputUpdate::Accepted);
        }
    }

    #[test]
    fn initialize_splits_on_spaces() {
        let states = WordStates::new("the quick  fox");
        assert_eq!(states.tokens().len(), "the quick  fox".split(' ').count());
        assert_eq!(states.active_index(), 0);
        assert!(states.tokens().iter().all(|t| !t.completed));
        assert_eq!(states.tokens().iter().filter(|t| t.is_active).count(), 1);
        assert_eq!(states.state(), PhraseState::Editing);
    }

    #[test]
    fn scenario_a_two_words_complete() {
        let mut states = WordStates::new("a cat");
        type_word(&mut states, "a");
        assert_eq!(states.submit(), SubmitOutcome::Advanced { to: 1 });
        assert!(states.tokens()[0].completed);
        assert_eq!(states.active().map(|t| t.text.as_str()), Some("cat"));

        type_word(&mut states, "cat");
        assert_eq!(states.submit(), SubmitOutcome::PhraseComplete);
        assert!(states.is_complete());
        // Further submissions never complete twice.
        assert_eq!(states.submit(), SubmitOutcome::Ignored);
    }

    #[test]
    fn scenario_b_overtype_rejected() {
        let mut states = WordStates::new("dog");
        type_word(&mut states, "dog");
        assert_eq!(states.update_active_input("dogs"), InputUpdate::Rejected);
        let token = &states.tokens()[0];
        assert!(token.incorrect);
        assert_eq!(token.user_input, "dog");
        assert_eq!(states.input(), "dog");
        assert!(states.has_error());
    }

    #[test]
    fn input_never_exceeds_token_length() {
        let mut states = WordStates::new("ab cde");
        for value in ["a", "ab", "abc", "abcd", "x", "xyzw"] {
            states.update_active_input(value);
            for t in states.tokens() {
                assert!(t.user_input.chars().count() <= t.text.chars().count());
            }
        }
    }

    #[test]
    fn scenario_c_punctuation_skipped_by_navigation() {
        let mut states = WordStates::new("hello , world");
        assert!(states.navigate(Direction::Right));
        assert_eq!(states.active_index(), 2);
        assert!(states.navigate(Direction::Left));
        assert_eq!(states.active_index(), 0);
        assert!(!states.tokens()[1].is_active);
    }

    #[test]
    fn attached_punctuation_is_part_of_the_word() {
        let mut states = WordStates::new("hello, world");
        assert!(states.navigate(Direction::Right));
        assert_eq!(states.active().map(|t| t.text.as_str()), Some("world"));
    }

    #[test]
    fn navigate_does_not_wrap() {
        let mut states = WordStates::new("one two");
        assert!(!states.navigate(Direction::Left));
        assert!(states.navigate(Direction::Right));
        assert!(!states.navigate(Direction::Right));
        assert_eq!(states.active_index(), 1);
    }

    #[test]
    fn navigate_copies_target_input_into_buffer() {
        let mut states = WordStates::new("one two");
        states.update_active_input("on");
        states.navigate(Direction::Right);
        assert_eq!(states.input(), "");
        states.navigate(Direction::Left);
        assert_eq!(states.input(), "on");
    }

    #[test]
    fn submit_wraps_to_earlier_incomplete_word() {
        let mut states = WordStates::new("one two three");
        states.navigate(Direction::Right);
        states.navigate(Direction::Right);
        type_word(&mut states, "three");
        assert_eq!(states.submit(), SubmitOutcome::Advanced { to: 0 });
        type_word(&mut states, "one");
        assert_eq!(states.submit(), SubmitOutcome::Advanced { to: 1 });
    }

    #[test]
    fn submit_mismatch_flags_and_stays() {
        let mut states = WordStates::new("Cat dog");
        type_word(&mut states, "cat");
        assert_eq!(states.submit(), SubmitOutcome::Mismatch);
        assert_eq!(states.active_index(), 0);
        assert!(states.tokens()[0].incorrect);
        assert!(states.has_error());

        // Editing recovers from the error state.
        states.update_active_input("C");
        assert!(!states.has_error());
        assert!(!states.tokens()[0].incorrect);
    }

    #[test]
    fn submit_advances_only_to_incomplete_word_tokens() {
        let mut states = WordStates::new("a , b - c");
        type_word(&mut states, "a");
        assert_eq!(states.submit(), SubmitOutcome::Advanced { to: 2 });
        type_word(&mut states, "b");
        assert_eq!(states.submit(), SubmitOutcome::Advanced { to: 4 });
        type_word(&mut states, "c");
        assert_eq!(states.submit(), SubmitOutcome::PhraseComplete);
    }

    #[test]
    fn backspace_merge_crosses_token_boundary() {
        let mut states = WordStates::new("ab cd");
        type_word(&mut states, "ab");
        states.submit();
        assert_eq!(states.active_index(), 1);
        assert!(states.backspace_merge());
        assert_eq!(states.active_index(), 0);
        assert_eq!(states.input(), "a");
        assert!(!states.tokens()[0].completed);
    }

    #[test]
    fn backspace_merge_requires_empty_buffer() {
        let mut states = WordStates::new("ab cd");
        states.navigate(Direction::Right);
        states.update_active_input("c");
        assert!(!states.backspace_merge());
        assert_eq!(states.active_index(), 1);
    }

    #[test]
    fn backspace_merge_skips_punctuation() {
        let mut states = WordStates::new("ab ! cd");
        states.update_active_input("ab");
        states.navigate(Direction::Right);
        assert!(states.backspace_merge());
        assert_eq!(states.active_index(), 0);
        assert_eq!(states.input(), "a");
    }

    #[test]
    fn reset_restores_initial_tokens() {
        let fresh = WordStates::new("a big cat");
        let mut states = fresh.clone();
        type_word(&mut states, "a");
        states.submit();
        states.update_active_input("bx");
        states.submit();
        states.jump_to_last_incomplete();
        states.reset();
        assert_eq!(states.tokens(), fresh.tokens());
        assert_eq!(states.active_index(), 0);
        assert_eq!(states.input(), "");
        assert_eq!(states.state(), PhraseState::Editing);
    }

    #[test]
    fn jumps_find_first_and_last_incomplete() {
        let mut states = WordStates::new("a b c");
        type_word(&mut states, "a");
        states.submit();
        assert!(states.jump_to_last_incomplete());
        assert_eq!(states.active_index(), 2);
        assert!(states.jump_to_first_incomplete());
        assert_eq!(states.active_index(), 1);
        assert!(!states.jump_to_first_incomplete());
    }

    #[test]
    fn clear_active_input_keeps_position() {
        let mut states = WordStates::new("one two");
        states.navigate(Direction::Right);
        states.update_active_input("tw");
        states.clear_active_input();
        assert_eq!(states.active_index(), 1);
        assert_eq!(states.input(), "");
        assert_eq!(states.tokens()[1].user_input, "");
    }

    #[test]
    fn hint_shows_remaining_characters() {
        let mut states = WordStates::new("café");
        states.update_active_input("ca");
        assert_eq!(states.hint(), Some("fé"));
        states.update_active_input("café");
        assert_eq!(states.hint(), Some(""));
    }

    #[test]
    fn all_punctuation_phrase_is_complete_immediately() {
        let mut states = WordStates::new(", . !");
        assert_eq!(states.state(), PhraseState::Complete);
        assert_eq!(states.submit(), SubmitOutcome::Ignored);
    }

    #[test]
    fn complete_phrase_ignores_edits() {
        let mut states = WordStates::new("hi");
        type_word(&mut states, "hi");
        assert_eq!(states.submit(), SubmitOutcome::PhraseComplete);
        assert_eq!(states.update_active_input("h"), InputUpdate::Ignored);
        assert!(!states.navigate(Direction::Left));
        assert!(!states.backspace_merge());
        assert!(states.tokens()[0].completed);
    }
}
