//! Token classification and speech-text helpers.

use std::sync::LazyLock;

use regex::Regex;

static WORD_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{M}']").expect("static regex"));

/// A token takes part in typing practice if it carries at least one
/// letter, combining mark or apostrophe. Anything else is punctuation
/// that is displayed but never typed.
pub fn is_word(token: &str) -> bool {
    WORD_CHAR.is_match(token)
}

fn is_word_char(c: char) -> bool {
    let mut buf = [0u8; 4];
    WORD_CHAR.is_match(c.encode_utf8(&mut buf))
}

/// Text sent to a speech engine: word tokens only, with leading and
/// trailing punctuation removed, joined by single spaces.
pub fn speech_text(phrase: &str) -> String {
    phrase
        .split(' ')
        .filter(|t| is_word(t))
        .map(|t| t.trim_matches(|c: char| !is_word_char(c)))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Truncate for log lines without splitting a char.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}
