//! Practice history and progress reporting.
//!
//! Stores one record per finished or skipped phrase as daily JSONL files,
//! by default in ~/.word-typer-history/.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, error};

use crate::deck::GameMode;
use crate::text::preview;

/// Record of a single practised phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeRecord {
    pub timestamp: String,
    pub phrase: String,
    pub word: String,
    pub mode: GameMode,
    pub correct: bool,
    pub mistakes: u32,
    pub hints: u32,
    pub pronunciations: u32,
    pub duration_ms: u64,
}

pub struct History {
    dir: PathBuf,
}

fn resolve_date(date: &str) -> String {
    if date == "today" {
        Local::now().format("%Y-%m-%d").to_string()
    } else {
        date.to_string()
    }
}

impl History {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Get the history file path for a given date.
    fn file(&self, date: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", resolve_date(date)))
    }

    /// Append a record to today's history file.
    pub fn save(&self, record: &PracticeRecord) {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            error!("Failed to create history dir: {e}");
            return;
        }

        let path = self.file("today");
        match fs::OpenOptions::new().create(true).append(true).open(&path) {
            Ok(mut file) => match serde_json::to_string(record) {
                Ok(json) => {
                    if let Err(e) = writeln!(file, "{json}") {
                        error!("Failed to write history record: {e}");
                    } else {
                        debug!("Saved practice record to {}", path.display());
                    }
                }
                Err(e) => error!("Failed to serialize record: {e}"),
            },
            Err(e) => error!("Failed to open history file: {e}"),
        }
    }

    /// Load all records for a given date ("today" or YYYY-MM-DD).
    pub fn load(&self, date: &str) -> Vec<PracticeRecord> {
        let path = self.file(date);
        if !path.exists() {
            return Vec::new();
        }

        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                error!("Failed to load history records: {e}");
                return Vec::new();
            }
        };

        std::io::BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<PracticeRecord>(line.trim()) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!("Skipping malformed history line: {e}");
                    None
                }
            })
            .collect()
    }

    /// List all dates with history records (newest first).
    pub fn available_dates(&self) -> Vec<String> {
        let mut dates: Vec<String> = fs::read_dir(&self.dir)
            .into_iter()
            .flatten()
            .filter_map(|entry| {
                let name = entry.ok()?.file_name().to_string_lossy().to_string();
                name.strip_suffix(".jsonl").map(str::to_string)
            })
            .collect();

        dates.sort_by(|a, b| b.cmp(a));
        dates
    }

    /// Generate a Markdown progress report for a given date.
    pub fn report(&self, date: &str) -> String {
        render_report(&resolve_date(date), &self.load(date))
    }
}

fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.1}s")
    } else {
        let minutes = (seconds / 60.0) as u64;
        let secs = seconds % 60.0;
        if minutes < 60 {
            format!("{minutes}m {secs:.0}s")
        } else {
            format!("{}h {}m", minutes / 60, minutes % 60)
        }
    }
}

fn render_report(display_date: &str, records: &[PracticeRecord]) -> String {
    if records.is_empty() {
        return format!("# Word Typer Report - {display_date}\n\nNo practice recorded.");
    }

    let completed = records.iter().filter(|r| r.correct).count();
    let skipped = records.len() - completed;
    let accuracy = completed as f64 / records.len() as f64 * 100.0;
    let total_mistakes: u32 = records.iter().map(|r| r.mistakes).sum();
    let total_hints: u32 = records.iter().map(|r| r.hints).sum();
    let total_pronunciations: u32 = records.iter().map(|r| r.pronunciations).sum();
    let total_secs: f64 = records.iter().map(|r| r.duration_ms as f64).sum::<f64>() / 1000.0;
    let avg_secs = total_secs / records.len() as f64;

    let mut lines = vec![
        format!("# Word Typer Report - {display_date}"),
        String::new(),
        "## Summary".to_string(),
        format!("- **Phrases practised**: {}", records.len()),
        format!("- **Completed**: {completed}"),
        format!("- **Skipped**: {skipped}"),
        format!("- **Accuracy**: {accuracy:.0}%"),
        format!("- **Mistakes**: {total_mistakes}"),
        format!("- **Hints used**: {total_hints}"),
        format!("- **Pronunciations played**: {total_pronunciations}"),
        format!("- **Total practice time**: {}", format_duration(total_secs)),
        format!("- **Average per phrase**: {}", format_duration(avg_secs)),
    ];

    let mut missed: HashMap<&str, u32> = HashMap::new();
    for r in records.iter().filter(|r| r.mistakes > 0 || !r.correct) {
        *missed.entry(r.word.as_str()).or_default() += r.mistakes.max(1);
    }
    if !missed.is_empty() {
        let mut missed: Vec<_> = missed.into_iter().collect();
        missed.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

        lines.extend([String::new(), "## Most Missed".to_string()]);
        for (word, count) in missed.into_iter().take(10) {
            lines.push(format!("- {word} ({count})"));
        }
    }

    lines.extend([
        String::new(),
        "## Practice Log".to_string(),
        String::new(),
        "| Time | Phrase | Mode | Result | Mistakes | Duration |".to_string(),
        "|------|--------|------|--------|----------|----------|".to_string(),
    ]);

    for r in records {
        // HH:MM:SS out of an RFC 3339 timestamp
        let time_str = r.timestamp.get(11..19).unwrap_or(&r.timestamp);
        let result = if r.correct { "done" } else { "skipped" };
        lines.push(format!(
            "| {time_str} | {} | {} | {result} | {} | {} |",
            preview(&r.phrase, 30),
            r.mode,
            r.mistakes,
            format_duration(r.duration_ms as f64 / 1000.0)
        ));
    }

    lines.join("\n")
}
