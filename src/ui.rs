//! `ratatui` front-end: draws the practice screen and feeds terminal
//! events into the typing session.

use std::io::{self, Write};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crossterm::cursor::Show;
use crossterm::event::{self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::{debug, info};
use unicode_width::UnicodeWidthStr;

use crate::deck::Deck;
use crate::history::History;
use crate::session::{InputEvent, PracticeEvent, SessionAction, TypingSession};
use crate::word_state::WordStates;

static RAW_MODE_ENABLED: AtomicBool = AtomicBool::new(false);
static ALT_SCREEN_ENABLED: AtomicBool = AtomicBool::new(false);
static PASTE_ENABLED: AtomicBool = AtomicBool::new(false);
static PANIC_HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

/// Puts the terminal back on drop and on panic.
pub struct TerminalRestoreGuard;

impl TerminalRestoreGuard {
    pub fn new() -> Self {
        install_panic_hook();
        TerminalRestoreGuard
    }

    pub fn enable_raw_mode(&self) -> io::Result<()> {
        enable_raw_mode()?;
        RAW_MODE_ENABLED.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn enter_alt_screen(&self, stdout: &mut impl Write) -> io::Result<()> {
        execute!(stdout, EnterAlternateScreen)?;
        ALT_SCREEN_ENABLED.store(true, Ordering::SeqCst);
        execute!(stdout, EnableBracketedPaste)?;
        PASTE_ENABLED.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for TerminalRestoreGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

fn restore_terminal() {
    if RAW_MODE_ENABLED.swap(false, Ordering::SeqCst) {
        let _ = disable_raw_mode();
    }
    let mut stdout = io::stdout();
    if PASTE_ENABLED.swap(false, Ordering::SeqCst) {
        let _ = execute!(stdout, DisableBracketedPaste);
    }
    if ALT_SCREEN_ENABLED.swap(false, Ordering::SeqCst) {
        let _ = execute!(stdout, LeaveAlternateScreen);
    }
    let _ = execute!(stdout, Show);
    let _ = stdout.flush();
}

fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            restore_terminal();
            tracing::error!("panic: {info}");
            previous(info);
        }));
    });
}

/// Deck navigation, history and session glued together.
pub struct App {
    session: TypingSession,
    deck: Deck,
    events: mpsc::UnboundedReceiver<PracticeEvent>,
    history: Option<History>,
    recorded: bool,
    completed: usize,
    status: String,
}

impl App {
    pub fn new(
        session: TypingSession,
        deck: Deck,
        events: mpsc::UnboundedReceiver<PracticeEvent>,
        history: Option<History>,
    ) -> Self {
        Self {
            session,
            deck,
            events,
            history,
            recorded: false,
            completed: 0,
            status: String::new(),
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.load_current(now);
    }

    fn load_current(&mut self, now: Instant) {
        if let Some(word) = self.deck.current().cloned() {
            self.session.load_word(word, now);
        }
        self.recorded = false;
        self.status = "Type the phrase. Space submits a word.".into();
    }

    fn save(&mut self, correct: bool, now: Instant) {
        if self.recorded {
            return;
        }
        self.recorded = true;
        if let Some(history) = &self.history {
            history.save(&self.session.record(correct, now));
        }
    }

    /// Returns true when the user asked to quit.
    pub fn handle_event(&mut self, event: Event, now: Instant) -> bool {
        let input = match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => InputEvent::Key(key),
            Event::Paste(text) => {
                self.session.handle_input(InputEvent::CompositionStart, now);
                InputEvent::CompositionEnd(text.trim().to_string())
            }
            _ => return false,
        };
        if self.session.handle_input(input, now) == SessionAction::Quit {
            return true;
        }
        self.drain_practice_events(now);
        false
    }

    pub fn drain_practice_events(&mut self, now: Instant) {
        while let Ok(event) = self.events.try_recv() {
            debug!("Practice event: {event:?}");
            match event {
                PracticeEvent::Completed(correct) => {
                    self.save(correct, now);
                    self.completed += 1;
                    self.status = "Correct! Press Space for the next phrase.".into();
                }
                PracticeEvent::Next => {
                    self.save(false, now);
                    self.deck.next();
                    self.load_current(now);
                }
                PracticeEvent::Prev => {
                    self.save(false, now);
                    self.deck.prev();
                    self.load_current(now);
                }
            }
        }
    }

    pub fn shutdown(&self) {
        self.session.shutdown();
    }
}

/// Configure the terminal, run the drawing loop, and tear everything down.
pub fn run_app(app: &mut App) -> io::Result<()> {
    let terminal_guard = TerminalRestoreGuard::new();
    terminal_guard.enable_raw_mode()?;
    let mut stdout = io::stdout();
    terminal_guard.enter_alt_screen(&mut stdout)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.start(Instant::now());
    let result = app_loop(&mut terminal, app);

    app.shutdown();
    drop(terminal);
    drop(terminal_guard);
    info!("Practice ended after {} completed phrases", app.completed);

    result
}

fn app_loop(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> io::Result<()> {
    terminal.draw(|frame| draw(frame, app, Instant::now()))?;

    let mut was_speaking = false;

    loop {
        let now = Instant::now();
        let mut should_draw = app.session.tick(now);

        let speaking = app.session.is_speaking();
        if speaking != was_speaking {
            was_speaking = speaking;
            should_draw = true;
        }

        if event::poll(Duration::from_millis(50))? {
            let event = event::read()?;
            if app.handle_event(event, Instant::now()) {
                break;
            }
            should_draw = true;
        }

        if should_draw {
            terminal.draw(|frame| draw(frame, app, Instant::now()))?;
        }
    }
    Ok(())
}

const TOKEN_STYLE_DONE: Style = Style::new().fg(Color::Green);
const TOKEN_STYLE_PUNCT: Style = Style::new().fg(Color::DarkGray);
const TOKEN_STYLE_BLANK: Style = Style::new().fg(Color::DarkGray);

/// One span group per token; the active token carries the ghost hint.
fn token_spans<'a>(words: &'a WordStates, hint: Option<&'a str>) -> Vec<Span<'a>> {
    let mut spans = Vec::new();

    for (i, token) in words.tokens().iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" "));
        }
        if !token.is_word() {
            spans.push(Span::styled(token.text.as_str(), TOKEN_STYLE_PUNCT));
            continue;
        }
        if token.completed && !token.is_active {
            spans.push(Span::styled(token.text.as_str(), TOKEN_STYLE_DONE));
            continue;
        }

        let typed = if token.is_active { words.input() } else { token.user_input.as_str() };
        let mut style = Style::new().fg(Color::White);
        if token.incorrect {
            style = style.fg(Color::Red);
        }
        if token.is_active {
            style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
        }
        if !typed.is_empty() {
            spans.push(Span::styled(typed, style));
        }

        let remaining = token.text.width().saturating_sub(typed.width());
        match hint.filter(|_| token.is_active) {
            Some(ghost) => spans.push(Span::styled(ghost, TOKEN_STYLE_BLANK.add_modifier(Modifier::ITALIC))),
            None if remaining > 0 => {
                let blank_style = if token.is_active { style } else { TOKEN_STYLE_BLANK };
                spans.push(Span::styled("_".repeat(remaining), blank_style));
            }
            None => {}
        }
    }

    spans
}

fn prompt_lines(app: &App) -> Vec<Line<'_>> {
    let word = app.session.word();
    let mode = app.session.mode();
    let mut lines = Vec::new();

    if let Some(prompt) = mode.prompt(word) {
        lines.push(Line::from(Span::styled(
            prompt,
            Style::new().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
    }
    if mode.plays_audio() {
        let phonetics: Vec<String> = [("US", &word.us_phonetic), ("UK", &word.uk_phonetic)]
            .into_iter()
            .filter_map(|(label, p)| p.as_deref().map(|p| format!("{label} /{p}/")))
            .collect();
        if !phonetics.is_empty() {
            lines.push(Line::from(Span::styled(
                phonetics.join("   "),
                Style::new().fg(Color::Gray),
            )));
        }
    }
    if app.session.words().is_complete() {
        if let Some(example) = &word.example {
            lines.push(Line::from(Span::styled(
                example.as_str(),
                Style::new().fg(Color::Gray).add_modifier(Modifier::ITALIC),
            )));
        }
    }
    lines
}

/// Render header, prompt, typing line and status bar.
pub fn draw(frame: &mut Frame<'_>, app: &App, now: Instant) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(5),
            Constraint::Length(2),
        ])
        .split(frame.size());

    let header = format!(
        " {} mode  |  word {}/{}  |  completed {}",
        app.session.mode(),
        app.deck.position() + 1,
        app.deck.len(),
        app.completed
    );
    frame.render_widget(
        Paragraph::new(header).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title(" word-typer "),
        ),
        chunks[0],
    );

    frame.render_widget(
        Paragraph::new(Text::from(prompt_lines(app))).wrap(Wrap { trim: true }),
        chunks[1],
    );

    let words = app.session.words();
    let typing = Paragraph::new(Line::from(token_spans(words, app.session.visible_hint(now))))
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title(format!(
                    " {}  {}/{} ",
                    words.state(),
                    (words.active_index() + 1).min(words.tokens().len()),
                    words.tokens().len()
                )),
        );
    frame.render_widget(typing, chunks[2]);

    let composing = if app.session.is_composing() { "  [composing]" } else { "" };
    let speaking = if app.session.is_speaking() { "  [speaking]" } else { "" };
    let status = Text::from(vec![
        Line::from(format!("{}{composing}{speaking}", app.status)),
        Line::from(Span::styled(
            "Ctrl+P speak  Ctrl+T hint  Ctrl+R reset  Shift+Left/Right prev/next  Ctrl+Q quit",
            Style::new().fg(Color::DarkGray),
        )),
    ]);
    frame.render_widget(Paragraph::new(status), chunks[3]);
}
