//! word-typer-rs: terminal vocabulary typing practice with spoken pronunciation.

mod config;
mod deck;
mod error;
mod history;
mod keymap;
mod playback;
mod session;
mod sounds;
mod speech;
mod text;
mod ui;
mod word_state;

use clap::{Parser, Subcommand};
use rodio::OutputStream;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::deck::{Deck, GameMode};
use crate::history::History;
use crate::playback::{normalize_volume, AudioOutput, NoAudio, RodioOutput};
use crate::sounds::SoundEffects;
use crate::speech::{CommandSynth, HttpTts, NativeSynth, RemoteTts, SpeechController};

#[derive(Parser, Debug)]
#[command(name = "word-typer-rs", about = "Typing practice with spoken pronunciation")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Word deck (YAML or JSON)
    #[arg(short, long)]
    deck: Option<PathBuf>,

    /// Game mode
    #[arg(short, long, value_enum)]
    mode: Option<GameMode>,

    /// Disable typing/success/error sounds
    #[arg(long)]
    no_sound: bool,

    /// Disable pronunciation
    #[arg(long)]
    no_speech: bool,

    /// Sound effect volume, 0-100
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    volume: Option<u8>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a Markdown practice report
    Report {
        /// YYYY-MM-DD or "today"
        #[arg(long, default_value = "today")]
        date: String,
    },
    /// List dates that have practice history
    Dates,
}

/// Log to a file; the terminal belongs to the UI.
fn init_logging(config: &config::Config, verbose: bool) -> std::io::Result<WorkerGuard> {
    let path = config.log_file();
    let dir = path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "word-typer.log".into());

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, file_name));

    // Suppress noisy audio/http internals
    let filter = if verbose {
        EnvFilter::new("debug,rodio=warn,symphonia=warn,reqwest=warn,hyper=warn,hyper_util=warn")
    } else {
        EnvFilter::new("info,rodio=warn,symphonia=warn,reqwest=warn,hyper=warn,hyper_util=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (mut config, config_origin) = config::Config::load(args.config.as_deref());
    if args.no_sound {
        config.sound.enabled = false;
    }
    if args.no_speech {
        config.speech.enabled = false;
    }
    if let Some(volume) = args.volume {
        config.sound.volume = volume;
    }
    if let Some(deck) = args.deck {
        config.practice.deck = Some(deck);
    }
    let mode = args.mode.unwrap_or(config.practice.mode);

    let _log_guard = init_logging(&config, args.verbose)?;
    info!("word-typer-rs starting");
    config_origin.log();

    match args.command {
        Some(Commands::Report { date }) => {
            println!("{}", History::new(config.history_dir()).report(&date));
            return Ok(());
        }
        Some(Commands::Dates) => {
            for date in History::new(config.history_dir()).available_dates() {
                println!("{date}");
            }
            return Ok(());
        }
        None => {}
    }

    let deck = match &config.practice.deck {
        Some(path) => Deck::load(path)?,
        None => {
            info!("No deck configured, using built-in words");
            Deck::sample()
        }
    };

    // The stream must outlive every sink created from its mixer.
    let (_stream, output): (Option<OutputStream>, Arc<dyn AudioOutput>) =
        match RodioOutput::open_default() {
            Ok((stream, output)) => (Some(stream), Arc::new(output)),
            Err(e) => {
                warn!("{e}, continuing without audio playback");
                (None, Arc::new(NoAudio))
            }
        };

    let sounds = SoundEffects::load(&config.sound, Arc::clone(&output));

    let speech = if config.speech.enabled {
        let remote: Option<Arc<dyn RemoteTts>> = match HttpTts::new(&config.speech) {
            Ok(tts) => Some(Arc::new(tts)),
            Err(e) => {
                warn!("Remote pronunciation unavailable: {e}");
                None
            }
        };
        let native: Option<Arc<dyn NativeSynth>> = config
            .speech
            .native_fallback
            .then(|| Arc::new(CommandSynth::new(&config.speech)) as Arc<dyn NativeSynth>);
        Some(Arc::new(SpeechController::new(
            remote,
            native,
            Arc::clone(&output),
            normalize_volume(config.speech.volume),
        )))
    } else {
        info!("Pronunciation disabled");
        None
    };

    let history = config
        .history
        .enabled
        .then(|| History::new(config.history_dir()));

    let (tx, rx) = mpsc::unbounded_channel();
    let session = session::TypingSession::new(&config, mode, sounds, speech, tx);
    let mut app = ui::App::new(session, deck, rx, history);

    tokio::task::block_in_place(|| ui::run_app(&mut app))?;

    Ok(())
}
