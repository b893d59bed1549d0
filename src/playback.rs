//! Audio playback primitive shared by pronunciation and sound effects.
//!
//! `AudioOutput::play` hands back a control handle plus a oneshot that
//! resolves once, when the clip drains on its own. Stopping a handle
//! detaches that listener first, so a stopped clip never reports an end.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rodio::mixer::Mixer;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::error::PlaybackError;
use crate::speech::mime::sniff_mime;

/// Encoded audio bytes plus the container type sniffed from them.
#[derive(Debug, Clone)]
pub struct AudioClip {
    bytes: Arc<[u8]>,
    mime: &'static str,
}

impl AudioClip {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mime = sniff_mime(&bytes);
        Self {
            bytes: bytes.into(),
            mime,
        }
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    Finished,
}

pub trait PlaybackControl: Send {
    /// Detach the end listener and silence the clip.
    fn stop(&mut self);
}

pub struct Playback {
    pub control: Box<dyn PlaybackControl>,
    pub finished: oneshot::Receiver<PlaybackEnd>,
}

pub trait AudioOutput: Send + Sync {
    fn play(&self, clip: &AudioClip, volume: f32) -> Result<Playback, PlaybackError>;
}

/// Map a 0-100 preference onto rodio's linear volume.
pub fn normalize_volume(percent: u8) -> f32 {
    f32::from(percent.min(100)) / 100.0
}

/// rodio-backed output. The `OutputStream` must outlive it; `open_default`
/// returns both so the caller can keep the stream alive.
pub struct RodioOutput {
    mixer: Mixer,
}

impl RodioOutput {
    pub fn open_default() -> Result<(OutputStream, Self), PlaybackError> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| PlaybackError::NoOutput(e.to_string()))?;
        stream.log_on_drop(false);
        let mixer = stream.mixer().clone();
        info!("Audio output opened on default device");
        Ok((stream, Self { mixer }))
    }
}

/// Decode with the sniffed container as the format hint.
fn decode(clip: &AudioClip) -> Result<Decoder<Cursor<Vec<u8>>>, PlaybackError> {
    Decoder::builder()
        .with_data(Cursor::new(clip.bytes.to_vec()))
        .with_byte_len(clip.byte_len() as u64)
        .with_mime_type(clip.mime)
        .build()
        .map_err(|e| PlaybackError::Decode {
            mime: clip.mime,
            reason: e.to_string(),
        })
}

impl AudioOutput for RodioOutput {
    fn play(&self, clip: &AudioClip, volume: f32) -> Result<Playback, PlaybackError> {
        let source = decode(clip)?;

        let sink = Arc::new(Sink::connect_new(&self.mixer));
        sink.set_volume(volume);
        sink.append(source);

        let attached = Arc::new(AtomicBool::new(true));
        let (tx, rx) = oneshot::channel();

        // sleep_until_end returns early once stop() clears the queue.
        let watcher_sink = Arc::clone(&sink);
        let watcher_attached = Arc::clone(&attached);
        std::thread::spawn(move || {
            watcher_sink.sleep_until_end();
            if watcher_attached.swap(false, Ordering::SeqCst) {
                let _ = tx.send(PlaybackEnd::Finished);
            }
        });

        debug!("Playing {} clip ({} bytes, volume {volume:.2})", clip.mime, clip.byte_len());
        Ok(Playback {
            control: Box::new(RodioControl { sink, attached }),
            finished: rx,
        })
    }
}

/// Stand-in when no output device opens. Every play fails, so speech
/// falls through to the native synthesizer and effects stay silent.
pub struct NoAudio;

impl AudioOutput for NoAudio {
    fn play(&self, _clip: &AudioClip, _volume: f32) -> Result<Playback, PlaybackError> {
        Err(PlaybackError::NoOutput("no audio device".into()))
    }
}

struct RodioControl {
    sink: Arc<Sink>,
    attached: Arc<AtomicBool>,
}

impl PlaybackControl for RodioControl {
    fn stop(&mut self) {
        self.attached.store(false, Ordering::SeqCst);
        self.sink.stop();
    }
}
