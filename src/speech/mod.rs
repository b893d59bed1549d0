//! Pronunciation with remote-then-native fallback.
//!
//! `SpeechController` owns at most one audio session. A generation counter
//! guards against stale fetches: every `cancel()` and every new request
//! bumps it, and a fetch that resolves under an older generation is dropped.

pub mod mime;
pub mod native;
pub mod remote;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::error::SpeechError;
use crate::playback::{AudioClip, AudioOutput, PlaybackControl};
use crate::text::{preview, speech_text};

pub use native::{CommandSynth, NativeSynth};
pub use remote::{HttpTts, RemoteTts, SpeechRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Remote audio played until it ended or was torn down.
    Remote,
    /// The native synthesizer handled the utterance.
    Native,
    AlreadySpeaking,
    RequestInFlight,
    /// Nothing speakable in the text.
    Silent,
    /// Cancelled or superseded before it could finish.
    Discarded,
    /// Both stages failed; the reason was logged.
    Failed,
}

/// A playing remote clip. The control and the clip are each released
/// through `Option::take`, so a session is torn down at most once.
struct AudioSession {
    generation: u64,
    control: Option<Box<dyn PlaybackControl>>,
    clip: Option<AudioClip>,
}

impl AudioSession {
    fn teardown(&mut self) {
        if let Some(mut control) = self.control.take() {
            control.stop();
        }
        self.clip.take();
    }

    /// Natural end: the sink already drained, nothing to stop.
    fn release(&mut self) {
        self.control.take();
        self.clip.take();
    }
}

#[derive(Default)]
struct SpeechState {
    generation: u64,
    fetching: bool,
    session: Option<AudioSession>,
    native_active: Option<u64>,
}

impl SpeechState {
    fn is_speaking(&self) -> bool {
        self.session.is_some() || self.native_active.is_some()
    }
}

enum RemoteOutcome {
    Played,
    Stale,
}

pub struct SpeechController {
    remote: Option<Arc<dyn RemoteTts>>,
    native: Option<Arc<dyn NativeSynth>>,
    output: Arc<dyn AudioOutput>,
    volume: f32,
    state: Mutex<SpeechState>,
}

impl SpeechController {
    pub fn new(
        remote: Option<Arc<dyn RemoteTts>>,
        native: Option<Arc<dyn NativeSynth>>,
        output: Arc<dyn AudioOutput>,
        volume: f32,
    ) -> Self {
        Self {
            remote,
            native,
            output,
            volume,
            state: Mutex::new(SpeechState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SpeechState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_speaking(&self) -> bool {
        self.lock().is_speaking()
    }

    /// Speak `request.text`, preferring the remote API and falling back to
    /// the native synthesizer. Without `force` this is a no-op while
    /// something is already playing.
    pub async fn speak(&self, request: SpeechRequest, force: bool) -> SpeakOutcome {
        let text = speech_text(&request.text);
        if text.is_empty() {
            debug!("Nothing speakable in \"{}\"", preview(&request.text, 40));
            return SpeakOutcome::Silent;
        }

        let generation = {
            let mut state = self.lock();
            if state.is_speaking() {
                if !force {
                    debug!("Already speaking, ignoring request");
                    return SpeakOutcome::AlreadySpeaking;
                }
                self.teardown_locked(&mut state);
            }
            if state.fetching {
                debug!("Speech request already in flight");
                return SpeakOutcome::RequestInFlight;
            }
            state.generation += 1;
            state.generation
        };

        let request = SpeechRequest { text, ..request };
        match self.remote_stage(&request, generation).await {
            Ok(RemoteOutcome::Played) => SpeakOutcome::Remote,
            Ok(RemoteOutcome::Stale) => SpeakOutcome::Discarded,
            Err(e) => {
                warn!("Remote pronunciation failed: {e}, falling back to native speech");
                self.native_stage(&request.text, generation, force).await
            }
        }
    }

    async fn remote_stage(
        &self,
        request: &SpeechRequest,
        generation: u64,
    ) -> Result<RemoteOutcome, SpeechError> {
        let Some(remote) = &self.remote else {
            return Err(SpeechError::RemoteDisabled);
        };

        self.lock().fetching = true;
        let fetched = remote.synthesize(request).await;

        let finished = {
            let mut state = self.lock();
            if state.generation != generation {
                debug!("Dropping stale speech response (generation {generation})");
                return Ok(RemoteOutcome::Stale);
            }
            state.fetching = false;

            let clip = AudioClip::from_bytes(fetched?);
            let playback = self.output.play(&clip, self.volume)?;
            info!("Playing pronunciation ({}, {} bytes)", clip.mime(), clip.byte_len());
            state.session = Some(AudioSession {
                generation,
                control: Some(playback.control),
                clip: Some(clip),
            });
            playback.finished
        };

        // Err means the session was torn down and its listener detached.
        let ended_naturally = finished.await.is_ok();

        let mut state = self.lock();
        if state
            .session
            .as_ref()
            .is_some_and(|s| s.generation == generation)
        {
            if let Some(mut session) = state.session.take() {
                if ended_naturally {
                    session.release();
                } else {
                    session.teardown();
                }
            }
        }
        Ok(RemoteOutcome::Played)
    }

    async fn native_stage(&self, text: &str, generation: u64, force: bool) -> SpeakOutcome {
        let Some(native) = &self.native else {
            return SpeakOutcome::Failed;
        };

        {
            let mut state = self.lock();
            if state.generation != generation {
                return SpeakOutcome::Discarded;
            }
            if state.native_active.is_some() {
                if !force {
                    return SpeakOutcome::AlreadySpeaking;
                }
                native.cancel();
            }
            state.native_active = Some(generation);
        }

        let result = native.speak(text).await;

        {
            let mut state = self.lock();
            if state.native_active == Some(generation) {
                state.native_active = None;
            }
        }

        match result {
            Ok(()) => SpeakOutcome::Native,
            Err(SpeechError::Cancelled) => SpeakOutcome::Discarded,
            Err(e) => {
                warn!("Native speech failed: {e}");
                SpeakOutcome::Failed
            }
        }
    }

    /// Stop everything and invalidate any in-flight fetch. Safe to call
    /// from any state, any number of times.
    pub fn cancel(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.fetching = false;
        self.teardown_locked(&mut state);
    }

    fn teardown_locked(&self, state: &mut SpeechState) {
        if let Some(mut session) = state.session.take() {
            debug!("Tearing down speech session {}", session.generation);
            session.teardown();
        }
        if state.native_active.take().is_some() {
            if let Some(native) = &self.native {
                native.cancel();
            }
        }
    }
}
