//! Typing, success and error sound effects.
//!
//! Each effect owns one playback slot. Triggering an effect stops its
//! previous handle first, so rapid key presses restart the clip instead
//! of stacking copies. Failures never propagate.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::config::SoundConfig;
use crate::playback::{normalize_volume, AudioClip, AudioOutput, PlaybackControl};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundKind {
    Typing,
    Success,
    Error,
}

impl SoundKind {
    pub const ALL: [SoundKind; 3] = [SoundKind::Typing, SoundKind::Success, SoundKind::Error];
}

pub struct SoundEffects {
    output: Arc<dyn AudioOutput>,
    clips: HashMap<SoundKind, AudioClip>,
    enabled: bool,
    volume: f32,
    handles: Mutex<HashMap<SoundKind, Box<dyn PlaybackControl>>>,
}

impl SoundEffects {
    /// Load the three clips named in the config. A missing or unreadable
    /// file only disables that one effect.
    pub fn load(config: &SoundConfig, output: Arc<dyn AudioOutput>) -> Self {
        let mut clips = HashMap::new();
        if config.enabled {
            for kind in SoundKind::ALL {
                let path = match kind {
                    SoundKind::Typing => &config.typing_path,
                    SoundKind::Success => &config.success_path,
                    SoundKind::Error => &config.error_path,
                };
                if let Some(clip) = read_clip(path) {
                    clips.insert(kind, clip);
                }
            }
            info!("Loaded {} of 3 sound effects", clips.len());
        }
        Self::with_clips(clips, config.enabled, config.volume, output)
    }

    pub fn with_clips(
        clips: HashMap<SoundKind, AudioClip>,
        enabled: bool,
        volume: u8,
        output: Arc<dyn AudioOutput>,
    ) -> Self {
        Self {
            output,
            clips,
            enabled,
            volume: normalize_volume(volume),
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn play(&self, kind: SoundKind) {
        if !self.enabled || self.volume <= 0.0 {
            return;
        }
        let Some(clip) = self.clips.get(&kind) else {
            return;
        };

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut previous) = handles.remove(&kind) {
            previous.stop();
        }

        match self.output.play(clip, self.volume) {
            Ok(playback) => {
                handles.insert(kind, playback.control);
            }
            Err(e) => debug!("Sound effect {kind:?} failed: {e}"),
        }
    }

    /// Silence every effect, e.g. on exit.
    pub fn stop_all(&self) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, mut control) in handles.drain() {
            control.stop();
        }
    }
}

fn read_clip(path: &Path) -> Option<AudioClip> {
    match std::fs::read(path) {
        Ok(bytes) if !bytes.is_empty() => Some(AudioClip::from_bytes(bytes)),
        Ok(_) => {
            warn!("Sound file {} is empty", path.display());
            None
        }
        Err(e) => {
            warn!("Sound file {} unavailable: {e}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::fake::{FakeEvent, FakeOutput};

    fn all_clips() -> HashMap<SoundKind, AudioClip> {
        SoundKind::ALL
            .into_iter()
            .map(|k| (k, AudioClip::from_bytes(b"ID3clip".to_vec())))
            .collect()
    }

    #[test]
    fn retrigger_stops_previous_handle_of_same_kind() {
        let output = Arc::new(FakeOutput::new());
        let sounds = SoundEffects::with_clips(all_clips(), true, 50, output.clone());

        sounds.play(SoundKind::Typing);
        sounds.play(SoundKind::Typing);

        assert_eq!(
            output.events(),
            vec![
                FakeEvent::Started { id: 0, mime: "audio/mpeg", volume: 0.5 },
                FakeEvent::Stopped { id: 0 },
                FakeEvent::Started { id: 1, mime: "audio/mpeg", volume: 0.5 },
            ]
        );
    }

    #[test]
    fn different_kinds_play_independently() {
        let output = Arc::new(FakeOutput::new());
        let sounds = SoundEffects::with_clips(all_clips(), true, 100, output.clone());

        sounds.play(SoundKind::Typing);
        sounds.play(SoundKind::Error);

        assert_eq!(output.started(), 2);
        assert_eq!(output.stops_for(0), 0);
    }

    #[test]
    fn disabled_or_muted_effects_are_silent() {
        let output = Arc::new(FakeOutput::new());
        SoundEffects::with_clips(all_clips(), false, 100, output.clone()).play(SoundKind::Success);
        SoundEffects::with_clips(all_clips(), true, 0, output.clone()).play(SoundKind::Success);
        assert_eq!(output.started(), 0);
    }

    #[test]
    fn playback_failures_are_swallowed() {
        let output = Arc::new(FakeOutput::failing());
        let sounds = SoundEffects::with_clips(all_clips(), true, 100, output.clone());
        sounds.play(SoundKind::Error);
        sounds.play(SoundKind::Error);
        assert!(output.events().is_empty());
    }

    #[test]
    fn missing_files_disable_only_that_effect() {
        let dir = tempfile::tempdir().unwrap();
        let typing = dir.path().join("typing.mp3");
        std::fs::write(&typing, b"ID3typing").unwrap();

        let config = SoundConfig {
            typing_path: typing,
            success_path: dir.path().join("missing.mp3"),
            error_path: dir.path().join("also-missing.mp3"),
            ..SoundConfig::default()
        };
        let output = Arc::new(FakeOutput::new());
        let sounds = SoundEffects::load(&config, output.clone());

        sounds.play(SoundKind::Success);
        sounds.play(SoundKind::Typing);
        assert_eq!(output.started(), 1);

        sounds.stop_all();
        assert_eq!(output.stops_for(0), 1);
    }
}
