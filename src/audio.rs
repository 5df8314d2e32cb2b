//! Audio cues and the looping background soundtrack.
//!
//! The core never plays sound itself; it emits [`AudioCue`]s for the host.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cue", rename_all = "snake_case")]
pub enum AudioCue {
    /// Start (or resume) a soundtrack track.
    PlayTrack { path: String },
    PauseTrack { path: String },
    /// Fire-and-forget sound effect.
    OneShot { path: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub playlist: Vec<String>,
    /// Played when a transition is accepted, if `audio_on_warp` is set.
    pub warp_sound: String,
    pub audio_on_warp: bool,
    pub alien_sound: String,
    /// Delay between triggering the actor and its arrival sound.
    pub alien_sound_delay_ms: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            playlist: vec![
                "./audio/lofi-piano-beat-305563.mp3".to_string(),
                "./audio/lofi-295209.mp3".to_string(),
                "./audio/lofi-background-music-309034.mp3".to_string(),
            ],
            warp_sound: "./audio/warp.mp3".to_string(),
            audio_on_warp: false,
            alien_sound: "./audio/alien.mp3".to_string(),
            alien_sound_delay_ms: 800.0,
        }
    }
}

/// Sequential, endlessly looping playlist with a play/pause toggle.
#[derive(Debug, Clone)]
pub struct Soundtrack {
    playlist: Vec<String>,
    current: usize,
    playing: bool,
}

impl Soundtrack {
    pub fn new(playlist: Vec<String>) -> Self {
        Self {
            playlist,
            current: 0,
            playing: false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_track(&self) -> Option<&str> {
        self.playlist.get(self.current).map(String::as_str)
    }

    /// Pause when playing, otherwise resume the current track.
    pub fn toggle(&mut self) -> Option<AudioCue> {
        let path = self.current_track()?.to_string();
        self.playing = !self.playing;
        Some(if self.playing {
            AudioCue::PlayTrack { path }
        } else {
            AudioCue::PauseTrack { path }
        })
    }

    /// The host reports the current track finished; move to the next one,
    /// wrapping around. Nothing happens while paused.
    pub fn track_ended(&mut self) -> Option<AudioCue> {
        if !self.playing || self.playlist.is_empty() {
            return None;
        }
        self.current = (self.current + 1) % self.playlist.len();
        self.current_track().map(|path| AudioCue::PlayTrack {
            path: path.to_string(),
        })
    }
}
