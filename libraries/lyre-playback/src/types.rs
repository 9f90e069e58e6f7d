//! Core types for playback management

use lyre_core::Track;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No track loaded
    #[default]
    Stopped,

    /// Resolving and opening a resource
    Loading,

    /// Currently playing
    Playing,

    /// Paused mid-track
    Paused,

    /// Last load or decode failed; see the snapshot's error message
    Error,
}

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop when queue ends
    #[default]
    Off,

    /// Loop entire queue
    All,

    /// Loop current track only
    One,
}

impl RepeatMode {
    /// Next mode in the `Off -> All -> One -> Off` cycle
    pub fn cycled(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }
}

/// Play position of the loaded track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub current_time: Duration,
    pub duration: Duration,
}

impl Progress {
    pub fn new(current_time: Duration, duration: Duration) -> Self {
        Self {
            current_time,
            duration,
        }
    }

    /// `current_time / duration`, or 0 when the duration is unknown
    pub fn ratio(&self) -> f64 {
        if self.duration.is_zero() {
            0.0
        } else {
            self.current_time.as_secs_f64() / self.duration.as_secs_f64()
        }
    }
}

/// Read-only projection of the session, recomputed on every change
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaybackSnapshot {
    pub current_track: Option<Arc<Track>>,
    pub state: PlaybackState,
    pub progress: Progress,
    pub error_message: Option<String>,
}

/// Queue contents and navigation flags at one point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueView {
    pub tracks: Vec<Track>,
    pub current_index: Option<usize>,
    pub shuffle_enabled: bool,
    pub repeat_mode: RepeatMode,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Configuration for the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Progress sampling interval while playing (default: 100ms)
    pub progress_interval_ms: u64,

    /// Play the next queue track when one finishes (default: true)
    pub auto_advance: bool,

    /// "Previous" restarts the current track past this position (default: 3000ms)
    pub restart_threshold_ms: u64,

    /// Initial repeat mode (default: Off)
    pub repeat: RepeatMode,

    /// Pending user commands before senders wait (default: 32)
    pub command_buffer: usize,

    /// Events retained for slow subscribers (default: 64)
    pub event_buffer: usize,
}

impl PlaybackConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn restart_threshold(&self) -> Duration {
        Duration::from_millis(self.restart_threshold_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: 100,
            auto_advance: true,
            restart_threshold_ms: 3000,
            repeat: RepeatMode::Off,
            command_buffer: 32,
            event_buffer: 64,
        }
    }
}
