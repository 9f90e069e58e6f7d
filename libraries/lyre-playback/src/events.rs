//! Playback Events
//!
//! Event-based communication for UI synchronization during playback.
//! Events are emitted at key points:
//! - State changes (play/pause/stop/error)
//! - Track changes and natural completion
//! - Position updates (every progress tick)
//! - Queue, shuffle and repeat changes
//! - Interruptions from the system

use crate::types::{PlaybackState, RepeatMode};
use serde::{Deserialize, Serialize};

/// Events emitted by the playback system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// Playback state changed
    StateChanged {
        /// The new playback state
        state: PlaybackState,
    },

    /// A new track started playing
    TrackChanged {
        /// ID of the new (current) track
        track_id: String,
        /// ID of the previous track (if any)
        previous_track_id: Option<String>,
    },

    /// Track finished playing naturally (reached end)
    TrackFinished {
        /// ID of the finished track
        track_id: String,
    },

    /// Position update
    PositionUpdate {
        /// Current playback position
        position_ms: u64,
        /// Total track duration
        duration_ms: u64,
    },

    /// Queue changed (tracks added/removed/reordered)
    QueueChanged {
        /// New queue length
        length: usize,
    },

    /// Shuffle was toggled
    ShuffleChanged { enabled: bool },

    /// Repeat mode changed
    RepeatChanged { mode: RepeatMode },

    /// Playback was paused by a system interruption
    Interrupted,

    /// A system interruption ended
    InterruptionEnded {
        /// Whether playback was resumed
        resumed: bool,
    },

    /// Error occurred during playback
    Error {
        /// Error message
        message: String,
    },
}
