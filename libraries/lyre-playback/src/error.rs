//! Error types for playback management

use thiserror::Error;

/// Playback errors
///
/// `Clone` so a failure can be both stored as the session's error message and
/// returned to the caller that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// No playable resource exists for the track (e.g. a remote source)
    #[error("Format or source not supported: {reason}")]
    ResourceUnavailable { track_id: String, reason: String },

    /// A resource was found but could not be initialized or decoded
    #[error("Failed to load audio: {0}")]
    ResourceLoadFailure(String),

    /// The platform audio session could not be (re)activated
    #[error("Audio session activation failed: {0}")]
    SessionActivationFailure(String),

    /// Index out of bounds
    #[error("Index {index} out of range for queue of {len}")]
    OutOfRangeIndex { index: usize, len: usize },

    /// No track is currently loaded
    #[error("No track loaded")]
    NoTrackLoaded,

    /// The player task has shut down
    #[error("Player is no longer running")]
    PlayerClosed,
}

impl PlaybackError {
    /// Create a resource unavailable error
    pub fn unavailable(track_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResourceUnavailable {
            track_id: track_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a resource load failure
    pub fn load_failure(msg: impl Into<String>) -> Self {
        Self::ResourceLoadFailure(msg.into())
    }

    /// Whether this is the "format/source not supported" condition
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::ResourceUnavailable { .. })
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
