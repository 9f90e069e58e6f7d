//! Playback queue
//!
//! Ordered track list with a current-position pointer, shuffle and repeat.
//!
//! ```text
//! active:   [T3, T1, T5, T2, T4]   <- play order (shuffled)
//!                ^ current_index = 1
//! backing:  [T1, T2, T3, T4, T5]   <- original order, restored on unshuffle
//! ```
//!
//! Out-of-range indices are silent no-ops: mutators report what they did
//! through their return values instead of failing.

use crate::shuffle::shuffled_with_current_first;
use crate::types::{QueueView, RepeatMode};
use lyre_core::Track;
use rand::Rng;

/// Queue of tracks for playback
#[derive(Debug, Clone, Default)]
pub struct QueueStore {
    /// Play order
    tracks: Vec<Track>,

    /// Original order before shuffle (for restoring)
    backing: Vec<Track>,

    /// Position in `tracks`; `None` means no selection
    current_index: Option<usize>,

    shuffle_enabled: bool,
    repeat_mode: RepeatMode,
}

impl QueueStore {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole queue
    ///
    /// The start index is clamped to the last track. Does not start playback.
    pub fn set_queue(&mut self, tracks: Vec<Track>, start_index: usize) {
        self.current_index = if tracks.is_empty() {
            None
        } else {
            Some(start_index.min(tracks.len() - 1))
        };
        self.backing.clone_from(&tracks);
        self.tracks = tracks;
    }

    /// Append a track to the end of the queue
    pub fn add_track(&mut self, track: Track) {
        self.add_tracks(vec![track]);
    }

    /// Append tracks to the end of the queue
    ///
    /// An empty backing sequence is seeded from the active one, which is how a
    /// queue built up one track at a time gets its original order.
    pub fn add_tracks(&mut self, tracks: Vec<Track>) {
        if tracks.is_empty() {
            return;
        }

        self.tracks.extend(tracks.iter().cloned());
        if self.backing.is_empty() {
            self.backing.clone_from(&self.tracks);
        } else {
            self.backing.extend(tracks);
        }
    }

    /// Remove the track at `index`
    ///
    /// Returns the removed track, or `None` if the index is out of range.
    /// Removing at or before the current position shifts the pointer back by
    /// one (never below zero). Removing the current track itself therefore
    /// leaves the pointer on whichever track slides into the neighbouring
    /// slot; no attempt is made to re-select by identity.
    pub fn remove_at(&mut self, index: usize) -> Option<Track> {
        if index >= self.tracks.len() {
            return None;
        }

        let removed = self.tracks.remove(index);
        if let Some(pos) = self.backing.iter().position(|t| *t == removed) {
            self.backing.remove(pos);
        }

        if let Some(current) = self.current_index {
            if index <= current && current > 0 {
                self.current_index = Some(current - 1);
            }
        }
        if self.tracks.is_empty() {
            self.current_index = None;
        }

        Some(removed)
    }

    /// Move the track at `from` to `to`
    ///
    /// Returns `false` without changes if either index is out of range.
    pub fn move_track(&mut self, from: usize, to: usize) -> bool {
        let len = self.tracks.len();
        if from >= len || to >= len {
            return false;
        }

        let track = self.tracks.remove(from);
        self.tracks.insert(to, track.clone());

        if let Some(pos) = self.backing.iter().position(|t| *t == track) {
            self.backing.remove(pos);
        }
        let backing_to = to.min(self.backing.len());
        self.backing.insert(backing_to, track);

        if let Some(current) = self.current_index {
            self.current_index = Some(if from == current {
                to
            } else if from < current && current <= to {
                current - 1
            } else if to <= current && current < from {
                current + 1
            } else {
                current
            });
        }

        true
    }

    /// Clear entire queue
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.backing.clear();
        self.current_index = None;
    }

    /// Advance to the next track
    ///
    /// Repeat One returns the current track without moving. At the end of the
    /// queue Repeat All wraps to the first track; otherwise nothing moves.
    pub fn next_track(&mut self) -> Option<Track> {
        if self.repeat_mode == RepeatMode::One {
            return self.current_track().cloned();
        }

        let next = self.current_index.map_or(0, |current| current + 1);
        if next < self.tracks.len() {
            self.current_index = Some(next);
        } else if self.repeat_mode == RepeatMode::All && !self.tracks.is_empty() {
            self.current_index = Some(0);
        } else {
            return None;
        }

        self.current_track().cloned()
    }

    /// Step back to the previous track
    pub fn previous_track(&mut self) -> Option<Track> {
        if self.repeat_mode == RepeatMode::One {
            return self.current_track().cloned();
        }

        match self.current_index {
            Some(current) if current > 0 => self.current_index = Some(current - 1),
            _ if self.repeat_mode == RepeatMode::All && !self.tracks.is_empty() => {
                self.current_index = Some(self.tracks.len() - 1);
            }
            _ => return None,
        }

        self.current_track().cloned()
    }

    /// Select the track at `index`
    pub fn jump_to(&mut self, index: usize) -> Option<Track> {
        let track = self.tracks.get(index)?.clone();
        self.current_index = Some(index);
        Some(track)
    }

    /// Flip shuffle using the thread-local RNG
    ///
    /// Returns the new shuffle state.
    pub fn toggle_shuffle(&mut self) -> bool {
        self.toggle_shuffle_with(&mut rand::thread_rng())
    }

    /// Flip shuffle using the given RNG
    ///
    /// Enabling permutes the original order and pins the current track to the
    /// front. Disabling restores the original order and follows the current
    /// track to its original position.
    pub fn toggle_shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        self.shuffle_enabled = !self.shuffle_enabled;
        let current = self.current_track().cloned();

        if self.shuffle_enabled {
            let (permutation, pinned) =
                shuffled_with_current_first(&self.backing, current.as_ref(), rng);
            if pinned {
                self.current_index = Some(0);
            }
            self.tracks = permutation;
        } else {
            self.tracks.clone_from(&self.backing);
            if let Some(current) = current {
                if let Some(pos) = self.backing.iter().position(|t| *t == current) {
                    self.current_index = Some(pos);
                }
            }
        }

        if self.tracks.is_empty() {
            self.current_index = None;
        }

        self.shuffle_enabled
    }

    /// Cycle `Off -> All -> One -> Off`, returning the new mode
    pub fn toggle_repeat_mode(&mut self) -> RepeatMode {
        self.repeat_mode = self.repeat_mode.cycled();
        self.repeat_mode
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
    }

    pub fn has_next(&self) -> bool {
        match self.repeat_mode {
            RepeatMode::One => true,
            RepeatMode::All if !self.tracks.is_empty() => true,
            _ => self.current_index.map_or(0, |current| current + 1) < self.tracks.len(),
        }
    }

    pub fn has_previous(&self) -> bool {
        match self.repeat_mode {
            RepeatMode::One => true,
            RepeatMode::All if !self.tracks.is_empty() => true,
            _ => self.current_index.is_some_and(|current| current > 0),
        }
    }

    /// Tracks strictly after the current one, at most `limit`; never wraps
    pub fn upcoming(&self, limit: usize) -> &[Track] {
        let start = self
            .current_index
            .map_or(0, |current| current + 1)
            .min(self.tracks.len());
        let end = start.saturating_add(limit).min(self.tracks.len());
        &self.tracks[start..end]
    }

    /// Tracks strictly before the current one, at most `limit`; never wraps
    pub fn preceding(&self, limit: usize) -> &[Track] {
        let end = self.current_index.unwrap_or(0);
        let start = end.saturating_sub(limit);
        &self.tracks[start..end]
    }

    // ===== State Queries =====

    /// Tracks in play order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Tracks in original (unshuffled) order
    pub fn original_order(&self) -> &[Track] {
        &self.backing
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_index.and_then(|index| self.tracks.get(index))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle_enabled
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    /// Owned copy of the queue for callers outside the player task
    pub fn view(&self) -> QueueView {
        QueueView {
            tracks: self.tracks.clone(),
            current_index: self.current_index,
            shuffle_enabled: self.shuffle_enabled,
            repeat_mode: self.repeat_mode,
            has_next: self.has_next(),
            has_previous: self.has_previous(),
        }
    }
}
