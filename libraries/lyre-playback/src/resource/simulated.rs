//! Silent, clock-driven resource
//!
//! Advances its position with `tokio::time`, so it behaves like a real
//! player for headless runs and stays deterministic under a paused test
//! clock.

use super::{AudioResource, AudioResourceResolver, ResourceBackend, ResourceEvents};
use crate::error::{PlaybackError, Result};
use lyre_core::Track;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

/// Resource that produces no audio but keeps time
#[derive(Debug)]
pub struct SimulatedResource {
    duration: Duration,
    /// Position accumulated up to `started_at`
    offset: Duration,
    /// Set while playing
    started_at: Option<Instant>,
    events: ResourceEvents,
}

impl SimulatedResource {
    pub fn new(duration: Duration, events: ResourceEvents) -> Self {
        Self {
            duration,
            offset: Duration::ZERO,
            started_at: None,
            events,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.started_at.is_some()
    }

    /// Event sender for this resource, for injecting failures
    pub fn events(&self) -> &ResourceEvents {
        &self.events
    }
}

impl AudioResource for SimulatedResource {
    fn play(&mut self) -> Result<()> {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.offset = self.position();
        self.started_at = None;
    }

    fn seek(&mut self, position: Duration) {
        self.offset = position.min(self.duration);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    fn position(&self) -> Duration {
        let running = self.started_at.map_or(Duration::ZERO, |start| start.elapsed());
        (self.offset + running).min(self.duration)
    }

    fn duration(&self) -> Duration {
        self.duration
    }
}

/// Backend producing `SimulatedResource`s
///
/// The media duration defaults to the track's estimate. Overrides stand in
/// for files whose real length differs from catalog metadata, and failing
/// ids stand in for files that cannot be decoded.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBackend {
    durations: HashMap<String, Duration>,
    failing: HashSet<String>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_duration(mut self, track_id: impl Into<String>, duration: Duration) -> Self {
        self.durations.insert(track_id.into(), duration);
        self
    }

    #[must_use]
    pub fn with_failure(mut self, track_id: impl Into<String>) -> Self {
        self.failing.insert(track_id.into());
        self
    }

    /// Open a resource for `track` without a bundled file
    pub fn open_track(&self, track: &Track, events: ResourceEvents) -> Result<SimulatedResource> {
        if self.failing.contains(track.id()) {
            return Err(PlaybackError::load_failure(format!(
                "could not decode '{}'",
                track.title()
            )));
        }

        let duration = self
            .durations
            .get(track.id())
            .copied()
            .unwrap_or_else(|| track.duration());
        Ok(SimulatedResource::new(duration, events))
    }
}

impl ResourceBackend for SimulatedBackend {
    fn open(
        &self,
        path: &Path,
        track: &Track,
        events: ResourceEvents,
    ) -> Result<Box<dyn AudioResource>> {
        tracing::trace!(path = %path.display(), "Opening simulated resource");
        Ok(Box::new(self.open_track(track, events)?))
    }
}

/// Resolves every track without touching the filesystem
impl AudioResourceResolver for SimulatedBackend {
    fn resolve(&self, track: &Track, events: ResourceEvents) -> Result<Box<dyn AudioResource>> {
        Ok(Box::new(self.open_track(track, events)?))
    }
}
