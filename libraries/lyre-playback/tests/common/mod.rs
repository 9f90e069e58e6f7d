//! Shared fixtures for integration tests

#![allow(dead_code)]

use lyre_core::Track;
use lyre_playback::{
    AudioActivator, AudioResource, AudioResourceResolver, PlaybackError, ResourceEvents, Result,
    SimulatedBackend,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn track(id: &str, secs: u64) -> Track {
    Track::local(id, format!("Track {id}"), id).with_duration(Duration::from_secs(secs))
}

/// `count` tracks with ids `t0..t{count-1}`
pub fn tracks(count: usize, secs: u64) -> Vec<Track> {
    (0..count).map(|i| track(&format!("t{i}"), secs)).collect()
}

pub fn ids(tracks: &[Track]) -> Vec<&str> {
    tracks.iter().map(Track::id).collect()
}

/// Simulated resolver that keeps the event sender of every resource it opens
#[derive(Default)]
pub struct RecordingResolver {
    pub backend: SimulatedBackend,
    opened: Mutex<Vec<(String, ResourceEvents)>>,
}

impl RecordingResolver {
    pub fn new(backend: SimulatedBackend) -> Self {
        Self {
            backend,
            opened: Mutex::default(),
        }
    }

    /// Event sender of the most recently opened resource
    pub fn last_events(&self) -> ResourceEvents {
        let opened = self.opened.lock().unwrap();
        opened.last().unwrap().1.clone()
    }

    /// Ids of every resolved track, in order
    pub fn resolved(&self) -> Vec<String> {
        let opened = self.opened.lock().unwrap();
        opened.iter().map(|(id, _)| id.clone()).collect()
    }
}

impl AudioResourceResolver for RecordingResolver {
    fn resolve(&self, track: &Track, events: ResourceEvents) -> Result<Box<dyn AudioResource>> {
        self.opened
            .lock()
            .unwrap()
            .push((track.id().to_string(), events.clone()));
        self.backend.resolve(track, events)
    }
}

/// Activator counting calls, optionally always failing
#[derive(Default)]
pub struct CountingActivator {
    pub fail: bool,
    calls: AtomicUsize,
}

impl CountingActivator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AudioActivator for CountingActivator {
    fn activate(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(PlaybackError::SessionActivationFailure(
                "category rejected".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}
