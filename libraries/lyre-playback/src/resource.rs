//! Audio resource boundary
//!
//! Decoding and output are delegated to a platform resource. The session only
//! sees the `AudioResource` handle a resolver hands back, plus the
//! asynchronous `ResourceEvent`s that resource reports.

use crate::error::{PlaybackError, Result};
use lyre_core::{SourceKind, Track};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

mod simulated;

pub use simulated::{SimulatedBackend, SimulatedResource};

/// A loaded, playable instance of a track
///
/// Exactly one is held by the session at a time; dropping it releases it.
pub trait AudioResource: Send {
    /// Start or resume output from the held position
    fn play(&mut self) -> Result<()>;

    /// Stop output, keeping the position
    fn pause(&mut self);

    /// Move the play position (already clamped to `duration()`)
    fn seek(&mut self, position: Duration);

    /// Current play position
    fn position(&self) -> Duration;

    /// Duration as reported by the decoded media
    fn duration(&self) -> Duration;
}

/// Asynchronous notification from a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceEvent {
    /// Reached the end of the media
    Finished,

    /// Decoding failed mid-playback
    DecodeError(String),
}

/// A resource event tagged with the load it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSignal {
    pub(crate) generation: u64,
    pub event: ResourceEvent,
}

/// Sender half given to a resource for reporting events
///
/// Events sent after the resource has been released are discarded by the
/// session.
#[derive(Debug, Clone)]
pub struct ResourceEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<ResourceSignal>,
}

impl ResourceEvents {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<ResourceSignal>) -> Self {
        Self { generation, tx }
    }

    /// Report natural end of media
    pub fn finished(&self) {
        self.emit(ResourceEvent::Finished);
    }

    /// Report a decode failure
    pub fn decode_error(&self, message: impl Into<String>) {
        self.emit(ResourceEvent::DecodeError(message.into()));
    }

    fn emit(&self, event: ResourceEvent) {
        // A closed channel means the session is gone; nothing left to notify
        let _ = self.tx.send(ResourceSignal {
            generation: self.generation,
            event,
        });
    }
}

/// Turns a track into a playable resource
///
/// Resolution is synchronous: it either completes or fails, and never waits
/// on the network.
pub trait AudioResourceResolver: Send + Sync {
    fn resolve(&self, track: &Track, events: ResourceEvents) -> Result<Box<dyn AudioResource>>;
}

/// Opens a bundled audio file as a resource
pub trait ResourceBackend: Send + Sync {
    fn open(
        &self,
        path: &Path,
        track: &Track,
        events: ResourceEvents,
    ) -> Result<Box<dyn AudioResource>>;
}

/// Default extensions tried for references without one
pub const DEFAULT_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "wav", "flac", "ogg"];

/// Resolver for tracks bundled with the application
///
/// Local tracks are looked up under `root` by their local reference, first
/// verbatim and then with each known extension appended. Remote tracks are
/// reported as unsupported since streaming is not implemented.
pub struct BundleResolver<B> {
    root: PathBuf,
    extensions: Vec<String>,
    backend: B,
}

impl<B: ResourceBackend> BundleResolver<B> {
    pub fn new(root: impl Into<PathBuf>, backend: B) -> Self {
        Self {
            root: root.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| (*ext).to_string()).collect(),
            backend,
        }
    }

    #[must_use]
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find the bundled file for a local reference
    pub fn locate(&self, reference: &str) -> Option<PathBuf> {
        let exact = self.root.join(reference);
        if exact.is_file() {
            return Some(exact);
        }

        self.extensions
            .iter()
            .map(|ext| self.root.join(format!("{reference}.{ext}")))
            .find(|candidate| candidate.is_file())
    }
}

impl<B: ResourceBackend> AudioResourceResolver for BundleResolver<B> {
    fn resolve(&self, track: &Track, events: ResourceEvents) -> Result<Box<dyn AudioResource>> {
        if track.source_kind() != SourceKind::Local {
            return Err(PlaybackError::unavailable(
                track.id(),
                format!("streaming from {} is not implemented", track.source_kind()),
            ));
        }

        let reference = track
            .local_reference()
            .ok_or_else(|| PlaybackError::unavailable(track.id(), "track has no local file"))?;

        let path = self.locate(reference).ok_or_else(|| {
            PlaybackError::unavailable(
                track.id(),
                format!("bundled file '{reference}' not found"),
            )
        })?;

        tracing::debug!(track_id = track.id(), path = %path.display(), "Resolved bundled file");
        self.backend.open(&path, track, events)
    }
}
