//! Playback session - the audio state machine
//!
//! Owns the single loaded resource and the progress clock, and turns user
//! transport commands, clock ticks and resource events into state
//! transitions. Every transition queues `PlaybackEvent`s which the owner
//! drains after each input.

use crate::{
    clock::{ClockTick, ProgressClock},
    error::{PlaybackError, Result},
    events::PlaybackEvent,
    resource::{AudioResource, AudioResourceResolver, ResourceEvent, ResourceEvents, ResourceSignal},
    types::{PlaybackSnapshot, PlaybackState, Progress},
};
use lyre_core::Track;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Receivers the session's owner must poll and feed back into
/// [`PlaybackSession::on_tick`] and [`PlaybackSession::on_resource_event`]
#[derive(Debug)]
pub struct SessionInputs {
    pub ticks: mpsc::UnboundedReceiver<ClockTick>,
    pub resource_events: mpsc::UnboundedReceiver<ResourceSignal>,
}

/// Audio session state machine
pub struct PlaybackSession {
    resolver: Arc<dyn AudioResourceResolver>,

    state: PlaybackState,
    current_track: Option<Arc<Track>>,
    resource: Option<Box<dyn AudioResource>>,
    progress: Progress,
    error_message: Option<String>,

    /// Paused by an interruption rather than the user
    auto_paused: bool,
    /// `TrackFinished` already emitted for the current load
    completion_signalled: bool,

    /// Identifies the held resource; bumped on every release
    load_generation: u64,
    resource_tx: mpsc::UnboundedSender<ResourceSignal>,
    clock: ProgressClock,

    pending_events: Vec<PlaybackEvent>,
}

impl PlaybackSession {
    /// Create a stopped session
    pub fn new(
        resolver: Arc<dyn AudioResourceResolver>,
        progress_interval: Duration,
    ) -> (Self, SessionInputs) {
        let (tick_tx, ticks) = mpsc::unbounded_channel();
        let (resource_tx, resource_events) = mpsc::unbounded_channel();

        let session = Self {
            resolver,
            state: PlaybackState::Stopped,
            current_track: None,
            resource: None,
            progress: Progress::default(),
            error_message: None,
            auto_paused: false,
            completion_signalled: false,
            load_generation: 0,
            resource_tx,
            clock: ProgressClock::new(progress_interval, tick_tx),
            pending_events: Vec::new(),
        };

        (
            session,
            SessionInputs {
                ticks,
                resource_events,
            },
        )
    }

    // ===== Transport =====

    /// Load and play `track` from the start
    ///
    /// Playing the track that is already loaded and paused resumes it
    /// instead. On failure the session moves to `Error` and the error is
    /// returned as well.
    pub fn play(&mut self, track: Track) -> Result<()> {
        if self.state == PlaybackState::Paused && self.current_track.as_deref() == Some(&track) {
            return self.resume();
        }

        let previous_track_id = self.current_track.as_ref().map(|t| t.id().to_string());
        self.release();

        let track = Arc::new(track);
        self.current_track = Some(Arc::clone(&track));
        self.progress = Progress::new(Duration::ZERO, track.duration());
        self.error_message = None;
        self.auto_paused = false;
        self.completion_signalled = false;
        self.set_state(PlaybackState::Loading);

        let events = ResourceEvents::new(self.load_generation, self.resource_tx.clone());
        let loaded = self
            .resolver
            .resolve(&track, events)
            .and_then(|mut resource| resource.play().map(|()| resource));

        match loaded {
            Ok(resource) => {
                if !resource.duration().is_zero() {
                    self.progress.duration = resource.duration();
                }
                self.resource = Some(resource);
                self.clock.start();
                self.set_state(PlaybackState::Playing);
                self.emit_track_changed(track.id().to_string(), previous_track_id);

                tracing::info!(
                    track_id = track.id(),
                    title = track.title(),
                    duration_ms = self.progress.duration.as_millis() as u64,
                    "Loaded track"
                );
                Ok(())
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Pause output; only valid while playing
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }

        if let Some(resource) = self.resource.as_mut() {
            resource.pause();
            self.progress.current_time = resource.position();
        }
        self.clock.stop();
        self.set_state(PlaybackState::Paused);
    }

    /// Resume from the held position; only valid while paused
    pub fn resume(&mut self) -> Result<()> {
        if self.state != PlaybackState::Paused {
            return Ok(());
        }

        if let Some(resource) = self.resource.as_mut() {
            if let Err(err) = resource.play() {
                self.fail(&err);
                return Err(err);
            }
        }

        self.auto_paused = false;
        self.clock.start();
        self.set_state(PlaybackState::Playing);
        Ok(())
    }

    /// Release everything and return to `Stopped`
    pub fn stop(&mut self) {
        self.release();
        self.current_track = None;
        self.progress = Progress::default();
        self.error_message = None;
        self.auto_paused = false;
        self.set_state(PlaybackState::Stopped);
    }

    /// Seek to `seconds`, clamped to `[0, duration]`
    ///
    /// Negative and NaN targets seek to the start, anything past the end
    /// seeks to exactly the end. Returns the applied position.
    pub fn seek(&mut self, seconds: f64) -> Result<Duration> {
        if !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            return Err(PlaybackError::NoTrackLoaded);
        }
        let resource = self.resource.as_mut().ok_or(PlaybackError::NoTrackLoaded)?;

        let duration = resource.duration();
        let target = if seconds.is_nan() || seconds <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(seconds)
                .unwrap_or(duration)
                .min(duration)
        };

        resource.seek(target);
        self.progress.current_time = target;
        self.emit_position_update();

        tracing::debug!(position_ms = target.as_millis() as u64, "Seeked");
        Ok(target)
    }

    /// Leave `Error` for `Stopped`; no-op in any other state
    pub fn clear_error(&mut self) {
        if self.state != PlaybackState::Error {
            return;
        }

        self.error_message = None;
        self.current_track = None;
        self.progress = Progress::default();
        self.set_state(PlaybackState::Stopped);
    }

    // ===== Interruptions =====

    /// An external interruption started; pauses if playing
    pub fn interruption_begin(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }

        self.pause();
        self.auto_paused = true;
        self.pending_events.push(PlaybackEvent::Interrupted);
        tracing::debug!("Paused for interruption");
    }

    /// An external interruption ended
    ///
    /// Only acts if the session was paused by [`Self::interruption_begin`].
    /// With `should_resume` playback picks up where it left off; without it
    /// the session stays paused and the user decides.
    pub fn interruption_end(&mut self, should_resume: bool) -> Result<()> {
        if !self.auto_paused {
            return Ok(());
        }
        self.auto_paused = false;

        let result = if should_resume { self.resume() } else { Ok(()) };

        let resumed = self.state == PlaybackState::Playing;
        self.pending_events
            .push(PlaybackEvent::InterruptionEnded { resumed });
        tracing::debug!(resumed, "Interruption ended");
        result
    }

    // ===== Inputs =====

    /// Handle a progress clock tick
    ///
    /// Returns the finished track if this tick detected natural completion.
    pub fn on_tick(&mut self, tick: ClockTick) -> Option<Arc<Track>> {
        if !self.clock.accepts(tick) || self.state != PlaybackState::Playing {
            return None;
        }
        let resource = self.resource.as_ref()?;

        self.progress.current_time = resource.position();
        if !resource.duration().is_zero() {
            self.progress.duration = resource.duration();
        }
        self.emit_position_update();

        let duration = self.progress.duration;
        if !duration.is_zero() && self.progress.current_time >= duration {
            return self.complete();
        }
        None
    }

    /// Handle an event reported by a resource
    ///
    /// Events from a released resource are discarded. Returns the finished
    /// track on natural completion.
    pub fn on_resource_event(&mut self, signal: ResourceSignal) -> Option<Arc<Track>> {
        if self.resource.is_none() || signal.generation != self.load_generation {
            tracing::trace!(event = ?signal.event, "Discarding event from released resource");
            return None;
        }

        match signal.event {
            ResourceEvent::Finished => self.complete(),
            ResourceEvent::DecodeError(message) => {
                self.fail(&PlaybackError::load_failure(message));
                None
            }
        }
    }

    // ===== Queries =====

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_track(&self) -> Option<&Arc<Track>> {
        self.current_track.as_ref()
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Whether the session is paused because of an interruption
    pub fn is_auto_paused(&self) -> bool {
        self.auto_paused
    }

    pub fn is_clock_running(&self) -> bool {
        self.clock.is_running()
    }

    /// Current read-only projection
    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            current_track: self.current_track.clone(),
            state: self.state,
            progress: self.progress,
            error_message: self.error_message.clone(),
        }
    }

    /// Drain pending events
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // ===== Internals =====

    /// Natural end of the current track, acted on once per load
    fn complete(&mut self) -> Option<Arc<Track>> {
        if self.completion_signalled {
            return None;
        }
        self.completion_signalled = true;

        let finished = self.current_track.clone()?;
        self.pending_events.push(PlaybackEvent::TrackFinished {
            track_id: finished.id().to_string(),
        });
        tracing::debug!(track_id = finished.id(), "Track finished");

        self.stop();
        Some(finished)
    }

    fn fail(&mut self, err: &PlaybackError) {
        tracing::warn!(error = %err, "Playback failed");

        self.release();
        self.error_message = Some(err.to_string());
        self.auto_paused = false;
        self.set_state(PlaybackState::Error);
        self.pending_events.push(PlaybackEvent::Error {
            message: err.to_string(),
        });
    }

    /// Drop the held resource and stop the clock
    ///
    /// Anything the old resource reports afterwards carries a stale generation.
    fn release(&mut self) {
        self.clock.stop();
        if self.resource.take().is_some() {
            tracing::trace!(generation = self.load_generation, "Released resource");
        }
        self.load_generation += 1;
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        tracing::debug!(from = ?self.state, to = ?state, "Playback state changed");
        self.state = state;
        self.pending_events.push(PlaybackEvent::StateChanged { state });
    }

    fn emit_track_changed(&mut self, track_id: String, previous_track_id: Option<String>) {
        self.pending_events.push(PlaybackEvent::TrackChanged {
            track_id,
            previous_track_id,
        });
    }

    fn emit_position_update(&mut self) {
        self.pending_events.push(PlaybackEvent::PositionUpdate {
            position_ms: self.progress.current_time.as_millis() as u64,
            duration_ms: self.progress.duration.as_millis() as u64,
        });
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("state", &self.state)
            .field("current_track", &self.current_track.as_ref().map(|t| t.id()))
            .field("progress", &self.progress)
            .field("error_message", &self.error_message)
            .field("auto_paused", &self.auto_paused)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{BundleResolver, SimulatedBackend};
    use lyre_core::SourceKind;
    use std::sync::Mutex;

    fn track(id: &str, secs: u64) -> Track {
        Track::local(id, format!("Track {id}"), id).with_duration(Duration::from_secs(secs))
    }

    fn session_with(resolver: impl AudioResourceResolver + 'static) -> (PlaybackSession, SessionInputs) {
        PlaybackSession::new(Arc::new(resolver), Duration::from_millis(100))
    }

    fn simulated() -> (PlaybackSession, SessionInputs) {
        session_with(SimulatedBackend::new())
    }

    /// Resolver that keeps the event sender of the last resource it opened
    #[derive(Default)]
    struct Recording {
        backend: SimulatedBackend,
        last: Mutex<Option<ResourceEvents>>,
    }

    impl Recording {
        fn last_events(&self) -> ResourceEvents {
            self.last.lock().unwrap().clone().unwrap()
        }
    }

    impl AudioResourceResolver for Arc<Recording> {
        fn resolve(&self, track: &Track, events: ResourceEvents) -> Result<Box<dyn AudioResource>> {
            *self.last.lock().unwrap() = Some(events.clone());
            self.backend.resolve(track, events)
        }
    }

    #[tokio::test]
    async fn unsupported_source_enters_error_until_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, _inputs) =
            session_with(BundleResolver::new(dir.path(), SimulatedBackend::new()));
        let remote = Track::remote(SourceKind::CatalogA, "a1", "Remote", "123");

        let err = session.play(remote).unwrap_err();

        assert!(err.is_unsupported());
        assert_eq!(session.state(), PlaybackState::Error);
        assert!(session.error_message().unwrap().contains("not supported"));
        assert!(!session.is_clock_running());

        session.clear_error();
        assert_eq!(session.state(), PlaybackState::Stopped);
        assert!(session.error_message().is_none());
        assert!(session.current_track().is_none());
    }

    #[tokio::test]
    async fn load_failure_enters_error() {
        let (mut session, _inputs) = session_with(SimulatedBackend::new().with_failure("bad"));

        let err = session.play(track("bad", 30)).unwrap_err();

        assert!(matches!(err, PlaybackError::ResourceLoadFailure(_)));
        assert_eq!(session.state(), PlaybackState::Error);
        let events = session.drain_events();
        assert!(events.contains(&PlaybackEvent::StateChanged {
            state: PlaybackState::Loading
        }));
        assert!(events
            .iter()
            .any(|e| matches!(e, PlaybackEvent::Error { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn play_starts_at_zero_and_runs_clock() {
        let (mut session, _inputs) = simulated();

        session.play(track("t1", 120)).unwrap();

        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(session.progress(), Progress::new(Duration::ZERO, Duration::from_secs(120)));
        assert!(session.is_clock_running());
        assert_eq!(
            session.drain_events(),
            vec![
                PlaybackEvent::StateChanged {
                    state: PlaybackState::Loading
                },
                PlaybackEvent::StateChanged {
                    state: PlaybackState::Playing
                },
                PlaybackEvent::TrackChanged {
                    track_id: "t1".to_string(),
                    previous_track_id: None
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn resource_duration_wins_over_estimate() {
        let backend = SimulatedBackend::new().with_duration("t1", Duration::from_secs(97));
        let (mut session, _inputs) = session_with(backend);

        session.play(track("t1", 100)).unwrap();
        assert_eq!(session.progress().duration, Duration::from_secs(97));
    }

    #[tokio::test(start_paused = true)]
    async fn playing_paused_track_resumes_it() {
        let (mut session, _inputs) = simulated();
        session.play(track("t1", 60)).unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        session.pause();
        session.drain_events();

        session.play(track("t1", 60)).unwrap();

        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(session.progress().current_time, Duration::from_secs(4));
        assert!(!session
            .drain_events()
            .iter()
            .any(|e| matches!(e, PlaybackEvent::TrackChanged { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_resume_only_from_valid_states() {
        let (mut session, _inputs) = simulated();

        session.pause();
        session.resume().unwrap();
        assert_eq!(session.state(), PlaybackState::Stopped);

        session.play(track("t1", 60)).unwrap();
        session.pause();
        assert_eq!(session.state(), PlaybackState::Paused);
        assert!(!session.is_clock_running());

        session.resume().unwrap();
        assert_eq!(session.state(), PlaybackState::Playing);
        assert!(session.is_clock_running());
    }

    #[tokio::test(start_paused = true)]
    async fn seek_clamps_to_track_bounds() {
        let (mut session, _inputs) = simulated();
        assert_eq!(session.seek(10.0), Err(PlaybackError::NoTrackLoaded));

        session.play(track("t1", 100)).unwrap();

        assert_eq!(session.seek(-5.0).unwrap(), Duration::ZERO);
        assert_eq!(session.seek(f64::NAN).unwrap(), Duration::ZERO);
        assert_eq!(session.seek(250.0).unwrap(), Duration::from_secs(100));
        assert_eq!(session.seek(f64::INFINITY).unwrap(), Duration::from_secs(100));
        assert_eq!(session.seek(42.5).unwrap(), Duration::from_millis(42_500));
        assert_eq!(session.progress().current_time, Duration::from_millis(42_500));
    }

    #[tokio::test(start_paused = true)]
    async fn seek_while_paused_updates_progress() {
        let (mut session, _inputs) = simulated();
        session.play(track("t1", 100)).unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        session.pause();
        session.drain_events();

        assert_eq!(session.seek(42.0).unwrap(), Duration::from_secs(42));

        assert_eq!(session.state(), PlaybackState::Paused);
        assert_eq!(session.progress().current_time, Duration::from_secs(42));
        assert!(!session.is_clock_running());
        assert_eq!(
            session.drain_events(),
            vec![PlaybackEvent::PositionUpdate {
                position_ms: 42_000,
                duration_ms: 100_000
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_resets_everything() {
        let (mut session, _inputs) = simulated();
        session.play(track("t1", 60)).unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;

        session.stop();

        assert_eq!(session.state(), PlaybackState::Stopped);
        assert_eq!(session.snapshot(), PlaybackSnapshot::default());
        assert!(!session.is_clock_running());
    }

    #[tokio::test(start_paused = true)]
    async fn interruption_pauses_and_resumes_in_place() {
        let (mut session, _inputs) = simulated();
        session.play(track("t1", 60)).unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;

        session.interruption_begin();
        assert_eq!(session.state(), PlaybackState::Paused);
        assert!(session.is_auto_paused());
        assert_eq!(session.progress().current_time, Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(30)).await;
        session.interruption_end(true).unwrap();

        assert_eq!(session.state(), PlaybackState::Playing);
        assert!(!session.is_auto_paused());
        assert_eq!(session.progress().current_time, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn interruption_end_without_resume_stays_paused() {
        let (mut session, _inputs) = simulated();
        session.play(track("t1", 60)).unwrap();
        session.interruption_begin();
        session.drain_events();

        session.interruption_end(false).unwrap();

        assert_eq!(session.state(), PlaybackState::Paused);
        assert!(!session.is_auto_paused());
        assert_eq!(
            session.drain_events(),
            vec![PlaybackEvent::InterruptionEnded { resumed: false }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn interruption_end_ignores_user_pause() {
        let (mut session, _inputs) = simulated();
        session.play(track("t1", 60)).unwrap();
        session.pause();

        session.interruption_end(true).unwrap();

        assert_eq!(session.state(), PlaybackState::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_from_clock_fires_once() {
        let (mut session, mut inputs) = simulated();
        session.play(track("t1", 1)).unwrap();
        session.drain_events();

        let finished = loop {
            let tick = inputs.ticks.recv().await.unwrap();
            if let Some(finished) = session.on_tick(tick) {
                break finished;
            }
        };

        assert_eq!(finished.id(), "t1");
        assert_eq!(session.state(), PlaybackState::Stopped);
        assert!(!session.is_clock_running());

        let finished_events = session
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, PlaybackEvent::TrackFinished { .. }))
            .count();
        assert_eq!(finished_events, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_after_stop_are_ignored() {
        let (mut session, mut inputs) = simulated();
        session.play(track("t1", 60)).unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;

        session.stop();
        session.drain_events();

        while let Ok(tick) = inputs.ticks.try_recv() {
            assert!(session.on_tick(tick).is_none());
        }
        assert!(session.drain_events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn decode_error_releases_resource() {
        let recording = Arc::new(Recording::default());
        let (mut session, mut inputs) = session_with(Arc::clone(&recording));
        session.play(track("t1", 60)).unwrap();

        recording.last_events().decode_error("corrupt frame");
        let signal = inputs.resource_events.recv().await.unwrap();
        assert!(session.on_resource_event(signal).is_none());

        assert_eq!(session.state(), PlaybackState::Error);
        assert!(session.error_message().unwrap().contains("corrupt frame"));
        assert!(!session.is_clock_running());
        assert_eq!(session.seek(1.0), Err(PlaybackError::NoTrackLoaded));
    }

    #[tokio::test(start_paused = true)]
    async fn events_from_replaced_resource_are_discarded() {
        let recording = Arc::new(Recording::default());
        let (mut session, mut inputs) = session_with(Arc::clone(&recording));

        session.play(track("t1", 60)).unwrap();
        let old = recording.last_events();
        session.play(track("t2", 60)).unwrap();

        old.finished();
        let signal = inputs.resource_events.recv().await.unwrap();
        assert!(session.on_resource_event(signal).is_none());
        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(session.current_track().unwrap().id(), "t2");

        recording.last_events().finished();
        let signal = inputs.resource_events.recv().await.unwrap();
        let finished = session.on_resource_event(signal).unwrap();
        assert_eq!(finished.id(), "t2");
        assert_eq!(session.state(), PlaybackState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_tracks_reports_previous() {
        let (mut session, _inputs) = simulated();
        session.play(track("t1", 60)).unwrap();
        session.drain_events();

        session.play(track("t2", 60)).unwrap();

        assert!(session.drain_events().contains(&PlaybackEvent::TrackChanged {
            track_id: "t2".to_string(),
            previous_track_id: Some("t1".to_string()),
        }));
    }
}
