//! Player - queue and session orchestration
//!
//! A single tokio task owns the [`QueueStore`] and the [`PlaybackSession`].
//! User commands, progress ticks and resource events all funnel into that
//! task and are handled one at a time, so no two transitions ever interleave.
//! After every input the task broadcasts the queued events and republishes
//! the session snapshot.
//!
//! [`PlayerHandle`] is the cloneable front door: each method sends a command
//! and waits for the task's reply.

use crate::{
    error::{PlaybackError, Result},
    events::PlaybackEvent,
    interruption::InterruptionCommand,
    queue::QueueStore,
    resource::AudioResourceResolver,
    session::{PlaybackSession, SessionInputs},
    types::{PlaybackConfig, PlaybackSnapshot, PlaybackState, QueueView, RepeatMode},
};
use lyre_core::Track;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

type Reply<T> = oneshot::Sender<T>;

/// Commands handled by the player task
#[derive(Debug)]
enum PlayerCommand {
    // Queue
    SetQueue {
        tracks: Vec<Track>,
        start_index: usize,
        reply: Reply<()>,
    },
    AddTracks {
        tracks: Vec<Track>,
        reply: Reply<()>,
    },
    RemoveAt {
        index: usize,
        reply: Reply<Option<Track>>,
    },
    MoveTrack {
        from: usize,
        to: usize,
        reply: Reply<bool>,
    },
    ClearQueue {
        reply: Reply<()>,
    },
    ToggleShuffle {
        reply: Reply<bool>,
    },
    ToggleRepeatMode {
        reply: Reply<RepeatMode>,
    },
    SetRepeatMode {
        mode: RepeatMode,
        reply: Reply<()>,
    },

    // Navigation
    Play {
        reply: Reply<Result<()>>,
    },
    PlayAt {
        index: usize,
        reply: Reply<Result<Track>>,
    },
    Next {
        reply: Reply<Result<Option<Track>>>,
    },
    Previous {
        reply: Reply<Result<Option<Track>>>,
    },

    // Transport
    Pause {
        reply: Reply<()>,
    },
    Resume {
        reply: Reply<Result<()>>,
    },
    TogglePlayPause {
        reply: Reply<Result<()>>,
    },
    Stop {
        reply: Reply<()>,
    },
    Seek {
        seconds: f64,
        reply: Reply<Result<Duration>>,
    },
    ClearError {
        reply: Reply<()>,
    },
    Interrupt {
        command: InterruptionCommand,
        reply: Reply<Result<()>>,
    },

    // Queries
    QueueView {
        reply: Reply<QueueView>,
    },
    Upcoming {
        limit: usize,
        reply: Reply<Vec<Track>>,
    },
    Preceding {
        limit: usize,
        reply: Reply<Vec<Track>>,
    },

    Shutdown {
        reply: Reply<()>,
    },
}

/// State owned by the player task
pub struct Player {
    queue: QueueStore,
    session: PlaybackSession,
    config: PlaybackConfig,
    pending_events: Vec<PlaybackEvent>,
    events_tx: broadcast::Sender<PlaybackEvent>,
    snapshot_tx: watch::Sender<PlaybackSnapshot>,
}

impl Player {
    /// Spawn the player task and return a handle to it
    ///
    /// Must be called from within a tokio runtime. The task runs until
    /// [`PlayerHandle::shutdown`] is called or every handle is dropped.
    pub fn spawn(resolver: Arc<dyn AudioResourceResolver>, config: PlaybackConfig) -> PlayerHandle {
        let (session, inputs) = PlaybackSession::new(resolver, config.progress_interval());
        let (commands_tx, commands_rx) = mpsc::channel(config.command_buffer.max(1));
        let (events_tx, _) = broadcast::channel(config.event_buffer.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(PlaybackSnapshot::default());

        let mut queue = QueueStore::new();
        queue.set_repeat_mode(config.repeat);

        let player = Self {
            queue,
            session,
            config,
            pending_events: Vec::new(),
            events_tx: events_tx.clone(),
            snapshot_tx,
        };

        tokio::spawn(player.run(commands_rx, inputs));

        PlayerHandle {
            commands: commands_tx,
            snapshot: snapshot_rx,
            events: events_tx,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<PlayerCommand>, mut inputs: SessionInputs) {
        tracing::debug!("Player task started");

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(PlayerCommand::Shutdown { reply }) => {
                        self.session.stop();
                        self.publish();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle(command),
                    None => break,
                },

                Some(signal) = inputs.resource_events.recv() => {
                    if let Some(finished) = self.session.on_resource_event(signal) {
                        self.on_track_finished(&finished);
                    }
                }

                Some(tick) = inputs.ticks.recv() => {
                    if let Some(finished) = self.session.on_tick(tick) {
                        self.on_track_finished(&finished);
                    }
                }
            }

            self.publish();
        }

        tracing::debug!("Player task stopped");
    }

    fn handle(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::SetQueue {
                tracks,
                start_index,
                reply,
            } => {
                self.queue.set_queue(tracks, start_index);
                self.emit_queue_changed();
                self.respond(reply, ());
            }
            PlayerCommand::AddTracks { tracks, reply } => {
                self.queue.add_tracks(tracks);
                self.emit_queue_changed();
                self.respond(reply, ());
            }
            PlayerCommand::RemoveAt { index, reply } => {
                let removed = self.queue.remove_at(index);
                if removed.is_some() {
                    self.emit_queue_changed();
                }
                self.respond(reply, removed);
            }
            PlayerCommand::MoveTrack { from, to, reply } => {
                let moved = self.queue.move_track(from, to);
                if moved {
                    self.emit_queue_changed();
                }
                self.respond(reply, moved);
            }
            PlayerCommand::ClearQueue { reply } => {
                self.queue.clear();
                self.session.stop();
                self.emit_queue_changed();
                self.respond(reply, ());
            }
            PlayerCommand::ToggleShuffle { reply } => {
                let enabled = self.queue.toggle_shuffle();
                self.pending_events
                    .push(PlaybackEvent::ShuffleChanged { enabled });
                self.respond(reply, enabled);
            }
            PlayerCommand::ToggleRepeatMode { reply } => {
                let mode = self.queue.toggle_repeat_mode();
                self.pending_events.push(PlaybackEvent::RepeatChanged { mode });
                self.respond(reply, mode);
            }
            PlayerCommand::SetRepeatMode { mode, reply } => {
                if self.queue.repeat_mode() != mode {
                    self.queue.set_repeat_mode(mode);
                    self.pending_events.push(PlaybackEvent::RepeatChanged { mode });
                }
                self.respond(reply, ());
            }

            PlayerCommand::Play { reply } => {
                let value = self.play();
                self.respond(reply, value);
            }
            PlayerCommand::PlayAt { index, reply } => {
                let value = self.play_at(index);
                self.respond(reply, value);
            }
            PlayerCommand::Next { reply } => {
                let value = self.next();
                self.respond(reply, value);
            }
            PlayerCommand::Previous { reply } => {
                let value = self.previous();
                self.respond(reply, value);
            }

            PlayerCommand::Pause { reply } => {
                self.session.pause();
                self.respond(reply, ());
            }
            PlayerCommand::Resume { reply } => {
                let value = self.session.resume();
                self.respond(reply, value);
            }
            PlayerCommand::TogglePlayPause { reply } => {
                let result = match self.session.state() {
                    PlaybackState::Playing => {
                        self.session.pause();
                        Ok(())
                    }
                    PlaybackState::Paused => self.session.resume(),
                    _ => self.play(),
                };
                self.respond(reply, result);
            }
            PlayerCommand::Stop { reply } => {
                self.session.stop();
                self.respond(reply, ());
            }
            PlayerCommand::Seek { seconds, reply } => {
                let value = self.session.seek(seconds);
                self.respond(reply, value);
            }
            PlayerCommand::ClearError { reply } => {
                self.session.clear_error();
                self.respond(reply, ());
            }
            PlayerCommand::Interrupt { command, reply } => {
                let result = match command {
                    InterruptionCommand::Begin => {
                        self.session.interruption_begin();
                        Ok(())
                    }
                    InterruptionCommand::End { should_resume } => {
                        self.session.interruption_end(should_resume)
                    }
                };
                self.respond(reply, result);
            }

            PlayerCommand::QueueView { reply } => {
                let value = self.queue.view();
                self.respond(reply, value);
            }
            PlayerCommand::Upcoming { limit, reply } => {
                let value = self.queue.upcoming(limit).to_vec();
                self.respond(reply, value);
            }
            PlayerCommand::Preceding { limit, reply } => {
                let value = self.queue.preceding(limit).to_vec();
                self.respond(reply, value);
            }

            // Handled by the run loop
            PlayerCommand::Shutdown { reply } => {
                self.respond(reply, ());
            }
        }
    }

    // ===== Navigation =====

    /// Resume if paused, otherwise play the queue's current track
    ///
    /// With no selection the first track is selected.
    fn play(&mut self) -> Result<()> {
        if self.session.state() == PlaybackState::Paused {
            return self.session.resume();
        }

        let track = match self.queue.current_track() {
            Some(track) => track.clone(),
            None => self.queue.jump_to(0).ok_or(PlaybackError::NoTrackLoaded)?,
        };
        self.session.play(track)
    }

    fn play_at(&mut self, index: usize) -> Result<Track> {
        let track = self
            .queue
            .jump_to(index)
            .ok_or(PlaybackError::OutOfRangeIndex {
                index,
                len: self.queue.len(),
            })?;
        self.session.play(track.clone())?;
        Ok(track)
    }

    fn next(&mut self) -> Result<Option<Track>> {
        match self.queue.next_track() {
            Some(track) => {
                self.session.play(track.clone())?;
                Ok(Some(track))
            }
            None => Ok(None),
        }
    }

    /// Restart the current track if far enough in, otherwise step back
    fn previous(&mut self) -> Result<Option<Track>> {
        let in_track = matches!(
            self.session.state(),
            PlaybackState::Playing | PlaybackState::Paused
        );
        if in_track && self.session.progress().current_time > self.config.restart_threshold() {
            self.session.seek(0.0)?;
            return Ok(self.queue.current_track().cloned());
        }

        match self.queue.previous_track() {
            Some(track) => {
                self.session.play(track.clone())?;
                Ok(Some(track))
            }
            None => Ok(None),
        }
    }

    fn on_track_finished(&mut self, finished: &Track) {
        if !self.config.auto_advance {
            return;
        }

        let Some(next) = self.queue.next_track() else {
            tracing::debug!(track_id = finished.id(), "Reached end of queue");
            return;
        };

        tracing::debug!(from = finished.id(), to = next.id(), "Auto-advancing");
        if let Err(err) = self.session.play(next) {
            // The session already moved to Error and queued the message
            tracing::debug!(error = %err, "Auto-advance failed");
        }
    }

    // ===== Publishing =====

    /// Publish, then answer, so the caller observes the new snapshot
    fn respond<T>(&mut self, reply: Reply<T>, value: T) {
        self.publish();
        // A dropped receiver only means the caller stopped waiting
        let _ = reply.send(value);
    }

    fn emit_queue_changed(&mut self) {
        self.pending_events.push(PlaybackEvent::QueueChanged {
            length: self.queue.len(),
        });
    }

    fn publish(&mut self) {
        let events = self
            .pending_events
            .drain(..)
            .chain(self.session.drain_events());
        for event in events {
            // No subscribers is fine
            let _ = self.events_tx.send(event);
        }

        let snapshot = self.session.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

/// Cloneable handle to a running [`Player`]
///
/// Every method fails with [`PlaybackError::PlayerClosed`] once the task has
/// shut down.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    commands: mpsc::Sender<PlayerCommand>,
    snapshot: watch::Receiver<PlaybackSnapshot>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlayerHandle {
    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> PlayerCommand) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| PlaybackError::PlayerClosed)?;
        response.await.map_err(|_| PlaybackError::PlayerClosed)
    }

    // ===== Queue =====

    /// Replace the queue; does not start playback
    pub async fn set_queue(&self, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        self.request(|reply| PlayerCommand::SetQueue {
            tracks,
            start_index,
            reply,
        })
        .await
    }

    pub async fn add_track(&self, track: Track) -> Result<()> {
        self.add_tracks(vec![track]).await
    }

    pub async fn add_tracks(&self, tracks: Vec<Track>) -> Result<()> {
        self.request(|reply| PlayerCommand::AddTracks { tracks, reply })
            .await
    }

    /// Remove the track at `index`, returning it if the index was valid
    pub async fn remove_at(&self, index: usize) -> Result<Option<Track>> {
        self.request(|reply| PlayerCommand::RemoveAt { index, reply })
            .await
    }

    pub async fn move_track(&self, from: usize, to: usize) -> Result<bool> {
        self.request(|reply| PlayerCommand::MoveTrack { from, to, reply })
            .await
    }

    /// Empty the queue and stop playback
    pub async fn clear_queue(&self) -> Result<()> {
        self.request(|reply| PlayerCommand::ClearQueue { reply }).await
    }

    pub async fn toggle_shuffle(&self) -> Result<bool> {
        self.request(|reply| PlayerCommand::ToggleShuffle { reply })
            .await
    }

    pub async fn toggle_repeat_mode(&self) -> Result<RepeatMode> {
        self.request(|reply| PlayerCommand::ToggleRepeatMode { reply })
            .await
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.request(|reply| PlayerCommand::SetRepeatMode { mode, reply })
            .await
    }

    // ===== Navigation =====

    /// Resume, or play the current queue track (the first if none selected)
    pub async fn play(&self) -> Result<()> {
        self.request(|reply| PlayerCommand::Play { reply }).await?
    }

    /// Select and play the track at `index`
    pub async fn play_at(&self, index: usize) -> Result<Track> {
        self.request(|reply| PlayerCommand::PlayAt { index, reply })
            .await?
    }

    /// Play the next track; `None` at the end of the queue
    pub async fn next(&self) -> Result<Option<Track>> {
        self.request(|reply| PlayerCommand::Next { reply }).await?
    }

    /// Restart the current track, or play the previous one
    pub async fn previous(&self) -> Result<Option<Track>> {
        self.request(|reply| PlayerCommand::Previous { reply }).await?
    }

    // ===== Transport =====

    pub async fn pause(&self) -> Result<()> {
        self.request(|reply| PlayerCommand::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(|reply| PlayerCommand::Resume { reply }).await?
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        self.request(|reply| PlayerCommand::TogglePlayPause { reply })
            .await?
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| PlayerCommand::Stop { reply }).await
    }

    /// Seek within the current track, returning the clamped position
    pub async fn seek(&self, seconds: f64) -> Result<Duration> {
        self.request(|reply| PlayerCommand::Seek { seconds, reply })
            .await?
    }

    pub async fn clear_error(&self) -> Result<()> {
        self.request(|reply| PlayerCommand::ClearError { reply })
            .await
    }

    // ===== Interruptions =====

    pub async fn interrupt(&self, command: InterruptionCommand) -> Result<()> {
        self.request(|reply| PlayerCommand::Interrupt { command, reply })
            .await?
    }

    pub async fn interruption_begin(&self) -> Result<()> {
        self.interrupt(InterruptionCommand::Begin).await
    }

    pub async fn interruption_end(&self, should_resume: bool) -> Result<()> {
        self.interrupt(InterruptionCommand::End { should_resume })
            .await
    }

    // ===== Queries =====

    pub async fn queue_view(&self) -> Result<QueueView> {
        self.request(|reply| PlayerCommand::QueueView { reply })
            .await
    }

    pub async fn upcoming(&self, limit: usize) -> Result<Vec<Track>> {
        self.request(|reply| PlayerCommand::Upcoming { limit, reply })
            .await
    }

    pub async fn preceding(&self, limit: usize) -> Result<Vec<Track>> {
        self.request(|reply| PlayerCommand::Preceding { limit, reply })
            .await
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Stop playback and end the player task
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| PlayerCommand::Shutdown { reply }).await
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}
