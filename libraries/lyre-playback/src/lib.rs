//! Lyre Playback - queue and audio session
//!
//! Platform-agnostic playback core for Lyre.
//!
//! This crate provides:
//! - Playback queue with a current pointer (shuffle, repeat Off/All/One)
//! - Audio session state machine (Stopped, Loading, Playing, Paused, Error)
//! - Progress clock sampling the play position while playing
//! - System interruption handling (audio focus, app lifecycle)
//! - A player task serializing all of the above behind a cloneable handle
//!
//! # Architecture
//!
//! Decoding and audio output are provided by the platform through the
//! [`AudioResourceResolver`] and [`AudioResource`] traits. [`BundleResolver`]
//! looks tracks up in a bundled directory; [`SimulatedBackend`] keeps time
//! without producing audio, for headless runs and tests.
//!
//! # Example: Queue
//!
//! ```rust
//! use lyre_core::Track;
//! use lyre_playback::{QueueStore, RepeatMode};
//!
//! let mut queue = QueueStore::new();
//! queue.set_queue(
//!     vec![Track::local("a", "A", "a"), Track::local("b", "B", "b")],
//!     0,
//! );
//! queue.set_repeat_mode(RepeatMode::All);
//!
//! assert_eq!(queue.next_track().unwrap().id(), "b");
//! assert_eq!(queue.next_track().unwrap().id(), "a"); // wraps
//! ```
//!
//! # Example: Player
//!
//! ```rust,no_run
//! use lyre_core::Track;
//! use lyre_playback::{PlaybackConfig, Player, SimulatedBackend};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn demo() -> lyre_playback::Result<()> {
//! let player = Player::spawn(Arc::new(SimulatedBackend::new()), PlaybackConfig::default());
//!
//! let track = Track::local("intro", "Intro", "intro").with_duration(Duration::from_secs(30));
//! player.set_queue(vec![track], 0).await?;
//! player.play().await?;
//!
//! let mut snapshots = player.subscribe_snapshot();
//! snapshots.changed().await.ok();
//! println!("{:?}", snapshots.borrow().state);
//! # Ok(())
//! # }
//! ```

mod clock;
mod error;
mod events;
mod interruption;
mod player;
mod queue;
mod resource;
mod session;
mod shuffle;
pub mod types;

// Public exports
pub use clock::{ClockTick, ProgressClock};
pub use error::{PlaybackError, Result};
pub use events::PlaybackEvent;
pub use interruption::{
    normalize, AudioActivator, InterruptionCommand, InterruptionCoordinator, SignalAction,
    SignalBus, Subscription, SubscriptionId, SystemSignal,
};
pub use player::{Player, PlayerHandle};
pub use queue::QueueStore;
pub use resource::{
    AudioResource, AudioResourceResolver, BundleResolver, ResourceBackend, ResourceEvent,
    ResourceEvents, ResourceSignal, SimulatedBackend, SimulatedResource, DEFAULT_EXTENSIONS,
};
pub use session::{PlaybackSession, SessionInputs};
pub use shuffle::shuffled_with_current_first;
pub use types::{PlaybackConfig, PlaybackSnapshot, PlaybackState, Progress, QueueView, RepeatMode};
