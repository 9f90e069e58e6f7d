//! System interruptions
//!
//! Platform notifications (audio focus, app lifecycle) arrive on a
//! [`SignalBus`]. The [`InterruptionCoordinator`] normalizes them and either
//! forwards an [`InterruptionCommand`] to the player, where it is serialized
//! with user commands, or re-activates the platform audio session.

use crate::error::{PlaybackError, Result};
use crate::player::PlayerHandle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Notification from the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemSignal {
    /// Another app or a call took the audio output
    AudioFocusLost,

    /// Audio output is back; the platform hints whether to resume
    AudioFocusRegained { should_resume: bool },

    DidEnterBackground,

    WillEnterForeground,
}

/// Interruption as understood by the playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptionCommand {
    Begin,
    End { should_resume: bool },
}

/// What the coordinator does with a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Hand the command to the player
    Forward(InterruptionCommand),

    /// Re-issue audio session activation
    Reactivate,
}

/// Map a platform signal to its action
pub fn normalize(signal: SystemSignal) -> SignalAction {
    match signal {
        SystemSignal::AudioFocusLost => SignalAction::Forward(InterruptionCommand::Begin),
        SystemSignal::AudioFocusRegained { should_resume } => {
            SignalAction::Forward(InterruptionCommand::End { should_resume })
        }
        SystemSignal::DidEnterBackground | SystemSignal::WillEnterForeground => {
            SignalAction::Reactivate
        }
    }
}

/// Platform audio session activation
pub trait AudioActivator: Send + Sync {
    /// Declare background-capable playback and activate the session
    ///
    /// Failures are reported as [`PlaybackError::SessionActivationFailure`].
    fn activate(&self) -> Result<()>;
}

// ===== Signal bus =====

/// Identifies one subscription on a [`SignalBus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Default)]
struct BusInner {
    next_id: u64,
    subscribers: BTreeMap<SubscriptionId, mpsc::UnboundedSender<SystemSignal>>,
}

/// Publish/subscribe hub for [`SystemSignal`]s
///
/// Subscribers are registered and removed explicitly; dropping a
/// [`Subscription`] removes it too.
#[derive(Debug, Clone, Default)]
pub struct SignalBus {
    inner: Arc<Mutex<BusInner>>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut inner = lock(&self.inner);
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner.subscribers.insert(id, tx);

        tracing::trace!(id = id.0, "Signal subscriber added");
        Subscription {
            id,
            rx,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a subscriber; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        remove(&self.inner, id)
    }

    /// Deliver `signal` to every subscriber, returning how many received it
    pub fn publish(&self, signal: SystemSignal) -> usize {
        let mut inner = lock(&self.inner);
        inner
            .subscribers
            .retain(|_, tx| tx.send(signal).is_ok());

        tracing::debug!(?signal, subscribers = inner.subscribers.len(), "Published system signal");
        inner.subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }
}

/// Receiving end of a [`SignalBus`] registration
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<SystemSignal>,
    bus: Weak<Mutex<BusInner>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next signal, or `None` once unsubscribed
    pub async fn recv(&mut self) -> Option<SystemSignal> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SystemSignal> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            remove(&inner, self.id);
        }
    }
}

fn lock(inner: &Mutex<BusInner>) -> MutexGuard<'_, BusInner> {
    // The map stays consistent even if a holder panicked
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

fn remove(inner: &Mutex<BusInner>, id: SubscriptionId) -> bool {
    let removed = lock(inner).subscribers.remove(&id).is_some();
    if removed {
        tracing::trace!(id = id.0, "Signal subscriber removed");
    }
    removed
}

// ===== Coordinator =====

/// Routes system signals into the player and the audio session
///
/// Dropping the coordinator unsubscribes it from the bus immediately.
#[derive(Debug)]
pub struct InterruptionCoordinator {
    bus: SignalBus,
    subscription_id: SubscriptionId,
    handled: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl InterruptionCoordinator {
    /// Subscribe to `bus` and start forwarding
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(bus: &SignalBus, player: PlayerHandle, activator: Arc<dyn AudioActivator>) -> Self {
        let mut subscription = bus.subscribe();
        let subscription_id = subscription.id();
        let (handled_tx, handled) = watch::channel(0u64);

        let task = tokio::spawn(async move {
            while let Some(signal) = subscription.recv().await {
                match normalize(signal) {
                    SignalAction::Forward(command) => match player.interrupt(command).await {
                        Ok(()) => {}
                        Err(PlaybackError::PlayerClosed) => break,
                        Err(err) => {
                            tracing::warn!(?command, error = %err, "Interruption handling failed");
                        }
                    },
                    SignalAction::Reactivate => {
                        if let Err(err) = activator.activate() {
                            tracing::warn!(?signal, error = %err, "Audio session activation failed");
                        }
                    }
                }
                handled_tx.send_modify(|count| *count += 1);
            }
            tracing::debug!("Interruption coordinator stopped");
        });

        Self {
            bus: bus.clone(),
            subscription_id,
            handled,
            task,
        }
    }

    /// Number of signals fully handled so far
    ///
    /// A forwarded signal counts once the player has applied it and
    /// published the resulting snapshot. The channel closes when the
    /// coordinator stops.
    pub fn handled_signals(&self) -> watch::Receiver<u64> {
        self.handled.clone()
    }
}

impl Drop for InterruptionCoordinator {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.subscription_id);
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focus_signals_become_commands() {
        assert_eq!(
            normalize(SystemSignal::AudioFocusLost),
            SignalAction::Forward(InterruptionCommand::Begin)
        );
        assert_eq!(
            normalize(SystemSignal::AudioFocusRegained {
                should_resume: true
            }),
            SignalAction::Forward(InterruptionCommand::End {
                should_resume: true
            })
        );
    }

    #[test]
    fn lifecycle_signals_reactivate() {
        assert_eq!(normalize(SystemSignal::DidEnterBackground), SignalAction::Reactivate);
        assert_eq!(normalize(SystemSignal::WillEnterForeground), SignalAction::Reactivate);
    }

    #[test]
    fn publish_reaches_every_subscriber() {
        let bus = SignalBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.publish(SystemSignal::AudioFocusLost), 2);
        assert_eq!(first.try_recv(), Some(SystemSignal::AudioFocusLost));
        assert_eq!(second.try_recv(), Some(SystemSignal::AudioFocusLost));
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let bus = SignalBus::new();
        let subscription = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        drop(subscription);

        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(SystemSignal::DidEnterBackground), 0);
    }

    #[test]
    fn explicit_unsubscribe_closes_stream() {
        let bus = SignalBus::new();
        let mut subscription = bus.subscribe();

        assert!(bus.unsubscribe(subscription.id()));
        assert!(!bus.unsubscribe(subscription.id()));

        bus.publish(SystemSignal::AudioFocusLost);
        assert_eq!(subscription.try_recv(), None);
    }

    #[test]
    fn subscription_outlives_bus() {
        let bus = SignalBus::new();
        let subscription = bus.subscribe();
        drop(bus);
        drop(subscription);
    }
}
