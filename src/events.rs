//! Event payloads and the Subscription bundle PlaybackService fans events
//! out to.
//!
//! A single shared `tokio::sync::broadcast` topic forces every subscriber
//! to drain every kind to avoid lagging on kinds it doesn't care about, so
//! each kind gets its own bounded `mpsc` channel with drop-on-full
//! semantics instead.

use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::state::{RepeatMode, State};
use crate::track::Track;

#[derive(Debug, Clone, PartialEq)]
pub struct StateChanged {
    pub previous: State,
    pub current: State,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackChanged {
    pub previous: Option<Track>,
    pub current: Option<Track>,
    pub previous_index: i32,
    pub index: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionChanged {
    pub position: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueChanged {
    pub tracks: Vec<Track>,
    pub index: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeChanged {
    pub repeat: RepeatMode,
    pub shuffle: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEvent {
    pub operation: String,
    pub path: String,
    pub err: String,
}

/// The subscriber-facing half: six receivers plus a raised-once `done`
/// signal. Dropping this drops the service's corresponding senders'
/// ability to be observed further, but does not affect other subscribers.
pub struct Subscription {
    pub state_changed: mpsc::Receiver<StateChanged>,
    pub track_changed: mpsc::Receiver<TrackChanged>,
    pub position_changed: mpsc::Receiver<PositionChanged>,
    pub queue_changed: mpsc::Receiver<QueueChanged>,
    pub mode_changed: mpsc::Receiver<ModeChanged>,
    pub error_event: mpsc::Receiver<ErrorEvent>,
    done: watch::Receiver<bool>,
}

impl Subscription {
    pub fn is_done(&self) -> bool {
        *self.done.borrow()
    }

    pub async fn wait_done(&mut self) {
        let _ = self.done.wait_for(|done| *done).await;
    }
}

/// The service-facing half: non-blocking, drop-on-full senders.
pub(crate) struct SubscriptionSender {
    state_changed: mpsc::Sender<StateChanged>,
    track_changed: mpsc::Sender<TrackChanged>,
    position_changed: mpsc::Sender<PositionChanged>,
    queue_changed: mpsc::Sender<QueueChanged>,
    mode_changed: mpsc::Sender<ModeChanged>,
    error_event: mpsc::Sender<ErrorEvent>,
    done: watch::Sender<bool>,
}

impl SubscriptionSender {
    pub fn send_state_changed(&self, event: StateChanged) {
        let _ = self.state_changed.try_send(event);
    }

    pub fn send_track_changed(&self, event: TrackChanged) {
        let _ = self.track_changed.try_send(event);
    }

    pub fn send_position_changed(&self, event: PositionChanged) {
        let _ = self.position_changed.try_send(event);
    }

    pub fn send_queue_changed(&self, event: QueueChanged) {
        let _ = self.queue_changed.try_send(event);
    }

    pub fn send_mode_changed(&self, event: ModeChanged) {
        let _ = self.mode_changed.try_send(event);
    }

    pub fn send_error_event(&self, event: ErrorEvent) {
        let _ = self.error_event.try_send(event);
    }

    pub fn raise_done(&self) {
        self.done.send_replace(true);
    }

    pub fn is_done(&self) -> bool {
        *self.done.borrow()
    }
}

/// Builds a fresh subscription pair: the sender half the service keeps, and
/// the receiver half handed back to the caller of `subscribe()`.
pub(crate) fn new_subscription(capacity: usize) -> (SubscriptionSender, Subscription) {
    let (state_tx, state_rx) = mpsc::channel(capacity);
    let (track_tx, track_rx) = mpsc::channel(capacity);
    let (position_tx, position_rx) = mpsc::channel(capacity);
    let (queue_tx, queue_rx) = mpsc::channel(capacity);
    let (mode_tx, mode_rx) = mpsc::channel(capacity);
    let (error_tx, error_rx) = mpsc::channel(capacity);
    let (done_tx, done_rx) = watch::channel(false);

    (
        SubscriptionSender {
            state_changed: state_tx,
            track_changed: track_tx,
            position_changed: position_tx,
            queue_changed: queue_tx,
            mode_changed: mode_tx,
            error_event: error_tx,
            done: done_tx,
        },
        Subscription {
            state_changed: state_rx,
            track_changed: track_rx,
            position_changed: position_rx,
            queue_changed: queue_rx,
            mode_changed: mode_rx,
            error_event: error_rx,
            done: done_rx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_channel_drops_silently() {
        let (sender, mut sub) = new_subscription(1);
        sender.send_state_changed(StateChanged {
            previous: State::Stopped,
            current: State::Playing,
        });
        // Channel at capacity 1 is now full; this send is dropped, not queued.
        sender.send_state_changed(StateChanged {
            previous: State::Playing,
            current: State::Paused,
        });

        let first = sub.state_changed.try_recv().unwrap();
        assert_eq!(first.current, State::Playing);
        assert!(sub.state_changed.try_recv().is_err());
    }

    #[test]
    fn raise_done_is_observable() {
        let (sender, sub) = new_subscription(4);
        assert!(!sub.is_done());
        sender.raise_done();
        assert!(sub.is_done());
    }
}
