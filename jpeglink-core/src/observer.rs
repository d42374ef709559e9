//! One-way notifications from the engine to whatever presents them.

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tracing::trace;

use crate::state::ConnectionState;
use crate::transfer::TransferOutcome;

/// A notification for the observer sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverEvent {
    StateChanged(ConnectionState),
    /// Human-readable, informational only.
    Status(String),
    /// Exactly one per armed transfer that was not aborted.
    Outcome(TransferOutcome),
}

/// Receives engine notifications. Must not block; delivery is
/// fire-and-forget.
pub trait ObserverSink: Send + 'static {
    fn notify(&self, event: ObserverEvent);
}

impl ObserverSink for mpsc::UnboundedSender<ObserverEvent> {
    fn notify(&self, event: ObserverEvent) {
        if self.send(event).is_err() {
            trace!("observer receiver dropped");
        }
    }
}

// ── WatchObserver ────────────────────────────────────────────────

/// Publishes the latest state, status text and last good payload on
/// `watch` channels, for consumers that only care about the current value.
#[derive(Debug)]
pub struct WatchObserver {
    state: watch::Sender<ConnectionState>,
    status: watch::Sender<String>,
    last_jpeg: watch::Sender<Option<Bytes>>,
}

/// Receiving side of a [`WatchObserver`].
#[derive(Debug, Clone)]
pub struct ObserverWatch {
    pub state: watch::Receiver<ConnectionState>,
    pub status: watch::Receiver<String>,
    /// `None` until a transfer succeeds; cleared again by an invalid one.
    pub last_jpeg: watch::Receiver<Option<Bytes>>,
}

impl WatchObserver {
    pub fn new() -> (Self, ObserverWatch) {
        let (state, state_rx) = watch::channel(ConnectionState::Idle);
        let (status, status_rx) = watch::channel(String::from("Idle"));
        let (last_jpeg, last_jpeg_rx) = watch::channel(None);
        (
            Self {
                state,
                status,
                last_jpeg,
            },
            ObserverWatch {
                state: state_rx,
                status: status_rx,
                last_jpeg: last_jpeg_rx,
            },
        )
    }
}

impl ObserverSink for WatchObserver {
    fn notify(&self, event: ObserverEvent) {
        match event {
            ObserverEvent::StateChanged(state) => {
                self.state.send_replace(state);
            }
            ObserverEvent::Status(text) => {
                self.status.send_replace(text);
            }
            ObserverEvent::Outcome(TransferOutcome::Success(payload)) => {
                self.last_jpeg.send_replace(Some(payload));
            }
            ObserverEvent::Outcome(TransferOutcome::Invalid(_)) => {
                self.last_jpeg.send_replace(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::InvalidReason;

    #[test]
    fn watch_observer_tracks_latest_values() {
        let (observer, watch) = WatchObserver::new();
        assert_eq!(*watch.state.borrow(), ConnectionState::Idle);

        observer.notify(ObserverEvent::StateChanged(ConnectionState::Scanning));
        observer.notify(ObserverEvent::Status("Scanning".into()));
        assert_eq!(*watch.state.borrow(), ConnectionState::Scanning);
        assert_eq!(*watch.status.borrow(), "Scanning");

        let jpeg = Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]);
        observer.notify(ObserverEvent::Outcome(TransferOutcome::Success(jpeg.clone())));
        assert_eq!(*watch.last_jpeg.borrow(), Some(jpeg));

        observer.notify(ObserverEvent::Outcome(TransferOutcome::Invalid(
            InvalidReason::MissingEndMarker,
        )));
        assert_eq!(*watch.last_jpeg.borrow(), None);
    }

    #[test]
    fn channel_sink_ignores_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.notify(ObserverEvent::Status("nobody listening".into()));
    }
}
