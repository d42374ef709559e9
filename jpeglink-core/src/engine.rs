//! The serial execution context.
//!
//! A [`LinkEngine`] is one tokio task that owns the [`LifecycleController`]
//! and drains a single queue of [`EngineInput`]. Caller requests, transport
//! events and timer firings all go through that queue, so every mutation
//! of the connection and transfer state happens one at a time, in arrival
//! order, without locks.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::LinkError;
use crate::observer::{ObserverEvent, ObserverSink};
use crate::state::{Effects, LifecycleController, TimerAction};
use crate::timer::TimeoutSlot;
use crate::transfer::TimeoutToken;
use crate::transport::{TransportAdapter, TransportEvent};

// ── Inputs ───────────────────────────────────────────────────────

#[derive(Debug)]
pub enum EngineInput {
    Start,
    Stop,
    RequestTransfer,
    Transport(TransportEvent),
    TimeoutFired(TimeoutToken),
    /// Stop, then end the actor task.
    Shutdown,
}

// ── EngineHandle ─────────────────────────────────────────────────

/// Cloneable handle to a running engine. Every method only enqueues.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineInput>,
}

impl EngineHandle {
    pub fn start(&self) -> Result<(), LinkError> {
        self.send(EngineInput::Start)
    }

    pub fn stop(&self) -> Result<(), LinkError> {
        self.send(EngineInput::Stop)
    }

    pub fn request_transfer(&self) -> Result<(), LinkError> {
        self.send(EngineInput::RequestTransfer)
    }

    /// Hand a transport event to the engine.
    pub fn deliver(&self, event: TransportEvent) -> Result<(), LinkError> {
        self.send(EngineInput::Transport(event))
    }

    pub fn shutdown(&self) -> Result<(), LinkError> {
        self.send(EngineInput::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, input: EngineInput) -> Result<(), LinkError> {
        self.tx.send(input)?;
        Ok(())
    }
}

/// Receiving side of the engine queue, consumed by [`LinkEngine::new`].
#[derive(Debug)]
pub struct EngineInbox {
    rx: mpsc::UnboundedReceiver<EngineInput>,
    timer_tx: mpsc::WeakUnboundedSender<EngineInput>,
}

impl EngineInbox {
    pub async fn recv(&mut self) -> Option<EngineInput> {
        self.rx.recv().await
    }
}

/// Create the engine queue before the engine itself, for transports that
/// need a handle to deliver their events.
pub fn engine_channel() -> (EngineHandle, EngineInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    let timer_tx = tx.downgrade();
    (EngineHandle { tx }, EngineInbox { rx, timer_tx })
}

// ── LinkEngine ───────────────────────────────────────────────────

pub struct LinkEngine<T, O> {
    core: LifecycleController,
    transport: T,
    observer: O,
    timer: TimeoutSlot,
    inactivity_timeout: Duration,
    inbox: EngineInbox,
}

impl<T, O> LinkEngine<T, O>
where
    T: TransportAdapter,
    O: ObserverSink,
{
    pub fn new(config: EngineConfig, transport: T, observer: O, inbox: EngineInbox) -> Self {
        let inactivity_timeout = config.inactivity_timeout;
        Self {
            core: LifecycleController::new(config),
            transport,
            observer,
            timer: TimeoutSlot::new(),
            inactivity_timeout,
            inbox,
        }
    }

    /// Create the queue and spawn the actor in one step.
    pub fn spawn(config: EngineConfig, transport: T, observer: O) -> (EngineHandle, JoinHandle<()>) {
        let (handle, inbox) = engine_channel();
        let task = Self::new(config, transport, observer, inbox).spawn_task();
        (handle, task)
    }

    pub fn spawn_task(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drain the queue until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        info!("link engine started");
        while let Some(input) = self.inbox.recv().await {
            if !self.handle(input) {
                break;
            }
        }
        self.timer.cancel();
        info!("link engine stopped");
    }

    /// Process one input. Returns `false` once the engine should exit.
    fn handle(&mut self, input: EngineInput) -> bool {
        let effects = match input {
            EngineInput::Start => self.core.start(),
            EngineInput::Stop => self.core.stop(),
            EngineInput::RequestTransfer => match self.core.request_transfer() {
                Ok(effects) => effects,
                Err(e) => {
                    warn!("transfer request rejected: {e}");
                    self.observer
                        .notify(ObserverEvent::Status("Peripheral unavailable for JPEG request".into()));
                    return true;
                }
            },
            EngineInput::Transport(event) => self.core.on_event(event),
            EngineInput::TimeoutFired(token) => {
                if !self.timer.fired(token) {
                    debug!(token = token.id(), "ignoring superseded timer firing");
                    return true;
                }
                self.core.on_timeout(token)
            }
            EngineInput::Shutdown => {
                let effects = self.core.stop();
                self.apply(effects);
                return false;
            }
        };
        self.apply(effects);
        true
    }

    fn apply(&mut self, effects: Effects) {
        for event in effects.events {
            self.observer.notify(event);
        }

        for command in effects.commands {
            debug!(?command, "submitting transport command");
            if let Err(e) = self.transport.submit(command) {
                warn!("transport rejected command: {e}");
                self.observer
                    .notify(ObserverEvent::Status(format!("Transport error: {e}")));
            }
        }

        match effects.timer {
            Some(TimerAction::Arm(token)) => {
                let timer_tx = self.inbox.timer_tx.clone();
                self.timer.arm(token, self.inactivity_timeout, move |token| {
                    if let Some(tx) = timer_tx.upgrade() {
                        let _ = tx.send(EngineInput::TimeoutFired(token));
                    }
                });
            }
            Some(TimerAction::Cancel) => {
                self.timer.cancel();
            }
            None => {}
        }
    }
}
