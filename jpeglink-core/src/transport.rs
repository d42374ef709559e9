//! Narrow interface to the BLE stack.
//!
//! The engine never talks to a radio. Everything the stack reports comes
//! in as a [`TransportEvent`]; everything the engine wants done goes out
//! as a [`TransportCommand`] through a [`TransportAdapter`]. Commands are
//! fire-and-forget: their completions come back later as events.

use std::fmt;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::LinkError;

// ── Identifiers ──────────────────────────────────────────────────

/// Opaque identifier the transport uses for a discovered peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeripheralId(pub String);

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeripheralId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A discovered GATT characteristic: its UUID and attribute handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicHandle {
    pub uuid: Uuid,
    pub handle: u16,
}

/// Power / permission state of the local adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    PoweredOn,
    PoweredOff,
    Unauthorized,
    Unsupported,
    /// Transient; the stack will report again once settled.
    Resetting,
}

impl AdapterState {
    /// Off, unauthorized or unsupported.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::PoweredOff | Self::Unauthorized | Self::Unsupported)
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoweredOn => write!(f, "powered on"),
            Self::PoweredOff => write!(f, "powered off"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::Resetting => write!(f, "resetting"),
        }
    }
}

// ── Events ───────────────────────────────────────────────────────

/// Everything the BLE stack reports to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    AdapterStateChanged(AdapterState),
    Discovered {
        peripheral: PeripheralId,
        name: Option<String>,
    },
    Linked {
        peripheral: PeripheralId,
    },
    LinkFailed {
        peripheral: PeripheralId,
        reason: String,
    },
    Disconnected {
        peripheral: PeripheralId,
        reason: Option<String>,
    },
    /// Result of `DiscoverServices`: the service UUIDs present.
    ServicesDiscovered {
        peripheral: PeripheralId,
        result: Result<Vec<Uuid>, String>,
    },
    /// Result of `DiscoverCharacteristics` for `service`.
    CharacteristicsDiscovered {
        service: Uuid,
        result: Result<Vec<CharacteristicHandle>, String>,
    },
    /// Notification state changed; `Ok(true)` means notifying.
    SubscriptionChanged {
        characteristic: CharacteristicHandle,
        result: Result<bool, String>,
    },
    /// One notify payload.
    Fragment {
        characteristic: CharacteristicHandle,
        bytes: Bytes,
    },
    /// Completion of an acknowledged write.
    WriteCompleted {
        characteristic: CharacteristicHandle,
        result: Result<(), String>,
    },
}

// ── Commands ─────────────────────────────────────────────────────

/// Everything the engine asks the BLE stack to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    StartDiscovery {
        service: Uuid,
    },
    StopDiscovery,
    Connect {
        peripheral: PeripheralId,
    },
    Disconnect {
        peripheral: PeripheralId,
    },
    DiscoverServices {
        peripheral: PeripheralId,
        services: Vec<Uuid>,
    },
    DiscoverCharacteristics {
        peripheral: PeripheralId,
        service: Uuid,
        characteristics: Vec<Uuid>,
    },
    SetNotify {
        peripheral: PeripheralId,
        characteristic: CharacteristicHandle,
        enabled: bool,
    },
    Write {
        peripheral: PeripheralId,
        characteristic: CharacteristicHandle,
        payload: Bytes,
        with_response: bool,
    },
}

// ── TransportAdapter ─────────────────────────────────────────────

/// Accepts outbound commands. Must not block.
pub trait TransportAdapter: Send + 'static {
    fn submit(&mut self, command: TransportCommand) -> Result<(), LinkError>;
}

impl TransportAdapter for mpsc::UnboundedSender<TransportCommand> {
    fn submit(&mut self, command: TransportCommand) -> Result<(), LinkError> {
        self.send(command)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_adapter_forwards_commands() {
        let (mut tx, mut rx) = mpsc::unbounded_channel();
        tx.submit(TransportCommand::StopDiscovery).unwrap();
        assert_eq!(rx.try_recv().unwrap(), TransportCommand::StopDiscovery);

        drop(rx);
        assert!(matches!(
            tx.submit(TransportCommand::StopDiscovery),
            Err(LinkError::ChannelClosed)
        ));
    }

    #[test]
    fn unavailable_adapter_states() {
        assert!(AdapterState::PoweredOff.is_unavailable());
        assert!(AdapterState::Unauthorized.is_unavailable());
        assert!(AdapterState::Unsupported.is_unavailable());
        assert!(!AdapterState::Resetting.is_unavailable());
        assert!(!AdapterState::PoweredOn.is_unavailable());
    }
}
