//! Connection lifecycle state.
//!
//! Provides a `ConnectionState` enum that models the lifecycle of the
//! link to the camera peripheral, with validated transitions that return
//! `Result` instead of panicking.

use std::fmt;

use crate::error::LinkError;

// ── ConnectionState ──────────────────────────────────────────────

/// The current phase of the link to the peripheral.
///
/// ```text
///                 ┌──────────── link lost ─────────────────────────┐
///                 ▼                                                │
///  Idle ──► Scanning ──► Connecting ──► Connected ──► Discovering ──► Subscribed
///   ▲          ▲             │               │              │
///   │          └── rescan ── Error ◄─────────┴──────────────┘
///   │
///  TransportUnavailable  (adapter off / unauthorized, from any state)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Nothing in progress. Initial state.
    #[default]
    Idle,

    /// The adapter is off, unauthorized or unsupported.
    TransportUnavailable,

    /// Discovery running with the service filter.
    Scanning,

    /// Link requested to a discovered peripheral.
    Connecting,

    /// Link up; service discovery requested.
    Connected,

    /// Service found; characteristic discovery / subscription pending.
    Discovering,

    /// Notifications enabled on the data characteristic.
    Subscribed,

    /// Link or discovery failed.
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::TransportUnavailable => write!(f, "TransportUnavailable"),
            Self::Scanning => write!(f, "Scanning"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Discovering => write!(f, "Discovering"),
            Self::Subscribed => write!(f, "Subscribed"),
            Self::Error => write!(f, "Error"),
        }
    }
}

impl ConnectionState {
    /// Returns `true` while a link to the peripheral exists or is being
    /// established.
    pub fn has_link(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Connected | Self::Discovering | Self::Subscribed
        )
    }

    /// Returns `true` when a transfer may be requested.
    pub fn is_subscribed(&self) -> bool {
        matches!(self, Self::Subscribed)
    }

    fn invalid(&self, event: &'static str) -> LinkError {
        LinkError::InvalidTransition {
            state: *self,
            event,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Scanning`.
    ///
    /// Valid from: `Idle`, `Error`, `Scanning`.
    pub fn begin_scan(&mut self) -> Result<(), LinkError> {
        match self {
            Self::Idle | Self::Error | Self::Scanning => {
                *self = Self::Scanning;
                Ok(())
            }
            _ => Err(self.invalid("begin scan")),
        }
    }

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Scanning`.
    pub fn begin_connect(&mut self) -> Result<(), LinkError> {
        match self {
            Self::Scanning => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(self.invalid("target discovered")),
        }
    }

    /// Transition to `Connected`.
    ///
    /// Valid from: `Connecting`.
    pub fn link_established(&mut self) -> Result<(), LinkError> {
        match self {
            Self::Connecting => {
                *self = Self::Connected;
                Ok(())
            }
            _ => Err(self.invalid("link established")),
        }
    }

    /// Transition to `Error` after a failed link attempt.
    ///
    /// Valid from: `Connecting`.
    pub fn link_failed(&mut self) -> Result<(), LinkError> {
        match self {
            Self::Connecting => {
                *self = Self::Error;
                Ok(())
            }
            _ => Err(self.invalid("link failed")),
        }
    }

    /// Transition to `Discovering`.
    ///
    /// Valid from: `Connected`.
    pub fn service_found(&mut self) -> Result<(), LinkError> {
        match self {
            Self::Connected => {
                *self = Self::Discovering;
                Ok(())
            }
            _ => Err(self.invalid("service found")),
        }
    }

    /// Transition to `Subscribed`.
    ///
    /// Valid from: `Discovering`, `Subscribed`.
    pub fn notifications_enabled(&mut self) -> Result<(), LinkError> {
        match self {
            Self::Discovering | Self::Subscribed => {
                *self = Self::Subscribed;
                Ok(())
            }
            _ => Err(self.invalid("notifications enabled")),
        }
    }

    /// Transition to `Error` after service or characteristic discovery
    /// failed.
    ///
    /// Valid from: `Connected`, `Discovering`.
    pub fn discovery_failed(&mut self) -> Result<(), LinkError> {
        match self {
            Self::Connected | Self::Discovering => {
                *self = Self::Error;
                Ok(())
            }
            _ => Err(self.invalid("discovery failed")),
        }
    }

    /// Transition to `Idle` after the link dropped.
    ///
    /// Valid from any state with a link.
    pub fn link_lost(&mut self) -> Result<(), LinkError> {
        if self.has_link() {
            *self = Self::Idle;
            Ok(())
        } else {
            Err(self.invalid("link lost"))
        }
    }

    /// Transition to `Idle` once the adapter reports ready (or resetting).
    ///
    /// Valid from any state without a link.
    pub fn adapter_settled(&mut self) -> Result<(), LinkError> {
        if self.has_link() {
            Err(self.invalid("adapter ready"))
        } else {
            *self = Self::Idle;
            Ok(())
        }
    }

    /// Force `TransportUnavailable` regardless of current state.
    pub fn adapter_unavailable(&mut self) {
        *self = Self::TransportUnavailable;
    }

    /// Force-reset to `Idle` regardless of current state.
    pub fn force_idle(&mut self) {
        *self = Self::Idle;
    }
}

// ── Tests ────────────────────────────────────────────────────────
