//! Domain-specific error types for the jpeglink engine.
//!
//! Fallible operations return `Result<T, LinkError>`. A rejected transfer
//! is *not* an error: it is reported as
//! [`TransferOutcome::Invalid`](crate::transfer::TransferOutcome) through
//! the observer sink.

use thiserror::Error;

/// The canonical error type for the jpeglink engine.
#[derive(Debug, Error)]
pub enum LinkError {
    // ── Framing Errors ───────────────────────────────────────────
    /// The 4-byte frame signature was not `JPEG`.
    #[error("invalid frame signature: {0:02x?}")]
    InvalidSignature([u8; 4]),

    /// Fewer bytes than a full header were supplied to the parser.
    #[error("header too short: expected {expected} bytes, got {actual}")]
    HeaderTooShort { expected: usize, actual: usize },

    /// The declared payload length is larger than the configured cap.
    #[error("declared length too large: {declared} bytes (max {max})")]
    DeclaredLengthTooLarge { declared: u32, max: u32 },

    /// The payload is too large to be described by a 32-bit length.
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    // ── Lifecycle Errors ─────────────────────────────────────────
    /// A connection state transition was attempted from the wrong state.
    #[error("invalid transition: {event} while {state}")]
    InvalidTransition {
        state: crate::state::ConnectionState,
        event: &'static str,
    },

    /// `request_transfer` was called without a subscribed peripheral.
    #[error("peripheral unavailable for transfer request")]
    TargetUnavailable,

    // ── Transport Errors ─────────────────────────────────────────
    /// The transport adapter rejected an outbound command.
    #[error("transport error: {0}")]
    Transport(String),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// Reading or writing a dump file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    // ── Encoding Errors ──────────────────────────────────────────
    /// Text input could not be decoded (base64, TOML, ...).
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for LinkError {
    fn from(s: String) -> Self {
        LinkError::Other(s)
    }
}

impl From<&str> for LinkError {
    fn from(s: &str) -> Self {
        LinkError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for LinkError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        LinkError::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConnectionState;

    #[test]
    fn error_display_messages() {
        let e = LinkError::InvalidSignature(*b"PNG!");
        assert!(e.to_string().contains("signature"));

        let e = LinkError::DeclaredLengthTooLarge {
            declared: 1000,
            max: 500,
        };
        assert!(e.to_string().contains("1000"));
        assert!(e.to_string().contains("500"));

        let e = LinkError::InvalidTransition {
            state: ConnectionState::Idle,
            event: "link established",
        };
        assert_eq!(e.to_string(), "invalid transition: link established while Idle");
    }

    #[test]
    fn from_string() {
        let e: LinkError = "something broke".into();
        assert!(matches!(e, LinkError::Other(_)));
    }

    #[test]
    fn from_send_error() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<u8>();
        drop(rx);
        let e: LinkError = tx.send(1).unwrap_err().into();
        assert!(matches!(e, LinkError::ChannelClosed));
    }
}
