//! Transfer reassembly: turns a stream of notify fragments back into one
//! validated JPEG payload.
//!
//! | Type               | Purpose                                          |
//! |--------------------|--------------------------------------------------|
//! | [`Reassembler`]    | Header/body accumulation and finalize decisions  |
//! | [`FragmentStep`]   | What the caller must do after a fragment         |
//! | [`TransferOutcome`]| The single result of one armed transfer          |
//! | [`TimeoutToken`]   | Identity of one armed inactivity timeout         |

mod reassembler;

use std::fmt;

use bytes::Bytes;

pub use reassembler::{FragmentStep, Reassembler, TimeoutToken};

// ── InvalidReason ────────────────────────────────────────────────

/// Why a finalized transfer was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// Fewer bytes than a start marker were collected.
    TooShort { len: usize },
    /// The payload does not open with `FF D8`.
    MissingStartMarker,
    /// The payload does not close with `FF D9`.
    MissingEndMarker,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { len } => write!(f, "payload too short ({len} bytes)"),
            Self::MissingStartMarker => write!(f, "missing start-of-image marker"),
            Self::MissingEndMarker => write!(f, "missing end-of-image marker"),
        }
    }
}

// ── TransferOutcome ──────────────────────────────────────────────

/// Result of one armed transfer, emitted exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Both markers matched; `payload` is exactly the bytes taken.
    Success(Bytes),
    /// Marker validation failed; no payload is exposed.
    Invalid(InvalidReason),
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            Self::Success(payload) => Some(payload),
            Self::Invalid(_) => None,
        }
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(payload) => write!(f, "JPEG received ({} bytes)", payload.len()),
            Self::Invalid(reason) => write!(f, "JPEG invalid ({reason})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_payload_only_on_success() {
        let ok = TransferOutcome::Success(Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]));
        assert!(ok.is_success());
        assert_eq!(ok.payload().map(|p| p.len()), Some(4));

        let bad = TransferOutcome::Invalid(InvalidReason::MissingEndMarker);
        assert!(!bad.is_success());
        assert!(bad.payload().is_none());
    }

    #[test]
    fn outcome_display() {
        let ok = TransferOutcome::Success(Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]));
        assert_eq!(ok.to_string(), "JPEG received (4 bytes)");

        let bad = TransferOutcome::Invalid(InvalidReason::TooShort { len: 1 });
        assert_eq!(bad.to_string(), "JPEG invalid (payload too short (1 bytes))");
    }
}
