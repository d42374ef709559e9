//! Header/body reassembly state machine.
//!
//! ```text
//!            fragment (< 8 header bytes)
//!             ┌──────┐
//!             ▼      │
//!  empty ──► header ─┘──► body ──► finalize ──► empty
//!             │            │  ▲        ▲
//!             │ bad sig    │  │ frag   │ length reached
//!             ▼            └──┘        │ or timeout
//!           empty (soft reset)         │
//! ```
//!
//! The reassembler never touches a clock. When the body phase needs an
//! inactivity timeout it mints a [`TimeoutToken`] and hands it back in
//! [`FragmentStep::BodyProgress`]; the owner schedules the timer and calls
//! [`Reassembler::on_timeout`] with that token when it fires. Only the
//! most recently minted token is honoured.

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::codec::{DEFAULT_MAX_DECLARED_LEN, validate_markers};
use crate::header::{FrameHeader, HEADER_LENGTH};
use crate::transfer::TransferOutcome;

// ── TimeoutToken ─────────────────────────────────────────────────

/// Identity of one armed inactivity timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeoutToken(u64);

impl TimeoutToken {
    #[cfg(test)]
    pub(crate) const fn from_id(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

// ── FragmentStep ─────────────────────────────────────────────────

/// What happened as a result of one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentStep {
    /// Still collecting the 8-byte header.
    HeaderProgress { received: usize },
    /// The header was rejected and the session reset.
    HeaderMismatch { signature: [u8; 4] },
    /// The header declared more bytes than the engine accepts; the
    /// session was reset.
    LengthRejected { declared: u32 },
    /// Body bytes are still missing. `timeout` replaces any previously
    /// armed timeout.
    BodyProgress {
        received: usize,
        expected: u32,
        timeout: TimeoutToken,
    },
    /// The declared length was reached and the transfer finalized.
    Finished(TransferOutcome),
}

// ── Reassembler ──────────────────────────────────────────────────

/// Owns the state of the single in-flight transfer.
///
/// `declared_len` is `Some` exactly while in the body phase, and
/// `header` is only non-empty while `declared_len` is `None`.
#[derive(Debug)]
pub struct Reassembler {
    header: Vec<u8>,
    body: BytesMut,
    declared_len: Option<u32>,
    pending_timeout: Option<TimeoutToken>,
    next_token: u64,
    max_declared_len: u32,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DECLARED_LEN)
    }
}

impl Reassembler {
    pub fn new(max_declared_len: u32) -> Self {
        Self {
            header: Vec::with_capacity(HEADER_LENGTH),
            body: BytesMut::new(),
            declared_len: None,
            pending_timeout: None,
            next_token: 0,
            max_declared_len,
        }
    }

    /// Returns `true` when no transfer bytes are held and no timeout is
    /// pending.
    pub fn is_empty(&self) -> bool {
        self.header.is_empty()
            && self.body.is_empty()
            && self.declared_len.is_none()
            && self.pending_timeout.is_none()
    }

    /// Declared payload length, once the header has been accepted.
    pub fn declared_len(&self) -> Option<u32> {
        self.declared_len
    }

    /// Number of body bytes collected so far.
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Number of header bytes collected so far.
    pub fn header_len(&self) -> usize {
        self.header.len()
    }

    /// The timeout the owner is expected to have armed, if any.
    pub fn pending_timeout(&self) -> Option<TimeoutToken> {
        self.pending_timeout
    }

    /// Drop all session state. Returns `true` if anything was discarded.
    ///
    /// Idempotent: resetting an empty session is a no-op.
    pub fn reset(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }
        self.clear();
        true
    }

    /// Feed one notify fragment.
    pub fn on_fragment(&mut self, fragment: &[u8]) -> FragmentStep {
        match self.declared_len {
            None => self.on_header_bytes(fragment),
            Some(expected) => {
                self.body.extend_from_slice(fragment);
                debug!(
                    "chunk received, total {}/{} bytes",
                    self.body.len(),
                    expected
                );
                self.after_body_growth(expected)
            }
        }
    }

    /// Handle an inactivity timeout firing.
    ///
    /// Returns `None` when `token` is stale (superseded, already
    /// finalized, or reset) so a late firing can never finalize a fresh
    /// session.
    pub fn on_timeout(&mut self, token: TimeoutToken) -> Option<TransferOutcome> {
        if self.pending_timeout != Some(token) {
            debug!(token = token.id(), "ignoring stale transfer timeout");
            return None;
        }
        self.pending_timeout = None;
        debug!(
            "chunk timeout fired, finalizing with {} bytes",
            self.body.len()
        );
        self.finalize()
    }

    // ── Phases ───────────────────────────────────────────────────

    fn on_header_bytes(&mut self, fragment: &[u8]) -> FragmentStep {
        self.header.extend_from_slice(fragment);
        if self.header.len() < HEADER_LENGTH {
            return FragmentStep::HeaderProgress {
                received: self.header.len(),
            };
        }

        let header = match FrameHeader::parse(&self.header) {
            Ok(header) => header,
            Err(_) => {
                let mut signature = [0u8; 4];
                signature.copy_from_slice(&self.header[..4]);
                warn!("unexpected frame signature {signature:02x?}");
                self.clear();
                return FragmentStep::HeaderMismatch { signature };
            }
        };

        let expected = header.length();
        if expected > self.max_declared_len {
            warn!(
                "declared length {expected} exceeds limit {}",
                self.max_declared_len
            );
            self.clear();
            return FragmentStep::LengthRejected { declared: expected };
        }

        debug!("header accepted, expecting {expected} bytes");
        self.declared_len = Some(expected);
        self.body.extend_from_slice(&self.header[HEADER_LENGTH..]);
        self.header.clear();
        self.after_body_growth(expected)
    }

    fn after_body_growth(&mut self, expected: u32) -> FragmentStep {
        if self.body.len() >= expected as usize {
            return FragmentStep::Finished(self.take_outcome(expected as usize));
        }

        let timeout = self.mint_token();
        self.pending_timeout = Some(timeout);
        FragmentStep::BodyProgress {
            received: self.body.len(),
            expected,
            timeout,
        }
    }

    /// Finalize whatever the body phase holds. `None` on an empty session.
    fn finalize(&mut self) -> Option<TransferOutcome> {
        let expected = self.declared_len?;
        Some(self.take_outcome(expected as usize))
    }

    /// Take the payload, clear the session, then validate.
    fn take_outcome(&mut self, expected: usize) -> TransferOutcome {
        let take = expected.min(self.body.len());
        let payload: Bytes = self.body.split_to(take).freeze();
        self.clear();

        match validate_markers(&payload) {
            Ok(()) => TransferOutcome::Success(payload),
            Err(reason) => TransferOutcome::Invalid(reason),
        }
    }

    fn clear(&mut self) {
        self.header.clear();
        self.body.clear();
        self.declared_len = None;
        self.pending_timeout = None;
    }

    fn mint_token(&mut self) -> TimeoutToken {
        self.next_token = self.next_token.wrapping_add(1);
        TimeoutToken(self.next_token)
    }
}

// ── Tests ────────────────────────────────────────────────────────
