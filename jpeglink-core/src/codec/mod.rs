//! Frame codec for the JPEG-over-notify wire format.
//!
//! ```text
//! ┌──────────────┬──────────────────┬───────────────────────────────┐
//! │ "JPEG" (4B)  │ length u32 BE    │ JPEG bytes  FF D8 ... FF D9   │
//! └──────────────┴──────────────────┴───────────────────────────────┘
//! ```
//!
//! [`validate_markers`] is the check applied to a finalized transfer.
//! [`JpegFrameCodec`] frames and deframes whole transfers on a contiguous
//! byte stream (the peripheral side, and captured dumps); live BLE
//! fragments go through the
//! [`Reassembler`](crate::transfer::Reassembler) instead, since a stalled
//! notify stream never signals end-of-message.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::TryStreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, Encoder, FramedRead};

use crate::error::LinkError;
use crate::header::{FrameHeader, HEADER_LENGTH};
use crate::transfer::InvalidReason;

/// JPEG start-of-image marker.
pub const START_MARKER: [u8; 2] = [0xFF, 0xD8];

/// JPEG end-of-image marker.
pub const END_MARKER: [u8; 2] = [0xFF, 0xD9];

/// Largest declared length the decoder accepts by default (8 MiB).
pub const DEFAULT_MAX_DECLARED_LEN: u32 = 8 * 1024 * 1024;

/// Check that `payload` opens with [`START_MARKER`] and closes with
/// [`END_MARKER`].
///
/// Only the markers are inspected; the bytes in between are never
/// validated.
pub fn validate_markers(payload: &[u8]) -> Result<(), InvalidReason> {
    if payload.len() < START_MARKER.len() {
        return Err(InvalidReason::TooShort { len: payload.len() });
    }
    if !payload.starts_with(&START_MARKER) {
        return Err(InvalidReason::MissingStartMarker);
    }
    if !payload.ends_with(&END_MARKER) {
        return Err(InvalidReason::MissingEndMarker);
    }
    Ok(())
}

/// Build the full wire representation of `payload`.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, LinkError> {
    let mut dst = BytesMut::with_capacity(HEADER_LENGTH + payload.len());
    JpegFrameCodec::default().encode(payload, &mut dst)?;
    Ok(dst.to_vec())
}

/// Decode every frame from a captured stream.
///
/// Fails if the stream ends in the middle of a frame.
pub async fn read_frames<R>(reader: R) -> Result<Vec<JpegFrame>, LinkError>
where
    R: AsyncRead + Unpin,
{
    FramedRead::new(reader, JpegFrameCodec::default())
        .try_collect()
        .await
}

// ── JpegFrame ────────────────────────────────────────────────────

/// One complete frame taken off a contiguous stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegFrame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl JpegFrame {
    /// Apply the marker check to this frame's payload.
    pub fn validate(&self) -> Result<(), InvalidReason> {
        validate_markers(&self.payload)
    }
}

// ── JpegFrameCodec ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct JpegFrameCodec {
    max_declared_len: u32,
}

impl JpegFrameCodec {
    pub fn new(max_declared_len: u32) -> Self {
        Self { max_declared_len }
    }
}

impl Default for JpegFrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DECLARED_LEN)
    }
}

impl Decoder for JpegFrameCodec {
    type Item = JpegFrame;
    type Error = LinkError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LENGTH {
            return Ok(None);
        }

        let header = FrameHeader::parse(&src[..HEADER_LENGTH])?;
        if header.length() > self.max_declared_len {
            return Err(LinkError::DeclaredLengthTooLarge {
                declared: header.length(),
                max: self.max_declared_len,
            });
        }

        let frame_len = HEADER_LENGTH + header.length() as usize;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LENGTH);
        let payload = src.split_to(header.length() as usize).freeze();
        Ok(Some(JpegFrame { header, payload }))
    }
}

impl Encoder<&[u8]> for JpegFrameCodec {
    type Error = LinkError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        let length = u32::try_from(item.len()).map_err(|_| LinkError::PayloadTooLarge(item.len()))?;
        dst.reserve(HEADER_LENGTH + item.len());
        dst.put_slice(&FrameHeader::new(length).to_bytes());
        dst.put_slice(item);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
