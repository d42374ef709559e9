//! Offline debug tools: frame or base64-encode an image, and recover a
//! JPEG from a captured dump.

use std::fmt;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use jpeglink_core::error::LinkError;
use jpeglink_core::header::SIGNATURE;
use jpeglink_core::{encode_frame, read_frames, validate_markers};

/// Output format of [`encode_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeFormat {
    /// Header plus payload, exactly as notified over the link.
    Framed,
    /// Standard base64 text of the bare image.
    Base64,
}

/// Encode `image` for the given format.
pub fn encode_image(image: &[u8], format: EncodeFormat) -> Result<Vec<u8>, LinkError> {
    if let Err(reason) = validate_markers(image) {
        warn!("input does not look like a JPEG: {reason}");
    }
    match format {
        EncodeFormat::Framed => encode_frame(image),
        EncodeFormat::Base64 => Ok(STANDARD.encode(image).into_bytes()),
    }
}

/// Recover a JPEG from either a framed dump or base64 text.
///
/// Base64 input may contain whitespace and may be missing its padding.
/// A framed dump must hold at least one complete frame; the first is
/// returned.
pub async fn decode_input(input: &[u8]) -> Result<Vec<u8>, LinkError> {
    if input.starts_with(&SIGNATURE) {
        debug!("decoding framed dump of {} bytes", input.len());
        let frames = read_frames(input).await?;
        let Some(frame) = frames.into_iter().next() else {
            return Err(LinkError::Other("no complete frame in input".into()));
        };
        if let Err(reason) = frame.validate() {
            warn!("decoded frame is not a valid JPEG: {reason}");
        }
        return Ok(frame.payload.to_vec());
    }

    debug!("decoding base64 text of {} bytes", input.len());
    decode_base64(input)
}

fn decode_base64(input: &[u8]) -> Result<Vec<u8>, LinkError> {
    let mut text: Vec<u8> = input
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    while text.len() % 4 != 0 {
        text.push(b'=');
    }
    STANDARD
        .decode(&text)
        .map_err(|e| LinkError::Encoding(format!("invalid base64: {e}")))
}

/// Read, decode and write in one go. Returns the decoded image.
pub async fn decode_file(input: &Path, output: &Path) -> Result<Vec<u8>, LinkError> {
    let raw = tokio::fs::read(input).await?;
    let jpeg = decode_input(&raw).await?;
    tokio::fs::write(output, &jpeg).await?;
    Ok(jpeg)
}

/// Read, encode and write in one go. Returns the number of bytes written.
pub async fn encode_file(
    input: &Path,
    output: &Path,
    format: EncodeFormat,
) -> Result<usize, LinkError> {
    let image = tokio::fs::read(input).await?;
    let encoded = encode_image(&image, format)?;
    tokio::fs::write(output, &encoded).await?;
    Ok(encoded.len())
}

// ── Summary ──────────────────────────────────────────────────────

/// Size and marker bytes of an image, for quick inspection.
pub struct ImageSummary<'a>(pub &'a [u8]);

impl fmt::Display for ImageSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;
        let head = &bytes[..bytes.len().min(4)];
        let tail = &bytes[bytes.len().saturating_sub(2)..];
        write!(f, "{} bytes, first: ", bytes.len())?;
        write_hex(f, head)?;
        write!(f, ", last: ")?;
        write_hex(f, tail)
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{b:02X}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9];

    #[tokio::test]
    async fn framed_dump_decodes() {
        let framed = encode_image(JPEG, EncodeFormat::Framed).unwrap();
        assert_eq!(&framed[..4], b"JPEG");
        assert_eq!(decode_input(&framed).await.unwrap(), JPEG);
    }

    #[tokio::test]
    async fn base64_with_whitespace_and_missing_padding() {
        let text = String::from_utf8(encode_image(JPEG, EncodeFormat::Base64).unwrap()).unwrap();
        assert_eq!(text, "/9gBAv/Z");

        let jpeg = &[0xFF, 0xD8, 0xFF, 0xD9];
        // "/9j/2Q==" with padding stripped and line breaks added.
        assert_eq!(decode_input(b"/9j/\n2Q\r\n").await.unwrap(), jpeg);
    }

    #[tokio::test]
    async fn garbage_base64_is_an_encoding_error() {
        assert!(matches!(
            decode_input(b"!!!!").await,
            Err(LinkError::Encoding(_))
        ));
    }

    #[tokio::test]
    async fn truncated_frame_is_rejected() {
        let framed = encode_image(JPEG, EncodeFormat::Framed).unwrap();
        assert!(decode_input(&framed[..framed.len() - 1]).await.is_err());
    }

    #[tokio::test]
    async fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("in.jpg");
        let dump = dir.path().join("dump.b64");
        let out = dir.path().join("out.jpg");
        std::fs::write(&image, JPEG).unwrap();

        encode_file(&image, &dump, EncodeFormat::Base64).await.unwrap();
        let decoded = decode_file(&dump, &out).await.unwrap();
        assert_eq!(decoded, JPEG);
        assert_eq!(std::fs::read(&out).unwrap(), JPEG);
    }

    #[test]
    fn summary_shows_markers() {
        assert_eq!(
            ImageSummary(JPEG).to_string(),
            "6 bytes, first: FF D8 01 02, last: FF D9"
        );
        assert_eq!(ImageSummary(&[]).to_string(), "0 bytes, first: , last: ");
    }
}
