use crate::error::LinkError;

/// ASCII signature that opens every frame.
pub const SIGNATURE: [u8; 4] = *b"JPEG";

/// Size of the frame header on the wire: signature (4) + length (4).
pub const HEADER_LENGTH: usize = 8;

pub type FrameHeaderBytes = [u8; HEADER_LENGTH];

/// The 8-byte header that precedes every JPEG payload.
///
/// ```text
/// bytes 0..4   signature  "JPEG"
/// bytes 4..8   length     u32, big-endian
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    signature: [u8; 4],
    length: u32,
}

impl FrameHeader {
    pub fn new(length: u32) -> Self {
        Self {
            signature: SIGNATURE,
            length,
        }
    }

    pub fn to_bytes(&self) -> FrameHeaderBytes {
        let mut header: FrameHeaderBytes = [0; HEADER_LENGTH];
        header[0..4].copy_from_slice(&self.signature);
        header[4..8].copy_from_slice(&self.length.to_be_bytes());
        header
    }

    pub fn from_bytes(bytes: FrameHeaderBytes) -> Result<Self, LinkError> {
        let mut signature = [0u8; 4];
        signature.copy_from_slice(&bytes[0..4]);
        if signature != SIGNATURE {
            return Err(LinkError::InvalidSignature(signature));
        }

        let mut length = [0u8; 4];
        length.copy_from_slice(&bytes[4..8]);
        Ok(Self {
            signature,
            length: u32::from_be_bytes(length),
        })
    }

    /// Parse the first [`HEADER_LENGTH`] bytes of `bytes`; anything after
    /// them is ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self, LinkError> {
        let Some(head) = bytes.get(..HEADER_LENGTH) else {
            return Err(LinkError::HeaderTooShort {
                expected: HEADER_LENGTH,
                actual: bytes.len(),
            });
        };
        let mut header: FrameHeaderBytes = [0; HEADER_LENGTH];
        header.copy_from_slice(head);
        Self::from_bytes(header)
    }

    pub fn signature(&self) -> [u8; 4] {
        self.signature
    }

    pub fn length(&self) -> u32 {
        self.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_big_endian_length() {
        let header = FrameHeader::parse(&[0x4A, 0x50, 0x45, 0x47, 0x00, 0x01, 0x02, 0x03]).unwrap();
        assert_eq!(header.signature(), *b"JPEG");
        assert_eq!(header.length(), 0x0001_0203);
    }

    #[test]
    fn rejects_wrong_signature() {
        let err = FrameHeader::parse(b"JPEx\x00\x00\x00\x04").unwrap_err();
        assert!(matches!(err, LinkError::InvalidSignature(sig) if &sig == b"JPEx"));
    }

    #[test]
    fn short_input_is_an_error() {
        let err = FrameHeader::parse(b"JPEG\x00").unwrap_err();
        assert!(matches!(
            err,
            LinkError::HeaderTooShort {
                expected: 8,
                actual: 5
            }
        ));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let header = FrameHeader::parse(b"JPEG\x00\x00\x00\x04\xFF\xD8").unwrap();
        assert_eq!(header.length(), 4);
    }

    #[test]
    fn to_bytes_matches_wire_layout() {
        assert_eq!(
            FrameHeader::new(4).to_bytes(),
            [0x4A, 0x50, 0x45, 0x47, 0x00, 0x00, 0x00, 0x04]
        );
    }
}
