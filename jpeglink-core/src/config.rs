//! Engine configuration.

use std::time::Duration;

use bytes::Bytes;
use uuid::Uuid;

use crate::codec::DEFAULT_MAX_DECLARED_LEN;

/// Expand a 16-bit assigned number onto the Bluetooth base UUID.
pub const fn uuid_from_u16(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_0080_5F9B_34FB)
}

/// Service advertised by the camera peripheral (0xFE55).
pub const JPEG_SERVICE_UUID: Uuid = uuid_from_u16(0xFE55);

/// Write-with-response characteristic that accepts the trigger command.
pub const CONTROL_CHAR_UUID: Uuid = Uuid::from_u128(0xbeb5483e_36e1_4688_b7f5_ea07361b26a8);

/// Notify characteristic that carries the framed JPEG.
pub const JPEG_CHAR_UUID: Uuid = Uuid::from_u128(0xc9d1cba2_1f32_4fb0_b6bc_9b73c7d8b4e2);

/// Literal written to the control characteristic to start a transfer.
pub const TRIGGER_COMMAND: &[u8] = b"SEND_JPEG";

/// Inactivity window after which a stalled body is finalized.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_millis(350);

/// Configuration for [`LinkEngine`](crate::engine::LinkEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Body-phase inactivity timeout.
    pub inactivity_timeout: Duration,
    /// Bytes written to the control characteristic by `request_transfer`.
    pub trigger_command: Bytes,
    /// Service used as the discovery filter.
    pub service_uuid: Uuid,
    /// Control (write) characteristic.
    pub control_uuid: Uuid,
    /// Data (notify) characteristic.
    pub data_uuid: Uuid,
    /// Headers declaring more than this many bytes are rejected.
    pub max_declared_len: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            trigger_command: Bytes::from_static(TRIGGER_COMMAND),
            service_uuid: JPEG_SERVICE_UUID,
            control_uuid: CONTROL_CHAR_UUID,
            data_uuid: JPEG_CHAR_UUID,
            max_declared_len: DEFAULT_MAX_DECLARED_LEN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_uuid_expands_onto_base() {
        assert_eq!(
            JPEG_SERVICE_UUID.to_string(),
            "0000fe55-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn characteristic_uuids() {
        assert_eq!(
            CONTROL_CHAR_UUID.to_string(),
            "beb5483e-36e1-4688-b7f5-ea07361b26a8"
        );
        assert_eq!(
            JPEG_CHAR_UUID.to_string(),
            "c9d1cba2-1f32-4fb0-b6bc-9b73c7d8b4e2"
        );
    }

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.inactivity_timeout, Duration::from_millis(350));
        assert_eq!(&cfg.trigger_command[..], b"SEND_JPEG");
    }
}
