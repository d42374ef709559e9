//! In-process simulated camera peripheral.
//!
//! [`SimPeripheral`] implements [`TransportAdapter`] by answering each
//! command with the event a real BLE stack would report, delivered back
//! through an [`EngineHandle`]. On a trigger write it streams the framed
//! image as MTU-sized notifications from a background task. Used by the
//! integration tests and by `jpeglink simulate`.

use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::codec::encode_frame;
use crate::config::{CONTROL_CHAR_UUID, JPEG_CHAR_UUID, JPEG_SERVICE_UUID, TRIGGER_COMMAND};
use crate::engine::EngineHandle;
use crate::error::LinkError;
use crate::transport::{
    AdapterState, CharacteristicHandle, PeripheralId, TransportAdapter, TransportCommand,
    TransportEvent,
};

/// Attribute handle of the simulated control characteristic.
pub const CONTROL_HANDLE: u16 = 0x0010;
/// Attribute handle of the simulated data characteristic.
pub const DATA_HANDLE: u16 = 0x0012;

/// Behaviour of the simulated peripheral.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub peripheral: PeripheralId,
    /// Advertised local name.
    pub name: String,
    /// Image sent on each trigger.
    pub image: Bytes,
    /// Maximum notification payload.
    pub mtu: usize,
    /// Delay before each notification.
    pub fragment_interval: Duration,
    /// Drop this many bytes from the end of the wire stream.
    pub truncate_tail: usize,
    /// Fail this many connect attempts before succeeding.
    pub fail_first_connects: usize,
    pub service_uuid: Uuid,
    pub control_uuid: Uuid,
    pub data_uuid: Uuid,
    pub trigger_command: Bytes,
}

impl SimConfig {
    pub fn new(image: impl Into<Bytes>) -> Self {
        Self {
            peripheral: PeripheralId::from("sim-0"),
            name: "M5CoreS3".to_string(),
            image: image.into(),
            mtu: 180,
            fragment_interval: Duration::from_millis(5),
            truncate_tail: 0,
            fail_first_connects: 0,
            service_uuid: JPEG_SERVICE_UUID,
            control_uuid: CONTROL_CHAR_UUID,
            data_uuid: JPEG_CHAR_UUID,
            trigger_command: Bytes::from_static(TRIGGER_COMMAND),
        }
    }

    fn control(&self) -> CharacteristicHandle {
        CharacteristicHandle {
            uuid: self.control_uuid,
            handle: CONTROL_HANDLE,
        }
    }

    fn data(&self) -> CharacteristicHandle {
        CharacteristicHandle {
            uuid: self.data_uuid,
            handle: DATA_HANDLE,
        }
    }

    /// The bytes the peripheral notifies for one transfer, after
    /// truncation.
    pub fn wire(&self) -> Result<Bytes, LinkError> {
        let mut wire = Bytes::from(encode_frame(&self.image)?);
        let keep = wire.len().saturating_sub(self.truncate_tail);
        wire.truncate(keep);
        Ok(wire)
    }
}

pub struct SimPeripheral {
    config: SimConfig,
    engine: EngineHandle,
    connected: bool,
    notifying: bool,
    connect_attempts: usize,
    streaming: Option<JoinHandle<()>>,
}

impl SimPeripheral {
    pub fn new(config: SimConfig, engine: EngineHandle) -> Self {
        Self {
            config,
            engine,
            connected: false,
            notifying: false,
            connect_attempts: 0,
            streaming: None,
        }
    }

    /// Report the adapter as powered on.
    pub fn power_on(&self) -> Result<(), LinkError> {
        self.engine
            .deliver(TransportEvent::AdapterStateChanged(AdapterState::PoweredOn))
    }

    fn reply(&self, event: TransportEvent) -> Result<(), LinkError> {
        self.engine.deliver(event)
    }

    fn stop_streaming(&mut self) {
        if let Some(task) = self.streaming.take() {
            task.abort();
        }
    }

    fn start_streaming(&mut self) -> Result<(), LinkError> {
        self.stop_streaming();

        let wire = self.config.wire()?;
        let mtu = self.config.mtu.max(1);
        let interval = self.config.fragment_interval;
        let characteristic = self.config.data();
        let engine = self.engine.clone();
        info!(
            "streaming {} bytes in {} notifications",
            wire.len(),
            wire.len().div_ceil(mtu)
        );

        self.streaming = Some(tokio::spawn(async move {
            let mut offset = 0;
            while offset < wire.len() {
                tokio::time::sleep(interval).await;
                let end = (offset + mtu).min(wire.len());
                let event = TransportEvent::Fragment {
                    characteristic,
                    bytes: wire.slice(offset..end),
                };
                if engine.deliver(event).is_err() {
                    debug!("engine gone, stopping stream");
                    return;
                }
                offset = end;
            }
        }));
        Ok(())
    }
}

impl TransportAdapter for SimPeripheral {
    fn submit(&mut self, command: TransportCommand) -> Result<(), LinkError> {
        match command {
            TransportCommand::StartDiscovery { service } => {
                if service == self.config.service_uuid && !self.connected {
                    self.reply(TransportEvent::Discovered {
                        peripheral: self.config.peripheral.clone(),
                        name: Some(self.config.name.clone()),
                    })?;
                }
            }
            TransportCommand::StopDiscovery => {}
            TransportCommand::Connect { peripheral } => {
                if peripheral != self.config.peripheral {
                    return Err(LinkError::Transport(format!("unknown peripheral {peripheral}")));
                }
                self.connect_attempts += 1;
                if self.connect_attempts <= self.config.fail_first_connects {
                    self.reply(TransportEvent::LinkFailed {
                        peripheral,
                        reason: "simulated connect failure".to_string(),
                    })?;
                } else {
                    self.connected = true;
                    self.reply(TransportEvent::Linked { peripheral })?;
                }
            }
            TransportCommand::Disconnect { peripheral } => {
                self.stop_streaming();
                self.notifying = false;
                if self.connected {
                    self.connected = false;
                    self.reply(TransportEvent::Disconnected {
                        peripheral,
                        reason: None,
                    })?;
                }
            }
            TransportCommand::DiscoverServices { peripheral, .. } => {
                self.reply(TransportEvent::ServicesDiscovered {
                    peripheral,
                    result: Ok(vec![self.config.service_uuid]),
                })?;
            }
            TransportCommand::DiscoverCharacteristics { service, .. } => {
                let result = if service == self.config.service_uuid {
                    Ok(vec![self.config.control(), self.config.data()])
                } else {
                    Err(format!("no service {service}"))
                };
                self.reply(TransportEvent::CharacteristicsDiscovered { service, result })?;
            }
            TransportCommand::SetNotify {
                characteristic,
                enabled,
                ..
            } => {
                let result = if characteristic == self.config.data() {
                    self.notifying = enabled;
                    Ok(enabled)
                } else {
                    Err("characteristic does not support notifications".to_string())
                };
                self.reply(TransportEvent::SubscriptionChanged {
                    characteristic,
                    result,
                })?;
            }
            TransportCommand::Write {
                characteristic,
                payload,
                ..
            } => {
                if characteristic != self.config.control() {
                    return self.reply(TransportEvent::WriteCompleted {
                        characteristic,
                        result: Err("write not permitted".to_string()),
                    });
                }
                if payload != self.config.trigger_command {
                    return self.reply(TransportEvent::WriteCompleted {
                        characteristic,
                        result: Err("unknown command".to_string()),
                    });
                }
                self.reply(TransportEvent::WriteCompleted {
                    characteristic,
                    result: Ok(()),
                })?;
                if self.notifying {
                    self.start_streaming()?;
                }
            }
        }
        Ok(())
    }
}

impl Drop for SimPeripheral {
    fn drop(&mut self) {
        self.stop_streaming();
    }
}
