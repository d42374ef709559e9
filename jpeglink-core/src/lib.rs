//! # jpeglink-core
//!
//! Client-side engine for pulling one JPEG at a time off a BLE camera
//! peripheral that notifies it in small fragments.
//!
//! This crate contains:
//! - **Framing**: `FrameHeader`, marker validation and `JpegFrameCodec` for
//!   the `"JPEG"` + big-endian length wire format
//! - **Transfer**: `Reassembler`, the header/body state machine with a
//!   debounced inactivity timeout, and its `TransferOutcome`
//! - **State**: `ConnectionState` and the `LifecycleController` that gates
//!   when a transfer may be armed
//! - **Engine**: `LinkEngine`, the single tokio task all inputs funnel
//!   through, and its cloneable `EngineHandle`
//! - **Interfaces**: `TransportAdapter` / `TransportEvent` toward the BLE
//!   stack, `ObserverSink` / `ObserverEvent` toward presentation
//! - **Simulator**: `SimPeripheral`, an in-process peripheral for tests and
//!   demos
//! - **Error**: `LinkError`, typed, `thiserror`-based

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod header;
pub mod observer;
pub mod sim;
pub mod state;
pub mod timer;
pub mod transfer;
pub mod transport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{JpegFrame, JpegFrameCodec, encode_frame, read_frames, validate_markers};
pub use config::EngineConfig;
pub use engine::{EngineHandle, EngineInput, LinkEngine, engine_channel};
pub use error::LinkError;
pub use header::{FrameHeader, HEADER_LENGTH};
pub use observer::{ObserverEvent, ObserverSink, ObserverWatch, WatchObserver};
pub use sim::{SimConfig, SimPeripheral};
pub use state::{ConnectionState, LifecycleController};
pub use transfer::{InvalidReason, Reassembler, TransferOutcome};
pub use transport::{
    AdapterState, CharacteristicHandle, PeripheralId, TransportAdapter, TransportCommand,
    TransportEvent,
};
