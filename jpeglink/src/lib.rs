//! # jpeglink: BLE JPEG client front-end
//!
//! Command-line front-end for `jpeglink-core`.
//!
//! ## Commands
//!
//! - **simulate**: Run a full session against the in-process simulated
//!   peripheral and save the received image.
//! - **encode**: Turn an image into the framed wire stream or base64 text.
//! - **decode**: Recover an image from a framed dump or base64 text.

pub mod config;
pub mod simulate;
pub mod tools;
