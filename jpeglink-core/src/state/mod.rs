//! Connection lifecycle: the state enum and the controller that drives it.

pub mod connection;
mod controller;

pub use connection::ConnectionState;
pub use controller::{Effects, LifecycleController, TimerAction};
