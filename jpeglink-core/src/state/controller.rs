//! Connection lifecycle controller.
//!
//! The controller is the synchronous heart of the engine. It owns the
//! [`ConnectionState`] and the [`Reassembler`], consumes caller requests
//! and [`TransportEvent`]s one at a time, and answers each with an
//! [`Effects`] bundle the actor then executes. Nothing here touches a
//! channel or a clock, so every transition is drivable from a plain test.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::LinkError;
use crate::header::HEADER_LENGTH;
use crate::observer::ObserverEvent;
use crate::state::ConnectionState;
use crate::transfer::{FragmentStep, Reassembler, TimeoutToken, TransferOutcome};
use crate::transport::{
    AdapterState, CharacteristicHandle, PeripheralId, TransportCommand, TransportEvent,
};

// ── Effects ──────────────────────────────────────────────────────

/// What the single-slot inactivity timer must do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Replace whatever is armed with a timer for this token.
    Arm(TimeoutToken),
    /// Cancel whatever is armed.
    Cancel,
}

/// Side effects produced by one controller input, in emission order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Effects {
    pub commands: Vec<TransportCommand>,
    pub events: Vec<ObserverEvent>,
    pub timer: Option<TimerAction>,
}

impl Effects {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.events.is_empty() && self.timer.is_none()
    }

    fn command(&mut self, command: TransportCommand) {
        self.commands.push(command);
    }

    /// Lifecycle-level status text.
    fn status(&mut self, text: impl Into<String>) {
        let text = text.into();
        info!("{text}");
        self.events.push(ObserverEvent::Status(text));
    }

    /// Per-fragment status text.
    fn progress(&mut self, text: String) {
        debug!("{text}");
        self.events.push(ObserverEvent::Status(text));
    }
}

// ── LifecycleController ──────────────────────────────────────────

#[derive(Debug)]
pub struct LifecycleController {
    config: EngineConfig,
    state: ConnectionState,
    /// Caller intent: keep discovering whenever nothing better is going on.
    scan_desired: bool,
    adapter_ready: bool,
    /// Discovery is running at the transport.
    scanning: bool,
    peripheral: Option<PeripheralId>,
    control: Option<CharacteristicHandle>,
    data: Option<CharacteristicHandle>,
    reassembler: Reassembler,
}

impl LifecycleController {
    pub fn new(config: EngineConfig) -> Self {
        let reassembler = Reassembler::new(config.max_declared_len);
        Self {
            config,
            state: ConnectionState::Idle,
            scan_desired: false,
            adapter_ready: false,
            scanning: false,
            peripheral: None,
            control: None,
            data: None,
            reassembler,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }

    pub fn peripheral(&self) -> Option<&PeripheralId> {
        self.peripheral.as_ref()
    }

    // ── Caller requests ──────────────────────────────────────────

    /// Assert the intent to scan. Starts discovery when the adapter is
    /// ready and nothing is in progress; otherwise only records intent.
    pub fn start(&mut self) -> Effects {
        let mut fx = Effects::default();
        self.scan_desired = true;

        if !self.adapter_ready {
            debug!("start requested before adapter ready");
            return fx;
        }
        if matches!(self.state, ConnectionState::Idle | ConnectionState::Error) {
            self.begin_scan(&mut fx);
        }
        fx
    }

    /// Cancel discovery, release the link, abort any transfer, go Idle.
    pub fn stop(&mut self) -> Effects {
        let mut fx = Effects::default();
        self.scan_desired = false;

        if self.scanning {
            self.scanning = false;
            fx.command(TransportCommand::StopDiscovery);
        }
        if let Some(peripheral) = self.peripheral.take() {
            fx.command(TransportCommand::Disconnect { peripheral });
        }
        self.control = None;
        self.data = None;
        self.abort_transfer(&mut fx);
        self.transition(&mut fx, |s| {
            s.force_idle();
            Ok(())
        });
        fx.status("Stopped");
        fx
    }

    /// Arm a fresh transfer and write the trigger command.
    ///
    /// Fails with [`LinkError::TargetUnavailable`] unless subscribed; in
    /// that case nothing is changed.
    pub fn request_transfer(&mut self) -> Result<Effects, LinkError> {
        let (Some(peripheral), Some(control)) = (self.peripheral.clone(), self.control) else {
            return Err(LinkError::TargetUnavailable);
        };
        if !self.state.is_subscribed() {
            return Err(LinkError::TargetUnavailable);
        }

        let mut fx = Effects::default();
        self.abort_transfer(&mut fx);
        fx.command(TransportCommand::Write {
            peripheral,
            characteristic: control,
            payload: self.config.trigger_command.clone(),
            with_response: true,
        });
        fx.status(format!(
            "Requested {}",
            String::from_utf8_lossy(&self.config.trigger_command)
        ));
        Ok(fx)
    }

    /// The inactivity timer for `token` fired.
    pub fn on_timeout(&mut self, token: TimeoutToken) -> Effects {
        let mut fx = Effects::default();
        if let Some(outcome) = self.reassembler.on_timeout(token) {
            self.deliver_outcome(&mut fx, outcome);
        }
        fx
    }

    // ── Transport events ─────────────────────────────────────────

    pub fn on_event(&mut self, event: TransportEvent) -> Effects {
        let mut fx = Effects::default();
        match event {
            TransportEvent::AdapterStateChanged(adapter) => self.on_adapter(&mut fx, adapter),
            TransportEvent::Discovered { peripheral, name } => {
                self.on_discovered(&mut fx, peripheral, name)
            }
            TransportEvent::Linked { peripheral } => self.on_linked(&mut fx, peripheral),
            TransportEvent::LinkFailed { peripheral, reason } => {
                self.on_link_failed(&mut fx, peripheral, reason)
            }
            TransportEvent::Disconnected { peripheral, reason } => {
                self.on_disconnected(&mut fx, peripheral, reason)
            }
            TransportEvent::ServicesDiscovered { peripheral, result } => {
                self.on_services(&mut fx, peripheral, result)
            }
            TransportEvent::CharacteristicsDiscovered { service, result } => {
                self.on_characteristics(&mut fx, service, result)
            }
            TransportEvent::SubscriptionChanged {
                characteristic,
                result,
            } => self.on_subscription(&mut fx, characteristic, result),
            TransportEvent::Fragment {
                characteristic,
                bytes,
            } => {
                if self.data == Some(characteristic) {
                    self.on_fragment(&mut fx, &bytes);
                } else {
                    debug!(
                        handle = characteristic.handle,
                        "ignoring {} bytes on unexpected characteristic",
                        bytes.len()
                    );
                }
            }
            TransportEvent::WriteCompleted {
                characteristic,
                result,
            } => self.on_write(&mut fx, characteristic, result),
        }
        fx
    }

    fn on_adapter(&mut self, fx: &mut Effects, adapter: AdapterState) {
        match adapter {
            AdapterState::PoweredOn => {
                self.adapter_ready = true;
                if self.state == ConnectionState::TransportUnavailable {
                    self.transition(fx, ConnectionState::adapter_settled);
                }
                fx.status("Bluetooth ready");
                if self.scan_desired && self.state == ConnectionState::Idle {
                    self.begin_scan(fx);
                }
            }
            AdapterState::Resetting => {
                self.adapter_ready = false;
                self.drop_link(fx);
                self.transition(fx, |s| {
                    s.force_idle();
                    Ok(())
                });
                fx.status("Bluetooth resetting");
            }
            unavailable => {
                self.adapter_ready = false;
                self.drop_link(fx);
                self.transition(fx, |s| {
                    s.adapter_unavailable();
                    Ok(())
                });
                warn!("adapter unavailable: {unavailable}");
                fx.status(format!("Bluetooth {unavailable}"));
            }
        }
    }

    fn on_discovered(&mut self, fx: &mut Effects, peripheral: PeripheralId, name: Option<String>) {
        if self.state != ConnectionState::Scanning {
            debug!(%peripheral, "ignoring discovery while {}", self.state);
            return;
        }
        if !self.transition(fx, ConnectionState::begin_connect) {
            return;
        }
        fx.status(format!(
            "Found {}",
            name.as_deref().unwrap_or(peripheral.0.as_str())
        ));
        if self.scanning {
            self.scanning = false;
            fx.command(TransportCommand::StopDiscovery);
        }
        self.peripheral = Some(peripheral.clone());
        fx.command(TransportCommand::Connect { peripheral });
    }

    fn on_linked(&mut self, fx: &mut Effects, peripheral: PeripheralId) {
        if !self.is_current(&peripheral) {
            debug!(%peripheral, "ignoring link from unknown peripheral");
            return;
        }
        if !self.transition(fx, ConnectionState::link_established) {
            return;
        }
        fx.status("Discovering services");
        fx.command(TransportCommand::DiscoverServices {
            peripheral,
            services: vec![self.config.service_uuid],
        });
    }

    fn on_link_failed(&mut self, fx: &mut Effects, peripheral: PeripheralId, reason: String) {
        if !self.is_current(&peripheral) {
            return;
        }
        if !self.transition(fx, ConnectionState::link_failed) {
            return;
        }
        self.peripheral = None;
        warn!(%peripheral, "link failed: {reason}");
        fx.status(format!("Connect failed: {reason}"));
        if self.scan_desired && self.adapter_ready {
            self.begin_scan(fx);
        }
    }

    fn on_disconnected(
        &mut self,
        fx: &mut Effects,
        peripheral: PeripheralId,
        reason: Option<String>,
    ) {
        if !self.is_current(&peripheral) {
            debug!(%peripheral, "ignoring disconnect from unknown peripheral");
            return;
        }
        self.peripheral = None;
        self.control = None;
        self.data = None;
        self.abort_transfer(fx);
        self.transition(fx, ConnectionState::link_lost);
        match reason {
            Some(reason) => fx.status(format!("Disconnected: {reason}")),
            None => fx.status("Disconnected"),
        }
        if self.scan_desired && self.adapter_ready {
            self.begin_scan(fx);
        }
    }

    fn on_services(
        &mut self,
        fx: &mut Effects,
        peripheral: PeripheralId,
        result: Result<Vec<Uuid>, String>,
    ) {
        if !self.is_current(&peripheral) || self.state != ConnectionState::Connected {
            return;
        }
        let service = self.config.service_uuid;
        match result {
            Err(reason) => self.fail_discovery(fx, format!("Service discovery failed: {reason}")),
            Ok(services) if !services.contains(&service) => {
                self.fail_discovery(fx, format!("Service {service} not found"))
            }
            Ok(_) => {
                if !self.transition(fx, ConnectionState::service_found) {
                    return;
                }
                fx.status("Discovering characteristics");
                fx.command(TransportCommand::DiscoverCharacteristics {
                    peripheral,
                    service,
                    characteristics: vec![self.config.control_uuid, self.config.data_uuid],
                });
            }
        }
    }

    fn on_characteristics(
        &mut self,
        fx: &mut Effects,
        service: Uuid,
        result: Result<Vec<CharacteristicHandle>, String>,
    ) {
        if service != self.config.service_uuid || self.state != ConnectionState::Discovering {
            return;
        }
        let found = match result {
            Ok(found) => found,
            Err(reason) => {
                self.fail_discovery(fx, format!("Characteristic discovery failed: {reason}"));
                return;
            }
        };

        let control = found.iter().find(|c| c.uuid == self.config.control_uuid).copied();
        let data = found.iter().find(|c| c.uuid == self.config.data_uuid).copied();
        let (Some(control), Some(data), Some(peripheral)) = (control, data, self.peripheral.clone())
        else {
            self.fail_discovery(fx, "Required characteristics missing".to_string());
            return;
        };

        self.control = Some(control);
        self.data = Some(data);
        fx.status("Subscribing to JPEG notifications");
        fx.command(TransportCommand::SetNotify {
            peripheral,
            characteristic: data,
            enabled: true,
        });
    }

    fn on_subscription(
        &mut self,
        fx: &mut Effects,
        characteristic: CharacteristicHandle,
        result: Result<bool, String>,
    ) {
        if self.data != Some(characteristic) {
            return;
        }
        match result {
            Ok(true) => {
                if self.transition(fx, ConnectionState::notifications_enabled) {
                    fx.status("JPEG notifications active");
                }
            }
            Ok(false) => fx.status("JPEG notifications stopped"),
            Err(reason) => {
                warn!("notify failed: {reason}");
                fx.status(format!("Notify failed: {reason}"));
            }
        }
    }

    fn on_write(
        &mut self,
        fx: &mut Effects,
        characteristic: CharacteristicHandle,
        result: Result<(), String>,
    ) {
        if self.control != Some(characteristic) {
            return;
        }
        match result {
            Ok(()) => debug!("trigger write acknowledged"),
            Err(reason) => {
                warn!("trigger write failed: {reason}");
                fx.status(format!("Write failed: {reason}"));
            }
        }
    }

    fn on_fragment(&mut self, fx: &mut Effects, bytes: &[u8]) {
        match self.reassembler.on_fragment(bytes) {
            FragmentStep::HeaderProgress { received } => {
                fx.progress(format!("Receiving header ({received}/{HEADER_LENGTH})"));
            }
            FragmentStep::HeaderMismatch { signature } => {
                warn!("unexpected header {signature:02x?}");
                fx.status("Unexpected JPEG header");
            }
            FragmentStep::LengthRejected { declared } => {
                fx.status(format!(
                    "JPEG length {declared} exceeds limit {}",
                    self.config.max_declared_len
                ));
            }
            FragmentStep::BodyProgress {
                received,
                expected,
                timeout,
            } => {
                fx.progress(format!("Receiving JPEG ({received}/{expected})"));
                fx.timer = Some(TimerAction::Arm(timeout));
            }
            FragmentStep::Finished(outcome) => {
                fx.timer = Some(TimerAction::Cancel);
                self.deliver_outcome(fx, outcome);
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────

    /// Apply a state transition; publishes `StateChanged` on an actual
    /// change. Returns `false` if the transition was rejected.
    fn transition<F>(&mut self, fx: &mut Effects, f: F) -> bool
    where
        F: FnOnce(&mut ConnectionState) -> Result<(), LinkError>,
    {
        let before = self.state;
        if let Err(e) = f(&mut self.state) {
            debug!("{e}");
            return false;
        }
        if self.state != before {
            info!(from = %before, to = %self.state, "connection state changed");
            fx.events.push(ObserverEvent::StateChanged(self.state));
        }
        true
    }

    fn begin_scan(&mut self, fx: &mut Effects) {
        if !self.transition(fx, ConnectionState::begin_scan) {
            return;
        }
        if !self.scanning {
            self.scanning = true;
            fx.command(TransportCommand::StartDiscovery {
                service: self.config.service_uuid,
            });
        }
        fx.status(format!("Scanning for {}", self.config.service_uuid));
    }

    fn fail_discovery(&mut self, fx: &mut Effects, reason: String) {
        warn!("{reason}");
        self.transition(fx, ConnectionState::discovery_failed);
        if let Some(peripheral) = self.peripheral.take() {
            fx.command(TransportCommand::Disconnect { peripheral });
        }
        self.control = None;
        self.data = None;
        fx.status(reason);
    }

    /// Forget the link without issuing commands; the adapter already
    /// lost it.
    fn drop_link(&mut self, fx: &mut Effects) {
        self.scanning = false;
        self.peripheral = None;
        self.control = None;
        self.data = None;
        self.abort_transfer(fx);
    }

    fn abort_transfer(&mut self, fx: &mut Effects) {
        if self.reassembler.reset() {
            debug!("in-flight transfer discarded");
            fx.timer = Some(TimerAction::Cancel);
        }
    }

    fn deliver_outcome(&mut self, fx: &mut Effects, outcome: TransferOutcome) {
        if outcome.is_success() {
            info!("{outcome}");
        } else {
            warn!("{outcome}");
        }
        fx.events.push(ObserverEvent::Status(outcome.to_string()));
        fx.events.push(ObserverEvent::Outcome(outcome));
    }

    fn is_current(&self, peripheral: &PeripheralId) -> bool {
        self.peripheral.as_ref() == Some(peripheral)
    }
}

// ── Tests ────────────────────────────────────────────────────────
