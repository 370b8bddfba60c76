//! Screen Flow Controller
//!
//! Which screen is shown is never stored: it is derived from a few flags and
//! the connection state every time it is asked for. User actions are routed
//! to the registry and the lifecycle manager from here.

use std::sync::Arc;

use firminia_proto::ConfigurationPayload;
use tracing::{debug, info};

use crate::lifecycle::{ConnectionManager, ConnectionState};
use crate::registry::DeviceRegistry;
use crate::session::Session;
use crate::transport::{CandidateDevice, Transport};
use crate::{ClientConfig, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Splash,
    Introduction,
    /// Capability check in flight
    Checking,
    /// Bluetooth missing or off; offers "open settings" and "recheck"
    TransportOff,
    Pairing,
    MainApp,
    Configuration,
}

/// What is known about the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Capability {
    /// Not checked yet
    #[default]
    Unknown,
    Checking,
    Absent,
    Present,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowInputs {
    pub splash_complete: bool,
    pub introduction_acknowledged: bool,
    pub capability: Capability,
    pub connection: ConnectionState,
    pub configuration_requested: bool,
}

/// First match wins.
pub fn derive_screen(inputs: &FlowInputs) -> Screen {
    if !inputs.splash_complete {
        return Screen::Splash;
    }
    if !inputs.introduction_acknowledged {
        return Screen::Introduction;
    }
    match inputs.capability {
        Capability::Unknown | Capability::Checking => Screen::Checking,
        Capability::Absent => Screen::TransportOff,
        Capability::Present => match inputs.connection {
            ConnectionState::Connected if inputs.configuration_requested => Screen::Configuration,
            ConnectionState::Connected => Screen::MainApp,
            ConnectionState::Disconnected | ConnectionState::Connecting => Screen::Pairing,
        },
    }
}

const SETTINGS_HINT: &str =
    "Open your system Bluetooth settings, switch Bluetooth on, then recheck.";

pub struct ScreenFlow<T: Transport> {
    transport: Arc<T>,
    registry: DeviceRegistry<T>,
    manager: ConnectionManager<T>,
    session: Session,
    splash_complete: bool,
    introduction_acknowledged: bool,
    capability: Capability,
    configuration_requested: bool,
    /// Form contents of the last submit that failed
    draft: Option<ConfigurationPayload>,
    last_error: Option<String>,
}

impl<T: Transport> ScreenFlow<T> {
    pub fn new(transport: Arc<T>, config: &ClientConfig, session: Session) -> Self {
        Self {
            registry: DeviceRegistry::new(Arc::clone(&transport), config.filter.clone()),
            manager: ConnectionManager::new(Arc::clone(&transport), config.channel),
            transport,
            session,
            splash_complete: false,
            introduction_acknowledged: false,
            capability: Capability::Unknown,
            configuration_requested: false,
            draft: None,
            last_error: None,
        }
    }

    pub fn inputs(&self) -> FlowInputs {
        FlowInputs {
            splash_complete: self.splash_complete,
            introduction_acknowledged: self.introduction_acknowledged,
            capability: self.capability,
            connection: self.manager.state(),
            configuration_requested: self.configuration_requested,
        }
    }

    pub fn current(&self) -> Screen {
        derive_screen(&self.inputs())
    }

    pub fn devices(&self) -> &[CandidateDevice] {
        self.registry.devices()
    }

    pub fn connected_device(&self) -> Option<CandidateDevice> {
        match self.manager.state() {
            ConnectionState::Connected => self.manager.device(),
            _ => None,
        }
    }

    pub fn manager(&self) -> &ConnectionManager<T> {
        &self.manager
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Message of the last failed action, cleared by the next successful one.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn record<R>(&mut self, result: Result<R>) -> Result<R> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => self.last_error = Some(e.to_string()),
        }
        result
    }

    pub fn complete_splash(&mut self) -> Screen {
        self.splash_complete = true;
        self.current()
    }

    pub fn acknowledge_introduction(&mut self) -> Screen {
        self.introduction_acknowledged = true;
        self.current()
    }

    /// Checks the radio; also the "recheck" action of the TransportOff screen.
    ///
    /// Coming back from TransportOff to Pairing starts one scan on its own.
    pub async fn check_transport(&mut self) -> Result<Screen> {
        let before = self.current();
        self.capability = Capability::Checking;

        let available = self.transport.is_available().await;
        self.capability = if available {
            Capability::Present
        } else {
            Capability::Absent
        };

        let after = self.current();
        debug!(?before, ?after, available, "transport checked");

        if before == Screen::TransportOff && after == Screen::Pairing {
            info!("bluetooth is back, scanning");
            self.scan().await?;
        }
        Ok(self.current())
    }

    pub fn open_settings(&self) -> &'static str {
        SETTINGS_HINT
    }

    /// The "search" / "try again" action of the Pairing screen.
    pub async fn scan(&mut self) -> Result<Vec<CandidateDevice>> {
        let result = self.registry.scan().await;
        if let Err(Error::TransportUnavailable(_)) = &result {
            self.capability = Capability::Absent;
        }
        self.record(result)
    }

    /// Connects to a device from the last scan.
    pub async fn connect(&mut self, id: &str) -> Result<()> {
        let Some(device) = self.registry.find(id).cloned() else {
            return self.record(Err(Error::UnknownDevice(id.to_string())));
        };
        let result = self.manager.connect(&device).await;
        self.record(result)?;
        self.configuration_requested = false;
        Ok(())
    }

    pub fn open_configuration(&mut self) -> Result<Screen> {
        if self.manager.state() != ConnectionState::Connected {
            return self.record(Err(Error::NotConnected));
        }
        self.configuration_requested = true;
        Ok(self.current())
    }

    /// What the configuration form starts from: the last rejected submit,
    /// otherwise a blank form.
    pub fn configuration_draft(&self) -> ConfigurationPayload {
        self.draft
            .clone()
            .unwrap_or_else(|| self.session.blank_payload())
    }

    pub fn close_configuration(&mut self) -> Screen {
        self.configuration_requested = false;
        self.draft = None;
        self.current()
    }

    /// Sends the form to the device and returns to the main screen on success.
    pub async fn submit_configuration(&mut self, payload: &ConfigurationPayload) -> Result<()> {
        let result = self.manager.send(payload).await;
        if result.is_err() {
            self.draft = Some(payload.clone());
        }
        self.record(result)?;
        self.configuration_requested = false;
        self.draft = None;
        Ok(())
    }

    /// Disconnects and resets pairing: scan results are dropped as well.
    pub async fn disconnect(&mut self) -> Screen {
        self.manager.disconnect().await;
        self.configuration_requested = false;
        self.draft = None;
        self.registry.clear();
        self.last_error = None;
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> FlowInputs {
        FlowInputs {
            splash_complete: true,
            introduction_acknowledged: true,
            capability: Capability::Present,
            connection: ConnectionState::Disconnected,
            configuration_requested: false,
        }
    }

    #[test]
    fn splash_and_introduction_come_first() {
        let mut inputs = ready();
        inputs.splash_complete = false;
        inputs.connection = ConnectionState::Connected;
        assert_eq!(derive_screen(&inputs), Screen::Splash);

        inputs.splash_complete = true;
        inputs.introduction_acknowledged = false;
        assert_eq!(derive_screen(&inputs), Screen::Introduction);
    }

    #[test]
    fn capability_gates_pairing() {
        let mut inputs = ready();
        inputs.capability = Capability::Unknown;
        assert_eq!(derive_screen(&inputs), Screen::Checking);
        inputs.capability = Capability::Checking;
        assert_eq!(derive_screen(&inputs), Screen::Checking);
        inputs.capability = Capability::Absent;
        inputs.connection = ConnectionState::Connected;
        assert_eq!(derive_screen(&inputs), Screen::TransportOff);
    }

    #[test]
    fn connection_state_selects_screen() {
        let mut inputs = ready();
        assert_eq!(derive_screen(&inputs), Screen::Pairing);

        inputs.connection = ConnectionState::Connecting;
        assert_eq!(derive_screen(&inputs), Screen::Pairing);

        inputs.connection = ConnectionState::Connected;
        assert_eq!(derive_screen(&inputs), Screen::MainApp);

        inputs.configuration_requested = true;
        assert_eq!(derive_screen(&inputs), Screen::Configuration);

        inputs.connection = ConnectionState::Disconnected;
        assert_eq!(derive_screen(&inputs), Screen::Pairing);
    }
}
