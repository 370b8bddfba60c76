//! Simulated transport
//!
//! A timer-driven stand-in for the radio. Handles are cheap clones sharing one
//! state, so a test can keep a handle to inject failures, trigger link loss and
//! inspect what was written while the registry and manager own other handles.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info};

use super::{
    Advertisement, CandidateDevice, ChannelSpec, DiscoveryFilter, Endpoint, Link, LinkLoss,
    LinkLossNotifier, Transport,
};
use crate::{Error, Result};

#[derive(Default)]
struct SimState {
    available: bool,
    delay: Duration,
    devices: Vec<Advertisement>,
    cancel_next_discovery: bool,
    connect_failure: Option<String>,
    channel_failure: Option<String>,
    write_failure: Option<String>,
    /// Device id and link epoch of the live link
    connected: Option<(String, u64)>,
    epoch: u64,
    subscribers: Vec<LinkLossNotifier>,
    writes: Vec<Vec<u8>>,
    discover_calls: usize,
    disconnect_calls: usize,
}

#[derive(Clone)]
pub struct SimulatedTransport {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTransport {
    /// An available radio with nothing around and no delays.
    pub fn new() -> Self {
        let state = SimState {
            available: true,
            ..SimState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// What `--simulate` uses: one FirminIA, one unrelated gadget, human-scale delays.
    pub fn demo() -> Self {
        Self::new()
            .with_device("SIM:00:00:00:00:01", "FirminIA V3")
            .with_device("SIM:00:00:00:00:02", "Living Room Speaker")
            .with_delay(Duration::from_millis(800))
    }

    pub fn with_device(self, id: &str, name: &str) -> Self {
        self.lock().devices.push(Advertisement {
            id: id.to_string(),
            name: Some(name.to_string()),
        });
        self
    }

    /// Adds an advertisement with no local name.
    pub fn with_unnamed_device(self, id: &str) -> Self {
        self.lock().devices.push(Advertisement {
            id: id.to_string(),
            name: None,
        });
        self
    }

    /// Delay applied to every discover, connect, channel open and write.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.lock().delay = delay;
        self
    }

    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Makes the next discovery behave like a dismissed device picker.
    pub fn cancel_next_discovery(&self) {
        self.lock().cancel_next_discovery = true;
    }

    pub fn fail_connect(&self, reason: Option<&str>) {
        self.lock().connect_failure = reason.map(str::to_string);
    }

    pub fn fail_channel_open(&self, reason: Option<&str>) {
        self.lock().channel_failure = reason.map(str::to_string);
    }

    pub fn fail_writes(&self, reason: Option<&str>) {
        self.lock().write_failure = reason.map(str::to_string);
    }

    /// Drops the live link as if the device went out of range.
    pub fn trigger_link_loss(&self) {
        let subscribers = {
            let mut state = self.lock();
            state.connected = None;
            std::mem::take(&mut state.subscribers)
        };
        info!(subscribers = subscribers.len(), "simulated link loss");
        for s in subscribers {
            s.notify();
        }
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    pub fn discover_calls(&self) -> usize {
        self.lock().discover_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        self.lock().disconnect_calls
    }

    pub fn is_linked(&self) -> bool {
        self.lock().connected.is_some()
    }

    /// Live link-loss subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|s| !s.is_closed());
        state.subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        lock(&self.state)
    }

    async fn pause(&self) {
        let delay = self.lock().delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl Transport for SimulatedTransport {
    type Link = SimulatedLink;

    async fn is_available(&self) -> bool {
        self.lock().available
    }

    async fn discover(&self, _filter: &DiscoveryFilter) -> Result<Vec<Advertisement>> {
        self.pause().await;

        let mut state = self.lock();
        state.discover_calls += 1;
        if !state.available {
            return Err(Error::TransportUnavailable("simulated radio is off".to_string()));
        }
        if std::mem::take(&mut state.cancel_next_discovery) {
            return Err(Error::UserCancelled);
        }
        debug!(count = state.devices.len(), "simulated discovery");
        Ok(state.devices.clone())
    }

    async fn connect(&self, device: &CandidateDevice) -> Result<SimulatedLink> {
        self.pause().await;

        let mut state = self.lock();
        if let Some(reason) = &state.connect_failure {
            return Err(Error::ConnectFailed(reason.clone()));
        }
        if !state.devices.iter().any(|d| d.id == device.id) {
            return Err(Error::ConnectFailed(format!("{} is out of range", device.id)));
        }

        state.epoch += 1;
        let epoch = state.epoch;
        state.connected = Some((device.id.clone(), epoch));
        info!(id = %device.id, epoch, "simulated link established");

        Ok(SimulatedLink {
            transport: self.clone(),
            epoch,
        })
    }
}

pub struct SimulatedLink {
    transport: SimulatedTransport,
    epoch: u64,
}

impl SimulatedLink {
    fn is_live(&self) -> bool {
        matches!(&self.transport.lock().connected, Some((_, e)) if *e == self.epoch)
    }
}

impl Link for SimulatedLink {
    type Endpoint = SimulatedEndpoint;

    async fn open_channel(&self, spec: &ChannelSpec) -> Result<SimulatedEndpoint> {
        self.transport.pause().await;

        if let Some(reason) = &self.transport.lock().channel_failure {
            return Err(Error::ChannelOpenFailed(reason.clone()));
        }
        if !self.is_live() {
            return Err(Error::ChannelOpenFailed("link is down".to_string()));
        }
        debug!(service = %spec.service, characteristic = %spec.characteristic, "simulated channel open");

        Ok(SimulatedEndpoint {
            transport: self.transport.clone(),
            epoch: self.epoch,
        })
    }

    async fn subscribe_link_loss(&self) -> Result<LinkLoss> {
        let (notifier, loss) = LinkLoss::channel();
        if self.is_live() {
            self.transport.lock().subscribers.push(notifier);
        } else {
            notifier.notify();
        }
        Ok(loss)
    }

    async fn is_connected(&self) -> bool {
        self.is_live()
    }

    async fn disconnect(&self) -> Result<()> {
        let mut state = self.transport.lock();
        state.disconnect_calls += 1;
        if matches!(&state.connected, Some((_, e)) if *e == self.epoch) {
            state.connected = None;
            state.subscribers.clear();
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct SimulatedEndpoint {
    transport: SimulatedTransport,
    epoch: u64,
}

impl Endpoint for SimulatedEndpoint {
    async fn write(&self, data: &[u8]) -> Result<()> {
        self.transport.pause().await;

        let mut state = self.transport.lock();
        if !matches!(&state.connected, Some((_, e)) if *e == self.epoch) {
            return Err(Error::WriteFailed("link is down".to_string()));
        }
        if let Some(reason) = &state.write_failure {
            return Err(Error::WriteFailed(reason.clone()));
        }
        state.writes.push(data.to_vec());
        debug!(bytes = data.len(), "simulated write");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ClientConfig;

    fn device() -> CandidateDevice {
        CandidateDevice {
            id: "AA:01".to_string(),
            name: "FirminIA V3".to_string(),
        }
    }

    #[tokio::test]
    async fn subscribing_on_a_dead_link_fires_at_once() {
        let sim = SimulatedTransport::new().with_device("AA:01", "FirminIA V3");
        let link = sim.connect(&device()).await.unwrap();
        sim.trigger_link_loss();

        let loss = link.subscribe_link_loss().await.unwrap();
        tokio::time::timeout(Duration::from_millis(100), loss.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn link_loss_reaches_live_subscribers() {
        let sim = SimulatedTransport::new().with_device("AA:01", "FirminIA V3");
        let link = sim.connect(&device()).await.unwrap();
        link.open_channel(&ClientConfig::new(std::env::temp_dir()).channel)
            .await
            .unwrap();

        let loss = link.subscribe_link_loss().await.unwrap();
        assert_eq!(sim.subscriber_count(), 1);

        sim.trigger_link_loss();
        tokio::time::timeout(Duration::from_millis(100), loss.wait())
            .await
            .unwrap();
        assert!(!link.is_connected().await);
    }
}
