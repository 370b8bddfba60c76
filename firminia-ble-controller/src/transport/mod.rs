//! Transport abstraction
//!
//! Discovery, link establishment and the single configuration write go through
//! these traits. Two implementations exist: [`BluetoothTransport`] backed by
//! btleplug, and [`SimulatedTransport`], a timer-driven fake. [`AnyTransport`]
//! selects one of them from [`ClientConfig`] at construction time.

mod bluetooth;
mod simulated;

pub use bluetooth::{BluetoothEndpoint, BluetoothLink, BluetoothTransport};
pub use simulated::{SimulatedEndpoint, SimulatedLink, SimulatedTransport};

use std::future::Future;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::{ClientConfig, Result, TransportKind};

/// A discovered device that passed the name filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateDevice {
    /// Opaque transport identifier (a BD address for btleplug)
    pub id: String,
    pub name: String,
}

/// Raw discovery result, before name filtering.
#[derive(Debug, Clone)]
pub struct Advertisement {
    pub id: String,
    pub name: Option<String>,
}

/// Accept everything on air, then keep only names containing the marker.
#[derive(Debug, Clone)]
pub struct DiscoveryFilter {
    pub name_marker: String,
    /// Services the client wants access to once a device is picked
    pub optional_services: Vec<Uuid>,
}

impl DiscoveryFilter {
    pub fn accepts(&self, name: &str) -> bool {
        firminia_proto::ble::is_firminia_name(name, &self.name_marker)
    }
}

/// The service and characteristic carrying the configuration write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSpec {
    pub service: Uuid,
    pub characteristic: Uuid,
}

/// Subscription to an unsolicited disconnect of one link.
///
/// Resolves once, when the link is lost. Dropping it unsubscribes.
pub struct LinkLoss {
    rx: oneshot::Receiver<()>,
}

/// Sending half of a [`LinkLoss`], held by the transport.
pub struct LinkLossNotifier {
    tx: oneshot::Sender<()>,
}

impl LinkLoss {
    pub fn channel() -> (LinkLossNotifier, LinkLoss) {
        let (tx, rx) = oneshot::channel();
        (LinkLossNotifier { tx }, LinkLoss { rx })
    }

    /// Waits for the link to go away. A notifier dropped without firing
    /// means the transport itself is gone, which is treated the same way.
    pub async fn wait(self) {
        let _ = self.rx.await;
    }
}

impl LinkLossNotifier {
    pub fn notify(self) {
        let _ = self.tx.send(());
    }

    /// Completes when the subscriber has dropped its [`LinkLoss`].
    pub async fn closed(&mut self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub trait Transport: Send + Sync + 'static {
    type Link: Link;

    /// Whether the radio/API exists on this client at all.
    fn is_available(&self) -> impl Future<Output = bool> + Send;

    /// Runs one discovery round. May wait on the user (device picker) or on a scan window.
    fn discover(
        &self,
        filter: &DiscoveryFilter,
    ) -> impl Future<Output = Result<Vec<Advertisement>>> + Send;

    /// Establishes the transport-level link. Fails with `ConnectFailed`.
    fn connect(&self, device: &CandidateDevice) -> impl Future<Output = Result<Self::Link>> + Send;
}

pub trait Link: Send + Sync + 'static {
    type Endpoint: Endpoint;

    /// Resolves the service and characteristic. Fails with `ChannelOpenFailed`.
    fn open_channel(
        &self,
        spec: &ChannelSpec,
    ) -> impl Future<Output = Result<Self::Endpoint>> + Send;

    fn subscribe_link_loss(&self) -> impl Future<Output = Result<LinkLoss>> + Send;

    fn is_connected(&self) -> impl Future<Output = bool> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<()>> + Send;
}

pub trait Endpoint: Clone + Send + Sync + 'static {
    /// One write, acknowledged by the transport only.
    fn write(&self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;
}

pub enum AnyTransport {
    Bluetooth(BluetoothTransport),
    Simulated(SimulatedTransport),
}

pub enum AnyLink {
    Bluetooth(BluetoothLink),
    Simulated(SimulatedLink),
}

#[derive(Clone)]
pub enum AnyEndpoint {
    Bluetooth(BluetoothEndpoint),
    Simulated(SimulatedEndpoint),
}

impl AnyTransport {
    pub async fn from_config(config: &ClientConfig) -> Self {
        match config.transport {
            TransportKind::Bluetooth => {
                AnyTransport::Bluetooth(BluetoothTransport::new(config.scan_duration).await)
            }
            TransportKind::Simulated => AnyTransport::Simulated(SimulatedTransport::demo()),
        }
    }
}

impl Transport for AnyTransport {
    type Link = AnyLink;

    async fn is_available(&self) -> bool {
        match self {
            AnyTransport::Bluetooth(t) => t.is_available().await,
            AnyTransport::Simulated(t) => t.is_available().await,
        }
    }

    async fn discover(&self, filter: &DiscoveryFilter) -> Result<Vec<Advertisement>> {
        match self {
            AnyTransport::Bluetooth(t) => t.discover(filter).await,
            AnyTransport::Simulated(t) => t.discover(filter).await,
        }
    }

    async fn connect(&self, device: &CandidateDevice) -> Result<AnyLink> {
        match self {
            AnyTransport::Bluetooth(t) => t.connect(device).await.map(AnyLink::Bluetooth),
            AnyTransport::Simulated(t) => t.connect(device).await.map(AnyLink::Simulated),
        }
    }
}

impl Link for AnyLink {
    type Endpoint = AnyEndpoint;

    async fn open_channel(&self, spec: &ChannelSpec) -> Result<AnyEndpoint> {
        match self {
            AnyLink::Bluetooth(l) => l.open_channel(spec).await.map(AnyEndpoint::Bluetooth),
            AnyLink::Simulated(l) => l.open_channel(spec).await.map(AnyEndpoint::Simulated),
        }
    }

    async fn subscribe_link_loss(&self) -> Result<LinkLoss> {
        match self {
            AnyLink::Bluetooth(l) => l.subscribe_link_loss().await,
            AnyLink::Simulated(l) => l.subscribe_link_loss().await,
        }
    }

    async fn is_connected(&self) -> bool {
        match self {
            AnyLink::Bluetooth(l) => l.is_connected().await,
            AnyLink::Simulated(l) => l.is_connected().await,
        }
    }

    async fn disconnect(&self) -> Result<()> {
        match self {
            AnyLink::Bluetooth(l) => l.disconnect().await,
            AnyLink::Simulated(l) => l.disconnect().await,
        }
    }
}

impl Endpoint for AnyEndpoint {
    async fn write(&self, data: &[u8]) -> Result<()> {
        match self {
            AnyEndpoint::Bluetooth(e) => e.write(data).await,
            AnyEndpoint::Simulated(e) => e.write(data).await,
        }
    }
}
