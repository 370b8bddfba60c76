//! btleplug-backed transport
//!
//! Discovery is a timed scan with no service filter; the registry narrows the
//! result by name. Link loss comes from the adapter's `DeviceDisconnected` events.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tracing::{debug, info, warn};

use super::{
    Advertisement, CandidateDevice, ChannelSpec, DiscoveryFilter, Endpoint, Link, LinkLoss,
    Transport,
};
use crate::{Error, Result};

pub struct BluetoothTransport {
    adapter: Option<Adapter>,
    unavailable_reason: String,
    scan_duration: Duration,
    /// Peripherals seen by the last scan, keyed by device id
    seen: Mutex<HashMap<String, Peripheral>>,
}

impl BluetoothTransport {
    /// Picks the first adapter. Never fails: a missing adapter is reported
    /// through `is_available()` and `TransportUnavailable` later on.
    pub async fn new(scan_duration: Duration) -> Self {
        let (adapter, unavailable_reason) = match first_adapter().await {
            Ok(adapter) => (Some(adapter), String::new()),
            Err(reason) => {
                warn!(%reason, "bluetooth unavailable");
                (None, reason)
            }
        };

        Self {
            adapter,
            unavailable_reason,
            scan_duration,
            seen: Mutex::new(HashMap::new()),
        }
    }

    fn adapter(&self) -> Result<&Adapter> {
        self.adapter
            .as_ref()
            .ok_or_else(|| Error::TransportUnavailable(self.unavailable_reason.clone()))
    }

    fn seen(&self) -> MutexGuard<'_, HashMap<String, Peripheral>> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn first_adapter() -> std::result::Result<Adapter, String> {
    let manager = Manager::new().await.map_err(|e| e.to_string())?;
    let adapters = manager.adapters().await.map_err(|e| e.to_string())?;
    adapters
        .into_iter()
        .next()
        .ok_or_else(|| "no Bluetooth adapter found".to_string())
}

impl Transport for BluetoothTransport {
    type Link = BluetoothLink;

    async fn is_available(&self) -> bool {
        self.adapter.is_some()
    }

    // btleplug has no consent step, so the services list needs no pre-authorization.
    async fn discover(&self, _filter: &DiscoveryFilter) -> Result<Vec<Advertisement>> {
        let adapter = self.adapter()?;

        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| Error::TransportUnavailable(e.to_string()))?;
        tokio::time::sleep(self.scan_duration).await;

        let peripherals = adapter
            .peripherals()
            .await
            .map_err(|e| Error::TransportUnavailable(e.to_string()))?;

        let mut found = Vec::new();
        let mut seen = HashMap::new();

        for peripheral in peripherals {
            let props = match peripheral.properties().await {
                Ok(Some(props)) => props,
                Ok(None) => continue,
                Err(e) => {
                    debug!(error = %e, "skipping peripheral without properties");
                    continue;
                }
            };
            let id = peripheral.address().to_string();
            debug!(%id, name = ?props.local_name, rssi = ?props.rssi, "discovered");
            found.push(Advertisement { id: id.clone(), name: props.local_name });
            seen.insert(id, peripheral);
        }

        if let Err(e) = adapter.stop_scan().await {
            warn!(error = %e, "failed to stop scan");
        }

        *self.seen() = seen;
        Ok(found)
    }

    async fn connect(&self, device: &CandidateDevice) -> Result<BluetoothLink> {
        let adapter = self.adapter()?.clone();
        let peripheral = self.seen().get(&device.id).cloned().ok_or_else(|| {
            Error::ConnectFailed(format!("{} was not seen in the last scan", device.id))
        })?;

        peripheral
            .connect()
            .await
            .map_err(|e| Error::ConnectFailed(e.to_string()))?;
        info!(id = %device.id, name = %device.name, "link established");

        Ok(BluetoothLink { adapter, peripheral })
    }
}

pub struct BluetoothLink {
    adapter: Adapter,
    peripheral: Peripheral,
}

impl Link for BluetoothLink {
    type Endpoint = BluetoothEndpoint;

    async fn open_channel(&self, spec: &ChannelSpec) -> Result<BluetoothEndpoint> {
        self.peripheral
            .discover_services()
            .await
            .map_err(|e| Error::ChannelOpenFailed(e.to_string()))?;

        let service = self
            .peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == spec.service)
            .ok_or_else(|| Error::ChannelOpenFailed(format!("service {} not found", spec.service)))?;

        let characteristic = service
            .characteristics
            .into_iter()
            .find(|c| c.uuid == spec.characteristic)
            .ok_or_else(|| {
                Error::ChannelOpenFailed(format!(
                    "characteristic {} not found",
                    spec.characteristic
                ))
            })?;

        Ok(BluetoothEndpoint {
            peripheral: self.peripheral.clone(),
            characteristic,
        })
    }

    async fn subscribe_link_loss(&self) -> Result<LinkLoss> {
        let mut events = self
            .adapter
            .events()
            .await
            .map_err(|e| Error::ChannelOpenFailed(e.to_string()))?;
        let id = self.peripheral.id();
        let (mut notifier, loss) = LinkLoss::channel();

        // a disconnect before the stream was taken will never show up on it
        if !self.is_connected().await {
            warn!(?id, "link already down when subscribing");
            notifier.notify();
            return Ok(loss);
        }

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.next() => match event {
                        Some(CentralEvent::DeviceDisconnected(lost)) if lost == id => break,
                        Some(_) => {}
                        // adapter event stream ended, the link cannot be alive
                        None => break,
                    },
                    _ = notifier.closed() => return,
                }
            }
            notifier.notify();
        });

        Ok(loss)
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<()> {
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| Error::ConnectFailed(e.to_string()))
    }
}

#[derive(Clone)]
pub struct BluetoothEndpoint {
    peripheral: Peripheral,
    characteristic: Characteristic,
}

impl Endpoint for BluetoothEndpoint {
    async fn write(&self, data: &[u8]) -> Result<()> {
        self.peripheral
            .write(&self.characteristic, data, WriteType::WithResponse)
            .await
            .map_err(|e| Error::WriteFailed(e.to_string()))
    }
}
