//! Device Registry: the result of the most recent scan

use std::sync::Arc;

use tracing::{debug, info};

use crate::transport::{CandidateDevice, DiscoveryFilter, Transport};
use crate::{Error, Result};

pub struct DeviceRegistry<T: Transport> {
    transport: Arc<T>,
    filter: DiscoveryFilter,
    devices: Vec<CandidateDevice>,
}

impl<T: Transport> DeviceRegistry<T> {
    pub fn new(transport: Arc<T>, filter: DiscoveryFilter) -> Self {
        Self {
            transport,
            filter,
            devices: Vec::new(),
        }
    }

    /// Discovers devices and keeps those whose name carries the product marker.
    ///
    /// Previous results are discarded before discovery starts, so a failed scan
    /// leaves the registry empty. Fails with `NoMatchingDevice` rather than
    /// returning an empty list.
    pub async fn scan(&mut self) -> Result<Vec<CandidateDevice>> {
        self.devices.clear();

        if !self.transport.is_available().await {
            return Err(Error::TransportUnavailable(
                "bluetooth is not supported on this client".to_string(),
            ));
        }

        let advertisements = self.transport.discover(&self.filter).await?;
        let total = advertisements.len();

        let mut devices: Vec<CandidateDevice> = Vec::new();
        for adv in advertisements {
            let Some(name) = adv.name else {
                continue;
            };
            if !self.filter.accepts(&name) {
                debug!(%name, "ignoring non-FirminIA device");
                continue;
            }
            if devices.iter().any(|d| d.id == adv.id) {
                continue;
            }
            devices.push(CandidateDevice { id: adv.id, name });
        }

        if devices.is_empty() {
            info!(seen = total, "scan found no FirminIA device");
            return Err(Error::NoMatchingDevice);
        }

        info!(seen = total, matched = devices.len(), "scan complete");
        self.devices = devices;
        Ok(self.devices.clone())
    }

    pub fn devices(&self) -> &[CandidateDevice] {
        &self.devices
    }

    pub fn find(&self, id: &str) -> Option<&CandidateDevice> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }
}
