//! Client configuration and the local home directory

use std::path::PathBuf;
use std::time::Duration;

use firminia_proto::ble::{CONFIG_CHARACTERISTIC_UUID, DEVICE_NAME_MARKER, SERVICE_UUID};

use crate::transport::{ChannelSpec, DiscoveryFilter};

/// Which transport implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Platform Bluetooth via btleplug
    #[default]
    Bluetooth,
    /// Timer-driven fake, no radio needed
    Simulated,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub transport: TransportKind,
    /// How long a discovery scan listens for advertisements
    pub scan_duration: Duration,
    pub channel: ChannelSpec,
    pub filter: DiscoveryFilter,
    /// Where client-local preferences live
    pub home: PathBuf,
}

impl ClientConfig {
    pub fn new(home: PathBuf) -> Self {
        Self {
            transport: TransportKind::default(),
            scan_duration: Duration::from_secs(5),
            channel: ChannelSpec {
                service: SERVICE_UUID,
                characteristic: CONFIG_CHARACTERISTIC_UUID,
            },
            filter: DiscoveryFilter {
                name_marker: DEVICE_NAME_MARKER.to_string(),
                optional_services: vec![SERVICE_UUID],
            },
            home,
        }
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_scan_duration(mut self, duration: Duration) -> Self {
        self.scan_duration = duration;
        self
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.home.join("preferences.json")
    }
}

/// FIRMINIA_HOME, or `~/.firminia` when unset. Created if missing.
pub fn firminia_home() -> std::io::Result<PathBuf> {
    let home = match std::env::var("FIRMINIA_HOME") {
        Ok(h) => PathBuf::from(h),
        Err(_) => dirs::home_dir()
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "no home directory")
            })?
            .join(".firminia"),
    };

    if !home.exists() {
        std::fs::create_dir_all(&home)?;
    }

    Ok(home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_deployment_constants() {
        let config = ClientConfig::new(PathBuf::from("/tmp/firminia"));
        assert_eq!(config.transport, TransportKind::Bluetooth);
        assert_eq!(config.channel.service, SERVICE_UUID);
        assert_eq!(config.channel.characteristic, CONFIG_CHARACTERISTIC_UUID);
        assert_eq!(config.filter.name_marker, "firminia");
        assert_eq!(
            config.preferences_path(),
            PathBuf::from("/tmp/firminia/preferences.json")
        );
    }
}
