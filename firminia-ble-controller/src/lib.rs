//! FirminIA BLE Controller
//!
//! Client side of FirminIA V3 provisioning: find a device, connect to it, and
//! write its configuration in one go.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use firminia_ble_controller::{AnyTransport, ClientConfig, ConnectionManager, DeviceRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new(firminia_ble_controller::firminia_home()?);
//!     let transport = Arc::new(AnyTransport::from_config(&config).await);
//!
//!     let mut registry = DeviceRegistry::new(transport.clone(), config.filter.clone());
//!     let devices = registry.scan().await?;
//!
//!     let manager = ConnectionManager::new(transport, config.channel);
//!     manager.connect(&devices[0]).await?;
//!     manager.send(&payload).await?;
//!     manager.disconnect().await;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
pub mod flow;
pub mod lifecycle;
pub mod registry;
pub mod session;
pub mod transport;

pub use config::{ClientConfig, TransportKind, firminia_home};
pub use error::{Error, PreferenceError, Result};
pub use flow::{Capability, FlowInputs, Screen, ScreenFlow, derive_screen};
pub use lifecycle::{ConnectionManager, ConnectionState};
pub use registry::DeviceRegistry;
pub use session::{FilePreferences, MemoryPreferences, PreferenceStore, Session};
pub use transport::{
    AnyTransport, CandidateDevice, ChannelSpec, DiscoveryFilter, SimulatedTransport, Transport,
};

pub use firminia_proto::{ConfigurationPayload, Locale};
