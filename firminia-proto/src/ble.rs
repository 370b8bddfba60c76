//! BLE GATT constants for FirminIA V3 provisioning
//!
//! The device exposes a single service with one writable characteristic. The
//! whole configuration is written to it as one UTF-8 JSON blob. Nothing here is
//! negotiated: these identifiers are fixed per deployment.

use uuid::Uuid;

/// Provisioning service: 0000fff0-0000-1000-8000-00805f9b34fb
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x0000fff0_0000_1000_8000_00805f9b34fb);

/// Configuration characteristic (read/write): 0000ff01-0000-1000-8000-00805f9b34fb
pub const CONFIG_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000ff01_0000_1000_8000_00805f9b34fb);

/// Devices are accepted only if their advertised name contains this marker,
/// compared case-insensitively ("FIRMINIA-42", "FirminIA V3", ...).
pub const DEVICE_NAME_MARKER: &str = "firminia";

/// Returns true if an advertised name belongs to a FirminIA device.
pub fn is_firminia_name(name: &str, marker: &str) -> bool {
    name.to_lowercase().contains(&marker.to_lowercase())
}
