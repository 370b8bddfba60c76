//! FirminIA wire protocol - BLE constants and the configuration payload
//!
//! The device receives its whole configuration in a single write: a flat UTF-8
//! JSON object. There is no framing, chunking or acknowledgement.

pub mod ble;
mod locale;
mod payload;

pub use locale::{Locale, ParseLocaleError};
pub use payload::{
    ConfigurationPayload, PENDING_FILES_PATH, PayloadError, WirePayload, pending_files_url,
};
