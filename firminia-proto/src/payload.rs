//! Configuration payload: the form the user fills in, and the JSON the device receives

use crate::Locale;

/// Path polled by the device on the signing service, appended to the server host.
pub const PENDING_FILES_PATH: &str = "/api/v2/files/pending?page=0&size=1";

const MAX_SSID_LEN: usize = 32;
const MAX_PASSWORD_LEN: usize = 64;
const MS_PER_MINUTE: u64 = 60_000;

/// Builds the polling URL the device uses: `https://{server}/api/v2/files/pending?page=0&size=1`
pub fn pending_files_url(server: &str) -> String {
    format!("https://{server}{PENDING_FILES_PATH}")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} must be at most {max} bytes")]
    TooLong { field: &'static str, max: usize },
    #[error("server must be a bare host name, got {0:?}")]
    InvalidServer(String),
    #[error("port must be a number between 1 and 65535, got {0:?}")]
    InvalidPort(String),
    #[error("interval must be a positive number of minutes, got {0:?}")]
    InvalidInterval(String),
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Settings entered by the user, with the polling interval in minutes.
///
/// Constructed fresh for every submission; it has no identity beyond that.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConfigurationPayload {
    pub ssid: String,
    pub password: String,
    pub server: String,
    pub port: String,
    pub token: String,
    pub user: String,
    /// Minutes between checks for documents to sign.
    pub interval: String,
    #[serde(default)]
    pub language: Locale,
}

impl ConfigurationPayload {
    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.ssid.is_empty() {
            return Err(PayloadError::Empty { field: "ssid" });
        }
        if self.ssid.len() > MAX_SSID_LEN {
            return Err(PayloadError::TooLong { field: "ssid", max: MAX_SSID_LEN });
        }
        if self.password.len() > MAX_PASSWORD_LEN {
            return Err(PayloadError::TooLong { field: "password", max: MAX_PASSWORD_LEN });
        }
        if self.server.trim().is_empty() {
            return Err(PayloadError::Empty { field: "server" });
        }
        if self.server.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(PayloadError::InvalidServer(self.server.clone()));
        }
        match self.port.trim().parse::<u16>() {
            Ok(p) if p > 0 => {}
            _ => return Err(PayloadError::InvalidPort(self.port.clone())),
        }
        self.interval_ms()?;
        Ok(())
    }

    /// Polling interval converted to milliseconds.
    pub fn interval_ms(&self) -> Result<u64, PayloadError> {
        let minutes = self
            .interval
            .trim()
            .parse::<u64>()
            .map_err(|_| PayloadError::InvalidInterval(self.interval.clone()))?;
        if minutes == 0 {
            return Err(PayloadError::InvalidInterval(self.interval.clone()));
        }
        minutes
            .checked_mul(MS_PER_MINUTE)
            .ok_or_else(|| PayloadError::InvalidInterval(self.interval.clone()))
    }

    pub fn to_wire(&self) -> Result<WirePayload, PayloadError> {
        self.validate()?;
        Ok(WirePayload {
            ssid: self.ssid.clone(),
            password: self.password.clone(),
            server: self.server.clone(),
            port: self.port.trim().to_string(),
            url: pending_files_url(&self.server),
            token: self.token.clone(),
            user: self.user.clone(),
            interval: self.interval_ms()?.to_string(),
            language: self.language.wire_index().to_string(),
        })
    }

    /// Validates and encodes the payload as the UTF-8 JSON bytes written to the device.
    pub fn encode(&self) -> Result<Vec<u8>, PayloadError> {
        self.to_wire()?.to_bytes()
    }
}

/// The flat JSON object written to the configuration characteristic.
///
/// Field order is part of the format: the device firmware expects
/// `ssid, password, server, port, url, token, user, interval, language`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WirePayload {
    pub ssid: String,
    pub password: String,
    pub server: String,
    pub port: String,
    /// Redundant with server; kept because the firmware reads it directly.
    pub url: String,
    pub token: String,
    pub user: String,
    /// Milliseconds, decimal.
    pub interval: String,
    /// Locale index, "0".."3".
    pub language: String,
}

impl WirePayload {
    pub fn to_bytes(&self) -> Result<Vec<u8>, PayloadError> {
        serde_json::to_vec(self).map_err(|e| PayloadError::Malformed(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, PayloadError> {
        serde_json::from_slice(data).map_err(|e| PayloadError::Malformed(e.to_string()))
    }
}
