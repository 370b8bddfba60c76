use firminia_proto::PayloadError;

/// Failures surfaced by discovery, connection and configuration operations.
///
/// None of these are retried internally; retrying is always a user action.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("bluetooth is not available on this client: {0}")]
    TransportUnavailable(String),
    #[error("device selection was cancelled")]
    UserCancelled,
    #[error("no FirminIA device found nearby")]
    NoMatchingDevice,
    #[error("failed to connect to device: {0}")]
    ConnectFailed(String),
    #[error("failed to open configuration channel: {0}")]
    ChannelOpenFailed(String),
    #[error("no device connected")]
    NotConnected,
    #[error("failed to send configuration: {0}")]
    WriteFailed(String),
    #[error("invalid configuration: {0}")]
    ValidationFailed(#[from] PayloadError),
    #[error("a connection attempt is already in progress")]
    Busy,
    #[error("already connected to {0}")]
    AlreadyConnected(String),
    #[error("unknown device: {0}")]
    UnknownDevice(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors reading or writing client-local preferences.
#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error("failed to access preferences file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("invalid preferences file: {0}")]
    Parse(#[from] serde_json::Error),
}
