//! Error taxonomy shared by the fetchers, normalizers and the monitor loop.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArrivalError {
    /// Network, timeout or non-success HTTP status while fetching a source.
    #[error("transport error: {0}")]
    Transport(String),

    /// Payload could not be read as the expected SIRI JSON or GTFS-RT schema.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Missing or invalid configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for arrival operations
pub type Result<T> = std::result::Result<T, ArrivalError>;

impl ArrivalError {
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::MalformedPayload(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}

impl From<reqwest::Error> for ArrivalError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ArrivalError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedPayload(err.to_string())
    }
}

impl From<prost::DecodeError> for ArrivalError {
    fn from(err: prost::DecodeError) -> Self {
        Self::MalformedPayload(err.to_string())
    }
}
