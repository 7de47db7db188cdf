use rv_core::FrameError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("command link connection failed: {0}")]
    Connection(String),
    #[error("command link channel is closed")]
    ChannelClosed,
    #[error("malformed command link payload: {0}")]
    MalformedPayload(#[from] FrameError),
}

/// A failed read against one of the monitoring endpoints.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("{endpoint} request failed: {message}")]
    Request {
        endpoint: &'static str,
        message: String,
    },
    #[error("{endpoint} returned status {status}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("{endpoint} response could not be decoded: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {setting} url '{value}': {reason}")]
    InvalidUrl {
        setting: &'static str,
        value: String,
        reason: String,
    },
    #[error("http client could not be built: {0}")]
    HttpClient(String),
}
