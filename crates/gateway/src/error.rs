//! Gateway error types.
//!
//! Nothing here is user-facing; errors surface through the log sink and
//! decide control flow (close a client, skip a tick). The runtime stays
//! up across all of them.

use thiserror::Error;

/// Gateway error type.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The hello message was malformed or lacked a `game` field.
    #[error("invalid hello message")]
    BadHello,

    /// Fetch succeeded but the document has no name and no teams.
    #[error("game {0} returned an empty snapshot")]
    EmptySnapshot(u64),

    /// Upstream transport, timeout or protocol error.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Upstream answered with an error status.
    #[error("upstream returned status {0}")]
    UpstreamStatus(u16),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A write to a client channel failed; the client gets dropped.
    #[error("client write failed: {0}")]
    ClientWrite(String),

    /// The client channel closed before or during a read.
    #[error("client channel closed")]
    ChannelClosed,

    /// Invalid configuration, startup only.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
