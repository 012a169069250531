/// Errors raised by the session store and the request client.
///
/// A business rejection from a service (`{success: false, message}`) is not an error at
/// this layer; it comes back as [`crate::ApiReply::Rejected`]. These variants are the
/// cases where no usable reply exists.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The service refused the credential (HTTP 401).
    #[error("session expired or credential rejected")]
    Unauthenticated,

    /// The request never produced a response (connection refused, reset, DNS, TLS).
    #[error("transport failure: {0}")]
    Transport(String),

    /// No response arrived within the configured request timeout.
    #[error("no response after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// A non-success status without a readable reply envelope.
    #[error("unexpected HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body was not the expected envelope.
    #[error("malformed response: {0}")]
    Decode(String),

    #[error("invalid client configuration: {0}")]
    Config(String),

    #[error("failed to read session file: {0}")]
    SessionRead(std::io::Error),
    #[error("failed to write session file: {0}")]
    SessionWrite(std::io::Error),
    #[error("failed to serialise session: {0}")]
    SessionSerialization(serde_json::Error),
    #[error("failed to deserialise session: {0}")]
    SessionDeserialization(serde_json::Error),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
