use crate::{StubError, StubResult};
use std::net::SocketAddr;

pub const DEFAULT_STUB_ADDR: &str = "127.0.0.1:4000";
pub const DEFAULT_STUB_TOKEN: &str = "dev-token";

/// Stub server configuration, resolved once at startup.
#[derive(Clone, Debug)]
pub struct StubConfig {
    addr: SocketAddr,
    token: String,
}

impl StubConfig {
    pub fn new(addr: SocketAddr, token: impl Into<String>) -> StubResult<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(StubError::Config("bearer token must not be empty".into()));
        }
        Ok(Self { addr, token })
    }

    /// Builds the configuration from `ODC_STUB_ADDR` and `ODC_STUB_TOKEN` values.
    pub fn from_env_values(addr: Option<String>, token: Option<String>) -> StubResult<Self> {
        let addr = addr.unwrap_or_else(|| DEFAULT_STUB_ADDR.into());
        let addr = addr
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| StubError::Config(format!("ODC_STUB_ADDR '{}': {}", addr, e)))?;
        Self::new(addr, token.unwrap_or_else(|| DEFAULT_STUB_TOKEN.into()))
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}
