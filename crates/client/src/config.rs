//! Client runtime configuration.
//!
//! Resolved once at process startup and then handed to the request client. Parsing takes
//! optional string values rather than reading the environment so that binaries and tests
//! decide where the values come from.

use crate::{ClientError, ClientResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:4000";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_SESSION_FILE: &str = ".odc/session.json";

/// Where the verification upload takes its `X-Tenant-ID` from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TenantSource {
    /// The tenant stored in the signed-in operator's profile, falling back to the session
    /// tenant when the profile carries none.
    #[default]
    Profile,
    /// The session tenant used by every other call.
    Session,
}

impl FromStr for TenantSource {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "profile" => Ok(TenantSource::Profile),
            "session" => Ok(TenantSource::Session),
            other => Err(ClientError::Config(format!(
                "unknown tenant source '{}' (expected 'profile' or 'session')",
                other
            ))),
        }
    }
}

/// Request client configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    base_url: String,
    request_timeout: Duration,
    verification_tenant_source: TenantSource,
    session_file: PathBuf,
}

impl ClientConfig {
    /// Create a configuration with defaults for everything except the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the URL is empty or not `http(s)://`.
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ClientError::Config("base URL cannot be empty".into()));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "base URL must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        Ok(Self {
            base_url,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            verification_tenant_source: TenantSource::default(),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
        })
    }

    /// Build a configuration from optional raw values (typically environment variables).
    ///
    /// Absent or blank values take their defaults.
    pub fn from_env_values(
        base_url: Option<String>,
        request_timeout_ms: Option<String>,
        tenant_source: Option<String>,
        session_file: Option<String>,
    ) -> ClientResult<Self> {
        fn present(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        let mut cfg = Self::new(present(base_url).unwrap_or_else(|| DEFAULT_API_BASE_URL.into()))?;

        if let Some(raw) = present(request_timeout_ms) {
            let ms = raw.parse::<u64>().map_err(|_| {
                ClientError::Config(format!("request timeout must be milliseconds, got '{}'", raw))
            })?;
            cfg = cfg.with_request_timeout(Duration::from_millis(ms))?;
        }

        if let Some(raw) = present(tenant_source) {
            cfg = cfg.with_verification_tenant_source(raw.parse()?);
        }

        if let Some(raw) = present(session_file) {
            cfg = cfg.with_session_file(PathBuf::from(raw));
        }

        Ok(cfg)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> ClientResult<Self> {
        if timeout.is_zero() {
            return Err(ClientError::Config("request timeout must be > 0".into()));
        }
        self.request_timeout = timeout;
        Ok(self)
    }

    pub fn with_verification_tenant_source(mut self, source: TenantSource) -> Self {
        self.verification_tenant_source = source;
        self
    }

    pub fn with_session_file(mut self, path: PathBuf) -> Self {
        self.session_file = path;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn verification_tenant_source(&self) -> TenantSource {
        self.verification_tenant_source
    }

    pub fn session_file(&self) -> &Path {
        &self.session_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_blank_values() {
        let cfg = ClientConfig::from_env_values(None, Some("  ".into()), None, None).unwrap();
        assert_eq!(cfg.base_url(), DEFAULT_API_BASE_URL);
        assert_eq!(cfg.request_timeout(), Duration::from_millis(30_000));
        assert_eq!(cfg.verification_tenant_source(), TenantSource::Profile);
        assert_eq!(cfg.session_file(), Path::new(DEFAULT_SESSION_FILE));
    }

    #[test]
    fn values_are_parsed() {
        let cfg = ClientConfig::from_env_values(
            Some("https://api.example.org/".into()),
            Some("1500".into()),
            Some("Session".into()),
            Some("/tmp/odc.json".into()),
        )
        .unwrap();

        assert_eq!(cfg.base_url(), "https://api.example.org");
        assert_eq!(cfg.request_timeout(), Duration::from_millis(1500));
        assert_eq!(cfg.verification_tenant_source(), TenantSource::Session);
        assert_eq!(cfg.session_file(), Path::new("/tmp/odc.json"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(ClientConfig::new("ftp://example.org").is_err());
        assert!(ClientConfig::from_env_values(None, Some("0".into()), None, None).is_err());
        assert!(ClientConfig::from_env_values(None, Some("soon".into()), None, None).is_err());
        assert!(ClientConfig::from_env_values(None, None, Some("ledger".into()), None).is_err());
    }
}
