//! Session context: the bearer credential and tenant behind every request.
//!
//! The credential lives in an injected [`SessionStore`] rather than process-wide state, so
//! tests substitute a [`MemorySessionStore`] and the CLI persists to a
//! [`FileSessionStore`].
//!
//! The request client never tears the session down itself. Authorisation failures are
//! published as [`SessionSignal::Unauthenticated`] and a top-level [`SessionWatcher`]
//! decides what to do with them, which lets flows that tolerate partial failure hold the
//! signal back until they have recorded their own outcome.

use crate::config::TenantSource;
use crate::{ClientError, ClientResult};
use odc_types::NonEmptyText;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

/// The operator profile saved alongside the session at sign-in.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital_id: Option<String>,
}

/// Everything a session store persists.
#[derive(Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<OperatorProfile>,
}

impl fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredSession")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("tenant", &self.tenant)
            .field("profile", &self.profile)
            .finish()
    }
}

/// Storage for the session credential, tenant and profile.
///
/// Implementors provide whole-record `load`/`store`; the field accessors are derived.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> StoredSession;

    fn store(&self, session: StoredSession) -> ClientResult<()>;

    fn clear(&self) -> ClientResult<()> {
        self.store(StoredSession::default())
    }

    fn token(&self) -> Option<String> {
        self.load().token
    }

    fn set_token(&self, token: Option<String>) -> ClientResult<()> {
        let mut session = self.load();
        session.token = token;
        self.store(session)
    }

    fn tenant(&self) -> Option<String> {
        self.load().tenant
    }

    fn set_tenant(&self, tenant: Option<String>) -> ClientResult<()> {
        let mut session = self.load();
        session.tenant = tenant;
        self.store(session)
    }

    fn profile(&self) -> Option<OperatorProfile> {
        self.load().profile
    }

    fn set_profile(&self, profile: Option<OperatorProfile>) -> ClientResult<()> {
        let mut session = self.load();
        session.profile = profile;
        self.store(session)
    }
}

/// In-memory session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<StoredSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: StoredSession) -> Self {
        Self {
            inner: Mutex::new(session),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> StoredSession {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store(&self, session: StoredSession) -> ClientResult<()> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = session;
        Ok(())
    }
}

/// Session store persisted as a JSON file.
///
/// The file is read once at open and rewritten on every change. Writes go to a sibling
/// temporary file first and are renamed into place, so a crash never leaves half a
/// credential on disk. A missing file is an empty session.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    cached: Mutex<StoredSession>,
}

impl FileSessionStore {
    /// Opens (or prepares to create) the session file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if an existing file cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> ClientResult<Self> {
        let path = path.into();
        let cached = if path.is_file() {
            let contents = fs::read_to_string(&path).map_err(ClientError::SessionRead)?;
            if contents.trim().is_empty() {
                StoredSession::default()
            } else {
                serde_json::from_str(&contents).map_err(ClientError::SessionDeserialization)?
            }
        } else {
            StoredSession::default()
        };

        Ok(Self {
            path,
            cached: Mutex::new(cached),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, session: &StoredSession) -> ClientResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(ClientError::SessionWrite)?;
        }

        let json =
            serde_json::to_string_pretty(session).map_err(ClientError::SessionSerialization)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(ClientError::SessionWrite)?;
        fs::rename(&tmp, &self.path).map_err(ClientError::SessionWrite)
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> StoredSession {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store(&self, session: StoredSession) -> ClientResult<()> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_file(&session)?;
        *cached = session;
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ClientError::SessionWrite(e)),
        }
        *cached = StoredSession::default();
        Ok(())
    }
}

/// Signals published on the session channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionSignal {
    /// A service rejected the credential; the operator must sign in again.
    Unauthenticated,
}

/// Handle on the current session, shared by the request client and the top-level
/// controller.
#[derive(Clone)]
pub struct SessionContext {
    store: Arc<dyn SessionStore>,
    signals: broadcast::Sender<SessionSignal>,
}

impl SessionContext {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        let (signals, _) = broadcast::channel(16);
        Self { store, signals }
    }

    pub fn is_authenticated(&self) -> bool {
        self.bearer_token().is_some()
    }

    pub fn bearer_token(&self) -> Option<String> {
        self.store.token().filter(|t| !t.trim().is_empty())
    }

    pub fn current_tenant(&self) -> Option<String> {
        self.store.tenant().filter(|t| !t.trim().is_empty())
    }

    pub fn profile(&self) -> Option<OperatorProfile> {
        self.store.profile()
    }

    /// Tenant used for the verification upload.
    ///
    /// With [`TenantSource::Profile`] the profile's tenant is preferred and the session
    /// tenant is the fallback; a divergence between the two is logged.
    pub fn verification_tenant(&self, source: TenantSource) -> Option<String> {
        let session_tenant = self.current_tenant();
        match source {
            TenantSource::Session => session_tenant,
            TenantSource::Profile => {
                let profile_tenant = self
                    .store
                    .profile()
                    .and_then(|p| p.tenant_id)
                    .filter(|t| !t.trim().is_empty());
                match (profile_tenant, session_tenant) {
                    (Some(profile), Some(session)) if profile != session => {
                        tracing::warn!(
                            "profile tenant {} differs from session tenant {}; using profile",
                            profile,
                            session
                        );
                        Some(profile)
                    }
                    (Some(profile), _) => Some(profile),
                    (None, session) => session,
                }
            }
        }
    }

    /// Stores a fresh credential, replacing whatever was there.
    pub fn login(
        &self,
        token: NonEmptyText,
        tenant: Option<NonEmptyText>,
        profile: Option<OperatorProfile>,
    ) -> ClientResult<()> {
        self.store.store(StoredSession {
            token: Some(token.into_string()),
            tenant: tenant.map(NonEmptyText::into_string),
            profile,
        })?;
        tracing::info!("session started");
        Ok(())
    }

    /// Clears every stored credential.
    pub fn teardown(&self) -> ClientResult<()> {
        self.store.clear()?;
        tracing::info!("session cleared");
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionSignal> {
        self.signals.subscribe()
    }

    /// Publishes [`SessionSignal::Unauthenticated`] to every subscriber.
    pub fn signal_unauthenticated(&self) {
        // No subscribers is fine: nothing is watching the session.
        let _ = self.signals.send(SessionSignal::Unauthenticated);
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("authenticated", &self.is_authenticated())
            .field("tenant", &self.current_tenant())
            .finish()
    }
}

/// Top-level observer that reacts to authorisation failures.
///
/// On every [`SessionSignal::Unauthenticated`] it tears the session down and then runs the
/// caller's `on_expired` action (send the operator back to sign-in).
pub struct SessionWatcher {
    session: SessionContext,
    signals: broadcast::Receiver<SessionSignal>,
}

impl SessionWatcher {
    pub fn new(session: SessionContext) -> Self {
        let signals = session.subscribe();
        Self { session, signals }
    }

    /// Waits for the next expiry signal and tears the session down.
    ///
    /// Returns `false` once the signal channel has closed.
    pub async fn next_expiry(&mut self) -> bool {
        loop {
            match self.signals.recv().await {
                Ok(SessionSignal::Unauthenticated) => {
                    if let Err(e) = self.session.teardown() {
                        tracing::error!("failed to clear session after expiry: {}", e);
                    }
                    return true;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("session watcher skipped {} duplicate signals", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    }

    /// Runs until the channel closes, invoking `on_expired` after each teardown.
    pub async fn run<F>(mut self, mut on_expired: F)
    where
        F: FnMut() + Send,
    {
        while self.next_expiry().await {
            on_expired();
        }
    }
}
