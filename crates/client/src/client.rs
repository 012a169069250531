//! Authenticated request client.
//!
//! Every call goes through [`AuthenticatedClient::call`], which:
//!
//! 1. attaches `Authorization: Bearer <token>` and `X-Tenant-ID: <tenant>` when the
//!    session has them, plus a fresh `X-Request-ID`
//! 2. bounds the send by the configured request timeout
//! 3. classifies HTTP 401 as [`ClientError::Unauthenticated`] and, depending on the
//!    call's [`AuthFailurePolicy`], publishes the session's unauthenticated signal
//! 4. decodes the `{success, data, message}` envelope into an [`ApiReply`]
//!
//! Entity creation publishes the signal straight away. The verification upload defers it:
//! a 401 there arrives after the entity already exists, and the caller must record that
//! outcome before the session is torn down.

use crate::api::{
    ApiEnvelope, ApiReply, CreatedEntity, SignatureUpload, StoredSignature, VERIFY_AND_STORE_PATH,
};
use crate::config::ClientConfig;
use crate::session::SessionContext;
use crate::transport::{HttpRequest, HttpResponse, RequestBody, Transport};
use crate::{ClientError, ClientResult};
use odc_types::EntityKind;
use serde::de::DeserializeOwned;

pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_TENANT: &str = "X-Tenant-ID";
pub const HEADER_REQUEST_ID: &str = "X-Request-ID";

/// What the client does with an authorisation failure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthFailurePolicy {
    /// Publish [`crate::SessionSignal::Unauthenticated`] immediately.
    #[default]
    Signal,
    /// Return the error only; the caller publishes the signal when it is ready.
    Defer,
}

/// Request client bound to one session and one transport.
pub struct AuthenticatedClient<T> {
    config: ClientConfig,
    session: SessionContext,
    transport: T,
}

impl<T: Transport> AuthenticatedClient<T> {
    pub fn new(config: ClientConfig, session: SessionContext, transport: T) -> Self {
        Self {
            config,
            session,
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `POST /donors` or `POST /patients` with the flat field object.
    pub async fn create_entity(
        &self,
        kind: EntityKind,
        payload: serde_json::Map<String, serde_json::Value>,
    ) -> ClientResult<ApiReply<CreatedEntity>> {
        let request = HttpRequest::post(
            kind.collection_path(),
            RequestBody::Json(serde_json::Value::Object(payload)),
        );
        let tenant = self.session.current_tenant();
        self.call(request, tenant, AuthFailurePolicy::Signal).await
    }

    /// `POST /signatures/verify-and-store` with the multipart upload.
    ///
    /// Uses [`AuthFailurePolicy::Defer`] and the configured verification tenant source.
    pub async fn verify_and_store(
        &self,
        upload: SignatureUpload,
    ) -> ClientResult<ApiReply<StoredSignature>> {
        let request = HttpRequest::post(
            VERIFY_AND_STORE_PATH,
            RequestBody::Multipart(upload.into_parts()),
        );
        let tenant = self
            .session
            .verification_tenant(self.config.verification_tenant_source());
        self.call(request, tenant, AuthFailurePolicy::Defer).await
    }

    /// Sends one request with session headers attached and decodes the reply envelope.
    pub async fn call<R: DeserializeOwned>(
        &self,
        mut request: HttpRequest,
        tenant: Option<String>,
        policy: AuthFailurePolicy,
    ) -> ClientResult<ApiReply<R>> {
        let request_id = uuid::Uuid::new_v4().to_string();
        if let Some(token) = self.session.bearer_token() {
            request
                .headers
                .push((HEADER_AUTHORIZATION.into(), format!("Bearer {}", token)));
        }
        if let Some(tenant) = tenant {
            request.headers.push((HEADER_TENANT.into(), tenant));
        }
        request
            .headers
            .push((HEADER_REQUEST_ID.into(), request_id.clone()));

        let path = request.path.clone();
        tracing::debug!("sending POST {} (request {})", path, request_id);

        let timeout = self.config.request_timeout();
        let response = match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Ok(result) => result.map_err(|e| {
                tracing::warn!("{} failed (request {}): {}", path, request_id, e);
                e
            })?,
            Err(_) => {
                tracing::warn!(
                    "{} timed out after {}ms (request {})",
                    path,
                    timeout.as_millis(),
                    request_id
                );
                return Err(ClientError::Timeout {
                    after_ms: timeout.as_millis() as u64,
                });
            }
        };

        tracing::debug!("{} returned HTTP {} (request {})", path, response.status, request_id);

        if response.status == 401 {
            match policy {
                AuthFailurePolicy::Signal => {
                    tracing::warn!("{} rejected the session credential", path);
                    self.session.signal_unauthenticated();
                }
                AuthFailurePolicy::Defer => {
                    tracing::warn!(
                        "{} rejected the session credential; signal deferred to caller",
                        path
                    );
                }
            }
            return Err(ClientError::Unauthenticated);
        }

        decode_reply(&response)
    }
}

fn decode_reply<R: DeserializeOwned>(response: &HttpResponse) -> ClientResult<ApiReply<R>> {
    let envelope: ApiEnvelope<serde_json::Value> = match serde_json::from_slice(&response.body) {
        Ok(envelope) => envelope,
        Err(e) if response.is_success() => return Err(ClientError::Decode(e.to_string())),
        Err(_) => {
            return Err(ClientError::Status {
                status: response.status,
                message: response.body_excerpt(),
            })
        }
    };

    if envelope.success && response.is_success() {
        let data = envelope
            .data
            .ok_or_else(|| ClientError::Decode("reply has success=true but no data".into()))?;
        let data = serde_json::from_value(data).map_err(|e| ClientError::Decode(e.to_string()))?;
        return Ok(ApiReply::Accepted(data));
    }

    let message = envelope
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("request rejected (HTTP {})", response.status));

    Ok(ApiReply::Rejected {
        status: response.status,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TenantSource;
    use crate::mock::{MockReply, MockTransport};
    use crate::session::{MemorySessionStore, OperatorProfile, SessionSignal};
    use crate::transport::FormPart;
    use odc_types::{EntityId, NonEmptyText, SignerType};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn text(s: &str) -> NonEmptyText {
        NonEmptyText::new(s).unwrap()
    }

    fn signed_in_session() -> SessionContext {
        let session = SessionContext::new(Arc::new(MemorySessionStore::new()));
        session
            .login(
                text("tok-123"),
                Some(text("tenant-session")),
                Some(OperatorProfile {
                    tenant_id: Some("tenant-profile".into()),
                    ..OperatorProfile::default()
                }),
            )
            .unwrap();
        session
    }

    fn client(transport: MockTransport) -> AuthenticatedClient<MockTransport> {
        let config = ClientConfig::new("http://records.test")
            .unwrap()
            .with_request_timeout(Duration::from_millis(100))
            .unwrap();
        AuthenticatedClient::new(config, signed_in_session(), transport)
    }

    fn upload() -> SignatureUpload {
        SignatureUpload {
            file_name: "consent.png".into(),
            mime_type: "image/png".into(),
            bytes: vec![1, 2, 3],
            signer_name: "Ada".into(),
            signer_type: SignerType::Own,
            entity_kind: EntityKind::Patient,
            entity_id: EntityId::new("7").unwrap(),
            guardian_name: None,
            guardian_relation: None,
        }
    }

    #[tokio::test]
    async fn create_entity_attaches_session_headers() {
        let transport = MockTransport::new();
        transport.enqueue("/donors", MockReply::ok(json!({ "id": 42 })));
        let client = client(transport.clone());

        let mut payload = serde_json::Map::new();
        payload.insert("name".into(), json!("Ada"));
        let reply = client
            .create_entity(EntityKind::Donor, payload)
            .await
            .unwrap();

        assert_eq!(
            reply,
            ApiReply::Accepted(CreatedEntity {
                id: EntityId::new("42").unwrap()
            })
        );

        let sent = transport.requests_to("/donors");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].header("authorization"), Some("Bearer tok-123"));
        assert_eq!(sent[0].header("x-tenant-id"), Some("tenant-session"));
        assert!(sent[0].header("x-request-id").is_some());
        assert_eq!(sent[0].body, RequestBody::Json(json!({ "name": "Ada" })));
    }

    #[tokio::test]
    async fn headers_are_omitted_without_a_session() {
        let transport = MockTransport::new();
        transport.enqueue("/patients", MockReply::ok(json!({ "id": "p-1" })));
        let config = ClientConfig::new("http://records.test").unwrap();
        let session = SessionContext::new(Arc::new(MemorySessionStore::new()));
        let client = AuthenticatedClient::new(config, session, transport.clone());

        client
            .create_entity(EntityKind::Patient, serde_json::Map::new())
            .await
            .unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.header("authorization"), None);
        assert_eq!(sent.header("x-tenant-id"), None);
    }

    #[tokio::test]
    async fn verification_upload_uses_profile_tenant_by_default() {
        let transport = MockTransport::new();
        transport.enqueue(
            VERIFY_AND_STORE_PATH,
            MockReply::ok(json!({ "ipfsHash": "QmHash", "ethereumTxHash": "0xabc" })),
        );
        let client = client(transport.clone());

        let reply = client.verify_and_store(upload()).await.unwrap();
        assert_eq!(
            reply,
            ApiReply::Accepted(StoredSignature {
                ipfs_hash: "QmHash".into(),
                ethereum_tx_hash: "0xabc".into(),
            })
        );

        let sent = &transport.requests_to(VERIFY_AND_STORE_PATH)[0];
        assert_eq!(sent.header("x-tenant-id"), Some("tenant-profile"));
        match &sent.body {
            RequestBody::Multipart(parts) => {
                assert!(parts.contains(&FormPart::text("entityType", "PATIENT")));
                assert!(parts.contains(&FormPart::text("entityId", "7")));
            }
            other => panic!("expected multipart body, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn verification_tenant_source_can_be_session() {
        let transport = MockTransport::new();
        transport.enqueue(
            VERIFY_AND_STORE_PATH,
            MockReply::ok(json!({ "ipfsHash": "Qm", "ethereumTxHash": "0x1" })),
        );
        let config = ClientConfig::new("http://records.test")
            .unwrap()
            .with_verification_tenant_source(TenantSource::Session);
        let client = AuthenticatedClient::new(config, signed_in_session(), transport.clone());

        client.verify_and_store(upload()).await.unwrap();

        assert_eq!(
            transport.requests()[0].header("x-tenant-id"),
            Some("tenant-session")
        );
    }

    #[tokio::test]
    async fn unauthorised_with_signal_policy_publishes_signal() {
        let transport = MockTransport::new();
        transport.enqueue("/donors", MockReply::unauthorised());
        let client = client(transport);
        let mut signals = client.session().subscribe();

        let err = client
            .create_entity(EntityKind::Donor, serde_json::Map::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Unauthenticated));
        assert_eq!(signals.try_recv().unwrap(), SessionSignal::Unauthenticated);
        // The client never clears the session itself.
        assert!(client.session().is_authenticated());
    }

    #[tokio::test]
    async fn unauthorised_verification_defers_signal() {
        let transport = MockTransport::new();
        transport.enqueue(VERIFY_AND_STORE_PATH, MockReply::unauthorised());
        let client = client(transport);
        let mut signals = client.session().subscribe();

        let err = client.verify_and_store(upload()).await.unwrap_err();

        assert!(matches!(err, ClientError::Unauthenticated));
        assert!(signals.try_recv().is_err());
    }

    #[tokio::test]
    async fn business_rejection_is_a_reply_not_an_error() {
        let transport = MockTransport::new();
        transport.enqueue(
            VERIFY_AND_STORE_PATH,
            MockReply::rejected(200, "document illegible"),
        );
        transport.enqueue("/donors", MockReply::rejected(400, "name is required"));
        transport.enqueue("/patients", MockReply::json(422, json!({ "success": false })));
        let client = client(transport);

        assert_eq!(
            client.verify_and_store(upload()).await.unwrap(),
            ApiReply::Rejected {
                status: 200,
                message: "document illegible".into()
            }
        );
        assert_eq!(
            client
                .create_entity(EntityKind::Donor, serde_json::Map::new())
                .await
                .unwrap(),
            ApiReply::Rejected {
                status: 400,
                message: "name is required".into()
            }
        );
        assert_eq!(
            client
                .create_entity(EntityKind::Patient, serde_json::Map::new())
                .await
                .unwrap(),
            ApiReply::Rejected {
                status: 422,
                message: "request rejected (HTTP 422)".into()
            }
        );
    }

    #[tokio::test]
    async fn unreadable_bodies_are_classified() {
        let transport = MockTransport::new();
        transport.enqueue("/donors", MockReply::raw(502, "<html>bad gateway</html>"));
        transport.enqueue("/donors", MockReply::raw(200, "not json"));
        transport.enqueue("/donors", MockReply::json(200, json!({ "success": true })));
        let client = client(transport);

        let create = || client.create_entity(EntityKind::Donor, serde_json::Map::new());

        assert!(matches!(
            create().await,
            Err(ClientError::Status { status: 502, .. })
        ));
        assert!(matches!(create().await, Err(ClientError::Decode(_))));
        assert!(matches!(create().await, Err(ClientError::Decode(_))));
    }

    #[tokio::test]
    async fn transport_failure_and_timeout_are_errors() {
        let transport = MockTransport::new();
        transport.enqueue("/donors", MockReply::Fail("connection refused".into()));
        transport.enqueue("/donors", MockReply::Hang);
        let client = client(transport);

        assert!(matches!(
            client
                .create_entity(EntityKind::Donor, serde_json::Map::new())
                .await,
            Err(ClientError::Transport(m)) if m == "connection refused"
        ));
        assert!(matches!(
            client
                .create_entity(EntityKind::Donor, serde_json::Map::new())
                .await,
            Err(ClientError::Timeout { after_ms: 100 })
        ));
    }
}
