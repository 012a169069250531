//! # ODC Stub
//!
//! In-process stand-in for the two services the console talks to:
//! - the records service (`POST /donors`, `POST /patients`)
//! - the verification/ledger service (`POST /signatures/verify-and-store`)
//!
//! State lives in memory and is lost on restart. Document verification is simulated: an
//! empty document is "illegible", anything else is stored under a hash of its content.
//!
//! Used for local runs of the `odc` CLI and by the workspace end-to-end tests.

mod config;
mod error;

pub use config::{StubConfig, DEFAULT_STUB_ADDR, DEFAULT_STUB_TOKEN};
pub use error::{StubError, StubResult};

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use odc_types::EntityKind;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tower_http::cors::CorsLayer;

/// Request bodies above this are refused; leaves room for a 5 MiB document plus fields.
pub const BODY_LIMIT_BYTES: usize = 6 * 1024 * 1024;

#[derive(Debug, Default)]
struct Registry {
    next_id: u64,
    entities: HashMap<String, EntityKind>,
    verified: HashMap<String, String>,
}

/// Shared state of the stub handlers.
#[derive(Clone, Debug)]
pub struct StubState {
    token: Arc<str>,
    registry: Arc<Mutex<Registry>>,
}

impl StubState {
    pub fn new(config: &StubConfig) -> Self {
        Self {
            token: Arc::from(config.token()),
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    pub fn entity_count(&self) -> usize {
        self.registry().entities.len()
    }

    /// Content hash stored for an entity, once its consent is verified.
    pub fn verified_hash(&self, entity_id: &str) -> Option<String> {
        self.registry().verified.get(entity_id).cloned()
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Checks the bearer token and returns the tenant of the request.
    fn authorise(&self, headers: &HeaderMap) -> StubResult<String> {
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(StubError::Unauthorised)?;
        if token != &*self.token {
            return Err(StubError::Unauthorised);
        }

        headers
            .get("x-tenant-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or(StubError::MissingTenant)
    }
}

pub fn router(state: StubState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/donors", post(create_donor))
        .route("/patients", post(create_patient))
        .route("/signatures/verify-and-store", post(verify_and_store))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the stub on an already bound listener until the task is dropped.
pub async fn serve(listener: tokio::net::TcpListener, state: StubState) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true, "message": "ODC stub services are alive" }))
}

async fn create_donor(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Map<String, Value>>,
) -> StubResult<(StatusCode, Json<Value>)> {
    create_entity(&state, &headers, EntityKind::Donor, body)
}

async fn create_patient(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Map<String, Value>>,
) -> StubResult<(StatusCode, Json<Value>)> {
    create_entity(&state, &headers, EntityKind::Patient, body)
}

fn create_entity(
    state: &StubState,
    headers: &HeaderMap,
    kind: EntityKind,
    body: Map<String, Value>,
) -> StubResult<(StatusCode, Json<Value>)> {
    let tenant = state.authorise(headers)?;
    let request_id = request_id(headers);

    let has_name = body
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|n| !n.trim().is_empty());
    if !has_name {
        tracing::info!("rejected {} without a name (request {})", kind, request_id);
        return Err(StubError::rejected(StatusCode::BAD_REQUEST, "name is required"));
    }

    let id = {
        let mut registry = state.registry();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.entities.insert(id.to_string(), kind);
        id
    };

    tracing::info!(
        "created {} {} for tenant {} (request {})",
        kind,
        id,
        tenant,
        request_id
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": { "id": id } })),
    ))
}

#[derive(Debug, Default)]
struct ConsentUpload {
    file: Option<Vec<u8>>,
    signer_name: Option<String>,
    signer_type: Option<String>,
    entity_type: Option<String>,
    entity_id: Option<String>,
    guardian_name: Option<String>,
    guardian_relation: Option<String>,
}

impl ConsentUpload {
    async fn read(mut multipart: Multipart) -> StubResult<Self> {
        let mut upload = ConsentUpload::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "signatureFile" {
                upload.file = Some(field.bytes().await?.to_vec());
                continue;
            }
            let value = field.text().await?.trim().to_string();
            let value = (!value.is_empty()).then_some(value);
            match name.as_str() {
                "signerName" => upload.signer_name = value,
                "signerType" => upload.signer_type = value,
                "entityType" => upload.entity_type = value,
                "entityId" => upload.entity_id = value,
                "guardianName" => upload.guardian_name = value,
                "guardianRelation" => upload.guardian_relation = value,
                other => tracing::debug!("ignoring multipart field {}", other),
            }
        }
        Ok(upload)
    }
}

fn required(value: Option<String>, field: &str) -> StubResult<String> {
    value.ok_or_else(|| {
        StubError::rejected(StatusCode::BAD_REQUEST, format!("{} is required", field))
    })
}

async fn verify_and_store(
    State(state): State<StubState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> StubResult<Json<Value>> {
    let tenant = state.authorise(&headers)?;
    let request_id = request_id(&headers);
    let upload = ConsentUpload::read(multipart).await?;

    let file = upload.file.unwrap_or_default();
    required(upload.signer_name, "signerName")?;
    let signer_type = required(upload.signer_type, "signerType")?;
    let entity_type = required(upload.entity_type, "entityType")?;
    let entity_id = required(upload.entity_id, "entityId")?;

    let kind: EntityKind = entity_type.parse().map_err(|_| {
        StubError::rejected(StatusCode::BAD_REQUEST, "entityType must be DONOR or PATIENT")
    })?;
    if signer_type.eq_ignore_ascii_case("GUARDIAN")
        && (upload.guardian_name.is_none() || upload.guardian_relation.is_none())
    {
        return Err(StubError::rejected(
            StatusCode::BAD_REQUEST,
            "guardian name and relation are required",
        ));
    }

    if state.registry().entities.get(&entity_id) != Some(&kind) {
        tracing::info!("consent for unknown {} {} (request {})", kind, entity_id, request_id);
        return Err(StubError::rejected(StatusCode::OK, "entity not found"));
    }

    if file.is_empty() {
        tracing::info!("illegible consent for {} {} (request {})", kind, entity_id, request_id);
        return Err(StubError::rejected(StatusCode::OK, "document illegible"));
    }

    let (ipfs_hash, tx_hash) = ledger_proof(&file, &entity_id);
    state
        .registry()
        .verified
        .insert(entity_id.clone(), ipfs_hash.clone());

    tracing::info!(
        "stored consent for {} {} ({} bytes) for tenant {} (request {})",
        kind,
        entity_id,
        file.len(),
        tenant,
        request_id
    );
    Ok(Json(json!({
        "success": true,
        "data": { "ipfsHash": ipfs_hash, "ethereumTxHash": tx_hash }
    })))
}

/// Deterministic stand-ins for the content hash and ledger transaction id.
fn ledger_proof(file: &[u8], entity_id: &str) -> (String, String) {
    let digest = Sha256::digest(file);
    let content = hex::encode(digest);
    let ipfs_hash = format!("Qm{}", &content[..44]);

    let mut tx = Sha256::new();
    tx.update(digest);
    tx.update(entity_id.as_bytes());
    let tx_hash = format!("0x{}", hex::encode(tx.finalize()));

    (ipfs_hash, tx_hash)
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string()
}
