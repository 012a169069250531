//! # ODC Client
//!
//! Session context and authenticated request client for the organ donation console.
//!
//! Contains:
//! - [`SessionContext`] over an injected [`SessionStore`] (memory or JSON file)
//! - [`AuthenticatedClient`], which attaches the bearer token and tenant to every call and
//!   turns authorisation failures into a typed [`SessionSignal`]
//! - the [`Transport`] seam with a `reqwest` implementation and a scriptable
//!   [`mock::MockTransport`]
//! - wire types of the records and verification services
//!
//! Used by `odc-core` to run registrations and by the `odc` CLI to manage sign-in.

#![warn(rust_2018_idioms)]

pub mod api;
mod client;
pub mod config;
mod error;
pub mod mock;
pub mod session;
pub mod transport;

pub use api::{ApiEnvelope, ApiReply, CreatedEntity, SignatureUpload, StoredSignature};
pub use client::{
    AuthFailurePolicy, AuthenticatedClient, HEADER_AUTHORIZATION, HEADER_REQUEST_ID,
    HEADER_TENANT,
};
pub use config::{ClientConfig, TenantSource};
pub use error::{ClientError, ClientResult};
pub use session::{
    FileSessionStore, MemorySessionStore, OperatorProfile, SessionContext, SessionSignal,
    SessionStore, SessionWatcher, StoredSession,
};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
