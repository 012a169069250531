//! Wire types of the records and verification services.

use crate::transport::FormPart;
use odc_types::{EntityId, EntityKind, SignerType};

/// Path of the verification/ledger upload endpoint.
pub const VERIFY_AND_STORE_PATH: &str = "/signatures/verify-and-store";

/// Multipart field names of the verification upload.
pub mod fields {
    pub const SIGNATURE_FILE: &str = "signatureFile";
    pub const SIGNER_NAME: &str = "signerName";
    pub const SIGNER_TYPE: &str = "signerType";
    pub const ENTITY_TYPE: &str = "entityType";
    pub const ENTITY_ID: &str = "entityId";
    pub const GUARDIAN_NAME: &str = "guardianName";
    pub const GUARDIAN_RELATION: &str = "guardianRelation";
}

/// Reply envelope shared by both services: `{ success, data, message }`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Outcome of a call that produced a readable envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiReply<T> {
    /// `success: true` with a payload.
    Accepted(T),
    /// `success: false`, or a non-2xx status; `message` is the service's explanation.
    Rejected { status: u16, message: String },
}

/// `data` of a successful `POST /donors` or `POST /patients`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CreatedEntity {
    pub id: EntityId,
}

/// `data` of a successful verification upload.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSignature {
    /// Content hash of the stored document.
    pub ipfs_hash: String,
    /// Ledger transaction recording the document.
    pub ethereum_tx_hash: String,
}

/// Everything the verification upload carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub signer_name: String,
    pub signer_type: SignerType,
    pub entity_kind: EntityKind,
    pub entity_id: EntityId,
    pub guardian_name: Option<String>,
    pub guardian_relation: Option<String>,
}

impl SignatureUpload {
    /// Multipart parts in the order the service documents them.
    ///
    /// Guardian fields are only sent for guardian signers.
    pub fn into_parts(self) -> Vec<FormPart> {
        let mut parts = vec![
            FormPart::File {
                name: fields::SIGNATURE_FILE.into(),
                file_name: self.file_name,
                mime_type: self.mime_type,
                bytes: self.bytes,
            },
            FormPart::text(fields::SIGNER_NAME, self.signer_name),
            FormPart::text(fields::SIGNER_TYPE, self.signer_type.tag()),
            FormPart::text(fields::ENTITY_TYPE, self.entity_kind.tag()),
            FormPart::text(fields::ENTITY_ID, self.entity_id.as_str()),
        ];

        if self.signer_type == SignerType::Guardian {
            if let Some(name) = self.guardian_name {
                parts.push(FormPart::text(fields::GUARDIAN_NAME, name));
            }
            if let Some(relation) = self.guardian_relation {
                parts.push(FormPart::text(fields::GUARDIAN_RELATION, relation));
            }
        }

        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(signer_type: SignerType) -> SignatureUpload {
        SignatureUpload {
            file_name: "consent.pdf".into(),
            mime_type: "application/pdf".into(),
            bytes: b"%PDF".to_vec(),
            signer_name: "Ada Lovelace".into(),
            signer_type,
            entity_kind: EntityKind::Donor,
            entity_id: EntityId::new("42").unwrap(),
            guardian_name: Some("Byron".into()),
            guardian_relation: Some("Parent".into()),
        }
    }

    fn names(parts: &[FormPart]) -> Vec<&str> {
        parts.iter().map(FormPart::name).collect()
    }

    #[test]
    fn self_signer_omits_guardian_fields() {
        let parts = upload(SignerType::Own).into_parts();
        assert_eq!(
            names(&parts),
            [
                "signatureFile",
                "signerName",
                "signerType",
                "entityType",
                "entityId"
            ]
        );
        assert!(parts.contains(&FormPart::text("signerType", "SELF")));
        assert!(parts.contains(&FormPart::text("entityType", "DONOR")));
        assert!(parts.contains(&FormPart::text("entityId", "42")));
    }

    #[test]
    fn guardian_signer_sends_guardian_fields() {
        let parts = upload(SignerType::Guardian).into_parts();
        assert!(parts.contains(&FormPart::text("guardianName", "Byron")));
        assert!(parts.contains(&FormPart::text("guardianRelation", "Parent")));
        assert!(parts.contains(&FormPart::text("signerType", "GUARDIAN")));
    }

    #[test]
    fn stored_signature_reads_service_field_names() {
        let envelope: ApiEnvelope<StoredSignature> = serde_json::from_str(
            r#"{"success":true,"data":{"ipfsHash":"QmX","ethereumTxHash":"0xabc"}}"#,
        )
        .unwrap();
        let data = envelope.data.unwrap();
        assert_eq!(data.ipfs_hash, "QmX");
        assert_eq!(data.ethereum_tx_hash, "0xabc");
    }

    #[test]
    fn rejected_envelope_without_data_decodes_typed() {
        let envelope: ApiEnvelope<StoredSignature> =
            serde_json::from_str(r#"{"success":false,"message":"document illegible"}"#).unwrap();
        assert_eq!(envelope, ApiEnvelope::rejected("document illegible"));
    }
}
