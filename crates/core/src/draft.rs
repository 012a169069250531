//! Entity draft and signer metadata held by the registration form.

use crate::error::{RegistrationError, RegistrationResult};
use crate::schema;
use odc_types::{EntityKind, SignerType};
use std::collections::BTreeMap;

/// Field values of one donor or patient registration, keyed by wire key.
///
/// Values are stored trimmed. Setting an empty value clears the field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationDraft {
    kind: EntityKind,
    values: BTreeMap<&'static str, String>,
}

impl RegistrationDraft {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            values: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Sets a field by wire key.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::UnknownField`] if the schema of this draft's kind has
    /// no field named `key`.
    pub fn set(&mut self, key: &str, value: impl AsRef<str>) -> RegistrationResult<()> {
        let spec = schema::field(self.kind, key).ok_or_else(|| RegistrationError::UnknownField {
            kind: self.kind,
            key: key.to_string(),
        })?;

        let value = value.as_ref().trim();
        if value.is_empty() {
            self.values.remove(spec.key);
        } else {
            self.values.insert(spec.key, value.to_string());
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// The entity's name, which is also the signer name of the consent upload.
    pub fn name(&self) -> Option<&str> {
        self.get("name")
    }

    /// Flat wire object in schema order. Absent fields are omitted.
    pub fn payload(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut payload = serde_json::Map::new();
        for spec in schema::fields_for(self.kind) {
            if let Some(value) = self.get(spec.key) {
                payload.insert(spec.key.to_string(), spec.wire_value(value));
            }
        }
        payload
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Who attests the consent document.
///
/// Guardian details are kept while the operator toggles the signer type, but they are only
/// reported for guardian signers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignerInfo {
    signer_type: SignerType,
    guardian_name: Option<String>,
    guardian_relation: Option<String>,
}

impl SignerInfo {
    /// The entity signs for themselves.
    pub fn own() -> Self {
        Self::default()
    }

    pub fn guardian(name: impl AsRef<str>, relation: impl AsRef<str>) -> Self {
        Self {
            signer_type: SignerType::Guardian,
            guardian_name: non_blank(name.as_ref()),
            guardian_relation: non_blank(relation.as_ref()),
        }
    }

    pub fn signer_type(&self) -> SignerType {
        self.signer_type
    }

    pub fn set_signer_type(&mut self, signer_type: SignerType) {
        self.signer_type = signer_type;
    }

    pub fn set_guardian_name(&mut self, name: impl AsRef<str>) {
        self.guardian_name = non_blank(name.as_ref());
    }

    pub fn set_guardian_relation(&mut self, relation: impl AsRef<str>) {
        self.guardian_relation = non_blank(relation.as_ref());
    }

    pub fn guardian_name(&self) -> Option<&str> {
        match self.signer_type {
            SignerType::Guardian => self.guardian_name.as_deref(),
            SignerType::Own => None,
        }
    }

    pub fn guardian_relation(&self) -> Option<&str> {
        match self.signer_type {
            SignerType::Guardian => self.guardian_relation.as_deref(),
            SignerType::Own => None,
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_keys_are_rejected() {
        let mut draft = RegistrationDraft::new(EntityKind::Donor);
        let err = draft.set("urgencyLevel", "High").unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::UnknownField { kind: EntityKind::Donor, ref key } if key == "urgencyLevel"
        ));
        assert!(draft.is_empty());
    }

    #[test]
    fn values_are_trimmed_and_blank_clears() {
        let mut draft = RegistrationDraft::new(EntityKind::Patient);
        draft.set("name", "  Grace Hopper ").unwrap();
        assert_eq!(draft.name(), Some("Grace Hopper"));

        draft.set("name", "   ").unwrap();
        assert_eq!(draft.name(), None);
    }

    #[test]
    fn payload_follows_schema_and_types_age() {
        let mut draft = RegistrationDraft::new(EntityKind::Donor);
        draft.set("hospitalId", "H-1").unwrap();
        draft.set("age", "34").unwrap();
        draft.set("name", "Ada").unwrap();
        draft.set("bloodType", "o-").unwrap();

        let payload = draft.payload();
        assert_eq!(payload.len(), 4);
        assert_eq!(payload["age"], json!(34));
        assert_eq!(payload["bloodType"], json!("O-"));
        assert_eq!(payload["name"], json!("Ada"));
        assert!(!payload.contains_key("email"));
    }

    #[test]
    fn guardian_fields_are_hidden_for_own_signer() {
        let mut signer = SignerInfo::guardian("Byron", "Parent");
        assert_eq!(signer.guardian_name(), Some("Byron"));

        signer.set_signer_type(SignerType::Own);
        assert_eq!(signer.guardian_name(), None);
        assert_eq!(signer.guardian_relation(), None);

        signer.set_signer_type(SignerType::Guardian);
        assert_eq!(signer.guardian_relation(), Some("Parent"));
    }

    #[test]
    fn blank_guardian_values_are_absent() {
        let signer = SignerInfo::guardian("  ", "Parent");
        assert_eq!(signer.guardian_name(), None);
    }
}
