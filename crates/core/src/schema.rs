//! Field schemas of the donor and patient registration forms.
//!
//! The order of each schema is the order fields are validated in, and the order they
//! appear in the payload sent to the records service. Keys are the service's wire keys.

use crate::error::ValidationError;
use odc_types::{Age, EntityKind};

pub const BLOOD_TYPES: &[&str] = &["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

pub const ORGANS: &[&str] = &[
    "Kidney",
    "Liver",
    "Heart",
    "Lung",
    "Pancreas",
    "Intestine",
    "Cornea",
];

pub const URGENCY_LEVELS: &[&str] = &["Low", "Medium", "High", "Critical"];

pub const GENDERS: &[&str] = &["Male", "Female", "Other"];

const MAX_TEXT_LEN: usize = 200;
const MAX_NARRATIVE_LEN: usize = 2_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Single-line text.
    Text,
    /// Free-text medical narrative.
    Narrative,
    /// Whole years, sent as a JSON number.
    Age,
    /// One of a fixed list, matched case-insensitively and sent in canonical spelling.
    Choice(&'static [&'static str]),
    Phone,
    Email,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub required: bool,
    pub kind: FieldKind,
}

const fn required(key: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        key,
        label,
        required: true,
        kind,
    }
}

const fn optional(key: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        key,
        label,
        required: false,
        kind,
    }
}

pub const DONOR_FIELDS: &[FieldSpec] = &[
    required("name", "Full name", FieldKind::Text),
    required("age", "Age", FieldKind::Age),
    required("gender", "Gender", FieldKind::Choice(GENDERS)),
    required("bloodType", "Blood type", FieldKind::Choice(BLOOD_TYPES)),
    required("organType", "Organ to donate", FieldKind::Choice(ORGANS)),
    optional("medicalHistory", "Medical history", FieldKind::Narrative),
    required("address", "Address", FieldKind::Text),
    required("contactNumber", "Contact number", FieldKind::Phone),
    optional("email", "Email", FieldKind::Email),
    required("hospitalId", "Hospital", FieldKind::Text),
];

pub const PATIENT_FIELDS: &[FieldSpec] = &[
    required("name", "Full name", FieldKind::Text),
    required("age", "Age", FieldKind::Age),
    required("gender", "Gender", FieldKind::Choice(GENDERS)),
    required("bloodType", "Blood type", FieldKind::Choice(BLOOD_TYPES)),
    required("organNeeded", "Organ needed", FieldKind::Choice(ORGANS)),
    required("urgencyLevel", "Urgency", FieldKind::Choice(URGENCY_LEVELS)),
    required("medicalCondition", "Medical condition", FieldKind::Narrative),
    required("address", "Address", FieldKind::Text),
    required("contactNumber", "Contact number", FieldKind::Phone),
    optional("email", "Email", FieldKind::Email),
    required("hospitalId", "Hospital", FieldKind::Text),
];

pub fn fields_for(kind: EntityKind) -> &'static [FieldSpec] {
    match kind {
        EntityKind::Donor => DONOR_FIELDS,
        EntityKind::Patient => PATIENT_FIELDS,
    }
}

pub fn field(kind: EntityKind, key: &str) -> Option<&'static FieldSpec> {
    fields_for(kind).iter().find(|spec| spec.key == key)
}

impl FieldSpec {
    /// Checks the format of a present, trimmed value.
    pub fn check(&self, value: &str) -> Result<(), ValidationError> {
        match self.kind {
            FieldKind::Text => self.check_len(value, MAX_TEXT_LEN),
            FieldKind::Narrative => self.check_len(value, MAX_NARRATIVE_LEN),
            FieldKind::Age => value
                .parse::<Age>()
                .map(|_| ())
                .map_err(|_| ValidationError::OutOfRange {
                    key: self.key,
                    label: self.label,
                    min: Age::MIN,
                    max: Age::MAX,
                }),
            FieldKind::Choice(allowed) => {
                if canonical_choice(allowed, value).is_some() {
                    Ok(())
                } else {
                    Err(ValidationError::InvalidChoice {
                        key: self.key,
                        label: self.label,
                        allowed: allowed.join(", "),
                    })
                }
            }
            FieldKind::Phone => {
                let shape_ok = value
                    .chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
                let digits = value.chars().filter(char::is_ascii_digit).count();
                if shape_ok && (7..=15).contains(&digits) {
                    Ok(())
                } else {
                    Err(ValidationError::InvalidPhone {
                        key: self.key,
                        label: self.label,
                    })
                }
            }
            FieldKind::Email => {
                let valid = match value.split_once('@') {
                    Some((local, domain)) => {
                        !local.is_empty()
                            && domain.contains('.')
                            && !domain.starts_with('.')
                            && !domain.ends_with('.')
                            && !domain.contains('@')
                            && !value.contains(char::is_whitespace)
                    }
                    None => false,
                };
                if valid {
                    Ok(())
                } else {
                    Err(ValidationError::InvalidEmail {
                        key: self.key,
                        label: self.label,
                    })
                }
            }
        }
    }

    /// The value as it goes on the wire.
    pub fn wire_value(&self, value: &str) -> serde_json::Value {
        match self.kind {
            FieldKind::Age => match value.parse::<Age>() {
                Ok(age) => serde_json::Value::from(age.years()),
                Err(_) => serde_json::Value::from(value),
            },
            FieldKind::Choice(allowed) => {
                serde_json::Value::from(canonical_choice(allowed, value).unwrap_or(value))
            }
            _ => serde_json::Value::from(value),
        }
    }

    fn check_len(&self, value: &str, max: usize) -> Result<(), ValidationError> {
        if value.chars().count() > max {
            return Err(ValidationError::TooLong {
                key: self.key,
                label: self.label,
                max,
            });
        }
        Ok(())
    }
}

fn canonical_choice(allowed: &'static [&'static str], value: &str) -> Option<&'static str> {
    allowed
        .iter()
        .copied()
        .find(|option| option.eq_ignore_ascii_case(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_unique_per_schema() {
        for kind in [EntityKind::Donor, EntityKind::Patient] {
            let fields = fields_for(kind);
            for (i, a) in fields.iter().enumerate() {
                assert!(
                    fields[i + 1..].iter().all(|b| b.key != a.key),
                    "duplicate key {} in {} schema",
                    a.key,
                    kind
                );
            }
        }
    }

    #[test]
    fn both_schemas_require_name_and_hospital() {
        for kind in [EntityKind::Donor, EntityKind::Patient] {
            assert!(field(kind, "name").unwrap().required);
            assert!(field(kind, "hospitalId").unwrap().required);
        }
        assert!(field(EntityKind::Donor, "organNeeded").is_none());
        assert!(field(EntityKind::Patient, "organType").is_none());
    }

    #[test]
    fn age_is_bounded_and_sent_as_number() {
        let age = field(EntityKind::Donor, "age").unwrap();
        assert!(age.check("34").is_ok());
        assert!(matches!(
            age.check("0"),
            Err(ValidationError::OutOfRange { min: 1, max: 120, .. })
        ));
        assert!(age.check("121").is_err());
        assert!(age.check("thirty").is_err());
        assert_eq!(age.wire_value("34"), serde_json::json!(34));
    }

    #[test]
    fn choices_match_case_insensitively_and_canonicalise() {
        let blood = field(EntityKind::Patient, "bloodType").unwrap();
        assert!(blood.check("ab+").is_ok());
        assert_eq!(blood.wire_value("ab+"), serde_json::json!("AB+"));
        assert!(matches!(
            blood.check("C+"),
            Err(ValidationError::InvalidChoice { .. })
        ));
    }

    #[test]
    fn phone_and_email_shapes() {
        let phone = field(EntityKind::Donor, "contactNumber").unwrap();
        assert!(phone.check("+44 (0)20 7946-0958").is_ok());
        assert!(phone.check("12345").is_err());
        assert!(phone.check("call me").is_err());

        let email = field(EntityKind::Donor, "email").unwrap();
        assert!(email.check("ada@example.org").is_ok());
        assert!(email.check("ada@localhost").is_err());
        assert!(email.check("ada example@x.org").is_err());
        assert!(email.check("@example.org").is_err());
    }

    #[test]
    fn narrative_has_a_length_cap() {
        let history = field(EntityKind::Donor, "medicalHistory").unwrap();
        assert!(history.check(&"a".repeat(2_000)).is_ok());
        assert!(matches!(
            history.check(&"a".repeat(2_001)),
            Err(ValidationError::TooLong { max: 2_000, .. })
        ));
    }
}
