//! Validated primitive types shared by the console crates.
//!
//! Everything here is cheap to construct and guarantees its invariant once built, so the
//! form model, the request client and the stub server can pass values around without
//! re-checking them.

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when constructing validated primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypesError {
    /// The input text was empty or contained only whitespace
    #[error("text cannot be empty")]
    Empty,

    /// The input could not be read as a whole number of years
    #[error("age must be a whole number, got '{0}'")]
    AgeNotNumeric(String),

    /// The age was outside the accepted range
    #[error("age must be between {min} and {max}, got {value}")]
    AgeOutOfRange { value: i64, min: u8, max: u8 },

    /// An entity tag or signer type that the services do not know about
    #[error("unknown tag: {0}")]
    UnknownTag(String),
}

pub type TypesResult<T> = std::result::Result<T, TypesError>;

/// A string type that guarantees non-empty content.
///
/// Input is trimmed during construction; a value that trims to nothing is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText`, trimming leading and trailing whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::Empty`] if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> TypesResult<Self> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TypesError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(s).map_err(serde::de::Error::custom)
    }
}

/// Identifier assigned by the records service when an entity is created.
///
/// The service reports ids either as JSON numbers or strings; both are accepted and kept
/// in their textual form, which is also how the id travels in the multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityId(NonEmptyText);

impl EntityId {
    pub fn new(id: impl AsRef<str>) -> TypesResult<Self> {
        NonEmptyText::new(id).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl serde::Serialize for EntityId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        let raw = match RawId::deserialize(deserializer)? {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        };
        EntityId::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Age in whole years, bounded to the range the registration forms accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct Age(u8);

impl Age {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 120;

    pub fn new(value: i64) -> TypesResult<Self> {
        if value < i64::from(Self::MIN) || value > i64::from(Self::MAX) {
            return Err(TypesError::AgeOutOfRange {
                value,
                min: Self::MIN,
                max: Self::MAX,
            });
        }
        // Range check above keeps the value inside u8.
        Ok(Self(value as u8))
    }

    pub fn years(self) -> u8 {
        self.0
    }
}

impl FromStr for Age {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value = trimmed
            .parse::<i64>()
            .map_err(|_| TypesError::AgeNotNumeric(trimmed.to_owned()))?;
        Self::new(value)
    }
}

impl fmt::Display for Age {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two kinds of record the console registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityKind {
    Donor,
    Patient,
}

impl EntityKind {
    /// Tag sent as `entityType` to the verification service.
    pub fn tag(self) -> &'static str {
        match self {
            EntityKind::Donor => "DONOR",
            EntityKind::Patient => "PATIENT",
        }
    }

    /// Collection path on the records service.
    pub fn collection_path(self) -> &'static str {
        match self {
            EntityKind::Donor => "/donors",
            EntityKind::Patient => "/patients",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Donor => "donor",
            EntityKind::Patient => "patient",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntityKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DONOR" => Ok(EntityKind::Donor),
            "PATIENT" => Ok(EntityKind::Patient),
            other => Err(TypesError::UnknownTag(other.to_owned())),
        }
    }
}

/// Who is attesting consent on the attached document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignerType {
    /// The donor or patient signed the document.
    #[default]
    #[serde(rename = "SELF")]
    Own,
    /// A guardian signed on the entity's behalf.
    Guardian,
}

impl SignerType {
    pub fn tag(self) -> &'static str {
        match self {
            SignerType::Own => "SELF",
            SignerType::Guardian => "GUARDIAN",
        }
    }
}

impl FromStr for SignerType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SELF" => Ok(SignerType::Own),
            "GUARDIAN" => Ok(SignerType::Guardian),
            other => Err(TypesError::UnknownTag(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_and_rejects_blank() {
        assert_eq!(NonEmptyText::new("  Ada  ").unwrap().as_str(), "Ada");
        assert_eq!(NonEmptyText::new(" \t\n"), Err(TypesError::Empty));
    }

    #[test]
    fn entity_id_accepts_numbers_and_strings() {
        let from_number: EntityId = serde_json::from_str("42").unwrap();
        let from_text: EntityId = serde_json::from_str("\"d-17\"").unwrap();

        assert_eq!(from_number.as_str(), "42");
        assert_eq!(from_text.as_str(), "d-17");
        assert!(serde_json::from_str::<EntityId>("\"  \"").is_err());
    }

    #[test]
    fn age_bounds_are_inclusive() {
        assert_eq!("1".parse::<Age>().unwrap().years(), 1);
        assert_eq!(" 120 ".parse::<Age>().unwrap().years(), 120);
        assert!(matches!(
            "0".parse::<Age>(),
            Err(TypesError::AgeOutOfRange { value: 0, .. })
        ));
        assert!(matches!(
            "121".parse::<Age>(),
            Err(TypesError::AgeOutOfRange { value: 121, .. })
        ));
        assert!(matches!(
            "forty".parse::<Age>(),
            Err(TypesError::AgeNotNumeric(_))
        ));
    }

    #[test]
    fn wire_tags_match_service_contract() {
        assert_eq!(EntityKind::Donor.tag(), "DONOR");
        assert_eq!(EntityKind::Patient.collection_path(), "/patients");
        assert_eq!(SignerType::Own.tag(), "SELF");
        assert_eq!(
            serde_json::to_string(&SignerType::Guardian).unwrap(),
            "\"GUARDIAN\""
        );
        assert_eq!(serde_json::to_string(&SignerType::Own).unwrap(), "\"SELF\"");
        assert_eq!("patient".parse::<EntityKind>().unwrap(), EntityKind::Patient);
        assert!("nurse".parse::<EntityKind>().is_err());
    }
}
