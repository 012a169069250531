use odc_types::EntityKind;

/// The first rule a registration broke, in the order the form checks them.
///
/// Each variant's message is what the operator sees in the error banner.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{label} is required")]
    MissingField { key: &'static str, label: &'static str },
    #[error("{label} must be a whole number between {min} and {max}")]
    OutOfRange {
        key: &'static str,
        label: &'static str,
        min: u8,
        max: u8,
    },
    #[error("{label} must be one of: {allowed}")]
    InvalidChoice {
        key: &'static str,
        label: &'static str,
        allowed: String,
    },
    #[error("{label} must be a phone number of 7 to 15 digits")]
    InvalidPhone { key: &'static str, label: &'static str },
    #[error("{label} must be an email address")]
    InvalidEmail { key: &'static str, label: &'static str },
    #[error("{label} must be at most {max} characters")]
    TooLong {
        key: &'static str,
        label: &'static str,
        max: usize,
    },
    #[error("guardian name is required when a guardian signs")]
    MissingGuardianName,
    #[error("guardian relation is required when a guardian signs")]
    MissingGuardianRelation,
    #[error("a signed consent document must be attached")]
    MissingSignatureFile,
    #[error("consent document must be a JPEG, PNG or PDF file (got {mime_type})")]
    UnsupportedFileType { mime_type: String },
    #[error("consent document exceeds the 5 MiB size limit ({size_bytes} bytes)")]
    FileTooLarge { size_bytes: u64, limit_bytes: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("{kind} registrations have no field named '{key}'")]
    UnknownField { kind: EntityKind, key: String },
    #[error("no created record is waiting for a consent document")]
    NothingToRetry,
    #[error("{event} arrived while the submission was {state}")]
    UnexpectedEvent { event: &'static str, state: String },
    #[error("attachment error: {0}")]
    Files(#[from] odc_files::FilesError),
    #[error("client error: {0}")]
    Client(#[from] odc_client::ClientError),
    #[error("invalid value: {0}")]
    Types(#[from] odc_types::TypesError),
}

pub type RegistrationResult<T> = std::result::Result<T, RegistrationError>;
