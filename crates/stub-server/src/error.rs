use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

/// Failures a stub endpoint reports, rendered as `{success: false, message}`.
#[derive(Debug, thiserror::Error)]
pub enum StubError {
    #[error("unauthorised")]
    Unauthorised,
    #[error("X-Tenant-ID header is required")]
    MissingTenant,
    /// A business rejection with the status it is reported under.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error("malformed multipart body: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
    #[error("invalid stub configuration: {0}")]
    Config(String),
}

pub type StubResult<T> = std::result::Result<T, StubError>;

impl StubError {
    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        StubError::Rejected {
            status,
            message: message.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            StubError::Unauthorised => StatusCode::UNAUTHORIZED,
            StubError::MissingTenant | StubError::Multipart(_) => StatusCode::BAD_REQUEST,
            StubError::Rejected { status, .. } => *status,
            StubError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StubError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "success": false, "message": self.to_string() }));
        (status, body).into_response()
    }
}
