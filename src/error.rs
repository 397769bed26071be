//! Error types for the LibApps proxy

use std::io;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for the LibApps proxy
pub type Result<T> = std::result::Result<T, Error>;

/// LibApps proxy errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token exchange failed or returned no access token
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Upstream answered with an empty body
    #[error("Response is empty")]
    EmptyResponse,

    /// Upstream answered without usable data where data was required
    #[error("No Response")]
    NoResponse,

    /// No upstream location matched the requested name
    #[error("Location not found: {0}")]
    LocationNotFound(String),

    /// Site slug is not configured, or has no space listing
    #[error("Unknown site: {0}")]
    UnknownSite(String),

    /// Unsupported `availability` query value
    #[error("Invalid availability mode: {0}")]
    InvalidAvailability(String),

    /// Upstream answered with a non-success status
    #[error("Upstream error {status} from {endpoint}")]
    Upstream {
        /// HTTP status returned by upstream
        status: u16,
        /// Endpoint that was called
        endpoint: String,
    },

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status surfaced to outward callers
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(_)
            | Self::NoResponse
            | Self::LocationNotFound(_)
            | Self::InvalidAvailability(_) => StatusCode::BAD_REQUEST,
            Self::UnknownSite(_) => StatusCode::NOT_FOUND,
            Self::Upstream { .. } | Self::Http(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_)
            | Self::EmptyResponse
            | Self::Json(_)
            | Self::Io(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the outward `detail` field.
    ///
    /// Auth and lookup failures surface as `No Response`.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Auth(_) | Self::NoResponse | Self::LocationNotFound(_) => {
                "No Response".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}
