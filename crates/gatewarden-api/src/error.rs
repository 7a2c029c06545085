// gatewarden-api/src/error.rs
// ============================================================================
// Module: API Error
// Description: Maps the abstract error taxonomy (InvalidInput, NotFound,
//              Internal) onto HTTP status codes and a JSON error body.
// Purpose: One conversion point so handlers return a typed error instead of
//          building a response by hand at every call site.
// Dependencies: axum::response::IntoResponse, serde::Serialize
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;

/// Errors a route handler can return; each variant carries its own status
/// code via [`ApiError::status`].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The referenced instance does not exist, or cannot currently accept
    /// the request (e.g. a decision against a terminal instance).
    #[error("{0}")]
    NotFound(String),
    /// The store could not complete the request.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// The HTTP status code this error maps to.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The JSON body written for every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// A human-readable description of what went wrong.
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
