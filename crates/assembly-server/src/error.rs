//! HTTP error mapping
//!
//! Every failure leaves the server as a `StructuredError` JSON body with a
//! status derived from the error kind.

use assembly_coordination::{ErrorKind, SessionError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{error, warn};

/// Error returned from every handler
#[derive(Error, Debug)]
#[error(transparent)]
pub struct ApiError(#[from] pub SessionError);

pub type ApiResult<T> = Result<T, ApiError>;

/// HTTP status for an error kind
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::DuplicateAction | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        } else {
            warn!(kind = %kind, error = %self.0, "Request rejected");
        }
        (status, Json(self.0.to_structured())).into_response()
    }
}
