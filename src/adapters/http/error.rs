use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use crate::commands::Error;

/// JSON error body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error: bool,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    conflicting_booking_ids: Vec<Uuid>,
    retryable: bool,
}

/// Command error rendered as an HTTP response
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
    conflicting_booking_ids: Vec<Uuid>,
    retryable: bool,
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: true,
            message: self.message,
            conflicting_booking_ids: self.conflicting_booking_ids,
            retryable: self.retryable,
        });
        (self.status, body).into_response()
    }
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        let retryable = err.is_retryable();
        let message = err.to_string();
        let (status, conflicting_booking_ids) = match err {
            Error::InvalidInterval(_) | Error::Validation(_) => (StatusCode::BAD_REQUEST, vec![]),
            Error::NotFound { .. } => (StatusCode::NOT_FOUND, vec![]),
            Error::BookingConflict { conflicting } => (StatusCode::CONFLICT, conflicting),
            Error::InvalidTransition { .. } | Error::InvalidState(_) | Error::AlreadyPaid(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, vec![])
            }
            Error::SpaceBusy(_) => (StatusCode::SERVICE_UNAVAILABLE, vec![]),
            Error::StorageUnavailable(_) => {
                error!(error = %message, "storage error");
                (StatusCode::SERVICE_UNAVAILABLE, vec![])
            }
        };

        Self {
            status,
            message,
            conflicting_booking_ids,
            retryable,
        }
    }
}
