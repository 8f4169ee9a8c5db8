//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body is a JSON object with an `error` kind and a `message`,
//! plus `identifier`, `role`, or `committed` where they apply.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use roster_core::Error as CoreError;
use serde_json::{Value, json};
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] CoreError),

  /// The request could not be decoded.
  #[error("bad request: {0}")]
  BadRequest(String),
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { ApiError::BadRequest(rejection.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self { ApiError::BadRequest(rejection.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self { ApiError::BadRequest(rejection.body_text()) }
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Core(e) => match e {
        CoreError::Validation(_) | CoreError::InvalidRole { .. } => StatusCode::BAD_REQUEST,
        CoreError::UnknownAccount(_) => StatusCode::NOT_FOUND,
        CoreError::Conflict(_) | CoreError::BulkCommit { .. } => StatusCode::CONFLICT,
        CoreError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }

  fn body(&self) -> Value {
    let message = self.to_string();
    match self {
      ApiError::BadRequest(_) => json!({ "error": "bad_request", "message": message }),
      ApiError::Core(e) => match e {
        CoreError::Validation(_) => json!({ "error": "validation", "message": message }),
        CoreError::UnknownAccount(identifier) => json!({
          "error": "unknown_account",
          "message": message,
          "identifier": identifier,
        }),
        CoreError::InvalidRole { email, role } => json!({
          "error": "invalid_role",
          "message": message,
          "identifier": email,
          "role": role,
        }),
        CoreError::Conflict(_) => json!({ "error": "conflict", "message": message }),
        CoreError::BulkCommit { email, committed, .. } => json!({
          "error": "bulk_commit",
          "message": message,
          "identifier": email,
          "committed": committed,
        }),
        CoreError::Store(_) => json!({ "error": "store", "message": message }),
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    (status, Json(self.body())).into_response()
  }
}
