//! Error type for `roster-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A uniqueness or foreign-key constraint rejected the write. The
  /// transaction it ran in has been rolled back.
  #[error("constraint violated: {0}")]
  Conflict(String),

  #[error("account not found: {0}")]
  AccountNotFound(uuid::Uuid),
}

impl Error {
  /// Classify a database error, splitting out constraint violations.
  pub(crate) fn from_write(e: tokio_rusqlite::Error) -> Self {
    if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(err, msg)) = &e {
      if matches!(err.code, rusqlite::ErrorCode::ConstraintViolation) {
        return Error::Conflict(msg.clone().unwrap_or_else(|| err.to_string()));
      }
    }
    Error::Database(e)
  }

  pub(crate) fn email_taken(email: String) -> Self {
    Error::Conflict(format!("email already registered: {email}"))
  }
}

impl From<Error> for roster_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Conflict(msg) => roster_core::Error::Conflict(msg),
      Error::AccountNotFound(id) => roster_core::Error::UnknownAccount(id.to_string()),
      other => roster_core::Error::Store(Box::new(other)),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
