//! Error types for `roster-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed or missing input. Always raised before the store is touched.
  #[error("validation error: {0}")]
  Validation(String),

  #[error("no matching account found: {0}")]
  UnknownAccount(String),

  #[error("invalid role: {role:?}")]
  InvalidRole {
    /// The bulk-update entry the token belonged to, if any.
    email: Option<String>,
    role:  String,
  },

  #[error("conflict: {0}")]
  Conflict(String),

  /// A bulk role update stopped partway through its commit phase.
  ///
  /// `committed` lists the emails whose role sets were already replaced;
  /// those writes are not rolled back.
  #[error(
    "bulk update stopped at account {account_id} ({email}) after {} committed: {reason}",
    .committed.len()
  )]
  BulkCommit {
    account_id: Uuid,
    email:      String,
    committed:  Vec<String>,
    #[source]
    reason:     Box<Error>,
  },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Attach the owning bulk-update email to an [`Error::InvalidRole`].
  pub fn for_email(self, email: &str) -> Self {
    match self {
      Error::InvalidRole { role, .. } => Error::InvalidRole {
        email: Some(email.to_owned()),
        role,
      },
      other => other,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
