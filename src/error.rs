use std::fmt;

use thiserror::Error;

/// Normalized classification of a storage failure, shared across all providers.
///
/// `Transient` is the only kind a caller should consider retrying. This layer
/// never retries on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  /// The object (or, for uploads, the local file) does not exist.
  NotFound,
  /// The credentials were rejected or lack permission for the operation.
  PermissionDenied,
  /// Network trouble, timeouts, throttling. Safe to retry.
  Transient,
  /// Bad or missing configuration, detected before any network call.
  Configuration,
  /// The backend or the given credentials cannot perform this operation.
  Unsupported,
  /// Anything unclassified; the provider-native code is preserved for diagnostics.
  Unknown,
}

impl ErrorKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ErrorKind::NotFound => "not found",
      ErrorKind::PermissionDenied => "permission denied",
      ErrorKind::Transient => "transient",
      ErrorKind::Configuration => "configuration",
      ErrorKind::Unsupported => "unsupported",
      ErrorKind::Unknown => "unknown",
    }
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Error returned by every operation in this crate.
///
/// Carries the normalized [`ErrorKind`], an optional provider-native error
/// code (passed through verbatim for diagnostics) and a human-readable
/// message. Provider SDK error types never cross the crate boundary.
#[derive(Debug, Clone, Error)]
#[error("{kind} error: {message}")]
pub struct StorageError {
  kind: ErrorKind,
  code: Option<String>,
  message: String,
}

impl StorageError {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self { kind, code: None, message: message.into() }
  }

  /// Attach the provider-native error code.
  pub fn with_code(mut self, code: impl Into<String>) -> Self {
    self.code = Some(code.into());
    self
  }

  pub fn not_found(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::NotFound, message)
  }

  pub fn permission_denied(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::PermissionDenied, message)
  }

  pub fn transient(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Transient, message)
  }

  pub fn configuration(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Configuration, message)
  }

  pub fn unsupported(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Unsupported, message)
  }

  pub fn unknown(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Unknown, message)
  }

  pub fn kind(&self) -> ErrorKind {
    self.kind
  }

  /// Provider-native error code, if one was available.
  pub fn code(&self) -> Option<&str> {
    self.code.as_deref()
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn is_not_found(&self) -> bool {
    self.kind == ErrorKind::NotFound
  }

  pub fn is_transient(&self) -> bool {
    self.kind == ErrorKind::Transient
  }
}

impl From<std::io::Error> for StorageError {
  fn from(err: std::io::Error) -> Self {
    use std::io::ErrorKind as IoKind;
    let kind = match err.kind() {
      IoKind::NotFound => ErrorKind::NotFound,
      IoKind::PermissionDenied => ErrorKind::PermissionDenied,
      IoKind::TimedOut | IoKind::Interrupted | IoKind::ConnectionReset | IoKind::ConnectionAborted => {
        ErrorKind::Transient
      }
      _ => ErrorKind::Unknown,
    };
    StorageError::new(kind, format!("local io error: {err}"))
  }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
