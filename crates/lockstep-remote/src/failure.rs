use thiserror::Error;

/// A raw failure reported by the remote control plane.
///
/// This is what `RemoteApi` implementations raise: the service's error code
/// string, the original message, and an optional HTTP-style status. The
/// classifier turns it into a [`ClassifiedError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ServiceFailure {
  pub code: String,
  pub message: String,
  pub status: Option<u16>,
}

impl ServiceFailure {
  pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      code: code.into(),
      message: message.into(),
      status: None,
    }
  }

  pub fn with_status(mut self, status: u16) -> Self {
    self.status = Some(status);
    self
  }
}

/// The closed error taxonomy every remote failure maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  NotFound,
  AlreadyExists,
  InvalidRequest,
  InvalidState,
  ServiceLimitExceeded,
  ServiceInternalError,
  Throttling,
  GeneralServiceFailure,
}

/// A remote failure classified into the taxonomy.
///
/// Carries the operation name and the original message text so operators can
/// diagnose failures without access to engine internals. `code` is the raw
/// service error code when the failure came off the wire; engine-raised
/// failures (semantic validation, pagination exhaustion) have no code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("remote operation '{operation}' failed: {message}")]
pub struct ClassifiedError {
  pub kind: ErrorKind,
  pub operation: String,
  pub code: Option<String>,
  pub message: String,
}

impl ClassifiedError {
  /// An engine-raised classified failure with no underlying service code.
  pub fn new(kind: ErrorKind, operation: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      kind,
      operation: operation.into(),
      code: None,
      message: message.into(),
    }
  }

  /// Whether the caller may retry the whole invocation.
  ///
  /// The engine itself performs no backoff; throttling and service-internal
  /// failures are surfaced as retryable-by-caller signals.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self.kind,
      ErrorKind::Throttling | ErrorKind::ServiceInternalError
    )
  }

  /// Whether this failure means the subject resource no longer exists.
  ///
  /// `NotFound` carries treat-as-deleted semantics distinct from every other
  /// kind: an update hitting it is a legitimate terminal outcome, not an
  /// engine fault.
  pub fn is_not_found(&self) -> bool {
    self.kind == ErrorKind::NotFound
  }
}
