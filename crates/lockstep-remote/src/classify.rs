use crate::failure::{ClassifiedError, ErrorKind, ServiceFailure};

/// The service's designated throttling error code.
pub const THROTTLING_ERROR_CODE: &str = "ThrottlingException";

/// Authorization-denied code. Not part of the whitelist; callers that
/// soft-fail on missing tagging permission check for it explicitly.
pub const ACCESS_DENIED_ERROR_CODE: &str = "AccessDeniedException";

/// Map a raw service failure onto the closed error taxonomy.
///
/// A whitelisted set of codes maps 1:1; anything unrecognized falls through
/// to `Throttling` when the code matches the designated throttling code, and
/// `GeneralServiceFailure` otherwise. Pure and stateless - shared by every
/// remote call site, which only supplies the operation name for diagnostics.
pub fn classify(operation: &str, failure: ServiceFailure) -> ClassifiedError {
  let kind = match failure.code.as_str() {
    "NotFoundException" => ErrorKind::NotFound,
    "AlreadyExistsException" => ErrorKind::AlreadyExists,
    "InvalidAliasNameException"
    | "InvalidArnException"
    | "KMSInvalidStateException"
    | "MalformedPolicyDocumentException"
    | "TagException" => ErrorKind::InvalidRequest,
    "DisabledException" => ErrorKind::InvalidState,
    "LimitExceededException" => ErrorKind::ServiceLimitExceeded,
    // An invalid pagination marker is a fault in our own paging loop, not a
    // user error; it surfaces as an internal, retryable failure.
    "KMSInternalException" | "DependencyTimeoutException" | "InvalidMarkerException" => {
      ErrorKind::ServiceInternalError
    }
    THROTTLING_ERROR_CODE => ErrorKind::Throttling,
    _ => ErrorKind::GeneralServiceFailure,
  };

  ClassifiedError {
    kind,
    operation: operation.to_string(),
    code: Some(failure.code),
    message: failure.message,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_whitelisted_codes_map_one_to_one() {
    let cases = [
      ("NotFoundException", ErrorKind::NotFound),
      ("AlreadyExistsException", ErrorKind::AlreadyExists),
      ("InvalidAliasNameException", ErrorKind::InvalidRequest),
      ("InvalidArnException", ErrorKind::InvalidRequest),
      ("KMSInvalidStateException", ErrorKind::InvalidRequest),
      ("MalformedPolicyDocumentException", ErrorKind::InvalidRequest),
      ("TagException", ErrorKind::InvalidRequest),
      ("DisabledException", ErrorKind::InvalidState),
      ("LimitExceededException", ErrorKind::ServiceLimitExceeded),
      ("KMSInternalException", ErrorKind::ServiceInternalError),
      ("DependencyTimeoutException", ErrorKind::ServiceInternalError),
      ("InvalidMarkerException", ErrorKind::ServiceInternalError),
    ];

    for (code, expected) in cases {
      let err = classify("DescribeKey", ServiceFailure::new(code, "boom"));
      assert_eq!(err.kind, expected, "code {}", code);
    }
  }

  #[test]
  fn test_unrecognized_throttling_code() {
    let err = classify(
      "EnableKey",
      ServiceFailure::new(THROTTLING_ERROR_CODE, "rate exceeded"),
    );
    assert_eq!(err.kind, ErrorKind::Throttling);
    assert!(err.is_retryable());
  }

  #[test]
  fn test_unrecognized_code_falls_through_to_general() {
    let err = classify("EnableKey", ServiceFailure::new("SomethingElse", "boom"));
    assert_eq!(err.kind, ErrorKind::GeneralServiceFailure);
    assert!(!err.is_retryable());
  }

  #[test]
  fn test_classified_error_preserves_diagnostics() {
    let err = classify(
      "PutKeyPolicy",
      ServiceFailure::new("NotFoundException", "key key-1 does not exist"),
    );
    assert_eq!(err.operation, "PutKeyPolicy");
    assert_eq!(err.code.as_deref(), Some("NotFoundException"));
    assert!(err.to_string().contains("PutKeyPolicy"));
    assert!(err.to_string().contains("key key-1 does not exist"));
  }
}
