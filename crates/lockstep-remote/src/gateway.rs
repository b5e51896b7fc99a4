use std::future::Future;

use tracing::{debug, warn};

use crate::classify::classify;
use crate::failure::{ClassifiedError, ServiceFailure};

/// Invoke exactly one remote operation and classify its failure.
///
/// The future must perform exactly one remote call. No retry happens here -
/// retry is an orchestration-level decision. On failure the raw
/// [`ServiceFailure`] is classified and re-raised carrying the operation
/// name; the original message text is never swallowed.
pub async fn invoke<T, F>(operation: &'static str, call: F) -> Result<T, ClassifiedError>
where
  F: Future<Output = Result<T, ServiceFailure>>,
{
  debug!(operation, "remote_call");

  call.await.map_err(|failure| {
    let err = classify(operation, failure);
    warn!(
      operation,
      kind = ?err.kind,
      code = err.code.as_deref().unwrap_or(""),
      error = %err.message,
      "remote_call_failed"
    );
    err
  })
}
