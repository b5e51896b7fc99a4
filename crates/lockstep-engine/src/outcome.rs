use lockstep_model::KeyState;
use lockstep_remote::ClassifiedError;

use crate::token::ProgressToken;

/// The caller-visible result of one reconciliation invocation.
///
/// `InProgress` carries the updated token and the delay the caller must wait
/// before re-invoking with that exact token. A `Failed` outcome whose error
/// is `NotFound` means the resource should be treated as deleted.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
  Success {
    /// The authoritative final state, write-only fields masked.
    resource: KeyState,
  },
  InProgress {
    token: ProgressToken,
    delay_seconds: u64,
  },
  Failed {
    error: ClassifiedError,
  },
}

impl ReconcileOutcome {
  pub fn is_success(&self) -> bool {
    matches!(self, Self::Success { .. })
  }

  pub fn is_in_progress(&self) -> bool {
    matches!(self, Self::InProgress { .. })
  }

  pub fn error(&self) -> Option<&ClassifiedError> {
    match self {
      Self::Failed { error } => Some(error),
      _ => None,
    }
  }
}

/// Control flow returned by a single pipeline step.
///
/// Failures propagate separately as `Err(ClassifiedError)`, so a step result
/// is `Result<StepControl, ClassifiedError>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepControl {
  /// Proceed to the next step.
  Continue,
  /// Stop here; the caller must re-invoke after `delay_seconds`.
  Suspend { delay_seconds: u64 },
}

/// Project a sequencer outcome into the caller-visible result.
pub(crate) fn project(
  result: Result<StepControl, ClassifiedError>,
  desired: &KeyState,
  token: ProgressToken,
) -> ReconcileOutcome {
  match result {
    Ok(StepControl::Continue) => ReconcileOutcome::Success {
      resource: desired.clone().masked(),
    },
    Ok(StepControl::Suspend { delay_seconds }) => ReconcileOutcome::InProgress {
      token,
      delay_seconds,
    },
    Err(error) => ReconcileOutcome::Failed { error },
  }
}
