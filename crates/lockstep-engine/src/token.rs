use std::collections::BTreeSet;

use lockstep_model::Tag;
use serde::{Deserialize, Serialize};

/// Caller-persisted record of partial workflow completion.
///
/// Created empty at workflow start; each step conditionally sets one or more
/// fields; discarded once the workflow reaches a terminal state. This is the
/// only state carried across suspend/resume boundaries, and it is
/// monotonically more complete: a step already marked done is never
/// re-executed on resumption.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressToken {
  /// The enable step has run and its propagation delay was requested.
  #[serde(default)]
  pub key_enabled_done: bool,
  /// The rotation step has run.
  #[serde(default)]
  pub rotation_done: bool,
  /// The policy-update step has started. Set at most once; once true the
  /// step is permanently skipped on resumption.
  #[serde(default)]
  pub policy_propagation_started: bool,
  /// Tags already read from the control plane, cached to avoid a redundant
  /// listing when the invocation chain is replayed.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tags_snapshot: Option<BTreeSet<Tag>>,
  /// A requested propagation delay has been consumed by the caller.
  /// Diagnostic bookkeeping only: recorded for persisted-token inspection,
  /// never read back by the sequencer.
  #[serde(default)]
  pub propagation_wait_elapsed: bool,
}

impl ProgressToken {
  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }
}
