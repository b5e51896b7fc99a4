//! Convergence policies: the decision rules the step sequencer consults.
//!
//! The essential invariant is a strict partial order over the update steps,
//! Enable < Rotation < Disable < Description < Policy < Tags, with Enable
//! and Policy both introducing a mandatory propagation delay.

use std::collections::BTreeSet;

use lockstep_model::{KeyState, Tag};
use lockstep_remote::{ClassifiedError, ErrorKind};

/// Fixed wait inserted after enable and policy-update calls so the
/// eventually consistent control plane settles before dependent calls.
pub const PROPAGATION_DELAY_SECONDS: u64 = 60;

/// Set difference between desired tags and currently applied tags, over
/// full (key, value) pairs. Changing only a tag's value is both a removal
/// and an addition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDelta {
  pub to_remove: BTreeSet<Tag>,
  pub to_add: BTreeSet<Tag>,
}

impl TagDelta {
  pub fn between(current: &BTreeSet<Tag>, desired: &BTreeSet<Tag>) -> Self {
    Self {
      to_remove: current.difference(desired).cloned().collect(),
      to_add: desired.difference(current).cloned().collect(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.to_remove.is_empty() && self.to_add.is_empty()
  }
}

/// Semantic legality check on the previous -> desired transition.
///
/// Runs before any remote mutation, so a rejected transition performs no
/// partial work. The rotation flag cannot change while the key is disabled
/// and not concurrently being re-enabled, because the rotation call would
/// hit an invalid-state error remotely.
pub fn validate_transition(
  previous: &KeyState,
  desired: &KeyState,
) -> Result<(), ClassifiedError> {
  if previous.rotation_enabled != desired.rotation_enabled
    && !previous.enabled
    && !desired.enabled
  {
    return Err(ClassifiedError::new(
      ErrorKind::InvalidRequest,
      "UpdateKey",
      format!(
        "cannot change rotation for key '{}' while it is disabled",
        desired.key_id
      ),
    ));
  }

  if previous.origin != desired.origin {
    return Err(ClassifiedError::new(
      ErrorKind::InvalidRequest,
      "UpdateKey",
      format!(
        "origin of key '{}' is create-only and cannot be changed",
        desired.key_id
      ),
    ));
  }

  Ok(())
}

/// Structural policy comparison.
///
/// Policies may arrive as JSON documents or as JSON-encoded strings; both
/// normalize to the parsed document, so key order and whitespace never
/// produce a spurious policy update.
pub fn policies_equal(previous: &serde_json::Value, desired: &serde_json::Value) -> bool {
  normalize_policy(previous) == normalize_policy(desired)
}

fn normalize_policy(policy: &serde_json::Value) -> serde_json::Value {
  match policy {
    serde_json::Value::String(raw) => {
      serde_json::from_str(raw).unwrap_or_else(|_| policy.clone())
    }
    other => other.clone(),
  }
}
