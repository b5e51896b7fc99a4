//! The key update workflow.
//!
//! One invocation walks the fixed step order, calling the remote gateway
//! where a step's precondition holds, and either advances the progress token
//! or returns a suspend instruction for the caller to honor.

use std::collections::BTreeSet;

use lockstep_model::{KeyState, Tag};
use lockstep_remote::{
  invoke, ops, ClassifiedError, DescribeKeyRequest, DisableKeyRequest, EnableKeyRequest,
  ErrorKind, KeyLifecycle, KeyRotationRequest, KeySnapshot, ListResourceTagsRequest,
  PutKeyPolicyRequest, RemoteApi, TagResourceRequest, UntagResourceRequest,
  UpdateKeyDescriptionRequest, ACCESS_DENIED_ERROR_CODE,
};
use tracing::{info, instrument, warn};

use crate::convergence::{
  policies_equal, validate_transition, TagDelta, PROPAGATION_DELAY_SECONDS,
};
use crate::outcome::{project, ReconcileOutcome, StepControl};
use crate::token::ProgressToken;

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Delay requested after enable and policy-update calls.
  pub propagation_delay_seconds: u64,
  /// Page size hint for remote listings; `None` leaves it to the service.
  pub list_page_limit: Option<u32>,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      propagation_delay_seconds: PROPAGATION_DELAY_SECONDS,
      list_page_limit: None,
    }
  }
}

/// The ordered pipeline steps of a key update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
  Enable,
  Rotation,
  Disable,
  Description,
  Policy,
  Tags,
  Settle,
}

impl Step {
  /// Fixed execution order. Enable must precede Rotation (a rotation call
  /// against a key whose enablement has not propagated fails with an
  /// invalid-state error); Disable runs after Rotation for the same reason;
  /// Tags run last, after the policy grants they may depend on.
  const ORDER: [Step; 7] = [
    Step::Enable,
    Step::Rotation,
    Step::Disable,
    Step::Description,
    Step::Policy,
    Step::Tags,
    Step::Settle,
  ];

  fn name(self) -> &'static str {
    match self {
      Step::Enable => "enable",
      Step::Rotation => "rotation",
      Step::Disable => "disable",
      Step::Description => "description",
      Step::Policy => "policy",
      Step::Tags => "tags",
      Step::Settle => "settle",
    }
  }
}

/// The resumable key update workflow.
pub struct UpdateWorkflow<'a, R: RemoteApi> {
  api: &'a R,
  config: EngineConfig,
}

impl<'a, R: RemoteApi> UpdateWorkflow<'a, R> {
  pub fn new(api: &'a R, config: EngineConfig) -> Self {
    Self { api, config }
  }

  /// Run one reconciliation invocation.
  ///
  /// Stateless apart from the token: the caller persists the token returned
  /// inside an `InProgress` outcome and replays it verbatim after the
  /// requested delay.
  #[instrument(
    name = "key_reconcile",
    skip(self, desired, previous, token),
    fields(
      key_id = %desired.key_id,
      invocation_id = %uuid::Uuid::new_v4(),
    )
  )]
  pub async fn reconcile(
    &self,
    desired: &KeyState,
    previous: &KeyState,
    token: ProgressToken,
  ) -> ReconcileOutcome {
    info!(resuming = !token.is_empty(), "reconcile_started");

    let mut token = token;
    let result = self.run(desired, previous, &mut token).await;

    match &result {
      Ok(StepControl::Continue) => info!("reconcile_completed"),
      Ok(StepControl::Suspend { delay_seconds }) => {
        info!(delay_seconds, "reconcile_suspended");
      }
      Err(e) => warn!(kind = ?e.kind, error = %e, "reconcile_failed"),
    }

    project(result, desired, token)
  }

  async fn run(
    &self,
    desired: &KeyState,
    previous: &KeyState,
    token: &mut ProgressToken,
  ) -> Result<StepControl, ClassifiedError> {
    let snapshot = invoke(
      ops::DESCRIBE_KEY,
      self.api.describe_key(DescribeKeyRequest {
        key_id: desired.key_id.clone(),
      }),
    )
    .await?;
    check_resource_state(&snapshot)?;

    // Reject illegal transitions before any mutating call, so a rejected
    // update performs no partial work.
    validate_transition(previous, desired)?;

    for step in Step::ORDER {
      let control = self.run_step(step, desired, previous, token).await?;
      if let StepControl::Suspend { delay_seconds } = control {
        info!(step = step.name(), delay_seconds, "step_suspended");
        return Ok(control);
      }
    }

    Ok(StepControl::Continue)
  }

  async fn run_step(
    &self,
    step: Step,
    desired: &KeyState,
    previous: &KeyState,
    token: &mut ProgressToken,
  ) -> Result<StepControl, ClassifiedError> {
    match step {
      Step::Enable => self.step_enable(desired, previous, token).await,
      Step::Rotation => self.step_rotation(desired, previous, token).await,
      Step::Disable => self.step_disable(desired, previous).await,
      Step::Description => self.step_description(desired, previous).await,
      Step::Policy => self.step_policy(desired, previous, token).await,
      Step::Tags => self.step_tags(desired, token).await,
      Step::Settle => Ok(step_settle(token)),
    }
  }

  /// Enable the key before anything else touches it. The suspension lets
  /// the "now enabled" fact settle remotely; rotation and policy calls
  /// against a key whose enablement has not propagated can fail with an
  /// invalid-state error.
  async fn step_enable(
    &self,
    desired: &KeyState,
    previous: &KeyState,
    token: &mut ProgressToken,
  ) -> Result<StepControl, ClassifiedError> {
    if previous.enabled || !desired.enabled || token.key_enabled_done {
      return Ok(StepControl::Continue);
    }

    invoke(
      ops::ENABLE_KEY,
      self.api.enable_key(EnableKeyRequest {
        key_id: desired.key_id.clone(),
      }),
    )
    .await?;
    token.key_enabled_done = true;
    info!(step = "enable", "step_completed");

    Ok(StepControl::Suspend {
      delay_seconds: self.config.propagation_delay_seconds,
    })
  }

  async fn step_rotation(
    &self,
    desired: &KeyState,
    previous: &KeyState,
    token: &mut ProgressToken,
  ) -> Result<StepControl, ClassifiedError> {
    if previous.rotation_enabled == desired.rotation_enabled || token.rotation_done {
      return Ok(StepControl::Continue);
    }

    let req = KeyRotationRequest {
      key_id: desired.key_id.clone(),
    };
    if desired.rotation_enabled {
      invoke(ops::ENABLE_KEY_ROTATION, self.api.enable_key_rotation(req)).await?;
    } else {
      invoke(ops::DISABLE_KEY_ROTATION, self.api.disable_key_rotation(req)).await?;
    }
    token.rotation_done = true;
    info!(step = "rotation", enabled = desired.rotation_enabled, "step_completed");

    Ok(StepControl::Continue)
  }

  /// Disabling runs after the rotation update; rotation calls fail against
  /// a disabled key, while the remaining updates are allowed.
  async fn step_disable(
    &self,
    desired: &KeyState,
    previous: &KeyState,
  ) -> Result<StepControl, ClassifiedError> {
    if !previous.enabled || desired.enabled {
      return Ok(StepControl::Continue);
    }

    invoke(
      ops::DISABLE_KEY,
      self.api.disable_key(DisableKeyRequest {
        key_id: desired.key_id.clone(),
      }),
    )
    .await?;
    info!(step = "disable", "step_completed");

    Ok(StepControl::Continue)
  }

  async fn step_description(
    &self,
    desired: &KeyState,
    previous: &KeyState,
  ) -> Result<StepControl, ClassifiedError> {
    if previous.description == desired.description {
      return Ok(StepControl::Continue);
    }

    invoke(
      ops::UPDATE_KEY_DESCRIPTION,
      self.api.update_key_description(UpdateKeyDescriptionRequest {
        key_id: desired.key_id.clone(),
        description: desired.description.clone(),
      }),
    )
    .await?;
    info!(step = "description", "step_completed");

    Ok(StepControl::Continue)
  }

  /// Put the new policy and suspend: the updated policy might provision
  /// permissions required by the tag operations that follow. The token flag
  /// is set at most once, so the step is permanently skipped on resumption.
  async fn step_policy(
    &self,
    desired: &KeyState,
    previous: &KeyState,
    token: &mut ProgressToken,
  ) -> Result<StepControl, ClassifiedError> {
    if policies_equal(&previous.policy, &desired.policy) || token.policy_propagation_started {
      return Ok(StepControl::Continue);
    }

    token.policy_propagation_started = true;
    invoke(
      ops::PUT_KEY_POLICY,
      self.api.put_key_policy(PutKeyPolicyRequest {
        key_id: desired.key_id.clone(),
        policy: desired.policy.clone(),
      }),
    )
    .await?;
    info!(step = "policy", "step_completed");

    Ok(StepControl::Suspend {
      delay_seconds: self.config.propagation_delay_seconds,
    })
  }

  /// Tag reconciliation runs last. Missing tagging permission is commonly
  /// narrower than core key permission, so an authorization-denied failure
  /// here downgrades to a soft success: the workflow completes without tags
  /// rather than failing the whole reconciliation. The downgrade is scoped
  /// to this step only.
  async fn step_tags(
    &self,
    desired: &KeyState,
    token: &mut ProgressToken,
  ) -> Result<StepControl, ClassifiedError> {
    match self.reconcile_tags(desired, token).await {
      Ok(()) => Ok(StepControl::Continue),
      Err(error) if error.code.as_deref() == Some(ACCESS_DENIED_ERROR_CODE) => {
        warn!(
          step = "tags",
          operation = %error.operation,
          "tagging access denied, completing without tags"
        );
        Ok(StepControl::Continue)
      }
      Err(error) => Err(error),
    }
  }

  async fn reconcile_tags(
    &self,
    desired: &KeyState,
    token: &mut ProgressToken,
  ) -> Result<(), ClassifiedError> {
    let existing = match &token.tags_snapshot {
      Some(snapshot) => snapshot.clone(),
      None => {
        let snapshot = self.list_all_tags(&desired.key_id).await?;
        token.tags_snapshot = Some(snapshot.clone());
        snapshot
      }
    };

    let delta = TagDelta::between(&existing, &desired.tag_set());
    if delta.is_empty() {
      return Ok(());
    }

    // Removal strictly precedes addition to avoid transient duplicate-tag
    // states when only a tag's value changes.
    if !delta.to_remove.is_empty() {
      invoke(
        ops::UNTAG_RESOURCE,
        self.api.untag_resource(UntagResourceRequest {
          key_id: desired.key_id.clone(),
          tag_keys: delta.to_remove.iter().map(|t| t.key.clone()).collect(),
        }),
      )
      .await?;
    }
    if !delta.to_add.is_empty() {
      invoke(
        ops::TAG_RESOURCE,
        self.api.tag_resource(TagResourceRequest {
          key_id: desired.key_id.clone(),
          tags: delta.to_add.iter().cloned().collect(),
        }),
      )
      .await?;
    }
    info!(
      step = "tags",
      removed = delta.to_remove.len(),
      added = delta.to_add.len(),
      "step_completed"
    );

    Ok(())
  }

  async fn list_all_tags(&self, key_id: &str) -> Result<BTreeSet<Tag>, ClassifiedError> {
    let mut tags = BTreeSet::new();
    let mut cursor: Option<String> = None;

    loop {
      let page = invoke(
        ops::LIST_RESOURCE_TAGS,
        self.api.list_resource_tags(ListResourceTagsRequest {
          key_id: key_id.to_string(),
          cursor: cursor.take(),
          limit: self.config.list_page_limit,
        }),
      )
      .await?;
      tags.extend(page.tags);

      match page.next_cursor {
        Some(next) => cursor = Some(next),
        None => return Ok(tags),
      }
    }
  }
}

/// Bookkeeping: once a requested propagation delay has been consumed by the
/// caller (the workflow is resuming past a suspend point), record it. This
/// step never issues a suspension of its own.
fn step_settle(token: &mut ProgressToken) -> StepControl {
  if (token.key_enabled_done || token.policy_propagation_started)
    && !token.propagation_wait_elapsed
  {
    token.propagation_wait_elapsed = true;
  }
  StepControl::Continue
}

/// Out-of-band deletion check on the freshly fetched snapshot. A key
/// scheduled for removal is treated as already deleted, not as an engine
/// fault; a key stuck unavailable cannot be updated at all.
fn check_resource_state(snapshot: &KeySnapshot) -> Result<(), ClassifiedError> {
  match snapshot.lifecycle {
    KeyLifecycle::PendingDeletion => Err(ClassifiedError::new(
      ErrorKind::NotFound,
      ops::DESCRIBE_KEY,
      format!("key '{}' is pending deletion", snapshot.key_id),
    )),
    KeyLifecycle::Unavailable => Err(ClassifiedError::new(
      ErrorKind::InvalidState,
      ops::DESCRIBE_KEY,
      format!("key '{}' is unavailable", snapshot.key_id),
    )),
    _ => Ok(()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_settle_records_consumed_suspension() {
    let mut token = ProgressToken {
      key_enabled_done: true,
      ..ProgressToken::default()
    };

    assert_eq!(step_settle(&mut token), StepControl::Continue);
    assert!(token.propagation_wait_elapsed);
  }

  #[test]
  fn test_settle_leaves_untouched_token_unmarked() {
    let mut token = ProgressToken::default();

    assert_eq!(step_settle(&mut token), StepControl::Continue);
    assert!(!token.propagation_wait_elapsed);
  }
}
