use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::tags::Tag;

/// A declared key configuration snapshot.
///
/// Used for both the desired state and the previous state of a
/// reconciliation. Field defaults mirror what the control plane assumes for
/// an omitted field: keys are enabled, rotation is off, the description is
/// empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyState {
  pub key_id: String,
  #[serde(default = "default_enabled")]
  pub enabled: bool,
  #[serde(default)]
  pub rotation_enabled: bool,
  #[serde(default)]
  pub description: String,
  /// Access policy document. Stored as raw JSON; comparison is structural.
  #[serde(default = "default_policy")]
  pub policy: serde_json::Value,
  #[serde(default)]
  pub tags: BTreeMap<String, String>,
  /// Deletion window in days. Write-only: accepted on input, masked from
  /// any state the engine returns.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pending_window_days: Option<u32>,
  /// Key material origin. Create-only: a change between previous and
  /// desired is rejected before any remote mutation.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub origin: Option<String>,
}

impl KeyState {
  /// The tag map as a set of (key, value) pairs for diffing.
  pub fn tag_set(&self) -> BTreeSet<Tag> {
    self
      .tags
      .iter()
      .map(|(k, v)| Tag::new(k.clone(), v.clone()))
      .collect()
  }

  /// Strip write-only fields before handing the state back to the caller.
  pub fn masked(mut self) -> Self {
    self.pending_window_days = None;
    self
  }
}

fn default_enabled() -> bool {
  true
}

fn default_policy() -> serde_json::Value {
  serde_json::Value::Null
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_applied_on_deserialize() {
    let state: KeyState = serde_json::from_str(r#"{"key_id": "key-1"}"#).unwrap();
    assert!(state.enabled);
    assert!(!state.rotation_enabled);
    assert_eq!(state.description, "");
    assert!(state.tags.is_empty());
    assert_eq!(state.pending_window_days, None);
  }

  #[test]
  fn test_masked_strips_write_only_fields() {
    let state: KeyState =
      serde_json::from_str(r#"{"key_id": "key-1", "pending_window_days": 7}"#).unwrap();
    let masked = state.masked();
    assert_eq!(masked.pending_window_days, None);

    let serialized = serde_json::to_value(&masked).unwrap();
    assert!(serialized.get("pending_window_days").is_none());
  }

  #[test]
  fn test_tag_set_pairs() {
    let mut tags = BTreeMap::new();
    tags.insert("env".to_string(), "prod".to_string());
    tags.insert("team".to_string(), "infra".to_string());

    let state = KeyState {
      key_id: "key-1".to_string(),
      enabled: true,
      rotation_enabled: false,
      description: String::new(),
      policy: serde_json::Value::Null,
      tags,
      pending_window_days: None,
      origin: None,
    };

    let set = state.tag_set();
    assert!(set.contains(&Tag::new("env", "prod")));
    assert!(set.contains(&Tag::new("team", "infra")));
    assert_eq!(set.len(), 2);
  }
}
