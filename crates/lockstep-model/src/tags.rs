use serde::{Deserialize, Serialize};

/// A single key/value tag applied to a resource.
///
/// Tags compare on the full (key, value) pair, so changing only a tag's
/// value shows up as both a removal and an addition when diffing tag sets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
  pub key: String,
  pub value: String,
}

impl Tag {
  pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      value: value.into(),
    }
  }
}
