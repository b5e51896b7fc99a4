//! In-memory control plane.
//!
//! A real in-process implementation of [`RemoteApi`] over a single key
//! record. Used by the demo binary as its backend and by the engine's
//! integration tests, which assert on the ordered operation log and inject
//! failures per operation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use lockstep_model::Tag;

use crate::api::{
  ops, DescribeKeyRequest, DisableKeyRequest, EnableKeyRequest, GrantEntry, GrantPage,
  KeyLifecycle, KeyRotationRequest, KeySnapshot, ListGrantsRequest, ListResourceTagsRequest,
  PutKeyPolicyRequest, RemoteApi, RemoteResult, TagPage, TagResourceRequest,
  UntagResourceRequest, UpdateKeyDescriptionRequest,
};
use crate::failure::ServiceFailure;

/// The authoritative remote-side record of a key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRecord {
  pub key_id: String,
  pub lifecycle: KeyLifecycle,
  pub enabled: bool,
  pub rotation_enabled: bool,
  pub description: String,
  pub policy: serde_json::Value,
  pub tags: BTreeMap<String, String>,
}

impl KeyRecord {
  pub fn new(key_id: impl Into<String>) -> Self {
    Self {
      key_id: key_id.into(),
      lifecycle: KeyLifecycle::Enabled,
      enabled: true,
      rotation_enabled: false,
      description: String::new(),
      policy: serde_json::Value::Null,
      tags: BTreeMap::new(),
    }
  }
}

#[derive(Debug)]
struct Inner {
  key: KeyRecord,
  grants: Vec<GrantEntry>,
  calls: Vec<String>,
  failures: HashMap<&'static str, ServiceFailure>,
  page_size: usize,
}

/// An in-memory key control plane.
#[derive(Debug)]
pub struct InMemoryControlPlane {
  inner: Mutex<Inner>,
}

impl InMemoryControlPlane {
  pub fn new(key: KeyRecord) -> Self {
    Self {
      inner: Mutex::new(Inner {
        key,
        grants: Vec::new(),
        calls: Vec::new(),
        failures: HashMap::new(),
        page_size: 50,
      }),
    }
  }

  pub fn with_grants(self, grants: Vec<GrantEntry>) -> Self {
    self.lock().grants = grants;
    self
  }

  /// Cap listing pages at `page_size` entries to exercise pagination.
  pub fn with_page_size(self, page_size: usize) -> Self {
    self.lock().page_size = page_size.max(1);
    self
  }

  /// Make every call to `operation` fail with the given service failure
  /// until the injection is cleared.
  pub fn inject_failure(&self, operation: &'static str, failure: ServiceFailure) {
    self.lock().failures.insert(operation, failure);
  }

  pub fn clear_failure(&self, operation: &'static str) {
    self.lock().failures.remove(operation);
  }

  /// Ordered log of every operation received, mutating or not.
  pub fn calls(&self) -> Vec<String> {
    self.lock().calls.clone()
  }

  /// Ordered log of mutating operations only.
  pub fn mutating_calls(&self) -> Vec<String> {
    self
      .calls()
      .into_iter()
      .filter(|op| {
        !matches!(
          op.as_str(),
          ops::DESCRIBE_KEY | ops::LIST_RESOURCE_TAGS | ops::LIST_GRANTS
        )
      })
      .collect()
  }

  /// Current remote-side record.
  pub fn key(&self) -> KeyRecord {
    self.lock().key.clone()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn enter(&self, operation: &'static str) -> Result<(), ServiceFailure> {
    let mut inner = self.lock();
    inner.calls.push(operation.to_string());
    match inner.failures.get(operation) {
      Some(failure) => Err(failure.clone()),
      None => Ok(()),
    }
  }

  fn check_key_id(&self, operation: &'static str, key_id: &str) -> Result<(), ServiceFailure> {
    if self.lock().key.key_id != key_id {
      return Err(ServiceFailure::new(
        "NotFoundException",
        format!("{}: key '{}' does not exist", operation, key_id),
      ));
    }
    Ok(())
  }
}

fn parse_cursor(cursor: Option<&String>) -> Result<usize, ServiceFailure> {
  match cursor {
    None => Ok(0),
    Some(raw) => raw.parse().map_err(|_| {
      ServiceFailure::new("InvalidMarkerException", format!("invalid marker '{}'", raw))
    }),
  }
}

fn page_bounds(total: usize, offset: usize, page_size: usize) -> (usize, Option<String>) {
  let end = (offset + page_size).min(total);
  let next = (end < total).then(|| end.to_string());
  (end, next)
}

impl RemoteApi for InMemoryControlPlane {
  async fn describe_key(&self, req: DescribeKeyRequest) -> RemoteResult<KeySnapshot> {
    self.enter(ops::DESCRIBE_KEY)?;
    self.check_key_id(ops::DESCRIBE_KEY, &req.key_id)?;
    let key = self.key();
    Ok(KeySnapshot {
      key_id: key.key_id,
      lifecycle: key.lifecycle,
      enabled: key.enabled,
      rotation_enabled: key.rotation_enabled,
    })
  }

  async fn enable_key(&self, req: EnableKeyRequest) -> RemoteResult<()> {
    self.enter(ops::ENABLE_KEY)?;
    self.check_key_id(ops::ENABLE_KEY, &req.key_id)?;
    let mut inner = self.lock();
    inner.key.enabled = true;
    inner.key.lifecycle = KeyLifecycle::Enabled;
    Ok(())
  }

  async fn disable_key(&self, req: DisableKeyRequest) -> RemoteResult<()> {
    self.enter(ops::DISABLE_KEY)?;
    self.check_key_id(ops::DISABLE_KEY, &req.key_id)?;
    let mut inner = self.lock();
    inner.key.enabled = false;
    inner.key.lifecycle = KeyLifecycle::Disabled;
    Ok(())
  }

  async fn enable_key_rotation(&self, req: KeyRotationRequest) -> RemoteResult<()> {
    self.enter(ops::ENABLE_KEY_ROTATION)?;
    self.check_key_id(ops::ENABLE_KEY_ROTATION, &req.key_id)?;
    let mut inner = self.lock();
    if !inner.key.enabled {
      return Err(ServiceFailure::new(
        "KMSInvalidStateException",
        format!("key '{}' is disabled, rotation cannot be changed", req.key_id),
      ));
    }
    inner.key.rotation_enabled = true;
    Ok(())
  }

  async fn disable_key_rotation(&self, req: KeyRotationRequest) -> RemoteResult<()> {
    self.enter(ops::DISABLE_KEY_ROTATION)?;
    self.check_key_id(ops::DISABLE_KEY_ROTATION, &req.key_id)?;
    let mut inner = self.lock();
    if !inner.key.enabled {
      return Err(ServiceFailure::new(
        "KMSInvalidStateException",
        format!("key '{}' is disabled, rotation cannot be changed", req.key_id),
      ));
    }
    inner.key.rotation_enabled = false;
    Ok(())
  }

  async fn update_key_description(&self, req: UpdateKeyDescriptionRequest) -> RemoteResult<()> {
    self.enter(ops::UPDATE_KEY_DESCRIPTION)?;
    self.check_key_id(ops::UPDATE_KEY_DESCRIPTION, &req.key_id)?;
    self.lock().key.description = req.description;
    Ok(())
  }

  async fn put_key_policy(&self, req: PutKeyPolicyRequest) -> RemoteResult<()> {
    self.enter(ops::PUT_KEY_POLICY)?;
    self.check_key_id(ops::PUT_KEY_POLICY, &req.key_id)?;
    self.lock().key.policy = req.policy;
    Ok(())
  }

  async fn list_resource_tags(&self, req: ListResourceTagsRequest) -> RemoteResult<TagPage> {
    self.enter(ops::LIST_RESOURCE_TAGS)?;
    self.check_key_id(ops::LIST_RESOURCE_TAGS, &req.key_id)?;
    let inner = self.lock();
    let all: Vec<Tag> = inner
      .key
      .tags
      .iter()
      .map(|(k, v)| Tag::new(k.clone(), v.clone()))
      .collect();
    let offset = parse_cursor(req.cursor.as_ref())?;
    let page_size = req.limit.map(|l| l as usize).unwrap_or(inner.page_size);
    let (end, next_cursor) = page_bounds(all.len(), offset, page_size);
    Ok(TagPage {
      tags: all.get(offset..end).unwrap_or(&[]).to_vec(),
      next_cursor,
    })
  }

  async fn tag_resource(&self, req: TagResourceRequest) -> RemoteResult<()> {
    self.enter(ops::TAG_RESOURCE)?;
    self.check_key_id(ops::TAG_RESOURCE, &req.key_id)?;
    let mut inner = self.lock();
    for tag in req.tags {
      inner.key.tags.insert(tag.key, tag.value);
    }
    Ok(())
  }

  async fn untag_resource(&self, req: UntagResourceRequest) -> RemoteResult<()> {
    self.enter(ops::UNTAG_RESOURCE)?;
    self.check_key_id(ops::UNTAG_RESOURCE, &req.key_id)?;
    let mut inner = self.lock();
    for key in req.tag_keys {
      inner.key.tags.remove(&key);
    }
    Ok(())
  }

  async fn list_grants(&self, req: ListGrantsRequest) -> RemoteResult<GrantPage> {
    self.enter(ops::LIST_GRANTS)?;
    self.check_key_id(ops::LIST_GRANTS, &req.key_id)?;
    let inner = self.lock();
    let offset = parse_cursor(req.cursor.as_ref())?;
    let page_size = req.limit.map(|l| l as usize).unwrap_or(inner.page_size);
    let (end, next_cursor) = page_bounds(inner.grants.len(), offset, page_size);
    Ok(GrantPage {
      grants: inner.grants.get(offset..end).unwrap_or(&[]).to_vec(),
      next_cursor,
    })
  }
}
