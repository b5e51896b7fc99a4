use lockstep_model::Tag;
use serde::{Deserialize, Serialize};

use crate::failure::ServiceFailure;

/// Result of a single raw remote call, before classification.
pub type RemoteResult<T> = Result<T, ServiceFailure>;

/// Remote operation names, shared by call sites (for error diagnostics) and
/// backends (for call logging and failure injection).
pub mod ops {
  pub const DESCRIBE_KEY: &str = "DescribeKey";
  pub const ENABLE_KEY: &str = "EnableKey";
  pub const DISABLE_KEY: &str = "DisableKey";
  pub const ENABLE_KEY_ROTATION: &str = "EnableKeyRotation";
  pub const DISABLE_KEY_ROTATION: &str = "DisableKeyRotation";
  pub const UPDATE_KEY_DESCRIPTION: &str = "UpdateKeyDescription";
  pub const PUT_KEY_POLICY: &str = "PutKeyPolicy";
  pub const LIST_RESOURCE_TAGS: &str = "ListResourceTags";
  pub const TAG_RESOURCE: &str = "TagResource";
  pub const UNTAG_RESOURCE: &str = "UntagResource";
  pub const LIST_GRANTS: &str = "ListGrants";
}

/// Remote lifecycle state of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyLifecycle {
  Enabled,
  Disabled,
  /// Scheduled for removal out-of-band. An update against a key in this
  /// state is treated as the key having been deleted.
  PendingDeletion,
  PendingImport,
  Unavailable,
}

/// Read-only projection of a key's current remote status, fetched at the
/// start of each reconciliation invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySnapshot {
  pub key_id: String,
  pub lifecycle: KeyLifecycle,
  pub enabled: bool,
  pub rotation_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribeKeyRequest {
  pub key_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnableKeyRequest {
  pub key_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisableKeyRequest {
  pub key_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRotationRequest {
  pub key_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateKeyDescriptionRequest {
  pub key_id: String,
  pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutKeyPolicyRequest {
  pub key_id: String,
  pub policy: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResourceTagsRequest {
  pub key_id: String,
  /// Opaque page cursor; absent on the first page.
  pub cursor: Option<String>,
  pub limit: Option<u32>,
}

/// One page of a tag listing. No `next_cursor` means the listing is done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagPage {
  pub tags: Vec<Tag>,
  pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagResourceRequest {
  pub key_id: String,
  pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UntagResourceRequest {
  pub key_id: String,
  pub tag_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListGrantsRequest {
  pub key_id: String,
  pub cursor: Option<String>,
  pub limit: Option<u32>,
}

/// A grant as reported by the listing API. Grants can only be read by
/// listing all grants for the key and filtering by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantEntry {
  pub grant_id: String,
  pub grantee_principal: String,
  pub operations: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
}

/// One page of a grant listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantPage {
  pub grants: Vec<GrantEntry>,
  pub next_cursor: Option<String>,
}

/// The remote control-plane operations the engine drives.
///
/// Implementations perform the actual authenticated call and raise a
/// [`ServiceFailure`] on any transport or service-level error.
/// Authentication, request signing, and transport retry/backoff all live
/// behind this boundary.
pub trait RemoteApi {
  fn describe_key(
    &self,
    req: DescribeKeyRequest,
  ) -> impl Future<Output = RemoteResult<KeySnapshot>>;

  fn enable_key(&self, req: EnableKeyRequest) -> impl Future<Output = RemoteResult<()>>;

  fn disable_key(&self, req: DisableKeyRequest) -> impl Future<Output = RemoteResult<()>>;

  fn enable_key_rotation(&self, req: KeyRotationRequest) -> impl Future<Output = RemoteResult<()>>;

  fn disable_key_rotation(
    &self,
    req: KeyRotationRequest,
  ) -> impl Future<Output = RemoteResult<()>>;

  fn update_key_description(
    &self,
    req: UpdateKeyDescriptionRequest,
  ) -> impl Future<Output = RemoteResult<()>>;

  fn put_key_policy(&self, req: PutKeyPolicyRequest) -> impl Future<Output = RemoteResult<()>>;

  fn list_resource_tags(
    &self,
    req: ListResourceTagsRequest,
  ) -> impl Future<Output = RemoteResult<TagPage>>;

  fn tag_resource(&self, req: TagResourceRequest) -> impl Future<Output = RemoteResult<()>>;

  fn untag_resource(&self, req: UntagResourceRequest) -> impl Future<Output = RemoteResult<()>>;

  fn list_grants(&self, req: ListGrantsRequest) -> impl Future<Output = RemoteResult<GrantPage>>;
}
