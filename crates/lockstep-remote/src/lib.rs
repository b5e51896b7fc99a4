//! Lockstep Remote
//!
//! The remote control-plane boundary for Lockstep. This crate owns:
//!
//! - the [`RemoteApi`] trait - one method per remote operation, implemented
//!   by the transport layer (and by [`InMemoryControlPlane`] for tests and
//!   local demos)
//! - the [`ServiceFailure`] raw failure type raised by implementations
//! - the exception classifier mapping raw failures onto the closed
//!   [`ErrorKind`] taxonomy
//! - the operation gateway [`invoke`] - exactly one remote call, classified
//!   on failure, never retried here (retry is the caller's decision)

mod api;
mod classify;
mod failure;
mod gateway;
mod memory;

pub use api::{
  ops, DescribeKeyRequest, DisableKeyRequest, EnableKeyRequest, GrantEntry, GrantPage,
  KeyLifecycle, KeyRotationRequest, KeySnapshot, ListGrantsRequest, ListResourceTagsRequest,
  PutKeyPolicyRequest, RemoteApi, RemoteResult, TagPage, TagResourceRequest,
  UntagResourceRequest, UpdateKeyDescriptionRequest,
};
pub use classify::{classify, ACCESS_DENIED_ERROR_CODE, THROTTLING_ERROR_CODE};
pub use failure::{ClassifiedError, ErrorKind, ServiceFailure};
pub use gateway::invoke;
pub use memory::{InMemoryControlPlane, KeyRecord};
