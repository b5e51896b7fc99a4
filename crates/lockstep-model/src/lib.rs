//! Lockstep Model
//!
//! This crate contains the serializable resource state types for Lockstep.
//! A `KeyState` is an immutable snapshot of a key's declared configuration,
//! supplied by the caller as either the desired state or the previous state
//! of a reconciliation.
//!
//! The engine never mutates these snapshots in place - it derives a new
//! state to return on success (with write-only fields masked).

mod state;
mod tags;

pub use state::KeyState;
pub use tags::Tag;
