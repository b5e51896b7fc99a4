//! Lockstep Engine
//!
//! The reconciliation engine: a step-ordered, resumable state machine that
//! drives a multi-operation key update against an eventually consistent
//! control plane and converges retried or partial work to success.
//!
//! # Architecture
//!
//! ```text
//! UpdateWorkflow
//! └── reconcile(desired, previous, token) -> ReconcileOutcome
//!     ├── snapshot fetch + out-of-band deletion check
//!     ├── semantic transition validation (before any mutation)
//!     └── fixed step order: Enable < Rotation < Disable < Description
//!         < Policy < Tags < Settle, each step conditional, each able to
//!         suspend the whole workflow with a delay-and-resume instruction
//! ```
//!
//! The engine is stateless between invocations except for the
//! [`ProgressToken`], which the caller persists and replays verbatim on
//! resumption. Suspension is cooperative: the engine never sleeps, it
//! returns a delay and relies on the caller to re-invoke after it elapses.

mod convergence;
mod grants;
mod outcome;
mod token;
mod update;

pub use convergence::{validate_transition, TagDelta, PROPAGATION_DELAY_SECONDS};
pub use grants::find_grant;
pub use outcome::ReconcileOutcome;
pub use token::ProgressToken;
pub use update::{EngineConfig, UpdateWorkflow};
