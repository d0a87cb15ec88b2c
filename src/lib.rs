//! # lockstep
//!
//! A crash-recoverable coordinator for small fixed-size groups whose
//! members move in lockstep through an ordered workflow:
//! - every member submits an artifact (`Ready` → `Submitted`)
//! - a derived artifact is composed and reviewed (`Submitted` → `Approved`)
//! - the group finishes once everyone has seen it fully approved (`Done`)
//!
//! Members interact independently by polling; there is no push channel.
//! Convergence happens because every poll recomputes the member's next
//! step from the same shared phase map, under a per-group writer lock.
//! The whole group survives a process restart through an external
//! checkpoint service reached over a small textual TCP protocol.
//!
//! ## Architecture
//!
//! ```text
//!  request handler (external)
//!        │
//!  ┌─────▼──────────────────────────────┐
//!  │ Engine                             │
//!  │  ┌──────────────┐  ┌────────────┐  │
//!  │  │ GroupRegistry│  │ Checkpoint │  │
//!  │  │  name → group│  │ Client     │  │
//!  │  └──────┬───────┘  └─────┬──────┘  │
//!  └─────────┼────────────────┼─────────┘
//!            │                │ TCP, one command per connection
//!  ┌─────────▼────────┐  ┌────▼───────────────┐
//!  │ GroupCoordinator │  │ checkpoint service │
//!  │  phase map +     │  │ (external, single  │
//!  │  quorum queries  │  │  snapshot slot)    │
//!  └──────────────────┘  └────────────────────┘
//! ```
//!
//! On startup, [`checkpoint::recover`] pulls the last stored snapshot and
//! rehydrates the registry before any request is served.

pub mod checkpoint;
pub mod common;
pub mod coordinator;

// Re-export commonly used types
pub use checkpoint::{CheckpointClient, Snapshot};
pub use common::{Config, Error, Result};
pub use coordinator::{Engine, GroupCoordinator, GroupRegistry, MemberView, Phase};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
