//! Group coordination core
//!
//! - [`Phase`]: the four-state member workflow
//! - [`GroupCoordinator`]: one group's phase map, quorum queries and
//!   transition protocol
//! - [`GroupRegistry`]: the live groups, keyed by name
//! - [`Engine`]: the facade request handlers drive

pub mod engine;
pub mod group;
pub mod phase;
pub mod registry;

pub use engine::Engine;
pub use group::{GroupCoordinator, MemberView, Reconciled};
pub use phase::Phase;
pub use registry::{GroupHandle, GroupRegistry};
