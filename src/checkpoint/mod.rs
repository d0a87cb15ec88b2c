//! Checkpoint persistence: wire codec, service client, startup recovery

pub mod client;
pub mod recovery;
pub mod wire;

pub use client::CheckpointClient;
pub use recovery::recover;
pub use wire::Snapshot;
