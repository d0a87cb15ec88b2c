//! Startup recovery
//!
//! Runs once, before the process serves its first request: pull the last
//! stored snapshot and rehydrate the registry. An absent or malformed
//! checkpoint is not fatal; the process simply starts with no groups.
//! A transport failure is surfaced; the caller decides whether boot can
//! proceed without the checkpoint service.

use crate::checkpoint::CheckpointClient;
use crate::common::{Error, Result};
use crate::coordinator::{GroupCoordinator, GroupRegistry};

/// Rehydrate `registry` from the checkpoint service's single slot.
pub async fn recover(registry: &GroupRegistry, client: &CheckpointClient) -> Result<()> {
    match client.fetch_snapshot().await {
        Ok(Some(snapshot)) => {
            tracing::info!(
                "Restored group {} ({} members) from checkpoint",
                snapshot.name,
                snapshot.members.len()
            );
            registry.adopt(GroupCoordinator::from_snapshot(snapshot));
            Ok(())
        }
        Ok(None) => {
            tracing::info!("No checkpoint stored; starting empty");
            Ok(())
        }
        Err(Error::MalformedSnapshot(reason)) => {
            tracing::warn!("Ignoring malformed checkpoint ({}); starting empty", reason);
            Ok(())
        }
        Err(e) => Err(e),
    }
}
