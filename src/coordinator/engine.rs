//! Request-facing coordination facade
//!
//! The external request handler (HTTP layer, CLI, test harness; not
//! this crate's concern) drives every member interaction through one of
//! these operations. Each operation looks the group up, takes its writer
//! lock, applies the member's action, reconciles the member against the
//! shared phase map, and checkpoints the snapshot when state changed.
//! When the last member observes the group done, the group is evicted
//! and the checkpoint slot cleared.

use crate::checkpoint::{self, CheckpointClient};
use crate::common::{Config, Result};
use crate::coordinator::{GroupCoordinator, GroupRegistry, MemberView, Phase};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct Engine {
    registry: Arc<GroupRegistry>,
    checkpoint: CheckpointClient,
}

impl Engine {
    pub fn new(registry: Arc<GroupRegistry>, checkpoint: CheckpointClient) -> Self {
        Self {
            registry,
            checkpoint,
        }
    }

    /// Engine with a fresh registry against the configured checkpoint
    /// service.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(GroupRegistry::new()),
            CheckpointClient::new(&config.checkpoint.addr),
        )
    }

    pub fn registry(&self) -> &GroupRegistry {
        &self.registry
    }

    /// Rehydrate the registry from the last stored checkpoint. Call once
    /// at startup, before serving any request.
    pub async fn recover(&self) -> Result<()> {
        checkpoint::recover(&self.registry, &self.checkpoint).await
    }

    /// Create a new group and initialize the checkpoint slot for it.
    /// The backend keeps a single slot, so this discards whatever
    /// previous group was stored there.
    pub async fn create_group(
        &self,
        name: &str,
        capacity: usize,
        deadline: Option<Duration>,
    ) -> Result<()> {
        self.registry.create(name, capacity, deadline)?;
        tracing::info!("Created group {} (capacity {})", name, capacity);
        self.checkpoint.create_slot().await?;
        Ok(())
    }

    /// Add `user` to the group, or re-enter them where they left off.
    pub async fn join(&self, group: &str, user: &str) -> Result<MemberView> {
        let handle = self.registry.lookup(group)?;
        let mut g = handle.lock().await;

        let was_member = g.is_member(user);
        g.join(user)?;
        if !was_member {
            tracing::info!("{} joined group {} ({}/{})", user, group, g.member_count(), g.capacity());
        }
        self.settle(group, &mut g, user, !was_member).await
    }

    /// The member's artifact arrived: `Ready` → `Submitted`.
    pub async fn submit(&self, group: &str, user: &str) -> Result<MemberView> {
        let handle = self.registry.lookup(group)?;
        let mut g = handle.lock().await;
        g.expect_member(user)?;

        let before = g.phase_of(user);
        let round_was_open = g.round_open();
        g.set_phase(user, Phase::Submitted);
        let completed_set = g.all_in_phase(Phase::Submitted) && !round_was_open;

        let view = self
            .settle(group, &mut g, user, before != Some(Phase::Submitted))
            .await?;

        // The member whose artifact completed the set composes the
        // derived artifact; later observers of the open round just
        // review it.
        if completed_set && view == MemberView::Review {
            Ok(MemberView::Compose)
        } else {
            Ok(view)
        }
    }

    /// The member accepted the composed artifact: `Submitted` → `Approved`.
    pub async fn approve(&self, group: &str, user: &str) -> Result<MemberView> {
        let handle = self.registry.lookup(group)?;
        let mut g = handle.lock().await;
        g.expect_member(user)?;

        let before = g.phase_of(user);
        g.set_phase(user, Phase::Approved);
        self.settle(group, &mut g, user, before != Some(Phase::Approved))
            .await
    }

    /// Hard, group-wide abort back to the start: everyone returns to
    /// `Ready` and resubmits.
    pub async fn reject(&self, group: &str, user: &str) -> Result<MemberView> {
        let handle = self.registry.lookup(group)?;
        let mut g = handle.lock().await;
        g.expect_member(user)?;

        tracing::info!("{} rejected the round for group {}", user, group);
        let changed = g.reset_all(Phase::Ready);
        g.close_round();
        self.settle(group, &mut g, user, changed).await
    }

    /// The member wants to redo their own submission: everyone else
    /// waits at `Submitted` while this member returns to `Ready`.
    pub async fn replace_submission(&self, group: &str, user: &str) -> Result<MemberView> {
        let handle = self.registry.lookup(group)?;
        let mut g = handle.lock().await;
        g.expect_member(user)?;

        tracing::info!("{} is replacing their submission in group {}", user, group);
        g.reset_all(Phase::Submitted);
        g.set_phase(user, Phase::Ready);
        g.close_round();
        self.settle(group, &mut g, user, true).await
    }

    /// Reconcile the member against the shared map without any action of
    /// their own. This is the poll every waiting page re-issues.
    pub async fn poll(&self, group: &str, user: &str) -> Result<MemberView> {
        let handle = self.registry.lookup(group)?;
        let mut g = handle.lock().await;
        self.settle(group, &mut g, user, false).await
    }

    /// Shared tail of every operation: reconcile, persist, tear down.
    ///
    /// Runs under the group's writer lock, so the checkpoint round trip
    /// serializes with other writers: a stalled checkpoint service
    /// stalls this request for as long as it stays stalled. If the
    /// store fails the in-memory
    /// transition is NOT rolled back; persisted state then lags live
    /// state until the next successful store.
    async fn settle(
        &self,
        name: &str,
        g: &mut GroupCoordinator,
        user: &str,
        action_changed: bool,
    ) -> Result<MemberView> {
        let outcome = g.reconcile(user, Instant::now())?;

        if outcome.complete {
            self.registry.remove(name);
            self.checkpoint.remove_slot().await?;
            tracing::info!("Group {} finished; checkpoint cleared", name);
        } else if action_changed || outcome.changed {
            self.checkpoint.store_snapshot(&g.snapshot()).await?;
        }

        Ok(outcome.view)
    }
}
