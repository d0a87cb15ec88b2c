//! Registry of live groups
//!
//! Owns `name → GroupCoordinator` for every group this process is
//! currently coordinating. The registry is an explicit, injectable
//! instance with an explicit lifecycle: populated once at startup by
//! recovery, grown by create, torn down group by group on completion.
//! It is never ambient process state.

use crate::common::{Error, Result};
use crate::coordinator::GroupCoordinator;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared handle to one group. The async mutex is the group's
/// single-writer discipline: every decide-then-apply sequence (and the
/// checkpoint write it triggers) runs under it.
pub type GroupHandle = Arc<tokio::sync::Mutex<GroupCoordinator>>;

/// Owns the set of live [`GroupCoordinator`] instances, keyed by name.
///
/// Several groups may be live in memory at once, but the checkpoint
/// backend retains a single snapshot slot, so only the most recently
/// checkpointed group survives a restart.
pub struct GroupRegistry {
    groups: Mutex<HashMap<String, GroupHandle>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self {
            groups: Mutex::new(HashMap::new()),
        }
    }

    /// Create and track a new group. Names are unique within the
    /// registry; re-creating a live name is rejected and requires an
    /// explicit remove first.
    pub fn create(
        &self,
        name: &str,
        capacity: usize,
        deadline: Option<Duration>,
    ) -> Result<GroupHandle> {
        let mut groups = self.groups.lock().unwrap();
        if groups.contains_key(name) {
            return Err(Error::DuplicateGroup(name.to_string()));
        }

        let group = GroupCoordinator::new(name, capacity, deadline)?;
        let handle: GroupHandle = Arc::new(tokio::sync::Mutex::new(group));
        groups.insert(name.to_string(), handle.clone());
        Ok(handle)
    }

    pub fn lookup(&self, name: &str) -> Result<GroupHandle> {
        self.groups
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownGroup(name.to_string()))
    }

    /// Evict a group. Returns whether it was still tracked; evicting an
    /// already-gone group is not an error, so completion races stay
    /// idempotent.
    pub fn remove(&self, name: &str) -> bool {
        self.groups.lock().unwrap().remove(name).is_some()
    }

    /// Install a restored group, used by recovery before any request is
    /// served. Replaces a same-named entry outright.
    pub fn adopt(&self, group: GroupCoordinator) -> GroupHandle {
        let name = group.name().to_string();
        let handle: GroupHandle = Arc::new(tokio::sync::Mutex::new(group));
        self.groups.lock().unwrap().insert(name, handle.clone());
        handle
    }

    pub fn len(&self) -> usize {
        self.groups.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.lock().unwrap().is_empty()
    }

    /// Names of all live groups, unordered.
    pub fn names(&self) -> Vec<String> {
        self.groups.lock().unwrap().keys().cloned().collect()
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}
