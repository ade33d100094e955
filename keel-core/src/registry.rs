//! The concurrent upstream registry.
//!
//! One reader/writer lock guards the whole collection: structural mutations
//! serialize globally, lookups proceed concurrently. This trades write
//! parallelism across unrelated applications for a single synchronization
//! domain; target sets are small (tens of entries, not millions), so every
//! critical section is short and bounded. Sharding the lock per application
//! would allow parallel writes at the cost of a second, outer lock for
//! upstream add/remove.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use crate::domain::target::Target;
use crate::domain::upstream::{Upstream, UpstreamSnapshot};
use crate::error::RegistryError;
use crate::load_balancer::{Balancer, WeightedBalancer};

/// The live mapping from application id to its upstream.
///
/// All operations are atomic with respect to each other: a reader running
/// concurrently with a writer observes either the pre- or post-mutation
/// state, never a partially applied one. Writers observe a strictly
/// serialized total order.
#[derive(Debug, Default)]
pub struct Upstreams {
    inner: RwLock<BTreeMap<String, Upstream>>,
}

impl Upstreams {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // Critical sections contain no panicking code, so a poisoned lock still
    // guards a consistent map; recover instead of propagating.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Upstream>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Upstream>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point-in-time copies of every upstream.
    ///
    /// The snapshots do not track mutation that happens after the call
    /// returns.
    pub fn all(&self) -> Vec<UpstreamSnapshot> {
        self.read().values().map(Upstream::snapshot).collect()
    }

    /// Number of applications currently routed.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no application is routed at all.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Register a target under the given application.
    ///
    /// The upstream is created with the default balancer the moment its first
    /// target arrives. A task id already present under the application is
    /// rejected and the stored entry left untouched, which keeps duplicate
    /// add notifications from the lifecycle feed idempotent.
    pub fn add_target(&self, app_id: &str, target: Target) -> Result<(), RegistryError> {
        self.add_target_with_balancer(app_id, target, Box::new(WeightedBalancer))
    }

    /// Register a target, binding `balancer` to the upstream when this add is
    /// the one that creates it.
    ///
    /// An upstream that already exists keeps the strategy it was born with;
    /// there is no mid-lifetime swap.
    pub fn add_target_with_balancer(
        &self,
        app_id: &str,
        target: Target,
        balancer: Box<dyn Balancer>,
    ) -> Result<(), RegistryError> {
        if target.task_id.is_empty() {
            warn!(app_id, "discarding target without a task id");
            return Err(RegistryError::IncompleteTarget);
        }

        let mut map = self.write();
        let upstream = map
            .entry(app_id.to_string())
            .or_insert_with(|| Upstream::with_balancer(app_id, balancer));
        if upstream.find(&target.task_id).is_some() {
            warn!(app_id, task_id = %target.task_id, "target already registered, ignoring");
            return Err(RegistryError::DuplicateTarget {
                app_id: app_id.to_string(),
                task_id: target.task_id,
            });
        }
        upstream.push(target);
        Ok(())
    }

    /// Look up one target. Pure read, no mutation.
    pub fn get_target(&self, app_id: &str, task_id: &str) -> Option<Target> {
        self.read().get(app_id)?.find(task_id).cloned()
    }

    /// Deregister a target, dropping the whole upstream in the same atomic
    /// step when it was the last one.
    ///
    /// Returns the removed snapshot so the caller can describe the change to
    /// downstream listeners.
    pub fn remove_target(&self, app_id: &str, task_id: &str) -> Result<Target, RegistryError> {
        let mut map = self.write();
        let Some(upstream) = map.get_mut(app_id) else {
            warn!(app_id, "no such upstream");
            return Err(RegistryError::UpstreamNotFound(app_id.to_string()));
        };
        let Some(index) = upstream.position(task_id) else {
            warn!(app_id, task_id, "no such target");
            return Err(RegistryError::TargetNotFound {
                app_id: app_id.to_string(),
                task_id: task_id.to_string(),
            });
        };

        let removed = upstream.remove(index);
        if upstream.is_empty() {
            map.remove(app_id);
            debug!(app_id, "dropped empty upstream");
        }
        Ok(removed)
    }

    /// Rewrite the weight of the stored target matching `update.task_id`.
    ///
    /// Deliberately narrow: every other stored field keeps its originally
    /// inserted value, whatever the update carries. Returns the post-update
    /// snapshot.
    pub fn update_target(&self, app_id: &str, update: &Target) -> Result<Target, RegistryError> {
        let mut map = self.write();
        let Some(upstream) = map.get_mut(app_id) else {
            warn!(app_id, "no such upstream");
            return Err(RegistryError::UpstreamNotFound(app_id.to_string()));
        };
        let Some(stored) = upstream.find_mut(&update.task_id) else {
            warn!(app_id, task_id = %update.task_id, "no such target");
            return Err(RegistryError::TargetNotFound {
                app_id: app_id.to_string(),
                task_id: update.task_id.clone(),
            });
        };

        stored.weight = update.weight;
        Ok(stored.clone())
    }

    /// Pick the target that should serve the next request for `app_id`.
    ///
    /// Delegates to the balancer bound to the upstream. `None` means no
    /// eligible backend right now: the upstream is absent, or the balancer
    /// declined the current set.
    pub fn next_target(&self, app_id: &str) -> Option<Target> {
        self.read().get(app_id)?.next()
    }
}
