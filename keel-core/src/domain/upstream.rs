//! Upstream models: the live target set of one application.

use serde::Serialize;

use crate::domain::target::Target;
use crate::load_balancer::Balancer;

/// The set of targets currently backing one application, paired with the
/// balancing strategy chosen when the upstream was created.
///
/// Upstreams are born when their first target is registered and die the
/// moment their last target is removed; the registry never holds an empty
/// one. The strategy is fixed for the upstream's lifetime.
#[derive(Debug)]
pub struct Upstream {
    app_id: String,
    targets: Vec<Target>,
    balancer: Box<dyn Balancer>,
}

impl Upstream {
    /// Create an empty upstream bound to the given balancing strategy.
    pub(crate) fn with_balancer(app_id: impl Into<String>, balancer: Box<dyn Balancer>) -> Self {
        Self {
            app_id: app_id.into(),
            targets: Vec::new(),
            balancer,
        }
    }

    /// Application this upstream routes for.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Targets in insertion order.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Ask the bound balancer for the target that should serve the next
    /// request.
    pub fn next(&self) -> Option<Target> {
        self.balancer.next(&self.targets)
    }

    /// Owned point-in-time copy, decoupled from later mutation.
    pub fn snapshot(&self) -> UpstreamSnapshot {
        UpstreamSnapshot {
            app_id: self.app_id.clone(),
            targets: self.targets.clone(),
        }
    }

    pub(crate) fn position(&self, task_id: &str) -> Option<usize> {
        self.targets.iter().position(|t| t.task_id == task_id)
    }

    pub(crate) fn find(&self, task_id: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.task_id == task_id)
    }

    pub(crate) fn find_mut(&mut self, task_id: &str) -> Option<&mut Target> {
        self.targets.iter_mut().find(|t| t.task_id == task_id)
    }

    pub(crate) fn push(&mut self, target: Target) {
        self.targets.push(target);
    }

    /// Remove by index, keeping the relative order of the rest.
    pub(crate) fn remove(&mut self, index: usize) -> Target {
        self.targets.remove(index)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Read-only copy of an upstream as returned by the registry's `all`.
///
/// The copy does not stay in sync with concurrent mutation; callers that need
/// fresh state ask the registry again.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamSnapshot {
    /// Application the snapshot describes.
    pub app_id: String,
    /// Targets at the time the snapshot was taken, in insertion order.
    pub targets: Vec<Target>,
}
