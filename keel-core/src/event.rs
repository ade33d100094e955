//! Change notifications for registry mutations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::target::Target;

/// The kind of mutation a [`TargetChangeEvent`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// A target was inserted.
    Add,
    /// A target was removed.
    Remove,
    /// A target's weight was rewritten.
    Update,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeKind::Add => "add",
            ChangeKind::Remove => "remove",
            ChangeKind::Update => "update",
        })
    }
}

/// Immutable description of one completed registry mutation, for downstream
/// listeners such as cache invalidation or an audit log.
///
/// Constructed by whichever layer drives the mutation; the registry itself
/// neither emits nor retains these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetChangeEvent {
    /// What happened.
    pub kind: ChangeKind,
    /// Snapshot of the target the mutation applied to.
    pub target: Target,
}

impl TargetChangeEvent {
    /// Describe a completed mutation of the given kind.
    pub fn new(kind: ChangeKind, target: Target) -> Self {
        Self { kind, target }
    }
}

impl fmt::Display for TargetChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}: app:{} task:{} endpoint:{}:{} weight:{}}}",
            self.kind,
            self.target.app_id,
            self.target.task_id,
            self.target.task_ip,
            self.target.task_port,
            self.target.weight,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_compact() {
        let ev = TargetChangeEvent::new(
            ChangeKind::Add,
            Target {
                app_id: "app1".to_string(),
                version_id: "v-1".to_string(),
                app_version: "1.0.0".to_string(),
                task_id: "task-0".to_string(),
                task_ip: "10.0.3.7".to_string(),
                task_port: 31005,
                port_name: "web".to_string(),
                weight: 1.5,
            },
        );
        assert_eq!(
            ev.to_string(),
            "{add: app:app1 task:task-0 endpoint:10.0.3.7:31005 weight:1.5}"
        );
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ChangeKind::Remove).unwrap(), "\"remove\"");
    }
}
