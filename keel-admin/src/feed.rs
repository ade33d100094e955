//! Task lifecycle notifications and how they drive the registry.

use keel_core::{ChangeKind, Target, TargetChangeEvent, Upstreams};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// What the orchestrator did with a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    /// The task was scheduled and is ready to serve.
    Add,
    /// The task was stopped or rescheduled away.
    Remove,
    /// The task's traffic share changed.
    Update,
}

/// One notification from the orchestrator's lifecycle feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    /// What happened to the task.
    pub action: TaskAction,
    /// The task the notification describes. The feed supplies every
    /// identifying field; the registry rejects incomplete targets.
    pub target: Target,
}

/// Drive one lifecycle notification into the registry.
///
/// Returns the change event describing the mutation when it took effect, and
/// `None` when the registry rejected it — a duplicate add or a remove/update
/// race that already resolved. The registry emits no events of its own, so
/// this is the single place change events are born.
pub fn apply(registry: &Upstreams, event: TaskEvent) -> Option<TargetChangeEvent> {
    let app_id = event.target.app_id.clone();
    match event.action {
        TaskAction::Add => {
            let target = event.target;
            match registry.add_target(&app_id, target.clone()) {
                Ok(()) => {
                    info!(%app_id, task_id = %target.task_id, "target added");
                    Some(TargetChangeEvent::new(ChangeKind::Add, target))
                }
                Err(err) => {
                    warn!(%app_id, error = %err, "add rejected");
                    None
                }
            }
        }
        TaskAction::Remove => match registry.remove_target(&app_id, &event.target.task_id) {
            Ok(removed) => {
                info!(%app_id, task_id = %removed.task_id, "target removed");
                Some(TargetChangeEvent::new(ChangeKind::Remove, removed))
            }
            Err(err) => {
                warn!(%app_id, error = %err, "remove rejected");
                None
            }
        },
        TaskAction::Update => match registry.update_target(&app_id, &event.target) {
            Ok(updated) => {
                info!(%app_id, task_id = %updated.task_id, weight = updated.weight, "weight updated");
                Some(TargetChangeEvent::new(ChangeKind::Update, updated))
            }
            Err(err) => {
                warn!(%app_id, error = %err, "update rejected");
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_target(task_id: &str, weight: f64) -> Target {
        Target {
            app_id: "app1".to_string(),
            version_id: "v-1".to_string(),
            app_version: "1.0.0".to_string(),
            task_id: task_id.to_string(),
            task_ip: "10.0.0.1".to_string(),
            task_port: 8080,
            port_name: "web".to_string(),
            weight,
        }
    }

    #[test]
    fn add_produces_an_add_event() {
        let registry = Upstreams::new();
        let ev = apply(
            &registry,
            TaskEvent {
                action: TaskAction::Add,
                target: make_target("t0", 1.0),
            },
        )
        .unwrap();

        assert_eq!(ev.kind, ChangeKind::Add);
        assert_eq!(ev.target.task_id, "t0");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_add_produces_no_event() {
        let registry = Upstreams::new();
        let event = TaskEvent {
            action: TaskAction::Add,
            target: make_target("t0", 1.0),
        };
        assert!(apply(&registry, event.clone()).is_some());
        assert!(apply(&registry, event).is_none());
    }

    #[test]
    fn remove_carries_the_stored_snapshot() {
        let registry = Upstreams::new();
        apply(
            &registry,
            TaskEvent {
                action: TaskAction::Add,
                target: make_target("t0", 2.5),
            },
        );

        // The remove notification only needs identifying fields; the event
        // must describe what was actually stored.
        let mut probe = make_target("t0", 0.0);
        probe.task_ip = "0.0.0.0".to_string();
        let ev = apply(
            &registry,
            TaskEvent {
                action: TaskAction::Remove,
                target: probe,
            },
        )
        .unwrap();

        assert_eq!(ev.kind, ChangeKind::Remove);
        assert_eq!(ev.target.task_ip, "10.0.0.1");
        assert_eq!(ev.target.weight, 2.5);
        assert!(registry.is_empty());
    }

    #[test]
    fn update_event_reflects_the_new_weight_only() {
        let registry = Upstreams::new();
        apply(
            &registry,
            TaskEvent {
                action: TaskAction::Add,
                target: make_target("t0", 1.0),
            },
        );

        let mut update = make_target("t0", 7.0);
        update.task_port = 12345;
        let ev = apply(
            &registry,
            TaskEvent {
                action: TaskAction::Update,
                target: update,
            },
        )
        .unwrap();

        assert_eq!(ev.kind, ChangeKind::Update);
        assert_eq!(ev.target.weight, 7.0);
        assert_eq!(ev.target.task_port, 8080, "stored port must win");
    }

    #[test]
    fn rejected_mutations_produce_no_event() {
        let registry = Upstreams::new();
        assert!(apply(
            &registry,
            TaskEvent {
                action: TaskAction::Remove,
                target: make_target("ghost", 1.0),
            },
        )
        .is_none());
        assert!(apply(
            &registry,
            TaskEvent {
                action: TaskAction::Update,
                target: make_target("ghost", 1.0),
            },
        )
        .is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn task_event_json_shape() {
        let event = TaskEvent {
            action: TaskAction::Add,
            target: make_target("t0", 1.0),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"action\":\"add\""));
        assert!(json.contains("\"task_id\":\"t0\""));

        let parsed: TaskEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
