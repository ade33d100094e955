//! Rotating selection with an atomic cursor.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::Balancer;
use crate::domain::target::Target;

/// Cycles through the targets that carry weight, one per call.
///
/// The cursor advances atomically because concurrent selections are not
/// serialized by the registry lock, and it is reduced modulo the eligible set
/// on every call so it wraps instead of indexing out of bounds when the set
/// shrinks between calls.
#[derive(Debug, Default)]
pub struct RoundRobinBalancer {
    cursor: AtomicUsize,
}

impl RoundRobinBalancer {
    /// Create a balancer with its cursor at the first target.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Balancer for RoundRobinBalancer {
    fn next(&self, targets: &[Target]) -> Option<Target> {
        let eligible: Vec<&Target> = targets.iter().filter(|t| t.weight > 0.0).collect();
        if eligible.is_empty() {
            return None;
        }
        let turn = self.cursor.fetch_add(1, Ordering::Relaxed);
        Some(eligible[turn % eligible.len()].clone())
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
    fn cycles_in_order() {
        let rr = RoundRobinBalancer::new();
        let targets = vec![
            make_target("t0", 1.0),
            make_target("t1", 1.0),
            make_target("t2", 1.0),
        ];

        let picked: Vec<String> = (0..6)
            .map(|_| rr.next(&targets).unwrap().task_id)
            .collect();
        assert_eq!(picked, vec!["t0", "t1", "t2", "t0", "t1", "t2"]);
    }

    #[test]
    fn skips_zero_weight_targets() {
        let rr = RoundRobinBalancer::new();
        let targets = vec![
            make_target("t0", 1.0),
            make_target("muted", 0.0),
            make_target("t2", 1.0),
        ];

        let picked: Vec<String> = (0..4)
            .map(|_| rr.next(&targets).unwrap().task_id)
            .collect();
        assert_eq!(picked, vec!["t0", "t2", "t0", "t2"]);
    }

    #[test]
    fn survives_a_shrinking_set() {
        let rr = RoundRobinBalancer::new();
        let three = vec![
            make_target("t0", 1.0),
            make_target("t1", 1.0),
            make_target("t2", 1.0),
        ];
        for _ in 0..5 {
            rr.next(&three).unwrap();
        }

        // The stored cursor now exceeds the smaller set; selection must wrap
        // rather than index past the end.
        let one = vec![make_target("t0", 1.0)];
        for _ in 0..3 {
            assert_eq!(rr.next(&one).unwrap().task_id, "t0");
        }
    }

    #[test]
    fn empty_and_all_zero_yield_none() {
        let rr = RoundRobinBalancer::new();
        assert!(rr.next(&[]).is_none());
        assert!(rr.next(&[make_target("t0", 0.0)]).is_none());
    }
}
