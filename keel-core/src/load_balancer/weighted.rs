//! Weight-proportional selection, the default strategy.

use rand::Rng;

use super::Balancer;
use crate::domain::target::Target;

/// Picks a target with probability proportional to its weight, normalized
/// across the current set.
///
/// A zero-weight target receives no traffic. Stateless, so concurrent calls
/// under the registry's shared lock need no extra coordination.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedBalancer;

impl Balancer for WeightedBalancer {
    fn next(&self, targets: &[Target]) -> Option<Target> {
        let total: f64 = targets.iter().map(|t| t.weight.max(0.0)).sum();
        if total <= 0.0 {
            // Empty set, or nothing carries weight.
            return None;
        }

        let mut point = rand::thread_rng().gen_range(0.0..total);
        for target in targets {
            let weight = target.weight.max(0.0);
            if weight <= 0.0 {
                continue;
            }
            if point < weight {
                return Some(target.clone());
            }
            point -= weight;
        }

        // Floating-point residue can carry the point past the last bucket.
        targets.iter().rev().find(|t| t.weight > 0.0).cloned()
    }
}
