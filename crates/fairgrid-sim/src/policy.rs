//! Headroom formulas of the two queue policies.

use fairgrid_attempt::SchedulingPolicy;
use fairgrid_core::Resource;
use serde::{Deserialize, Serialize};

/// Selects a policy from a scenario file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    #[default]
    Fair,
    Drf,
}

impl PolicyKind {
    pub fn build(self) -> Box<dyn SchedulingPolicy> {
        match self {
            PolicyKind::Fair => Box::new(FairSharePolicy),
            PolicyKind::Drf => Box::new(DominantResourcePolicy),
        }
    }
}

/// Memory-only fair sharing. vcores are not shared fairly, so the whole of
/// the available vcores counts as headroom.
#[derive(Debug, Clone, Copy, Default)]
pub struct FairSharePolicy;

impl SchedulingPolicy for FairSharePolicy {
    fn name(&self) -> &str {
        "fair"
    }

    fn headroom(&self, queue_fair_share: Resource, queue_usage: Resource, max_available: Resource) -> Resource {
        let memory = (queue_fair_share.memory_mb - queue_usage.memory_mb).max(0);
        Resource::new(memory.min(max_available.memory_mb), max_available.vcores)
    }
}

/// Dominant resource fairness: every dimension is bounded by its fair share.
#[derive(Debug, Clone, Copy, Default)]
pub struct DominantResourcePolicy;

impl SchedulingPolicy for DominantResourcePolicy {
    fn name(&self) -> &str {
        "drf"
    }

    fn headroom(&self, queue_fair_share: Resource, queue_usage: Resource, max_available: Resource) -> Resource {
        (queue_fair_share - queue_usage)
            .clamp_non_negative()
            .component_min(&max_available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fair_policy_bounds_memory_only() {
        let headroom = FairSharePolicy.headroom(
            Resource::new(8192, 4),
            Resource::new(2048, 6),
            Resource::new(4096, 10),
        );
        assert_eq!(headroom, Resource::new(4096, 10));
    }

    #[test]
    fn fair_policy_never_goes_negative() {
        let headroom = FairSharePolicy.headroom(
            Resource::new(1024, 1),
            Resource::new(4096, 1),
            Resource::new(4096, 2),
        );
        assert_eq!(headroom, Resource::new(0, 2));
    }

    #[test]
    fn drf_policy_bounds_every_dimension() {
        let headroom = DominantResourcePolicy.headroom(
            Resource::new(8192, 4),
            Resource::new(2048, 6),
            Resource::new(4096, 10),
        );
        assert_eq!(headroom, Resource::new(4096, 0));
    }

    #[test]
    fn policy_kind_parses_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: PolicyKind,
        }
        let w: Wrapper = toml::from_str("policy = \"drf\"").unwrap();
        assert_eq!(w.policy, PolicyKind::Drf);
        assert_eq!(w.policy.build().name(), "drf");
    }
}
