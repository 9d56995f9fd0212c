//! Delay scheduling: how far a priority may relax placement locality.
//!
//! Every priority starts at `NODE_LOCAL`. Each offer the attempt passes on
//! counts as a missed opportunity; once enough are missed (or enough time
//! has passed) the allowed level moves to `RACK_LOCAL`, then `OFF_SWITCH`.
//! A successful allocation at a stricter level than allowed pulls the level
//! back, so a priority that has shown it can get local containers keeps
//! asking for them.
//!
//! Which signal drives relaxation is a [`RelaxationStrategy`], chosen once
//! from the scheduler configuration.

use std::collections::HashMap;

use fairgrid_core::{NodeType, Priority};
use tracing::{debug, info, warn};

/// Decides when a priority has waited long enough at its current level.
pub trait RelaxationStrategy {
    /// Delay scheduling is off; every level is `OFF_SWITCH`.
    fn is_disabled(&self) -> bool;

    fn should_advance(&self, tracker: &LocalityTracker, priority: Priority, level: NodeType) -> bool;

    /// Reset whatever the strategy measures once a priority relaxes.
    fn on_advance(&self, tracker: &mut LocalityTracker, priority: Priority);
}

/// Relax after missing more than `num_nodes × threshold` offers.
#[derive(Debug, Clone, Copy)]
pub struct MissedOpportunities {
    pub num_nodes: usize,
    pub node_threshold: f64,
    pub rack_threshold: f64,
}

impl MissedOpportunities {
    /// Thresholds above 1.0 are clamped: there is no point skipping more
    /// than the cluster size.
    pub fn new(num_nodes: usize, node_threshold: f64, rack_threshold: f64) -> Self {
        Self {
            num_nodes,
            node_threshold: node_threshold.min(1.0),
            rack_threshold: rack_threshold.min(1.0),
        }
    }
}

impl RelaxationStrategy for MissedOpportunities {
    fn is_disabled(&self) -> bool {
        self.node_threshold < 0.0 || self.rack_threshold < 0.0
    }

    fn should_advance(&self, tracker: &LocalityTracker, priority: Priority, level: NodeType) -> bool {
        let threshold = match level {
            NodeType::NodeLocal => self.node_threshold,
            _ => self.rack_threshold,
        };
        tracker.missed_opportunities(priority) as f64 > self.num_nodes as f64 * threshold
    }

    fn on_advance(&self, tracker: &mut LocalityTracker, priority: Priority) {
        tracker.reset_missed_opportunities(priority);
    }
}

/// Relax after more than the configured delay since the last container.
#[derive(Debug, Clone, Copy)]
pub struct ElapsedDelay {
    pub node_delay_ms: i64,
    pub rack_delay_ms: i64,
    pub now_ms: u64,
}

impl RelaxationStrategy for ElapsedDelay {
    fn is_disabled(&self) -> bool {
        self.node_delay_ms < 0 || self.rack_delay_ms < 0
    }

    fn should_advance(&self, tracker: &LocalityTracker, priority: Priority, level: NodeType) -> bool {
        let delay = match level {
            NodeType::NodeLocal => self.node_delay_ms,
            _ => self.rack_delay_ms,
        };
        let waited = self.now_ms.saturating_sub(tracker.last_scheduled_ms(priority));
        // Delay is non-negative here; disabled strategies never reach this.
        waited > delay.max(0) as u64
    }

    fn on_advance(&self, tracker: &mut LocalityTracker, priority: Priority) {
        tracker.reset_scheduling_opportunities(priority, self.now_ms);
    }
}

/// Per-priority locality state of one attempt.
#[derive(Debug, Clone)]
pub struct LocalityTracker {
    allowed: HashMap<Priority, NodeType>,
    missed: HashMap<Priority, u64>,
    last_scheduled_ms: HashMap<Priority, u64>,
    /// Stand-in for "last scheduled" before any container at a priority.
    start_time_ms: u64,
}

impl LocalityTracker {
    pub fn new(start_time_ms: u64) -> Self {
        Self {
            allowed: HashMap::new(),
            missed: HashMap::new(),
            last_scheduled_ms: HashMap::new(),
            start_time_ms,
        }
    }

    /// The level `priority` may currently be scheduled at.
    pub fn allowed_level<S: RelaxationStrategy>(&mut self, priority: Priority, strategy: &S) -> NodeType {
        if strategy.is_disabled() {
            return NodeType::OffSwitch;
        }

        // A first lookup only records the strictest level.
        let Some(&current) = self.allowed.get(&priority) else {
            self.allowed.insert(priority, NodeType::NodeLocal);
            return NodeType::NodeLocal;
        };
        let Some(next) = current.relaxed() else {
            return current;
        };

        if strategy.should_advance(self, priority, current) {
            self.allowed.insert(priority, next);
            strategy.on_advance(self, priority);
            debug!(%priority, from = %current, to = %next, "relaxed locality level");
            return next;
        }
        current
    }

    /// Opportunity-count variant of [`allowed_level`](Self::allowed_level).
    pub fn allowed_level_by_opportunities(
        &mut self,
        priority: Priority,
        num_nodes: usize,
        node_threshold: f64,
        rack_threshold: f64,
    ) -> NodeType {
        let strategy = MissedOpportunities::new(num_nodes, node_threshold, rack_threshold);
        self.allowed_level(priority, &strategy)
    }

    /// Time-based variant of [`allowed_level`](Self::allowed_level).
    pub fn allowed_level_by_time(
        &mut self,
        priority: Priority,
        node_delay_ms: i64,
        rack_delay_ms: i64,
        now_ms: u64,
    ) -> NodeType {
        let strategy = ElapsedDelay {
            node_delay_ms,
            rack_delay_ms,
            now_ms,
        };
        self.allowed_level(priority, &strategy)
    }

    /// Tighten the allowed level after a container landed at `level`.
    ///
    /// Returns `false` (and changes nothing) if `level` would relax it.
    pub fn reset_allowed_level(&mut self, priority: Priority, level: NodeType) -> bool {
        let current = self.allowed.get(&priority).copied().unwrap_or(NodeType::NodeLocal);
        if level > current {
            warn!(%priority, current = %current, requested = %level, "refusing to relax locality level on reset");
            return false;
        }
        if level < current {
            info!(%priority, from = %current, to = %level, "raising locality level");
        }
        self.allowed.insert(priority, level);
        true
    }

    /// Recorded level, `None` if the priority was never evaluated.
    pub fn current_level(&self, priority: Priority) -> Option<NodeType> {
        self.allowed.get(&priority).copied()
    }

    pub fn add_missed_opportunity(&mut self, priority: Priority) {
        *self.missed.entry(priority).or_insert(0) += 1;
    }

    pub fn missed_opportunities(&self, priority: Priority) -> u64 {
        self.missed.get(&priority).copied().unwrap_or(0)
    }

    pub fn reset_missed_opportunities(&mut self, priority: Priority) {
        self.missed.insert(priority, 0);
    }

    /// Zero the missed count and record `now_ms` as the last scheduling time.
    pub fn reset_scheduling_opportunities(&mut self, priority: Priority, now_ms: u64) {
        self.missed.insert(priority, 0);
        self.last_scheduled_ms.insert(priority, now_ms);
    }

    pub fn last_scheduled_ms(&self, priority: Priority) -> u64 {
        self.last_scheduled_ms
            .get(&priority)
            .copied()
            .unwrap_or(self.start_time_ms)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const P: Priority = Priority(1);

    /// A tracker that has already recorded `P` at NODE_LOCAL.
    fn seen(num_nodes: usize) -> LocalityTracker {
        let mut tracker = LocalityTracker::new(0);
        assert_eq!(tracker.allowed_level_by_opportunities(P, num_nodes, 0.5, 0.5), NodeType::NodeLocal);
        tracker
    }

    fn miss(tracker: &mut LocalityTracker, times: usize) {
        for _ in 0..times {
            tracker.add_missed_opportunity(P);
        }
    }

    #[test]
    fn negative_threshold_disables_delay_and_records_nothing() {
        let mut tracker = LocalityTracker::new(0);
        assert_eq!(tracker.allowed_level_by_opportunities(P, 10, -1.0, 0.5), NodeType::OffSwitch);
        assert_eq!(tracker.allowed_level_by_opportunities(P, 10, 0.5, -0.1), NodeType::OffSwitch);
        assert_eq!(tracker.current_level(P), None);
    }

    #[test]
    fn unseen_priority_starts_node_local() {
        let mut tracker = LocalityTracker::new(0);
        assert_eq!(tracker.allowed_level_by_opportunities(P, 10, 0.5, 0.5), NodeType::NodeLocal);
        assert_eq!(tracker.current_level(P), Some(NodeType::NodeLocal));
    }

    #[test]
    fn first_lookup_never_relaxes_on_missed_opportunities() {
        let mut tracker = LocalityTracker::new(0);
        // 1 > 1 × 0.5 would relax, but the first lookup only records the level.
        miss(&mut tracker, 1);
        assert_eq!(tracker.allowed_level_by_opportunities(P, 1, 0.5, 0.5), NodeType::NodeLocal);
        assert_eq!(tracker.missed_opportunities(P), 1);

        assert_eq!(tracker.allowed_level_by_opportunities(P, 1, 0.5, 0.5), NodeType::RackLocal);
    }

    #[test]
    fn first_lookup_never_relaxes_on_elapsed_time() {
        let mut tracker = LocalityTracker::new(0);
        // Long past both delays since the attempt started.
        assert_eq!(tracker.allowed_level_by_time(P, 1_000, 1_000, 5_000), NodeType::NodeLocal);
        assert_eq!(tracker.current_level(P), Some(NodeType::NodeLocal));

        assert_eq!(tracker.allowed_level_by_time(P, 1_000, 1_000, 5_000), NodeType::RackLocal);
    }

    #[test]
    fn relaxation_uses_strict_greater_than() {
        let mut tracker = LocalityTracker::new(0);

        miss(&mut tracker, 5);
        // 5 > 10 × 0.5 is false.
        assert_eq!(tracker.allowed_level_by_opportunities(P, 10, 0.5, 0.5), NodeType::NodeLocal);
        assert_eq!(tracker.missed_opportunities(P), 5);

        miss(&mut tracker, 1);
        assert_eq!(tracker.allowed_level_by_opportunities(P, 10, 0.5, 0.5), NodeType::RackLocal);
        assert_eq!(tracker.missed_opportunities(P), 0);
    }

    #[test]
    fn rack_threshold_governs_second_step() {
        let mut tracker = seen(10);
        miss(&mut tracker, 6);
        assert_eq!(tracker.allowed_level_by_opportunities(P, 10, 0.5, 0.8), NodeType::RackLocal);

        miss(&mut tracker, 8);
        assert_eq!(tracker.allowed_level_by_opportunities(P, 10, 0.5, 0.8), NodeType::RackLocal);
        miss(&mut tracker, 1);
        assert_eq!(tracker.allowed_level_by_opportunities(P, 10, 0.5, 0.8), NodeType::OffSwitch);

        // Terminal until reset.
        miss(&mut tracker, 100);
        assert_eq!(tracker.allowed_level_by_opportunities(P, 10, 0.5, 0.8), NodeType::OffSwitch);
    }

    #[test]
    fn thresholds_above_one_are_clamped() {
        let mut tracker = seen(10);
        miss(&mut tracker, 11);
        assert_eq!(tracker.allowed_level_by_opportunities(P, 10, 5.0, 5.0), NodeType::RackLocal);
    }

    #[test]
    fn time_based_relaxes_after_delay_from_start() {
        let mut tracker = LocalityTracker::new(1_000);

        assert_eq!(tracker.allowed_level_by_time(P, 2_000, 4_000, 2_500), NodeType::NodeLocal);
        // Exactly at the delay is not enough.
        assert_eq!(tracker.allowed_level_by_time(P, 2_000, 4_000, 3_000), NodeType::NodeLocal);
        assert_eq!(tracker.allowed_level_by_time(P, 2_000, 4_000, 3_001), NodeType::RackLocal);
        assert_eq!(tracker.last_scheduled_ms(P), 3_001);

        assert_eq!(tracker.allowed_level_by_time(P, 2_000, 4_000, 7_001), NodeType::RackLocal);
        assert_eq!(tracker.allowed_level_by_time(P, 2_000, 4_000, 7_002), NodeType::OffSwitch);
    }

    #[test]
    fn time_based_negative_delay_disables() {
        let mut tracker = LocalityTracker::new(0);
        assert_eq!(tracker.allowed_level_by_time(P, -1, 4_000, 10), NodeType::OffSwitch);
        assert_eq!(tracker.current_level(P), None);
    }

    #[test]
    fn reset_only_tightens() {
        let mut tracker = seen(10);
        miss(&mut tracker, 11);
        assert_eq!(tracker.allowed_level_by_opportunities(P, 10, 0.5, 0.5), NodeType::RackLocal);

        assert!(!tracker.reset_allowed_level(P, NodeType::OffSwitch));
        assert_eq!(tracker.current_level(P), Some(NodeType::RackLocal));

        assert!(tracker.reset_allowed_level(P, NodeType::NodeLocal));
        assert_eq!(tracker.current_level(P), Some(NodeType::NodeLocal));
    }

    #[test]
    fn priorities_are_independent() {
        let mut tracker = seen(10);
        miss(&mut tracker, 6);
        assert_eq!(tracker.allowed_level_by_opportunities(P, 10, 0.5, 0.5), NodeType::RackLocal);
        assert_eq!(
            tracker.allowed_level_by_opportunities(Priority(2), 10, 0.5, 0.5),
            NodeType::NodeLocal
        );
    }

    proptest! {
        #[test]
        fn allowed_level_never_regresses_without_reset(
            num_nodes in 1usize..50,
            node_threshold in 0.0f64..1.5,
            rack_threshold in 0.0f64..1.5,
            misses in proptest::collection::vec(0usize..5, 1..60),
        ) {
            let mut tracker = LocalityTracker::new(0);
            let mut previous = NodeType::NodeLocal;
            for batch in misses {
                miss(&mut tracker, batch);
                let level = tracker.allowed_level_by_opportunities(P, num_nodes, node_threshold, rack_threshold);
                prop_assert!(level >= previous);
                previous = level;
            }
        }

        #[test]
        fn time_based_level_never_regresses(
            steps in proptest::collection::vec(0u64..3_000, 1..40),
        ) {
            let mut tracker = LocalityTracker::new(0);
            let mut now = 0u64;
            let mut previous = NodeType::NodeLocal;
            for step in steps {
                now += step;
                let level = tracker.allowed_level_by_time(P, 1_000, 2_000, now);
                prop_assert!(level >= previous);
                previous = level;
            }
        }
    }
}
