//! Demand, usage, fair share, headroom, and starvation.

use fairgrid_core::{ANY, Resource, ResourceWeights};
use tracing::debug;

use crate::attempt::AppAttempt;

impl AppAttempt {
    /// Recompute demand from scratch: consumption plus every outstanding
    /// off-switch ask.
    pub fn update_demand(&self) {
        let mut state = self.state.lock();
        let outstanding: Resource = self
            .requests
            .priorities_with_requests()
            .into_iter()
            .filter_map(|priority| self.requests.request_for(priority, ANY))
            .filter(|request| request.num_containers > 0)
            .map(|request| request.total())
            .sum();
        state.demand = state.consumption + outstanding;
    }

    pub fn demand(&self) -> Resource {
        self.state.lock().demand
    }

    pub fn current_consumption(&self) -> Resource {
        self.state.lock().consumption
    }

    /// Consumption net of containers already marked for preemption.
    pub fn resource_usage(&self) -> Resource {
        let consumption = self.state.lock().consumption;
        let preempted = self.preemption.total();
        if preempted.is_none() {
            consumption
        } else {
            consumption - preempted
        }
    }

    pub fn fair_share(&self) -> Resource {
        self.state.lock().fair_share
    }

    /// Set by the cluster-wide fair share computation.
    pub fn set_fair_share(&self, fair_share: Resource) {
        self.state.lock().fair_share = fair_share;
    }

    pub fn min_share(&self) -> Resource {
        Resource::NONE
    }

    pub fn max_share(&self) -> Resource {
        Resource::UNBOUNDED
    }

    pub fn weights(&self) -> ResourceWeights {
        self.state.lock().weights
    }

    pub fn set_weights(&self, weights: ResourceWeights) {
        self.state.lock().weights = weights;
    }

    pub fn is_preemptable(&self) -> bool {
        self.queue.is_preemptable()
    }

    /// How much more the attempt could be granted right now.
    ///
    /// Bounded by both free cluster capacity and the queue's remaining max
    /// share; the queue's policy turns that into the final figure.
    pub fn headroom(&self) -> Resource {
        let queue = self.queue.as_ref();
        let queue_fair_share = queue.fair_share();
        let queue_usage = queue.resource_usage();

        let cluster_available = self.context.cluster_resource() - self.context.cluster_allocated_resource();
        let queue_max_available = queue.max_share() - queue_usage;
        let max_available = cluster_available.component_min(&queue_max_available);

        let headroom = queue
            .policy()
            .headroom(queue_fair_share, queue_usage, max_available);
        debug!(
            attempt = %self.id,
            policy = queue.policy().name(),
            %queue_fair_share,
            %queue_usage,
            %max_available,
            %headroom,
            "headroom calculation"
        );
        headroom
    }

    // ── Starvation ────────────────────────────────────────────────

    /// Recompute fair-share starvation against the queue's threshold and
    /// timeout.
    pub fn fair_share_starvation(&self) -> Resource {
        let usage = self.resource_usage();
        let now_ms = self.context.now_ms();
        let threshold = self.queue.fair_share_preemption_threshold();
        let timeout_ms = self.queue.fair_share_preemption_timeout_ms();

        let mut state = self.state.lock();
        let fair_share = state.fair_share;
        state
            .starvation
            .update(fair_share, threshold, usage, now_ms, timeout_ms)
    }

    /// Fair-share plus attributed min-share starvation.
    pub fn starvation(&self) -> Resource {
        self.state.lock().starvation.total()
    }

    /// Called by the leaf queue when it distributes min-share starvation.
    pub fn set_minshare_starvation(&self, starvation: Resource) {
        self.state.lock().starvation.set_minshare(starvation);
    }

    pub fn reset_minshare_starvation(&self) {
        self.state.lock().starvation.reset_minshare();
    }

    pub fn is_starved_for_fair_share(&self) -> bool {
        self.state.lock().starvation.is_starved_for_fair_share()
    }
}
