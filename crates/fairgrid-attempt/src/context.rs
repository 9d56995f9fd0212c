//! Collaborator contracts.
//!
//! The engine never owns cluster-wide state. Queues, nodes, the outstanding
//! request table, and the scheduler clock are reached through these traits.
//! Implementations synchronize themselves; the engine may call them while
//! holding an attempt's main lock, so they must not call back into that
//! attempt's locking API.

use std::collections::BTreeSet;
use std::sync::Arc;

use fairgrid_core::{AttemptId, NodeType, Priority, Resource, ResourceRequest, SchedulerConfig};

use crate::container::{Container, ReservedContainer};

/// Name of the queue that terminates every upward walk.
pub const ROOT_QUEUE: &str = "root";

/// The application's outstanding asks, kept by the request tracker.
pub trait RequestTracker: Send + Sync {
    /// Every location key asked for at `priority`.
    fn requests_at(&self, priority: Priority) -> Vec<ResourceRequest>;

    /// The ask for one location key (host, rack, or `*`).
    fn request_for(&self, priority: Priority, resource_name: &str) -> Option<ResourceRequest>;

    /// Containers still wanted at `priority` (the `*` request's count).
    fn total_required_at(&self, priority: Priority) -> u32;

    fn priorities_with_requests(&self) -> BTreeSet<Priority>;

    /// Consume the asks satisfied by `container`.
    ///
    /// Returns the consumed requests, or `None` if the asks changed under the
    /// offer and nothing was consumed.
    fn record_allocation(
        &self,
        locality: NodeType,
        node: &dyn SchedulerNode,
        priority: Priority,
        request: &ResourceRequest,
        container: &Container,
    ) -> Option<Vec<ResourceRequest>>;
}

/// Any queue in the hierarchy.
pub trait FairQueue: Send + Sync {
    fn name(&self) -> &str;

    /// `None` only for the root.
    fn parent(&self) -> Option<Arc<dyn FairQueue>>;

    fn is_preemptable(&self) -> bool;

    fn resource_usage(&self) -> Resource;

    fn max_share(&self) -> Resource;
}

/// The queue an attempt was submitted to.
pub trait LeafQueue: FairQueue {
    fn fair_share(&self) -> Resource;

    fn policy(&self) -> &dyn SchedulingPolicy;

    /// Whether the queue's AM share leaves room for another application master.
    fn can_run_application_master(&self, am_resource: Resource) -> bool;

    fn add_application_master_usage(&self, am_resource: Resource);

    /// Fraction of fair share below which an attempt counts as starved.
    fn fair_share_preemption_threshold(&self) -> f64;

    /// How long an attempt must stay starved before starvation is reported.
    fn fair_share_preemption_timeout_ms(&self) -> u64;

    fn metrics(&self) -> &dyn QueueMetrics;
}

/// Queue-level resource accounting the engine reports into.
pub trait QueueMetrics: Send + Sync {
    fn allocate_resources(&self, user: &str, containers: u32, resource: Resource);

    fn release_resources(&self, user: &str, containers: u32, resource: Resource);

    fn reserve_resource(&self, user: &str, resource: Resource);

    fn unreserve_resource(&self, user: &str, resource: Resource);
}

/// Policy-specific headroom formula of a queue.
pub trait SchedulingPolicy: Send + Sync {
    fn name(&self) -> &str;

    fn headroom(&self, queue_fair_share: Resource, queue_usage: Resource, max_available: Resource) -> Resource;
}

/// Scheduler-wide state and configuration.
pub trait SchedulerContext: Send + Sync {
    fn config(&self) -> &SchedulerConfig;

    fn cluster_resource(&self) -> Resource;

    /// Resource allocated across the whole cluster (root queue usage).
    fn cluster_allocated_resource(&self) -> Resource;

    fn num_cluster_nodes(&self) -> usize;

    /// Logical clock in milliseconds.
    fn now_ms(&self) -> u64;

    fn is_continuous_scheduling_enabled(&self) -> bool {
        self.config().continuous_scheduling_enabled
    }

    fn node_locality_delay_ms(&self) -> i64 {
        self.config().node_locality_delay_ms
    }

    fn rack_locality_delay_ms(&self) -> i64 {
        self.config().rack_locality_delay_ms
    }

    fn node_locality_threshold(&self) -> f64 {
        self.config().node_locality_threshold
    }

    fn rack_locality_threshold(&self) -> f64 {
        self.config().rack_locality_threshold
    }
}

/// A worker node being offered to the attempt.
pub trait SchedulerNode: Send + Sync {
    /// Host name, also the node-local request key.
    fn node_name(&self) -> &str;

    fn rack_name(&self) -> &str;

    fn available_resource(&self) -> Resource;

    fn total_capability(&self) -> Resource;

    fn reserved_container(&self) -> Option<ReservedContainer>;

    fn reserve_resource(&self, attempt: &AttemptId, priority: Priority, container: &Container);

    fn unreserve_resource(&self, attempt: &AttemptId);

    fn allocate_container(&self, container: &Container);
}

/// Whether `additional` fits under the max share of `queue` and every ancestor.
pub fn fits_in_max_share(queue: &dyn LeafQueue, additional: Resource) -> bool {
    if !(queue.resource_usage() + additional).fits_in(&queue.max_share()) {
        return false;
    }
    let mut next = queue.parent();
    while let Some(q) = next {
        if !(q.resource_usage() + additional).fits_in(&q.max_share()) {
            return false;
        }
        next = q.parent();
    }
    true
}

/// Whether `queue` and all its ancestors below the root allow preemption.
pub fn queue_chain_preemptable(queue: &dyn LeafQueue) -> bool {
    if queue.name() == ROOT_QUEUE {
        return true;
    }
    if !queue.is_preemptable() {
        return false;
    }
    let mut next = queue.parent();
    while let Some(q) = next {
        if q.name() == ROOT_QUEUE {
            break;
        }
        if !q.is_preemptable() {
            return false;
        }
        next = q.parent();
    }
    true
}
