//! Scheduler context with a manual clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use fairgrid_attempt::{FairQueue, SchedulerContext, SchedulerNode};
use fairgrid_core::{Resource, SchedulerConfig};
use parking_lot::Mutex;

use crate::queue::SimParentQueue;

/// Cluster totals and the logical clock the engine reads.
///
/// Allocated resource is the root queue's usage. The clock only moves when
/// told to.
pub struct SimContext {
    config: SchedulerConfig,
    root: Arc<SimParentQueue>,
    cluster_resource: Mutex<Resource>,
    num_nodes: AtomicUsize,
    now_ms: AtomicU64,
}

impl SimContext {
    pub fn new(config: SchedulerConfig, root: Arc<SimParentQueue>) -> Self {
        Self {
            config,
            root,
            cluster_resource: Mutex::new(Resource::NONE),
            num_nodes: AtomicUsize::new(0),
            now_ms: AtomicU64::new(0),
        }
    }

    /// Count a node into cluster size and capacity.
    pub fn add_node(&self, node: &dyn SchedulerNode) {
        *self.cluster_resource.lock() += node.total_capability();
        self.num_nodes.fetch_add(1, Ordering::SeqCst);
    }

    pub fn root(&self) -> &Arc<SimParentQueue> {
        &self.root
    }

    pub fn advance(&self, ms: u64) -> u64 {
        self.now_ms.fetch_add(ms, Ordering::SeqCst) + ms
    }

    pub fn set_now(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }
}

impl SchedulerContext for SimContext {
    fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn cluster_resource(&self) -> Resource {
        *self.cluster_resource.lock()
    }

    fn cluster_allocated_resource(&self) -> Resource {
        self.root.resource_usage()
    }

    fn num_cluster_nodes(&self) -> usize {
        self.num_nodes.load(Ordering::SeqCst)
    }

    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
