//! Simulated queue hierarchy.
//!
//! Queue usage is whatever the engine has reported through
//! [`QueueMetrics`]; a leaf forwards every report to its ancestors, so the
//! root's usage is the cluster's allocated resource. Nothing here calls back
//! into an attempt.

use std::sync::Arc;

use fairgrid_attempt::{FairQueue, LeafQueue, QueueMetrics, ROOT_QUEUE, SchedulingPolicy};
use fairgrid_core::Resource;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::policy::PolicyKind;

/// Leaf queue settings as they appear in a scenario's `[queue]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub name: String,
    pub fair_share: Resource,
    pub max_share: Resource,
    pub preemptable: bool,
    /// Fraction of fair share application masters may use. Negative disables the check.
    pub max_am_share: f64,
    pub fair_share_preemption_threshold: f64,
    pub fair_share_preemption_timeout_ms: u64,
    pub policy: PolicyKind,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            name: "root.default".to_string(),
            fair_share: Resource::NONE,
            max_share: Resource::UNBOUNDED,
            preemptable: true,
            max_am_share: 0.5,
            fair_share_preemption_threshold: 0.5,
            fair_share_preemption_timeout_ms: 30_000,
            policy: PolicyKind::Fair,
        }
    }
}

/// Counters kept per queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounters {
    pub allocated: Resource,
    pub allocated_containers: u64,
    pub reserved: Resource,
    pub reserved_containers: u64,
}

impl QueueCounters {
    fn allocate(&mut self, containers: u32, resource: Resource) {
        self.allocated += resource.times(containers);
        self.allocated_containers += u64::from(containers);
    }

    fn release(&mut self, containers: u32, resource: Resource) {
        self.allocated -= resource.times(containers);
        self.allocated_containers = self.allocated_containers.saturating_sub(u64::from(containers));
    }

    fn reserve(&mut self, resource: Resource) {
        self.reserved += resource;
        self.reserved_containers += 1;
    }

    fn unreserve(&mut self, resource: Resource) {
        self.reserved -= resource;
        self.reserved_containers = self.reserved_containers.saturating_sub(1);
    }
}

/// An inner queue, or the root when it has no parent.
#[derive(Debug)]
pub struct SimParentQueue {
    name: String,
    parent: Option<Arc<SimParentQueue>>,
    max_share: Resource,
    preemptable: bool,
    counters: Mutex<QueueCounters>,
}

impl SimParentQueue {
    pub fn root() -> Arc<Self> {
        Arc::new(Self {
            name: ROOT_QUEUE.to_string(),
            parent: None,
            max_share: Resource::UNBOUNDED,
            preemptable: true,
            counters: Mutex::new(QueueCounters::default()),
        })
    }

    pub fn new(name: impl Into<String>, parent: Arc<SimParentQueue>, max_share: Resource, preemptable: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            parent: Some(parent),
            max_share,
            preemptable,
            counters: Mutex::new(QueueCounters::default()),
        })
    }

    pub fn counters(&self) -> QueueCounters {
        *self.counters.lock()
    }

    /// Apply `f` to this queue and every ancestor.
    fn propagate(&self, f: impl Fn(&mut QueueCounters)) {
        f(&mut *self.counters.lock());
        let mut next = self.parent.clone();
        while let Some(queue) = next {
            f(&mut *queue.counters.lock());
            next = queue.parent.clone();
        }
    }
}

impl FairQueue for SimParentQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<Arc<dyn FairQueue>> {
        self.parent.clone().map(|p| p as Arc<dyn FairQueue>)
    }

    fn is_preemptable(&self) -> bool {
        self.preemptable
    }

    fn resource_usage(&self) -> Resource {
        self.counters.lock().allocated
    }

    fn max_share(&self) -> Resource {
        self.max_share
    }
}

/// Metrics sink of a leaf queue.
#[derive(Debug)]
pub struct SimQueueMetrics {
    counters: Mutex<QueueCounters>,
    parent: Arc<SimParentQueue>,
}

impl SimQueueMetrics {
    pub fn counters(&self) -> QueueCounters {
        *self.counters.lock()
    }
}

impl QueueMetrics for SimQueueMetrics {
    fn allocate_resources(&self, user: &str, containers: u32, resource: Resource) {
        self.counters.lock().allocate(containers, resource);
        self.parent.propagate(|c| c.allocate(containers, resource));
        debug!(user, containers, %resource, "queue metrics: allocate");
    }

    fn release_resources(&self, user: &str, containers: u32, resource: Resource) {
        self.counters.lock().release(containers, resource);
        self.parent.propagate(|c| c.release(containers, resource));
        debug!(user, containers, %resource, "queue metrics: release");
    }

    fn reserve_resource(&self, user: &str, resource: Resource) {
        self.counters.lock().reserve(resource);
        self.parent.propagate(|c| c.reserve(resource));
        debug!(user, %resource, "queue metrics: reserve");
    }

    fn unreserve_resource(&self, user: &str, resource: Resource) {
        self.counters.lock().unreserve(resource);
        self.parent.propagate(|c| c.unreserve(resource));
        debug!(user, %resource, "queue metrics: unreserve");
    }
}

/// The queue attempts are submitted to.
pub struct SimLeafQueue {
    settings: QueueSettings,
    fair_share: Mutex<Resource>,
    am_usage: Mutex<Resource>,
    policy: Box<dyn SchedulingPolicy>,
    metrics: SimQueueMetrics,
}

impl SimLeafQueue {
    pub fn new(settings: QueueSettings, parent: Arc<SimParentQueue>) -> Arc<Self> {
        Arc::new(Self {
            fair_share: Mutex::new(settings.fair_share),
            am_usage: Mutex::new(Resource::NONE),
            policy: settings.policy.build(),
            metrics: SimQueueMetrics {
                counters: Mutex::new(QueueCounters::default()),
                parent,
            },
            settings,
        })
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    pub fn set_fair_share(&self, fair_share: Resource) {
        *self.fair_share.lock() = fair_share;
    }

    pub fn am_resource_usage(&self) -> Resource {
        *self.am_usage.lock()
    }

    pub fn counters(&self) -> QueueCounters {
        self.metrics.counters()
    }
}

impl FairQueue for SimLeafQueue {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn parent(&self) -> Option<Arc<dyn FairQueue>> {
        Some(self.metrics.parent.clone() as Arc<dyn FairQueue>)
    }

    fn is_preemptable(&self) -> bool {
        self.settings.preemptable
    }

    fn resource_usage(&self) -> Resource {
        self.metrics.counters().allocated
    }

    fn max_share(&self) -> Resource {
        self.settings.max_share
    }
}

impl LeafQueue for SimLeafQueue {
    fn fair_share(&self) -> Resource {
        *self.fair_share.lock()
    }

    fn policy(&self) -> &dyn SchedulingPolicy {
        self.policy.as_ref()
    }

    fn can_run_application_master(&self, am_resource: Resource) -> bool {
        if self.settings.max_am_share < 0.0 {
            return true;
        }
        let limit = self.fair_share().multiply(self.settings.max_am_share);
        let if_run = self.am_resource_usage() + am_resource;
        match self.settings.policy {
            PolicyKind::Fair => if_run.memory_mb <= limit.memory_mb,
            PolicyKind::Drf => if_run.fits_in(&limit),
        }
    }

    fn add_application_master_usage(&self, am_resource: Resource) {
        *self.am_usage.lock() += am_resource;
    }

    fn fair_share_preemption_threshold(&self) -> f64 {
        self.settings.fair_share_preemption_threshold
    }

    fn fair_share_preemption_timeout_ms(&self) -> u64 {
        self.settings.fair_share_preemption_timeout_ms
    }

    fn metrics(&self) -> &dyn QueueMetrics {
        &self.metrics
    }
}
