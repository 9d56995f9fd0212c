//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use fairgrid_attempt::{AppAttempt, AttemptSpec, Container};
use fairgrid_core::{AttemptId, ContainerId, Priority, Resource, ResourceRequest, SchedulerConfig};
use fairgrid_sim::{InMemoryRequestTracker, QueueSettings, SimContext, SimLeafQueue, SimNode, SimParentQueue};

pub const P1: Priority = Priority(1);
pub const P2: Priority = Priority(2);

pub fn mb(memory_mb: i64) -> Resource {
    Resource::new(memory_mb, 1)
}

pub struct Harness {
    pub root: Arc<SimParentQueue>,
    pub queue: Arc<SimLeafQueue>,
    pub context: Arc<SimContext>,
    pub requests: Arc<InMemoryRequestTracker>,
    pub nodes: Vec<Arc<SimNode>>,
    pub attempt: AppAttempt,
}

impl Harness {
    pub fn node(&self, name: &str) -> &SimNode {
        self.nodes
            .iter()
            .find(|n| fairgrid_attempt::SchedulerNode::node_name(n.as_ref()) == name)
            .map(|n| n.as_ref())
            .unwrap_or_else(|| panic!("no node {name}"))
    }

    pub fn ask(&self, requests: impl IntoIterator<Item = ResourceRequest>) {
        self.requests.update(requests);
    }
}

pub struct HarnessBuilder {
    config: SchedulerConfig,
    queue: QueueSettings,
    parent: Option<(String, bool, Resource)>,
    nodes: Vec<(String, String, Resource)>,
    am_resource: Resource,
    unmanaged_am: bool,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            config: SchedulerConfig::default(),
            queue: QueueSettings {
                max_am_share: -1.0,
                ..QueueSettings::default()
            },
            parent: None,
            nodes: Vec::new(),
            am_resource: mb(1024),
            unmanaged_am: false,
        }
    }
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn queue(mut self, queue: QueueSettings) -> Self {
        self.queue = queue;
        self
    }

    /// Put the leaf under an intermediate queue instead of directly under root.
    pub fn parent(mut self, name: &str, preemptable: bool, max_share: Resource) -> Self {
        self.parent = Some((name.to_string(), preemptable, max_share));
        self
    }

    /// Nodes get eight vcores so vcores never bind before memory does.
    pub fn node(mut self, name: &str, rack: &str, memory_mb: i64) -> Self {
        self.nodes.push((name.to_string(), rack.to_string(), Resource::new(memory_mb, 8)));
        self
    }

    pub fn node_with_capacity(mut self, name: &str, rack: &str, capacity: Resource) -> Self {
        self.nodes.push((name.to_string(), rack.to_string(), capacity));
        self
    }

    pub fn am_resource(mut self, am_resource: Resource) -> Self {
        self.am_resource = am_resource;
        self
    }

    pub fn unmanaged_am(mut self) -> Self {
        self.unmanaged_am = true;
        self
    }

    pub fn build(self) -> Harness {
        let root = SimParentQueue::root();
        let parent = match self.parent {
            Some((name, preemptable, max_share)) => SimParentQueue::new(name, root.clone(), max_share, preemptable),
            None => root.clone(),
        };
        let queue = SimLeafQueue::new(self.queue, parent);
        let context = Arc::new(SimContext::new(self.config, root.clone()));

        let nodes: Vec<Arc<SimNode>> = self
            .nodes
            .into_iter()
            .map(|(name, rack, capacity)| Arc::new(SimNode::new(name, rack, capacity)))
            .collect();
        for node in &nodes {
            context.add_node(node.as_ref());
        }

        let requests = Arc::new(InMemoryRequestTracker::new());
        let attempt = AppAttempt::new(
            AttemptSpec {
                id: AttemptId::new(1_700_000_000_000, 1, 1),
                user: "alice".to_string(),
                am_resource: self.am_resource,
                unmanaged_am: self.unmanaged_am,
            },
            queue.clone(),
            requests.clone(),
            context.clone(),
        );

        Harness {
            root,
            queue,
            context,
            requests,
            nodes,
            attempt,
        }
    }
}

/// A container owned by some other attempt.
pub fn foreign_container(node: &str, capability: Resource) -> Container {
    Container {
        id: ContainerId {
            attempt: AttemptId::new(1_700_000_000_000, 99, 1),
            sequence: 1,
        },
        node: node.to_string(),
        capability,
        priority: P1,
    }
}

pub fn locality_config(node_threshold: f64, rack_threshold: f64) -> SchedulerConfig {
    SchedulerConfig {
        node_locality_threshold: node_threshold,
        rack_locality_threshold: rack_threshold,
        ..SchedulerConfig::default()
    }
}
