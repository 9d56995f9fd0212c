//! Simulated worker node.

use std::collections::HashMap;

use fairgrid_attempt::{Container, ReservedContainer, SchedulerNode};
use fairgrid_core::{AttemptId, ContainerId, Priority, Resource};
use parking_lot::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct NodeState {
    allocated: Resource,
    containers: HashMap<ContainerId, Container>,
    reserved: Option<ReservedContainer>,
}

/// A node with fixed capacity and a single reservation slot.
///
/// A reservation does not reduce the free capacity; it only marks the node
/// as held for one attempt.
#[derive(Debug)]
pub struct SimNode {
    name: String,
    rack: String,
    total: Resource,
    state: Mutex<NodeState>,
}

impl SimNode {
    pub fn new(name: impl Into<String>, rack: impl Into<String>, total: Resource) -> Self {
        Self {
            name: name.into(),
            rack: rack.into(),
            total,
            state: Mutex::new(NodeState::default()),
        }
    }

    pub fn allocated_resource(&self) -> Resource {
        self.state.lock().allocated
    }

    pub fn num_containers(&self) -> usize {
        self.state.lock().containers.len()
    }

    /// Free a container's capacity, as when it finishes on the node.
    pub fn release_container(&self, id: &ContainerId) -> Option<Container> {
        let mut state = self.state.lock();
        let container = state.containers.remove(id)?;
        state.allocated -= container.capability;
        Some(container)
    }

    pub fn is_reserved_for(&self, attempt: &AttemptId) -> bool {
        self.state
            .lock()
            .reserved
            .as_ref()
            .is_some_and(|r| &r.attempt == attempt)
    }
}

impl SchedulerNode for SimNode {
    fn node_name(&self) -> &str {
        &self.name
    }

    fn rack_name(&self) -> &str {
        &self.rack
    }

    fn available_resource(&self) -> Resource {
        self.total - self.state.lock().allocated
    }

    fn total_capability(&self) -> Resource {
        self.total
    }

    fn reserved_container(&self) -> Option<ReservedContainer> {
        self.state.lock().reserved.clone()
    }

    fn reserve_resource(&self, attempt: &AttemptId, priority: Priority, container: &Container) {
        let mut state = self.state.lock();
        if let Some(existing) = &state.reserved {
            if &existing.attempt != attempt {
                warn!(
                    node = %self.name,
                    holder = %existing.attempt,
                    %attempt,
                    "replacing another attempt's reservation"
                );
            }
        }
        state.reserved = Some(ReservedContainer {
            attempt: attempt.clone(),
            priority,
            container: container.clone(),
        });
        debug!(node = %self.name, %attempt, %priority, "node reserved");
    }

    fn unreserve_resource(&self, attempt: &AttemptId) {
        let mut state = self.state.lock();
        match &state.reserved {
            Some(existing) if &existing.attempt == attempt => {
                state.reserved = None;
                debug!(node = %self.name, %attempt, "node unreserved");
            }
            _ => warn!(node = %self.name, %attempt, "unreserve for an attempt that holds no reservation"),
        }
    }

    fn allocate_container(&self, container: &Container) {
        let mut state = self.state.lock();
        state.allocated += container.capability;
        state.containers.insert(container.id.clone(), container.clone());
        debug!(
            node = %self.name,
            container = %container.id,
            available = %(self.total - state.allocated),
            "container launched on node"
        );
    }
}
