//! In-memory request table.
//!
//! Keeps one [`ResourceRequest`] per (priority, location key). Allocations
//! consume asks the way a resource manager does: a node-local container
//! counts against the node, its rack, and `*`; a rack-local one against the
//! rack and `*`; an off-switch one against `*` only. Node and rack asks
//! that reach zero are dropped; the `*` ask stays at zero.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use fairgrid_attempt::{Container, RequestTracker, SchedulerNode};
use fairgrid_core::{ANY, NodeType, Priority, ResourceRequest};
use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
pub struct InMemoryRequestTracker {
    table: Mutex<BTreeMap<Priority, HashMap<String, ResourceRequest>>>,
}

impl InMemoryRequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the asks for each (priority, location key) given.
    pub fn update(&self, requests: impl IntoIterator<Item = ResourceRequest>) {
        let mut table = self.table.lock();
        for request in requests {
            table
                .entry(request.priority)
                .or_default()
                .insert(request.resource_name.clone(), request);
        }
    }

    /// Change the count of one ask, as an application updating its asks would.
    pub fn set_num_containers(&self, priority: Priority, resource_name: &str, num_containers: u32) -> bool {
        let mut table = self.table.lock();
        match table
            .get_mut(&priority)
            .and_then(|row| row.get_mut(resource_name))
        {
            Some(request) => {
                request.num_containers = num_containers;
                true
            }
            None => false,
        }
    }

    /// Drop every ask at `priority`.
    pub fn clear_priority(&self, priority: Priority) {
        self.table.lock().remove(&priority);
    }
}

fn nonzero(row: &HashMap<String, ResourceRequest>, key: &str) -> bool {
    row.get(key).is_some_and(|r| r.num_containers > 0)
}

/// Take one container from `key`, recording the consumed ask.
fn decrement(row: &mut HashMap<String, ResourceRequest>, key: &str, consumed: &mut Vec<ResourceRequest>) {
    let Some(request) = row.get_mut(key) else {
        return;
    };
    if request.num_containers == 0 {
        return;
    }
    request.num_containers -= 1;

    let mut taken = request.clone();
    taken.num_containers = 1;
    consumed.push(taken);

    if request.num_containers == 0 && key != ANY {
        row.remove(key);
    }
}

impl RequestTracker for InMemoryRequestTracker {
    fn requests_at(&self, priority: Priority) -> Vec<ResourceRequest> {
        let table = self.table.lock();
        let mut requests: Vec<ResourceRequest> = table
            .get(&priority)
            .map(|row| row.values().cloned().collect())
            .unwrap_or_default();
        requests.sort_by(|a, b| a.resource_name.cmp(&b.resource_name));
        requests
    }

    fn request_for(&self, priority: Priority, resource_name: &str) -> Option<ResourceRequest> {
        self.table.lock().get(&priority)?.get(resource_name).cloned()
    }

    fn total_required_at(&self, priority: Priority) -> u32 {
        self.request_for(priority, ANY).map_or(0, |r| r.num_containers)
    }

    fn priorities_with_requests(&self) -> BTreeSet<Priority> {
        self.table.lock().keys().copied().collect()
    }

    fn record_allocation(
        &self,
        locality: NodeType,
        node: &dyn SchedulerNode,
        priority: Priority,
        request: &ResourceRequest,
        container: &Container,
    ) -> Option<Vec<ResourceRequest>> {
        let mut table = self.table.lock();
        let row = table.get_mut(&priority)?;

        // Validate everything before consuming anything.
        if !nonzero(row, ANY) || !nonzero(row, &request.resource_name) {
            return None;
        }

        let mut consumed = Vec::with_capacity(3);
        match locality {
            NodeType::NodeLocal => {
                decrement(row, node.node_name(), &mut consumed);
                decrement(row, node.rack_name(), &mut consumed);
                decrement(row, ANY, &mut consumed);
            }
            NodeType::RackLocal => {
                decrement(row, node.rack_name(), &mut consumed);
                decrement(row, ANY, &mut consumed);
            }
            NodeType::OffSwitch => {
                decrement(row, ANY, &mut consumed);
            }
        }

        debug!(
            container = %container.id,
            %priority,
            %locality,
            consumed = consumed.len(),
            "recorded allocation"
        );
        Some(consumed)
    }
}
