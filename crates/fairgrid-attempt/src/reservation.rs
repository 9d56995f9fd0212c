//! Reservations held by one attempt.
//!
//! A reservation pins a node's future capacity for a container that did
//! not fit when the node was offered. The ledger keeps at most one entry
//! per (priority, node) and the running total of reserved resource.

use std::collections::{BTreeMap, HashMap};

use fairgrid_core::{NodeId, Priority, Resource};

use crate::container::Container;

#[derive(Debug, Clone, Default)]
pub struct ReservationLedger {
    by_priority: BTreeMap<Priority, HashMap<NodeId, Container>>,
    total: Resource,
    /// Times an existing reservation was refreshed instead of created.
    re_reservations: HashMap<Priority, u32>,
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reservation, replacing any existing one for the same key.
    ///
    /// Returns `true` if this created a new reservation and `false` if it
    /// refreshed one already held.
    pub fn reserve(&mut self, priority: Priority, node: &str, container: Container) -> bool {
        let capability = container.capability;
        let previous = self
            .by_priority
            .entry(priority)
            .or_default()
            .insert(node.to_string(), container);

        match previous {
            Some(old) => {
                self.total -= old.capability;
                self.total += capability;
                *self.re_reservations.entry(priority).or_insert(0) += 1;
                false
            }
            None => {
                self.total += capability;
                self.re_reservations.insert(priority, 0);
                true
            }
        }
    }

    /// Drop the reservation for (priority, node), returning what it held.
    pub fn unreserve(&mut self, priority: Priority, node: &str) -> Option<Container> {
        let nodes = self.by_priority.get_mut(&priority)?;
        let container = nodes.remove(node)?;
        if nodes.is_empty() {
            self.by_priority.remove(&priority);
        }
        self.re_reservations.insert(priority, 0);
        self.total -= container.capability;
        Some(container)
    }

    pub fn get(&self, priority: Priority, node: &str) -> Option<&Container> {
        self.by_priority.get(&priority)?.get(node)
    }

    pub fn is_reserved(&self, priority: Priority, node: &str) -> bool {
        self.get(priority, node).is_some()
    }

    /// Number of nodes reserved at `priority`.
    pub fn reserved_at(&self, priority: Priority) -> usize {
        self.by_priority.get(&priority).map_or(0, HashMap::len)
    }

    pub fn len(&self) -> usize {
        self.by_priority.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_priority.is_empty()
    }

    pub fn total(&self) -> Resource {
        self.total
    }

    pub fn re_reservations(&self, priority: Priority) -> u32 {
        self.re_reservations.get(&priority).copied().unwrap_or(0)
    }

    /// Every reserved container, ordered by priority.
    pub fn containers(&self) -> Vec<Container> {
        self.by_priority
            .values()
            .flat_map(|nodes| nodes.values().cloned())
            .collect()
    }
}
