//! Preemption marks and starvation accounting.
//!
//! The preemption pass runs independently of allocation and marks
//! containers it intends to reclaim. The marked total is read on every
//! offer (through resource usage), so it sits behind its own lock rather
//! than the attempt's main lock.

use std::collections::HashMap;

use fairgrid_core::{ContainerId, Resource};
use parking_lot::Mutex;
use tracing::debug;

use crate::container::Container;

#[derive(Debug, Default)]
struct Marked {
    containers: HashMap<ContainerId, Container>,
    total: Resource,
}

/// Containers currently selected for preemption.
///
/// `track` and `untrack` are idempotent, so the total always equals the
/// sum of the marked containers no matter how completion and unmarking
/// race.
#[derive(Debug, Default)]
pub struct PreemptionLedger {
    marked: Mutex<Marked>,
}

impl PreemptionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the container was already marked.
    pub fn track(&self, container: &Container) -> bool {
        let mut marked = self.marked.lock();
        if marked.containers.contains_key(&container.id) {
            return false;
        }
        marked.total += container.capability;
        marked.containers.insert(container.id.clone(), container.clone());
        debug!(container = %container.id, preempted = %marked.total, "tracking container for preemption");
        true
    }

    /// Returns `false` if the container was not marked.
    pub fn untrack(&self, id: &ContainerId) -> bool {
        let mut marked = self.marked.lock();
        let Some(container) = marked.containers.remove(id) else {
            return false;
        };
        marked.total -= container.capability;
        true
    }

    pub fn is_marked(&self, id: &ContainerId) -> bool {
        self.marked.lock().containers.contains_key(id)
    }

    pub fn total(&self) -> Resource {
        self.marked.lock().total
    }

    /// Marked flag and total under a single lock acquisition.
    pub fn inspect(&self, id: &ContainerId) -> (bool, Resource) {
        let marked = self.marked.lock();
        (marked.containers.contains_key(id), marked.total)
    }

    pub fn containers(&self) -> Vec<Container> {
        self.marked.lock().containers.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.marked.lock().containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fair-share and min-share starvation of one attempt.
#[derive(Debug, Clone)]
pub struct StarvationTracker {
    fairshare: Resource,
    /// Attributed by the leaf queue; this engine never computes it.
    minshare: Resource,
    last_time_at_fair_share_ms: u64,
}

impl StarvationTracker {
    pub fn new(start_time_ms: u64) -> Self {
        Self {
            fairshare: Resource::NONE,
            minshare: Resource::NONE,
            last_time_at_fair_share_ms: start_time_ms,
        }
    }

    /// Recompute fair-share starvation.
    ///
    /// Starvation is `max(fair_share × threshold − usage, 0)`, but is only
    /// reported once the attempt has stayed starved for longer than
    /// `timeout_ms`; until then it reads as none.
    pub fn update(
        &mut self,
        fair_share: Resource,
        threshold: f64,
        usage: Resource,
        now_ms: u64,
        timeout_ms: u64,
    ) -> Resource {
        let starvation = (fair_share.multiply(threshold) - usage).clamp_non_negative();
        let starved = starvation.any_positive();

        if !starved {
            self.last_time_at_fair_share_ms = now_ms;
        }

        let starved_for = now_ms.saturating_sub(self.last_time_at_fair_share_ms);
        self.fairshare = if starved && starved_for > timeout_ms {
            starvation
        } else {
            Resource::NONE
        };
        self.fairshare
    }

    pub fn fairshare(&self) -> Resource {
        self.fairshare
    }

    pub fn minshare(&self) -> Resource {
        self.minshare
    }

    pub fn set_minshare(&mut self, starvation: Resource) {
        self.minshare = starvation;
    }

    pub fn reset_minshare(&mut self) {
        self.minshare = Resource::NONE;
    }

    pub fn total(&self) -> Resource {
        self.fairshare + self.minshare
    }

    pub fn is_starved_for_fair_share(&self) -> bool {
        !self.fairshare.is_none()
    }

    pub fn last_time_at_fair_share_ms(&self) -> u64 {
        self.last_time_at_fair_share_ms
    }
}
