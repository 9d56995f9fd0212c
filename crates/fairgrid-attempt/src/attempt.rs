//! The application attempt and its locked state.
//!
//! Allocation lives in [`allocation`](crate::allocation), demand and usage
//! in [`accounting`](crate::accounting). This module holds the struct, its
//! lifecycle hooks (container completion, acknowledgement), and the
//! preemption-facing API.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use fairgrid_core::{AttemptId, ContainerId, LocalityMode, Priority, Resource, ResourceRequest, ResourceWeights};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::container::{Container, ContainerEvent, ContainerStatus, LiveContainer};
use crate::context::{LeafQueue, RequestTracker, SchedulerContext, queue_chain_preemptable};
use crate::locality::LocalityTracker;
use crate::preemption::{PreemptionLedger, StarvationTracker};
use crate::reservation::ReservationLedger;

/// Registration details of an attempt.
#[derive(Debug, Clone)]
pub struct AttemptSpec {
    pub id: AttemptId,
    pub user: String,
    /// Resource of the application-master container.
    pub am_resource: Resource,
    /// The AM runs outside the cluster and is not scheduled here.
    pub unmanaged_am: bool,
}

/// State guarded by the attempt's main lock.
pub(crate) struct AttemptState {
    pub locality: LocalityTracker,
    pub reservations: ReservationLedger,
    pub starvation: StarvationTracker,
    pub live: HashMap<ContainerId, LiveContainer>,
    pub newly_allocated: Vec<Container>,
    pub consumption: Resource,
    pub demand: Resource,
    pub fair_share: Resource,
    pub weights: ResourceWeights,
    pub am_running: bool,
}

impl AttemptState {
    fn new(start_time_ms: u64) -> Self {
        Self {
            locality: LocalityTracker::new(start_time_ms),
            reservations: ReservationLedger::new(),
            starvation: StarvationTracker::new(start_time_ms),
            live: HashMap::new(),
            newly_allocated: Vec::new(),
            consumption: Resource::NONE,
            demand: Resource::NONE,
            fair_share: Resource::NONE,
            weights: ResourceWeights::default(),
            am_running: false,
        }
    }

    pub fn owns(&self, id: &ContainerId) -> bool {
        self.live.contains_key(id) || self.newly_allocated.iter().any(|c| &c.id == id)
    }
}

/// One running application attempt, seen from the fair scheduler.
pub struct AppAttempt {
    pub(crate) id: AttemptId,
    pub(crate) user: String,
    pub(crate) am_resource: Resource,
    pub(crate) unmanaged_am: bool,
    pub(crate) start_time_ms: u64,
    /// Per-app priorities are not supported; every attempt has the same.
    pub(crate) priority: Priority,
    pub(crate) locality_mode: LocalityMode,
    pub(crate) queue: Arc<dyn LeafQueue>,
    pub(crate) requests: Arc<dyn RequestTracker>,
    pub(crate) context: Arc<dyn SchedulerContext>,
    next_container_sequence: AtomicU64,
    pub(crate) state: Mutex<AttemptState>,
    pub(crate) preemption: PreemptionLedger,
}

impl AppAttempt {
    /// Register a new attempt. The start time is read from the scheduler
    /// clock and the locality strategy is fixed from its configuration.
    pub fn new(
        spec: AttemptSpec,
        queue: Arc<dyn LeafQueue>,
        requests: Arc<dyn RequestTracker>,
        context: Arc<dyn SchedulerContext>,
    ) -> Self {
        let start_time_ms = context.now_ms();
        let locality_mode = context.config().locality_mode();
        info!(
            attempt = %spec.id,
            user = %spec.user,
            queue = queue.name(),
            mode = ?locality_mode,
            "registered application attempt"
        );
        Self {
            id: spec.id,
            user: spec.user,
            am_resource: spec.am_resource,
            unmanaged_am: spec.unmanaged_am,
            start_time_ms,
            priority: Priority(1),
            locality_mode,
            queue,
            requests,
            context,
            next_container_sequence: AtomicU64::new(1),
            state: Mutex::new(AttemptState::new(start_time_ms)),
            preemption: PreemptionLedger::new(),
        }
    }

    pub fn id(&self) -> &AttemptId {
        &self.id
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn name(&self) -> String {
        self.id.application_id()
    }

    pub fn start_time_ms(&self) -> u64 {
        self.start_time_ms
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn locality_mode(&self) -> LocalityMode {
        self.locality_mode
    }

    pub fn queue(&self) -> &Arc<dyn LeafQueue> {
        &self.queue
    }

    pub fn is_am_running(&self) -> bool {
        self.state.lock().am_running
    }

    pub(crate) fn next_container_id(&self) -> ContainerId {
        ContainerId {
            attempt: self.id.clone(),
            sequence: self.next_container_sequence.fetch_add(1, Ordering::Relaxed),
        }
    }

    // ── Containers ────────────────────────────────────────────────

    pub fn live_containers(&self) -> Vec<Container> {
        self.state
            .lock()
            .live
            .values()
            .map(|live| live.container.clone())
            .collect()
    }

    pub fn num_live_containers(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Requests an allocation consumed, for re-asking a lost container.
    pub fn origin_requests(&self, id: &ContainerId) -> Option<Vec<ResourceRequest>> {
        self.state.lock().live.get(id).map(|live| live.origin_requests.clone())
    }

    /// Hand newly allocated containers to the application.
    ///
    /// They stay live; only the "not yet acknowledged" set is drained.
    pub fn pull_newly_allocated_containers(&self) -> Vec<Container> {
        std::mem::take(&mut self.state.lock().newly_allocated)
    }

    /// A container left the attempt: finished, released, killed or expired.
    ///
    /// Returns `false` if the attempt did not know the container.
    pub fn container_completed(&self, container: &Container, status: &ContainerStatus, event: ContainerEvent) -> bool {
        let mut state = self.state.lock();
        state.newly_allocated.retain(|c| c.id != container.id);

        let Some(live) = state.live.remove(&container.id) else {
            warn!(
                attempt = %self.id,
                container = %container.id,
                ?event,
                "completed container is not live for this attempt"
            );
            self.preemption.untrack(&container.id);
            return false;
        };

        self.preemption.untrack(&container.id);

        let resource = live.container.capability;
        self.queue.metrics().release_resources(&self.user, 1, resource);
        state.consumption -= resource;

        info!(
            attempt = %self.id,
            container = %container.id,
            ?event,
            locality = %live.locality,
            exit_status = status.exit_status,
            diagnostics = %status.diagnostics,
            consumption = %state.consumption,
            "completed container"
        );
        true
    }

    // ── Preemption ────────────────────────────────────────────────

    /// Mark a live container for preemption.
    ///
    /// Held under the main lock so a concurrent completion either runs first
    /// (and the mark is refused) or runs after and clears it.
    pub fn track_for_preemption(&self, container: &Container) -> bool {
        let state = self.state.lock();
        if !state.owns(&container.id) {
            warn!(
                attempt = %self.id,
                container = %container.id,
                "not marking a container that is no longer live for this attempt"
            );
            return false;
        }
        self.preemption.track(container)
    }

    pub fn untrack_for_preemption(&self, container: &Container) -> bool {
        self.preemption.untrack(&container.id)
    }

    pub fn preemption_containers(&self) -> Vec<Container> {
        self.preemption.containers()
    }

    pub fn preempted_resources(&self) -> Resource {
        self.preemption.total()
    }

    /// Whether the preemption pass may take `container` from this attempt.
    ///
    /// Only containers whose removal keeps the attempt at or above its fair
    /// share qualify, and never under a non-preemptable queue.
    pub fn can_be_preempted(&self, container: &Container) -> bool {
        let state = self.state.lock();
        if !state.owns(&container.id) {
            error!(
                attempt = %self.id,
                container = %container.id,
                "looking to preempt a container that does not belong to this attempt"
            );
            return false;
        }

        let (marked, preempted) = self.preemption.inspect(&container.id);
        if marked {
            return false;
        }

        if !queue_chain_preemptable(self.queue.as_ref()) {
            return false;
        }

        let usage = if preempted.is_none() {
            state.consumption
        } else {
            state.consumption - preempted
        };
        let over_fair_share_by = usage - state.fair_share;
        container.capability.fits_in(&over_fair_share_by)
    }
}
