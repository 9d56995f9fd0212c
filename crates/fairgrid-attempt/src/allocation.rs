//! Turning a node offer into an allocation, a reservation, or nothing.
//!
//! For each candidate priority (ascending), the engine picks the most local
//! request the delay-scheduling level allows:
//!
//! 1. node-local, whenever both a node and a rack ask are outstanding
//! 2. rack-local, once the level has relaxed to `RACK_LOCAL`
//! 3. off-switch, once relaxed to `OFF_SWITCH` or when only `*` is asked
//!
//! The chosen request is allocated if it fits the node's free capacity and
//! reserved on the node otherwise (queue max share permitting).

use fairgrid_core::{ANY, LocalityMode, NodeType, Priority, Resource, ResourceRequest};
use tracing::{debug, error, info, warn};

use crate::attempt::{AppAttempt, AttemptState};
use crate::container::{Container, LiveContainer, ReservedContainer};
use crate::context::{SchedulerNode, fits_in_max_share};
use crate::error::{AttemptError, AttemptResult};
use crate::locality::{ElapsedDelay, MissedOpportunities};

/// Outcome of offering a node to an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// A container of this size was bound to the node.
    Allocated(Resource),
    /// The node's capacity is now held for this attempt.
    Reserved,
    /// Nothing happened; try again on a later offer.
    None,
}

impl Assignment {
    pub fn is_allocated(&self) -> bool {
        matches!(self, Assignment::Allocated(_))
    }

    pub fn is_reserved(&self) -> bool {
        matches!(self, Assignment::Reserved)
    }

    /// Resource bound by this assignment (zero unless allocated).
    pub fn allocated(&self) -> Resource {
        match self {
            Assignment::Allocated(resource) => *resource,
            _ => Resource::NONE,
        }
    }
}

impl AppAttempt {
    /// Offer `node` to this attempt.
    pub fn assign_container(&self, node: &dyn SchedulerNode) -> AttemptResult<Assignment> {
        self.assign_container_at(node, false)
    }

    /// Retry the reservation this attempt holds on `node`.
    ///
    /// A reservation nobody needs any more is released; one that still does
    /// not fit is kept for a later offer.
    pub fn assign_reserved_container(&self, node: &dyn SchedulerNode) -> AttemptResult<Assignment> {
        let reserved = self.own_reservation(node)?;

        if self.requests.total_required_at(reserved.priority) == 0 {
            self.unreserve(reserved.priority, node)?;
            return Ok(Assignment::None);
        }

        // One container size per priority is assumed here.
        if !reserved
            .container
            .capability
            .fits_in(&node.available_resource())
        {
            return Ok(Assignment::None);
        }

        self.assign_container_at(node, true)
    }

    /// Release the reservation at (priority, node).
    pub fn unreserve(&self, priority: Priority, node: &dyn SchedulerNode) -> AttemptResult<()> {
        let mut state = self.state.lock();
        self.unreserve_locked(&mut state, priority, node)
    }

    /// Whether this attempt asks for something `node` could hold if empty.
    ///
    /// Reads only the request tracker, so it takes no attempt lock.
    pub fn has_container_for_node(&self, priority: Priority, node: &dyn SchedulerNode) -> bool {
        let Some(any) = self.requests.request_for(priority, ANY) else {
            return false;
        };
        if any.num_containers == 0 {
            return false;
        }

        let rack = self.requests.request_for(priority, node.rack_name());
        let nonzero = |request: &Option<ResourceRequest>| request.as_ref().is_some_and(|r| r.num_containers > 0);

        // Off-switch relaxation off: the node's rack must be asked for.
        if !any.relax_locality && !nonzero(&rack) {
            return false;
        }

        // Rack relaxation off: the node itself must be asked for.
        if let Some(rack) = &rack {
            if !rack.relax_locality {
                let local = self.requests.request_for(priority, node.node_name());
                if !nonzero(&local) {
                    return false;
                }
            }
        }

        any.capability.fits_in(&node.total_capability())
    }

    /// Total reserved resource.
    pub fn current_reservation(&self) -> Resource {
        self.state.lock().reservations.total()
    }

    pub fn reserved_containers(&self) -> Vec<Container> {
        self.state.lock().reservations.containers()
    }

    pub fn is_reserved(&self, priority: Priority, node: &dyn SchedulerNode) -> bool {
        self.state.lock().reservations.is_reserved(priority, node.node_name())
    }

    pub fn re_reservations(&self, priority: Priority) -> u32 {
        self.state.lock().reservations.re_reservations(priority)
    }

    pub fn missed_opportunities(&self, priority: Priority) -> u64 {
        self.state.lock().locality.missed_opportunities(priority)
    }

    pub fn allowed_locality_level(&self, priority: Priority) -> Option<NodeType> {
        self.state.lock().locality.current_level(priority)
    }

    /// Estimated share of the cluster worth skipping for locality at `priority`.
    pub fn locality_wait_factor(&self, priority: Priority, cluster_nodes: usize) -> f64 {
        if cluster_nodes == 0 {
            return 1.0;
        }
        let required = self.requests.requests_at(priority).len().saturating_sub(1);
        (required as f64 / cluster_nodes as f64).min(1.0)
    }

    // ── Internals ─────────────────────────────────────────────────

    fn own_reservation(&self, node: &dyn SchedulerNode) -> AttemptResult<ReservedContainer> {
        match node.reserved_container() {
            Some(reserved) if reserved.attempt == self.id => Ok(reserved),
            _ => {
                error!(attempt = %self.id, node = node.node_name(), "node holds no reservation for this attempt");
                Err(AttemptError::NodeNotReserved {
                    attempt: self.id.clone(),
                    node: node.node_name().to_string(),
                })
            }
        }
    }

    fn assign_container_at(&self, node: &dyn SchedulerNode, reserved: bool) -> AttemptResult<Assignment> {
        debug!(attempt = %self.id, node = node.node_name(), reserved, "node offered to attempt");

        let priorities: Vec<Priority> = if reserved {
            vec![self.own_reservation(node)?.priority]
        } else {
            self.requests.priorities_with_requests().into_iter().collect()
        };

        let mut state = self.state.lock();
        for priority in priorities {
            if self.requests.total_required_at(priority) == 0 || !self.has_container_for_node(priority, node) {
                continue;
            }

            state.locality.add_missed_opportunity(priority);

            if state.live.is_empty()
                && !self.unmanaged_am
                && !self.queue.can_run_application_master(self.am_resource)
            {
                debug!(attempt = %self.id, queue = self.queue.name(), "queue AM share exhausted");
                return Ok(Assignment::None);
            }

            let rack_request = self.requests.request_for(priority, node.rack_name());
            let local_request = self.requests.request_for(priority, node.node_name());

            if let Some(local) = &local_request {
                if !local.relax_locality {
                    warn!(
                        attempt = %self.id,
                        node = node.node_name(),
                        %priority,
                        "relax locality off is not supported on node-local requests"
                    );
                }
            }

            let allowed = self.allowed_level(&mut state, priority);

            if let (Some(rack), Some(local)) = (&rack_request, &local_request) {
                if rack.num_containers != 0 && local.num_containers != 0 {
                    return self.assign_request(&mut state, node, local, NodeType::NodeLocal, reserved);
                }
            }

            if let Some(rack) = &rack_request {
                if !rack.relax_locality {
                    continue;
                }
                if rack.num_containers != 0 && allowed >= NodeType::RackLocal {
                    return self.assign_request(&mut state, node, rack, NodeType::RackLocal, reserved);
                }
            }

            let Some(off_switch) = self.requests.request_for(priority, ANY) else {
                continue;
            };
            if !off_switch.relax_locality {
                continue;
            }
            if off_switch.num_containers != 0
                && (!self.has_node_or_rack_local_requests(priority) || allowed == NodeType::OffSwitch)
            {
                return self.assign_request(&mut state, node, &off_switch, NodeType::OffSwitch, reserved);
            }
        }

        Ok(Assignment::None)
    }

    fn allowed_level(&self, state: &mut AttemptState, priority: Priority) -> NodeType {
        match self.locality_mode {
            LocalityMode::ElapsedTime => {
                let strategy = ElapsedDelay {
                    node_delay_ms: self.context.node_locality_delay_ms(),
                    rack_delay_ms: self.context.rack_locality_delay_ms(),
                    now_ms: self.context.now_ms(),
                };
                state.locality.allowed_level(priority, &strategy)
            }
            LocalityMode::MissedOpportunities => {
                let strategy = MissedOpportunities::new(
                    self.context.num_cluster_nodes(),
                    self.context.node_locality_threshold(),
                    self.context.rack_locality_threshold(),
                );
                state.locality.allowed_level(priority, &strategy)
            }
        }
    }

    fn has_node_or_rack_local_requests(&self, priority: Priority) -> bool {
        self.requests.requests_at(priority).len() > 1
    }

    /// Place `request` on `node`: allocate if it fits, reserve if not.
    fn assign_request(
        &self,
        state: &mut AttemptState,
        node: &dyn SchedulerNode,
        request: &ResourceRequest,
        locality: NodeType,
        reserved: bool,
    ) -> AttemptResult<Assignment> {
        let capability = request.capability;
        let available = node.available_resource();

        let container = if reserved {
            self.own_reservation(node)?.container
        } else {
            self.create_container(node, capability, request.priority)
        };

        if capability.fits_in(&available) {
            // Released up front: either the container takes its place or the
            // application no longer needs it.
            if reserved {
                self.unreserve_locked(state, request.priority, node)?;
            }

            let Some(allocated) = self.allocate(state, locality, node, request.priority, request, container) else {
                return Ok(Assignment::None);
            };

            node.allocate_container(&allocated);

            if state.live.len() == 1 && !self.unmanaged_am {
                self.queue.add_application_master_usage(allocated.capability);
                state.am_running = true;
            }

            return Ok(Assignment::Allocated(allocated.capability));
        }

        if !fits_in_max_share(self.queue.as_ref(), capability) {
            debug!(
                attempt = %self.id,
                queue = self.queue.name(),
                %capability,
                "reservation would exceed queue max share"
            );
            return Ok(Assignment::None);
        }

        // A node has one reservation slot.
        if let Some(held) = node.reserved_container() {
            if held.attempt != self.id || held.priority != request.priority {
                debug!(
                    attempt = %self.id,
                    node = node.node_name(),
                    priority = %request.priority,
                    held_by = %held.attempt,
                    held_at = %held.priority,
                    "node already holds another reservation"
                );
                return Ok(Assignment::None);
            }
        }

        self.reserve_locked(state, request.priority, node, container, reserved);
        Ok(Assignment::Reserved)
    }

    fn create_container(&self, node: &dyn SchedulerNode, capability: Resource, priority: Priority) -> Container {
        Container {
            id: self.next_container_id(),
            node: node.node_name().to_string(),
            capability,
            priority,
        }
    }

    /// Bind `container` to the attempt.
    ///
    /// The request tracker is consulted before anything local changes, so a
    /// stale request leaves consumption and container sets untouched.
    fn allocate(
        &self,
        state: &mut AttemptState,
        locality: NodeType,
        node: &dyn SchedulerNode,
        priority: Priority,
        request: &ResourceRequest,
        container: Container,
    ) -> Option<Container> {
        // The application may update its asks without the scheduler lock.
        if self.requests.total_required_at(priority) == 0 {
            return None;
        }

        let Some(origin_requests) = self
            .requests
            .record_allocation(locality, node, priority, request, &container)
        else {
            debug!(attempt = %self.id, %priority, "request tracker declined allocation");
            return None;
        };

        if let Some(allowed) = state.locality.current_level(priority) {
            if locality < allowed {
                state.locality.reset_allowed_level(priority, locality);
            }
        }
        state
            .locality
            .reset_scheduling_opportunities(priority, self.context.now_ms());

        state.newly_allocated.push(container.clone());
        state.live.insert(
            container.id.clone(),
            LiveContainer {
                container: container.clone(),
                locality,
                origin_requests,
            },
        );
        state.consumption += container.capability;
        self.queue
            .metrics()
            .allocate_resources(&self.user, 1, container.capability);

        debug!(
            attempt = %self.id,
            container = %container.id,
            node = %container.node,
            %locality,
            consumption = %state.consumption,
            "allocated container"
        );
        Some(container)
    }

    fn reserve_locked(
        &self,
        state: &mut AttemptState,
        priority: Priority,
        node: &dyn SchedulerNode,
        container: Container,
        already_reserved: bool,
    ) {
        // A plain offer of a node this attempt already holds refreshes too.
        let refresh = already_reserved || state.reservations.is_reserved(priority, node.node_name());
        info!(
            attempt = %self.id,
            node = node.node_name(),
            %priority,
            capability = %container.capability,
            refresh,
            "making reservation"
        );

        if !refresh {
            self.queue
                .metrics()
                .reserve_resource(&self.user, container.capability);
        }
        node.reserve_resource(&self.id, priority, &container);
        let created = state.reservations.reserve(priority, node.node_name(), container);
        if already_reserved && created {
            warn!(attempt = %self.id, node = node.node_name(), %priority, "refreshed a reservation the ledger did not hold");
        }
    }

    pub(crate) fn unreserve_locked(
        &self,
        state: &mut AttemptState,
        priority: Priority,
        node: &dyn SchedulerNode,
    ) -> AttemptResult<()> {
        let Some(container) = state.reservations.unreserve(priority, node.node_name()) else {
            error!(
                attempt = %self.id,
                node = node.node_name(),
                %priority,
                "unreserve called without a matching reservation"
            );
            return Err(AttemptError::NoReservation {
                attempt: self.id.clone(),
                priority,
                node: node.node_name().to_string(),
            });
        };

        // A released reservation stops counting against the delay threshold.
        state.locality.reset_missed_opportunities(priority);

        node.unreserve_resource(&self.id);
        self.queue
            .metrics()
            .unreserve_resource(&self.user, container.capability);

        info!(
            attempt = %self.id,
            node = node.node_name(),
            %priority,
            remaining_at_priority = state.reservations.reserved_at(priority),
            current_reservation = %state.reservations.total(),
            "unreserved"
        );
        Ok(())
    }
}
