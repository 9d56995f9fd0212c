//! Scenario files and the offer loop that replays them.
//!
//! A scenario is a TOML file describing one queue, one attempt, its asks,
//! and the cluster's nodes:
//!
//! ```toml
//! [scheduler]
//! node_locality_threshold = 0.5
//! rack_locality_threshold = 0.5
//!
//! [queue]
//! name = "root.default"
//! fair_share = { memory_mb = 8192, vcores = 8 }
//!
//! [attempt]
//! user = "alice"
//! am_resource = { memory_mb = 1024, vcores = 1 }
//!
//! [[nodes]]
//! name = "n1"
//! rack = "/rack1"
//! capacity = { memory_mb = 4096, vcores = 4 }
//!
//! [[requests]]
//! priority = 1
//! resource_name = "*"
//! capability = { memory_mb = 1024, vcores = 1 }
//! num_containers = 2
//!
//! [run]
//! rounds = 3
//! advance_ms = 1000
//! ```
//!
//! Each round offers every node once, in file order. A node already
//! reserved for the attempt gets the reserved-container path.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use fairgrid_attempt::{AppAttempt, Assignment, AttemptSpec, Container, RequestTracker, SchedulerContext, SchedulerNode};
use fairgrid_core::{AttemptId, Resource, ResourceRequest, SchedulerConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cluster::SimContext;
use crate::node::SimNode;
use crate::queue::{QueueSettings, SimLeafQueue, SimParentQueue};
use crate::requests::InMemoryRequestTracker;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttemptSettings {
    pub cluster_timestamp: u64,
    pub application: u32,
    pub attempt: u32,
    pub user: String,
    pub am_resource: Resource,
    pub unmanaged_am: bool,
}

impl Default for AttemptSettings {
    fn default() -> Self {
        Self {
            cluster_timestamp: 1,
            application: 1,
            attempt: 1,
            user: "default".to_string(),
            am_resource: Resource::new(1024, 1),
            unmanaged_am: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSettings {
    pub name: String,
    pub rack: String,
    pub capacity: Resource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub rounds: u32,
    /// Logical time added after each round.
    pub advance_ms: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            rounds: 1,
            advance_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub scheduler: SchedulerConfig,
    pub queue: QueueSettings,
    pub attempt: AttemptSettings,
    pub nodes: Vec<NodeSettings>,
    pub requests: Vec<ResourceRequest>,
    pub run: RunSettings,
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("invalid scenario {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            bail!("scenario declares no nodes");
        }
        if self.requests.is_empty() {
            bail!("scenario declares no requests");
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if self.nodes[..i].iter().any(|n| n.name == node.name) {
                bail!("duplicate node name {}", node.name);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferOutcome {
    Allocated,
    Reserved,
    None,
}

impl From<Assignment> for OfferOutcome {
    fn from(assignment: Assignment) -> Self {
        match assignment {
            Assignment::Allocated(_) => OfferOutcome::Allocated,
            Assignment::Reserved => OfferOutcome::Reserved,
            Assignment::None => OfferOutcome::None,
        }
    }
}

/// One node offer and what the attempt did with it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferRecord {
    pub round: u32,
    pub now_ms: u64,
    pub node: String,
    pub from_reservation: bool,
    pub outcome: OfferOutcome,
    pub allocated: Resource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerRecord {
    pub id: String,
    pub node: String,
    pub priority: u32,
    pub capability: Resource,
}

impl From<&Container> for ContainerRecord {
    fn from(container: &Container) -> Self {
        Self {
            id: container.id.to_string(),
            node: container.node.clone(),
            priority: container.priority.0,
            capability: container.capability,
        }
    }
}

/// Final state of a replayed scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub attempt: String,
    pub offers: Vec<OfferRecord>,
    pub containers: Vec<ContainerRecord>,
    pub consumption: Resource,
    pub demand: Resource,
    pub reserved: Resource,
    pub headroom: Resource,
    pub outstanding_containers: u32,
}

impl RunReport {
    pub fn count(&self, outcome: OfferOutcome) -> usize {
        self.offers.iter().filter(|o| o.outcome == outcome).count()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "attempt {}", self.attempt)?;
        for offer in &self.offers {
            let outcome = match offer.outcome {
                OfferOutcome::Allocated => format!("allocated {}", offer.allocated),
                OfferOutcome::Reserved => "reserved".to_string(),
                OfferOutcome::None => "-".to_string(),
            };
            let marker = if offer.from_reservation { " (reserved)" } else { "" };
            writeln!(
                f,
                "  round {:>3}  t={:>8}ms  {:<12}{}  {}",
                offer.round, offer.now_ms, offer.node, marker, outcome
            )?;
        }
        writeln!(f, "containers: {}", self.containers.len())?;
        for container in &self.containers {
            writeln!(f, "  {} on {} {}", container.id, container.node, container.capability)?;
        }
        writeln!(f, "consumption: {}", self.consumption)?;
        writeln!(f, "demand:      {}", self.demand)?;
        writeln!(f, "reserved:    {}", self.reserved)?;
        writeln!(f, "headroom:    {}", self.headroom)?;
        write!(f, "outstanding: {}", self.outstanding_containers)
    }
}

/// Replay `scenario` against a fresh attempt.
pub fn run_scenario(scenario: &Scenario) -> Result<RunReport> {
    let root = SimParentQueue::root();
    let queue = SimLeafQueue::new(scenario.queue.clone(), root.clone());
    let context = Arc::new(SimContext::new(scenario.scheduler.clone(), root));

    let nodes: Vec<Arc<SimNode>> = scenario
        .nodes
        .iter()
        .map(|n| Arc::new(SimNode::new(n.name.clone(), n.rack.clone(), n.capacity)))
        .collect();
    for node in &nodes {
        context.add_node(node.as_ref());
    }

    let requests = Arc::new(InMemoryRequestTracker::new());
    requests.update(scenario.requests.iter().cloned());

    let settings = &scenario.attempt;
    let attempt = AppAttempt::new(
        AttemptSpec {
            id: AttemptId::new(settings.cluster_timestamp, settings.application, settings.attempt),
            user: settings.user.clone(),
            am_resource: settings.am_resource,
            unmanaged_am: settings.unmanaged_am,
        },
        queue.clone(),
        requests.clone(),
        context.clone(),
    );
    attempt.set_fair_share(scenario.queue.fair_share);
    attempt.update_demand();

    info!(
        attempt = %attempt.id(),
        nodes = nodes.len(),
        rounds = scenario.run.rounds,
        mode = ?attempt.locality_mode(),
        "replaying scenario"
    );

    let mut offers = Vec::new();
    let mut containers = Vec::new();
    for round in 0..scenario.run.rounds {
        for node in &nodes {
            let from_reservation = node.is_reserved_for(attempt.id());
            let assignment = if from_reservation {
                attempt.assign_reserved_container(node.as_ref())?
            } else {
                attempt.assign_container(node.as_ref())?
            };
            debug!(round, node = node.node_name(), ?assignment, "offer");
            offers.push(OfferRecord {
                round,
                now_ms: context.now_ms(),
                node: node.node_name().to_string(),
                from_reservation,
                outcome: assignment.into(),
                allocated: assignment.allocated(),
            });
        }
        containers.extend(attempt.pull_newly_allocated_containers().iter().map(ContainerRecord::from));
        attempt.update_demand();
        context.advance(scenario.run.advance_ms);
    }

    let outstanding_containers = requests
        .priorities_with_requests()
        .into_iter()
        .map(|p| requests.total_required_at(p))
        .sum();

    Ok(RunReport {
        attempt: attempt.id().to_string(),
        offers,
        containers,
        consumption: attempt.current_consumption(),
        demand: attempt.demand(),
        reserved: attempt.current_reservation(),
        headroom: attempt.headroom(),
        outstanding_containers,
    })
}
