//! fairgrid-sim: in-memory collaborators for the allocation engine.
//!
//! Every trait in `fairgrid_attempt::context` has a simple, thread-safe
//! implementation here, enough to replay a scenario or to test the engine
//! end to end without a real scheduler.
//!
//! # Components
//!
//! - **`requests`**: outstanding asks per priority and location
//! - **`node`**: worker node with capacity and one reservation slot
//! - **`queue`**: leaf and parent queues with metrics counters
//! - **`policy`**: fair-share and dominant-resource headroom formulas
//! - **`cluster`**: scheduler context with a manual logical clock
//! - **`scenario`**: TOML scenarios and the offer loop that replays them

pub mod cluster;
pub mod node;
pub mod policy;
pub mod queue;
pub mod requests;
pub mod scenario;

pub use cluster::SimContext;
pub use node::SimNode;
pub use policy::{DominantResourcePolicy, FairSharePolicy, PolicyKind};
pub use queue::{QueueCounters, QueueSettings, SimLeafQueue, SimParentQueue, SimQueueMetrics};
pub use requests::InMemoryRequestTracker;
pub use scenario::{
    AttemptSettings, ContainerRecord, NodeSettings, OfferOutcome, OfferRecord, RunReport, RunSettings, Scenario,
    run_scenario,
};
