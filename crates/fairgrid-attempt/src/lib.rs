//! fairgrid-attempt: the allocation engine for one application attempt.
//!
//! Each time the scheduler offers a node, [`AppAttempt`] decides whether to
//! bind a container there, hold a reservation, or pass. It owns the
//! per-attempt bookkeeping the decision needs and nothing cluster-wide:
//! queues, nodes, the request table, and the clock are reached through the
//! traits in [`context`].
//!
//! # Architecture
//!
//! ```text
//! AppAttempt
//!   ├── Mutex<AttemptState>            (main lock)
//!   │     ├── LocalityTracker          (allowed level per priority)
//!   │     ├── ReservationLedger        (priority → node → container)
//!   │     ├── StarvationTracker        (fairshare / minshare starvation)
//!   │     └── live + newly allocated containers, consumption, demand
//!   └── PreemptionLedger               (own lock, marked containers)
//! ```
//!
//! Lock order: the preemption lock may be taken while the main lock is held,
//! never the other way round.

pub mod accounting;
pub mod allocation;
pub mod attempt;
pub mod container;
pub mod context;
pub mod error;
pub mod locality;
pub mod preemption;
pub mod reservation;

pub use allocation::Assignment;
pub use attempt::{AppAttempt, AttemptSpec};
pub use container::{Container, ContainerEvent, ContainerStatus, ReservedContainer};
pub use context::{
    FairQueue, LeafQueue, QueueMetrics, ROOT_QUEUE, RequestTracker, SchedulerContext, SchedulerNode,
    SchedulingPolicy,
};
pub use error::{AttemptError, AttemptResult};
pub use locality::{ElapsedDelay, LocalityTracker, MissedOpportunities, RelaxationStrategy};
pub use preemption::{PreemptionLedger, StarvationTracker};
pub use reservation::ReservationLedger;
