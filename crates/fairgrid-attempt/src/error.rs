//! Engine error types.
//!
//! Every variant is a broken caller contract, not a transient condition:
//! "does not fit" and "queue is full" are [`Assignment::None`](crate::Assignment),
//! never errors. The scheduler should abandon the current offer when one of
//! these surfaces.

use fairgrid_core::{AttemptId, NodeId, Priority};
use thiserror::Error;

/// Errors raised by [`AppAttempt`](crate::AppAttempt) operations.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("attempt {attempt} holds no reservation at priority {priority} on node {node}")]
    NoReservation {
        attempt: AttemptId,
        priority: Priority,
        node: NodeId,
    },

    #[error("node {node} holds no reservation for attempt {attempt}")]
    NodeNotReserved { attempt: AttemptId, node: NodeId },
}

pub type AttemptResult<T> = Result<T, AttemptError>;
