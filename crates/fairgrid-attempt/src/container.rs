//! Container descriptors shared with the node and container lifecycle.

use std::fmt;

use fairgrid_core::{AttemptId, ContainerId, NodeId, NodeType, Priority, Resource, ResourceRequest};

/// A container bound (or about to be bound) to a node for an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: ContainerId,
    pub node: NodeId,
    pub capability: Resource,
    pub priority: Priority,
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {} {}", self.id, self.node, self.capability)
    }
}

/// The reservation a node currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedContainer {
    pub attempt: AttemptId,
    pub priority: Priority,
    pub container: Container,
}

/// A container the attempt has been granted.
#[derive(Debug, Clone)]
pub(crate) struct LiveContainer {
    pub container: Container,
    pub locality: NodeType,
    /// Requests consumed by the allocation, so they can be re-asked if the
    /// container is lost before it runs.
    pub origin_requests: Vec<ResourceRequest>,
}

/// Final status reported by the node for a completed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatus {
    pub exit_status: i32,
    pub diagnostics: String,
}

impl ContainerStatus {
    pub fn success() -> Self {
        Self {
            exit_status: 0,
            diagnostics: String::new(),
        }
    }

    pub fn with_diagnostics(exit_status: i32, diagnostics: impl Into<String>) -> Self {
        Self {
            exit_status,
            diagnostics: diagnostics.into(),
        }
    }
}

/// Why a container left the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerEvent {
    /// Ran to completion on the node.
    Finished,
    /// Released by the application.
    Released,
    /// Killed by the scheduler (e.g. preemption).
    Killed,
    /// Allocated but never launched before the allocation expired.
    Expired,
}
