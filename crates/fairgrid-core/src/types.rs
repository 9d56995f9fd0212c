//! Identifiers, priorities, locality levels, and resource requests.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resource::Resource;

/// Host name of a worker node.
pub type NodeId = String;

/// Rack a worker node lives in (e.g. `/default-rack`).
pub type RackName = String;

/// Location key that matches any node ("off-switch").
pub const ANY: &str = "*";

// ── Priority ──────────────────────────────────────────────────────

/// Request priority. Lower numbers are served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub u32);

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Locality ──────────────────────────────────────────────────────

/// How far from the preferred location a placement may range.
///
/// Ordered from strictest to most relaxed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    NodeLocal,
    RackLocal,
    OffSwitch,
}

impl NodeType {
    /// The next more relaxed level, or `None` at `OffSwitch`.
    pub fn relaxed(self) -> Option<NodeType> {
        match self {
            NodeType::NodeLocal => Some(NodeType::RackLocal),
            NodeType::RackLocal => Some(NodeType::OffSwitch),
            NodeType::OffSwitch => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeType::NodeLocal => "NODE_LOCAL",
            NodeType::RackLocal => "RACK_LOCAL",
            NodeType::OffSwitch => "OFF_SWITCH",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Identity ──────────────────────────────────────────────────────

/// Identity of one attempt of a submitted application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptId {
    /// Cluster start timestamp the application id is scoped to.
    pub cluster_timestamp: u64,
    pub application: u32,
    pub attempt: u32,
}

impl AttemptId {
    pub fn new(cluster_timestamp: u64, application: u32, attempt: u32) -> Self {
        Self {
            cluster_timestamp,
            application,
            attempt,
        }
    }

    /// The `application_<ts>_<seq>` form of the owning application.
    pub fn application_id(&self) -> String {
        format!("application_{}_{:04}", self.cluster_timestamp, self.application)
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "appattempt_{}_{:04}_{:06}",
            self.cluster_timestamp, self.application, self.attempt
        )
    }
}

/// Container identity, unique within the attempt that allocated it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId {
    pub attempt: AttemptId,
    pub sequence: u64,
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "container_{}_{:04}_{:02}_{:06}",
            self.attempt.cluster_timestamp, self.attempt.application, self.attempt.attempt, self.sequence
        )
    }
}

// ── Requests ──────────────────────────────────────────────────────

/// Outstanding ask at one priority for one location key.
///
/// `resource_name` is a host name, a rack name, or [`ANY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub priority: Priority,
    pub resource_name: String,
    pub capability: Resource,
    pub num_containers: u32,
    /// Whether the scheduler may satisfy this ask at a less local level.
    #[serde(default = "default_relax_locality")]
    pub relax_locality: bool,
}

fn default_relax_locality() -> bool {
    true
}

impl ResourceRequest {
    pub fn new(priority: Priority, resource_name: impl Into<String>, capability: Resource, num_containers: u32) -> Self {
        Self {
            priority,
            resource_name: resource_name.into(),
            capability,
            num_containers,
            relax_locality: true,
        }
    }

    /// Builder-style toggle for `relax_locality`.
    pub fn with_relax_locality(mut self, relax: bool) -> Self {
        self.relax_locality = relax;
        self
    }

    pub fn is_any(&self) -> bool {
        self.resource_name == ANY
    }

    /// Total resource this request still asks for.
    pub fn total(&self) -> Resource {
        self.capability.times(self.num_containers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locality_levels_are_ordered_strict_to_relaxed() {
        assert!(NodeType::NodeLocal < NodeType::RackLocal);
        assert!(NodeType::RackLocal < NodeType::OffSwitch);
        assert_eq!(NodeType::NodeLocal.relaxed(), Some(NodeType::RackLocal));
        assert_eq!(NodeType::OffSwitch.relaxed(), None);
    }

    #[test]
    fn ids_render_in_cluster_format() {
        let attempt = AttemptId::new(1_700_000_000_000, 7, 1);
        assert_eq!(attempt.to_string(), "appattempt_1700000000000_0007_000001");
        assert_eq!(attempt.application_id(), "application_1700000000000_0007");

        let container = ContainerId {
            attempt,
            sequence: 42,
        };
        assert_eq!(container.to_string(), "container_1700000000000_0007_01_000042");
    }

    #[test]
    fn request_total_and_any() {
        let req = ResourceRequest::new(Priority(1), ANY, Resource::new(1024, 1), 3);
        assert!(req.is_any());
        assert!(req.relax_locality);
        assert_eq!(req.total(), Resource::new(3072, 3));
    }
}
