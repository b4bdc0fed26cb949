//! Identifiers and topology model shared by the decomposer and the drivers.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identity of a topology node (one physical device).
    NodeId
);
string_id!(
    /// Identity of an edge point (logical port) owned by a node.
    EdgePointId
);
string_id!(
    /// Service-interface-point reference used by connectivity requests.
    SipId
);
string_id!(
    /// Connectivity service identifier.
    ServiceId
);
string_id!(
    /// Topology identifier.
    TopologyId
);

/// Name of the system topology the decomposer reads by default.
pub const SYSTEM_TOPOLOGY: &str = "mef:presto-nrp-topology-system";

/// Direction of a port, either as modeled in the topology or as requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
    #[default]
    Bidirectional,
    Unknown,
}

impl PortDirection {
    /// Returns true if traffic can enter the network through this port.
    pub const fn is_input_capable(&self) -> bool {
        matches!(self, PortDirection::Input | PortDirection::Bidirectional)
    }

    /// Returns true if traffic can leave the network through this port.
    pub const fn is_output_capable(&self) -> bool {
        matches!(self, PortDirection::Output | PortDirection::Bidirectional)
    }

    /// Returns true if a port with this topology direction can serve the
    /// `requested` direction.
    ///
    /// Bidirectional ports accept any concrete direction; unidirectional ports
    /// accept their own direction or an unconstrained (bidirectional) request.
    /// An `Unknown` request is never accepted.
    pub fn accepts(&self, requested: PortDirection) -> bool {
        match self {
            PortDirection::Bidirectional => requested != PortDirection::Unknown,
            PortDirection::Input | PortDirection::Output => {
                *self == requested || requested == PortDirection::Bidirectional
            }
            PortDirection::Unknown => false,
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PortDirection::Input => "input",
            PortDirection::Output => "output",
            PortDirection::Bidirectional => "bidirectional",
            PortDirection::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Operational state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationalState {
    Enabled,
    Disabled,
}

/// Reference to an edge point owned by a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NepRef {
    pub node_id: NodeId,
    pub edge_point_id: EdgePointId,
}

impl NepRef {
    pub fn new(node_id: impl Into<NodeId>, edge_point_id: impl Into<EdgePointId>) -> Self {
        Self {
            node_id: node_id.into(),
            edge_point_id: edge_point_id.into(),
        }
    }
}

impl fmt::Display for NepRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node_id, self.edge_point_id)
    }
}

/// An edge point owned by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedEdgePoint {
    pub id: EdgePointId,
    #[serde(default = "unknown_direction")]
    pub direction: PortDirection,
    /// Service interface points mapped to this edge point. Only the first one
    /// is used for addressing.
    #[serde(default)]
    pub mapped_sips: Vec<SipId>,
}

fn unknown_direction() -> PortDirection {
    PortDirection::Unknown
}

impl OwnedEdgePoint {
    pub fn new(id: impl Into<EdgePointId>, direction: PortDirection) -> Self {
        Self {
            id: id.into(),
            direction,
            mapped_sips: Vec::new(),
        }
    }

    /// Maps a service interface point to this edge point.
    pub fn with_sip(mut self, sip: impl Into<SipId>) -> Self {
        self.mapped_sips.push(sip.into());
        self
    }
}

/// A device in the topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Identifier of the activation driver family responsible for this node.
    pub activation_driver_id: String,
    #[serde(default)]
    pub edge_points: Vec<OwnedEdgePoint>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, activation_driver_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            activation_driver_id: activation_driver_id.into(),
            edge_points: Vec::new(),
        }
    }

    pub fn with_edge_point(mut self, edge_point: OwnedEdgePoint) -> Self {
        self.edge_points.push(edge_point);
        self
    }

    /// Looks up an owned edge point by id.
    pub fn edge_point(&self, id: &EdgePointId) -> Option<&OwnedEdgePoint> {
        self.edge_points.iter().find(|ep| &ep.id == id)
    }
}

/// A link between edge points of two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub edge_points: Vec<NepRef>,
    pub operational_state: OperationalState,
}

impl Link {
    pub fn new(id: impl Into<String>, a: NepRef, z: NepRef, state: OperationalState) -> Self {
        Self {
            id: id.into(),
            edge_points: vec![a, z],
            operational_state: state,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.operational_state == OperationalState::Enabled
    }
}

/// Snapshot of a topology as read from the data store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub id: TopologyId,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Topology {
    pub fn new(id: impl Into<TopologyId>) -> Self {
        Self {
            id: id.into(),
            nodes: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Looks up a node by id.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Finds the edge point mapped to `sip`, first match wins.
    pub fn find_sip(&self, sip: &SipId) -> Option<(&Node, &OwnedEdgePoint)> {
        self.nodes.iter().find_map(|node| {
            node.edge_points
                .iter()
                .find(|ep| ep.mapped_sips.contains(sip))
                .map(|ep| (node, ep))
        })
    }
}
