//! Test fixtures for topologies and request endpoints
//!
//! Port ids follow the `<node>:<n>` convention and every port is mapped to
//! the service interface point `sip:<port>`, so `ep("n1:1")` addresses port
//! `n1:1` on node `n1`.

use unimgr_nrp_common::{
    Link, NepRef, Node, OperationalState, OwnedEdgePoint, PortDirection, ServiceEndPoint, SipId,
    Topology, SYSTEM_TOPOLOGY,
};

/// Service interface point mapped to `port`
pub fn sip(port: &str) -> SipId {
    SipId::new(format!("sip:{}", port))
}

/// Node owning `port` (the part before the first ':')
pub fn node_of(port: &str) -> &str {
    port.split_once(':').map(|(node, _)| node).unwrap_or(port)
}

/// Edge point with a sip mapping
pub fn port(id: &str, direction: PortDirection) -> OwnedEdgePoint {
    OwnedEdgePoint::new(id, direction).with_sip(sip(id))
}

/// Node with bidirectional ports, driven by an activation driver named after the node
pub fn n(id: &str, ports: &[&str]) -> Node {
    n_with_driver(id, id, ports)
}

/// Node with bidirectional ports and an explicit activation driver id
pub fn n_with_driver(id: &str, driver: &str, ports: &[&str]) -> Node {
    ports.iter().fold(Node::new(id, driver), |node, p| {
        node.with_edge_point(port(p, PortDirection::Bidirectional))
    })
}

/// Node with directed ports
pub fn n_directed(id: &str, ports: &[(&str, PortDirection)]) -> Node {
    ports.iter().fold(Node::new(id, id), |node, (p, dir)| {
        node.with_edge_point(port(p, *dir))
    })
}

/// Link between two ports
pub fn l(a: &str, z: &str, state: OperationalState) -> Link {
    Link::new(
        format!("{}-{}", a, z),
        NepRef::new(node_of(a), a),
        NepRef::new(node_of(z), z),
        state,
    )
}

/// System topology with the given nodes and links
pub fn topology(nodes: Vec<Node>, links: Vec<Link>) -> Topology {
    let mut topo = Topology::new(SYSTEM_TOPOLOGY);
    topo.nodes = nodes;
    topo.links = links;
    topo
}

/// Bidirectional request endpoint for `port`, local id = port id
pub fn ep(port: &str) -> ServiceEndPoint {
    ServiceEndPoint::new(sip(port)).with_local_id(port)
}

/// Request endpoint for `port` with a requested direction
pub fn ep_dir(port: &str, direction: PortDirection) -> ServiceEndPoint {
    ep(port).with_direction(direction)
}

/// Ready-made topologies
pub mod topologies {
    use super::*;

    /// `n1:1` and `n2:1` connected by one link
    pub fn linked_pair(state: OperationalState) -> Topology {
        topology(
            vec![n("n1", &["n1:1"]), n("n2", &["n2:1"])],
            vec![l("n1:1", "n2:1", state)],
        )
    }

    /// Two nodes with no links between them
    pub fn isolated_nodes() -> Topology {
        topology(
            vec![
                n("n1", &["n1:1", "n1:2", "n1:3"]),
                n("n2", &["n2:1", "n2:2", "n2:3"]),
            ],
            vec![],
        )
    }

    /// Chain n1 - n2 - n3 over `n1:1-n2:1` and `n2:3-n3:3`
    pub fn three_node_chain(first_link: OperationalState) -> Topology {
        topology(
            vec![
                n("n1", &["n1:1", "n1:2", "n1:3"]),
                n("n2", &["n2:1", "n2:2", "n2:3"]),
                n("n3", &["n3:1", "n3:2", "n3:3"]),
            ],
            vec![
                l("n1:1", "n2:1", first_link),
                l("n2:3", "n3:3", OperationalState::Enabled),
            ],
        )
    }

    /// Directed chain where traffic can only flow from `n3:3` to `n1:2`
    ///
    /// - n1: `n1:1` in, `n1:2` out, `n1:3` in
    /// - n2: `n2:1` out, `n2:2` in
    /// - n3: `n3:1` out, `n3:2` out, `n3:3` in
    /// - links `n1:3-n2:1` and `n2:2-n3:1`
    pub fn directed_chain() -> Topology {
        use PortDirection::{Input, Output};
        topology(
            vec![
                n_directed("n1", &[("n1:1", Input), ("n1:2", Output), ("n1:3", Input)]),
                n_directed("n2", &[("n2:1", Output), ("n2:2", Input)]),
                n_directed("n3", &[("n3:1", Output), ("n3:2", Output), ("n3:3", Input)]),
            ],
            vec![
                l("n1:3", "n2:1", OperationalState::Enabled),
                l("n2:2", "n3:1", OperationalState::Enabled),
            ],
        )
    }

    /// Hub `n0` with one link to each of `n1`, `n2`, `n3`
    pub fn star() -> Topology {
        topology(
            vec![
                n("n0", &["n0:1", "n0:2", "n0:3"]),
                n("n1", &["n1:1", "n1:2"]),
                n("n2", &["n2:1", "n2:2"]),
                n("n3", &["n3:1", "n3:2"]),
            ],
            vec![
                l("n0:1", "n1:1", OperationalState::Enabled),
                l("n0:2", "n2:1", OperationalState::Enabled),
                l("n0:3", "n3:1", OperationalState::Enabled),
            ],
        )
    }
}
