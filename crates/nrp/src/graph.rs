//! Directed port graph built from a topology snapshot.
//!
//! Every usable edge point is a vertex. Two kinds of edges exist:
//!
//! - intra-node: from every input-capable port to every other output-capable
//!   port of the same node (the device can cross-connect them)
//! - link: from the output-capable side of an enabled link to its
//!   input-capable side (egress of one device feeds ingress of the next)

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::hash::{Hash, Hasher};

use tracing::{debug, warn};
use unimgr_nrp_common::{
    EdgePointId, NepRef, Node, NodeId, NrpError, NrpResult, PortDirection, SipId, Topology,
};

/// A port in the graph.
///
/// Equality and hashing use the edge point id only.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub node_id: NodeId,
    pub edge_point_id: EdgePointId,
    pub sip: Option<SipId>,
    pub direction: PortDirection,
    pub activation_driver_id: String,
}

impl Vertex {
    pub fn nep_ref(&self) -> NepRef {
        NepRef {
            node_id: self.node_id.clone(),
            edge_point_id: self.edge_point_id.clone(),
        }
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.edge_point_id == other.edge_point_id
    }
}

impl Eq for Vertex {}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.edge_point_id.hash(state);
    }
}

/// Read-only directed graph of ports for one decomposition run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyGraph {
    vertices: BTreeMap<EdgePointId, Vertex>,
    sip_index: BTreeMap<SipId, EdgePointId>,
    adjacency: BTreeMap<EdgePointId, BTreeSet<EdgePointId>>,
}

impl TopologyGraph {
    /// Builds the graph from a topology snapshot.
    pub fn build(topology: &Topology) -> NrpResult<Self> {
        if topology.nodes.is_empty() {
            return Err(NrpError::failure(format!(
                "There are no nodes in {} topology",
                topology.id
            )));
        }

        let mut graph = Self::default();

        for node in &topology.nodes {
            let vertices = node_vertices(node);
            let ids: Vec<EdgePointId> = vertices.iter().map(|v| v.edge_point_id.clone()).collect();
            for vertex in vertices {
                graph.add_vertex(vertex);
            }
            graph.interconnect_node(&ids);
        }

        for link in topology.links.iter().filter(|l| l.is_enabled()) {
            // edge points that never became vertices are skipped
            let ids: Vec<EdgePointId> = link
                .edge_points
                .iter()
                .filter(|r| graph.vertices.contains_key(&r.edge_point_id))
                .map(|r| r.edge_point_id.clone())
                .collect();
            graph.interconnect_link(&ids);
        }

        debug!(
            "Built graph for topology {}: {} vertices, {} edges",
            topology.id,
            graph.vertex_count(),
            graph.edge_count()
        );

        Ok(graph)
    }

    fn add_vertex(&mut self, vertex: Vertex) {
        if self.vertices.contains_key(&vertex.edge_point_id) {
            warn!(
                "Edge point {} is owned by more than one node, keeping the first",
                vertex.edge_point_id
            );
            return;
        }
        if let Some(sip) = &vertex.sip {
            match self.sip_index.get(sip) {
                Some(existing) => warn!(
                    "Service interface point {} already mapped to {}, ignoring {}",
                    sip, existing, vertex.edge_point_id
                ),
                None => {
                    self.sip_index
                        .insert(sip.clone(), vertex.edge_point_id.clone());
                }
            }
        }
        self.adjacency
            .insert(vertex.edge_point_id.clone(), BTreeSet::new());
        self.vertices.insert(vertex.edge_point_id.clone(), vertex);
    }

    fn interconnect_node(&mut self, ids: &[EdgePointId]) {
        let (inputs, outputs) = self.split_by_capability(ids);
        self.interconnect(&inputs, &outputs);
    }

    fn interconnect_link(&mut self, ids: &[EdgePointId]) {
        let (inputs, outputs) = self.split_by_capability(ids);
        self.interconnect(&outputs, &inputs);
    }

    fn split_by_capability(&self, ids: &[EdgePointId]) -> (Vec<EdgePointId>, Vec<EdgePointId>) {
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for id in ids {
            if let Some(v) = self.vertices.get(id) {
                if v.direction.is_input_capable() {
                    inputs.push(id.clone());
                }
                if v.direction.is_output_capable() {
                    outputs.push(id.clone());
                }
            }
        }
        (inputs, outputs)
    }

    fn interconnect(&mut self, from: &[EdgePointId], to: &[EdgePointId]) {
        for f in from {
            for t in to.iter().filter(|t| *t != f) {
                if let Some(targets) = self.adjacency.get_mut(f) {
                    targets.insert(t.clone());
                }
            }
        }
    }

    pub fn vertex(&self, id: &EdgePointId) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    /// Returns the vertex a service interface point maps to.
    pub fn vertex_for_sip(&self, sip: &SipId) -> Option<&Vertex> {
        self.sip_index.get(sip).and_then(|id| self.vertices.get(id))
    }

    /// Vertices ordered by edge point id.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum()
    }

    pub fn has_edge(&self, from: &EdgePointId, to: &EdgePointId) -> bool {
        self.adjacency
            .get(from)
            .map(|targets| targets.contains(to))
            .unwrap_or(false)
    }

    /// All directed edges ordered by source then target.
    pub fn edges(&self) -> impl Iterator<Item = (&EdgePointId, &EdgePointId)> {
        self.adjacency
            .iter()
            .flat_map(|(from, targets)| targets.iter().map(move |to| (from, to)))
    }

    /// Shortest path from `from` to `to`, both ends included.
    ///
    /// All edges weigh the same, so breadth-first search is exact. Neighbors
    /// are visited in id order, which makes the chosen path deterministic.
    pub fn shortest_path(&self, from: &EdgePointId, to: &EdgePointId) -> Option<Vec<Vertex>> {
        if !self.vertices.contains_key(from) || !self.vertices.contains_key(to) {
            return None;
        }

        let mut parents: BTreeMap<&EdgePointId, &EdgePointId> = BTreeMap::new();
        let mut visited: BTreeSet<&EdgePointId> = BTreeSet::new();
        let mut queue = VecDeque::new();
        visited.insert(from);
        queue.push_back(from);

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![current];
                let mut cursor = current;
                while let Some(parent) = parents.get(cursor) {
                    path.push(parent);
                    cursor = parent;
                }
                path.reverse();
                return Some(
                    path.into_iter()
                        .filter_map(|id| self.vertices.get(id).cloned())
                        .collect(),
                );
            }
            if let Some(targets) = self.adjacency.get(current) {
                for next in targets {
                    if visited.insert(next) {
                        parents.insert(next, current);
                        queue.push_back(next);
                    }
                }
            }
        }

        None
    }
}

fn node_vertices(node: &Node) -> Vec<Vertex> {
    node.edge_points
        .iter()
        .filter(|ep| ep.direction != PortDirection::Unknown)
        .map(|ep| {
            if ep.mapped_sips.len() > 1 {
                warn!(
                    "NodeEdgePoint {} has multiple ServiceInterfacePoints mapped, selecting first one",
                    ep.id
                );
            }
            Vertex {
                node_id: node.id.clone(),
                edge_point_id: ep.id.clone(),
                sip: ep.mapped_sips.first().cloned(),
                direction: ep.direction,
                activation_driver_id: node.activation_driver_id.clone(),
            }
        })
        .collect()
}
