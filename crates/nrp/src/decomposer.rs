//! Request decomposition.
//!
//! Splits a multi-endpoint request into one [`SubRequest`] per device by
//! searching the port graph for a path between every input-role and every
//! output-role endpoint. A request that cannot be connected yields `Ok(None)`.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use unimgr_nrp_common::{
    EdgePointId, EndPoint, NodeId, NrpError, NrpResult, PortDirection, ServiceEndPoint,
    SubRequest, Topology, TopologyId,
};

use crate::datastore::DataStore;
use crate::graph::{TopologyGraph, Vertex};

/// Decomposes a request into per-device sub-requests.
#[async_trait]
pub trait RequestDecomposer: Send + Sync {
    /// Returns `Ok(None)` when the endpoints cannot be interconnected.
    async fn decompose(&self, endpoints: &[ServiceEndPoint]) -> NrpResult<Option<Vec<SubRequest>>>;
}

/// Decomposer reading the topology from a data store on every call.
pub struct BasicDecomposer {
    store: Arc<dyn DataStore>,
    topology_id: TopologyId,
}

impl BasicDecomposer {
    pub fn new(store: Arc<dyn DataStore>, topology_id: impl Into<TopologyId>) -> Self {
        Self {
            store,
            topology_id: topology_id.into(),
        }
    }

    pub fn topology_id(&self) -> &TopologyId {
        &self.topology_id
    }
}

#[async_trait]
impl RequestDecomposer for BasicDecomposer {
    #[instrument(skip(self, endpoints), fields(topology = %self.topology_id, endpoints = endpoints.len()))]
    async fn decompose(&self, endpoints: &[ServiceEndPoint]) -> NrpResult<Option<Vec<SubRequest>>> {
        let action = DecompositionAction::new(endpoints)?;
        let topology = self.store.read_topology(&self.topology_id).await?;
        action.decompose(&topology)
    }
}

/// A resolved request endpoint: the graph vertex plus the direction asked for.
struct RequestedVertex<'g> {
    vertex: &'g Vertex,
    requested: PortDirection,
}

/// One decomposition run over a topology snapshot.
pub struct DecompositionAction<'a> {
    endpoints: &'a [ServiceEndPoint],
}

impl<'a> DecompositionAction<'a> {
    /// Fails with `IllegalArgument` when fewer than two endpoints are given.
    pub fn new(endpoints: &'a [ServiceEndPoint]) -> NrpResult<Self> {
        if endpoints.len() < 2 {
            return Err(NrpError::illegal_argument(
                "there should be at least two endpoints defined",
            ));
        }
        Ok(Self { endpoints })
    }

    pub fn decompose(&self, topology: &Topology) -> NrpResult<Option<Vec<SubRequest>>> {
        let graph = TopologyGraph::build(topology)?;

        let missing: BTreeSet<&str> = self
            .endpoints
            .iter()
            .filter(|e| graph.vertex_for_sip(&e.sip).is_none())
            .map(|e| e.sip.as_str())
            .collect();
        if !missing.is_empty() {
            let list: Vec<&str> = missing.into_iter().collect();
            return Err(NrpError::failure(format!(
                "Some service interface points not found in the system: [{}]",
                list.join(",")
            )));
        }

        let requested = self.resolve(&graph)?;
        self.check_shared_sips()?;

        let inputs: Vec<&RequestedVertex> = requested
            .iter()
            .filter(|r| r.requested.is_input_capable())
            .collect();
        let outputs: Vec<&RequestedVertex> = requested
            .iter()
            .filter(|r| r.requested.is_output_capable())
            .collect();

        let mut paths = Vec::new();
        for i in &inputs {
            for o in outputs
                .iter()
                .filter(|o| o.vertex.edge_point_id != i.vertex.edge_point_id)
            {
                match graph.shortest_path(&i.vertex.edge_point_id, &o.vertex.edge_point_id) {
                    Some(path) => {
                        debug!(
                            "Path between {} and {} has {} hops",
                            i.vertex.edge_point_id,
                            o.vertex.edge_point_id,
                            path.len()
                        );
                        paths.push(path);
                    }
                    None => {
                        debug!(
                            "Couldn't find path between {} and {}",
                            i.vertex.edge_point_id, o.vertex.edge_point_id
                        );
                        info!("At least single path between endpoints not found");
                        return Ok(None);
                    }
                }
            }
        }

        let result = self.to_sub_requests(paths);
        if result.is_empty() {
            info!("Decomposition produced no sub-requests");
            return Ok(None);
        }

        debug!("Decomposed request into {} sub-requests", result.len());
        Ok(Some(result))
    }

    fn resolve<'g>(&self, graph: &'g TopologyGraph) -> NrpResult<Vec<RequestedVertex<'g>>> {
        self.endpoints
            .iter()
            .map(|e| {
                let vertex = graph.vertex_for_sip(&e.sip).ok_or_else(|| {
                    NrpError::failure(format!("Service interface point {} not found", e.sip))
                })?;
                if e.direction == PortDirection::Unknown {
                    return Err(NrpError::illegal_argument(format!(
                        "Port direction for {} not specified",
                        e.local_id.as_deref().unwrap_or(e.sip.as_str())
                    )));
                }
                if !vertex.direction.accepts(e.direction) {
                    return Err(NrpError::illegal_argument(format!(
                        "Port direction for {} incompatible with NEP. CEP {} NEP {}",
                        e.local_id.as_deref().unwrap_or(e.sip.as_str()),
                        e.direction,
                        vertex.direction
                    )));
                }
                Ok(RequestedVertex {
                    vertex,
                    requested: e.direction,
                })
            })
            .collect()
    }

    /// Distinct endpoints naming one sip would collapse onto a single vertex.
    /// Repeating the identical endpoint is left to the path search.
    fn check_shared_sips(&self) -> NrpResult<()> {
        for (i, e) in self.endpoints.iter().enumerate() {
            if self.endpoints[..i].iter().any(|o| o.sip == e.sip && o != e) {
                return Err(NrpError::illegal_argument(format!(
                    "Service interface point {} requested by more than one endpoint",
                    e.sip
                )));
            }
        }
        Ok(())
    }

    /// Groups path vertices by node; one endpoint per edge point.
    fn to_sub_requests(&self, paths: Vec<Vec<Vertex>>) -> Vec<SubRequest> {
        let mut groups: BTreeMap<NodeId, (String, BTreeMap<EdgePointId, EndPoint>)> =
            BTreeMap::new();

        for vertex in paths.into_iter().flatten() {
            let (_, endpoints) = groups
                .entry(vertex.node_id.clone())
                .or_insert_with(|| (vertex.activation_driver_id.clone(), BTreeMap::new()));
            if !endpoints.contains_key(&vertex.edge_point_id) {
                endpoints.insert(vertex.edge_point_id.clone(), self.to_end_point(&vertex));
            }
        }

        groups
            .into_iter()
            .map(|(node_id, (driver_id, endpoints))| {
                SubRequest::new(node_id, driver_id, endpoints.into_values().collect())
            })
            .collect()
    }

    fn to_end_point(&self, vertex: &Vertex) -> EndPoint {
        let matched = vertex
            .sip
            .as_ref()
            .and_then(|sip| self.endpoints.iter().find(|e| &e.sip == sip));
        match matched {
            Some(e) => EndPoint::new(e.clone()).with_nep_ref(vertex.nep_ref()),
            None => EndPoint::synthetic(vertex.nep_ref()),
        }
    }
}
