//! Data store contract and an in-memory implementation.
//!
//! Every read hands out an owned snapshot, so a decomposition run sees one
//! consistent topology even if the store is written concurrently.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;
use unimgr_nrp_common::{NrpError, NrpResult, ServiceId, Topology, TopologyId};

use crate::model::ConnectivityService;

/// Storage for topologies and activated services.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Reads a topology snapshot. A missing topology is `TopologyUnavailable`.
    async fn read_topology(&self, id: &TopologyId) -> NrpResult<Topology>;

    async fn write_topology(&self, topology: Topology) -> NrpResult<()>;

    async fn put_service(&self, service: ConnectivityService) -> NrpResult<()>;

    async fn get_service(&self, id: &ServiceId) -> NrpResult<Option<ConnectivityService>>;

    /// Removes a service, returning the removed record.
    async fn remove_service(&self, id: &ServiceId) -> NrpResult<Option<ConnectivityService>>;

    async fn list_services(&self) -> NrpResult<Vec<ConnectivityService>>;

    /// Monotonic counter bumped on every write.
    fn version(&self) -> u64;
}

#[derive(Debug, Default)]
struct StoreState {
    topologies: BTreeMap<TopologyId, Topology>,
    services: BTreeMap<ServiceId, ConnectivityService>,
    version: u64,
}

/// Process-local data store.
#[derive(Debug, Default)]
pub struct InMemoryDataStore {
    state: RwLock<StoreState>,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with one topology.
    pub fn with_topology(topology: Topology) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write();
            state.topologies.insert(topology.id.clone(), topology);
            state.version = 1;
        }
        store
    }

    /// Creates a store seeded with a topology read from a JSON file.
    pub fn from_topology_file(path: impl AsRef<Path>) -> NrpResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let topology: Topology = serde_json::from_str(&content).map_err(|e| {
            NrpError::topology_unavailable(
                path.display().to_string(),
                format!("Failed to parse topology file: {}", e),
            )
        })?;
        Ok(Self::with_topology(topology))
    }
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    async fn read_topology(&self, id: &TopologyId) -> NrpResult<Topology> {
        self.state
            .read()
            .topologies
            .get(id)
            .cloned()
            .ok_or_else(|| NrpError::topology_unavailable(id.as_str(), "topology not found"))
    }

    async fn write_topology(&self, topology: Topology) -> NrpResult<()> {
        let mut state = self.state.write();
        debug!("Writing topology {}", topology.id);
        state.topologies.insert(topology.id.clone(), topology);
        state.version += 1;
        Ok(())
    }

    async fn put_service(&self, service: ConnectivityService) -> NrpResult<()> {
        let mut state = self.state.write();
        debug!("Storing connectivity service {}", service.id);
        state.services.insert(service.id.clone(), service);
        state.version += 1;
        Ok(())
    }

    async fn get_service(&self, id: &ServiceId) -> NrpResult<Option<ConnectivityService>> {
        Ok(self.state.read().services.get(id).cloned())
    }

    async fn remove_service(&self, id: &ServiceId) -> NrpResult<Option<ConnectivityService>> {
        let mut state = self.state.write();
        let removed = state.services.remove(id);
        if removed.is_some() {
            debug!("Removed connectivity service {}", id);
            state.version += 1;
        }
        Ok(removed)
    }

    async fn list_services(&self) -> NrpResult<Vec<ConnectivityService>> {
        Ok(self.state.read().services.values().cloned().collect())
    }

    fn version(&self) -> u64 {
        self.state.read().version
    }
}
