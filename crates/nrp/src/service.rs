//! Connectivity service lifecycle on top of decomposition and activation.
//!
//! # Flows
//!
//! - create: validate, decompose, select and bind one driver per device,
//!   activate, persist
//! - update: validate against the stored service, drive the changed
//!   endpoint's device, persist
//! - delete: rebuild per-device drivers from the stored connections,
//!   deactivate, remove

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use unimgr_nrp_common::{
    BuilderContext, EndPoint, NepRef, NrpError, NrpResult, ServiceEndPoint, ServiceId, SubRequest,
};
use uuid::Uuid;

use crate::config::NrpConfig;
use crate::datastore::DataStore;
use crate::decomposer::{BasicDecomposer, RequestDecomposer};
use crate::driver_repo::ActivationDriverRepo;
use crate::model::{Connection, ConnectivityService, CreateServiceRequest};
use crate::transaction::ActivationTransaction;
use crate::validator::DefaultValidator;

pub struct ConnectivityServiceManager {
    store: Arc<dyn DataStore>,
    decomposer: Arc<dyn RequestDecomposer>,
    repo: Arc<ActivationDriverRepo>,
    validator: DefaultValidator,
    config: NrpConfig,
}

impl ConnectivityServiceManager {
    /// Creates a manager decomposing over the configured topology.
    pub fn new(store: Arc<dyn DataStore>, repo: Arc<ActivationDriverRepo>, config: NrpConfig) -> Self {
        let decomposer = Arc::new(BasicDecomposer::new(
            Arc::clone(&store),
            config.topology_id(),
        ));
        Self {
            store,
            decomposer,
            repo,
            validator: DefaultValidator::new(config.validation.clone()),
            config,
        }
    }

    pub fn with_decomposer(mut self, decomposer: Arc<dyn RequestDecomposer>) -> Self {
        self.decomposer = decomposer;
        self
    }

    pub fn repo(&self) -> &Arc<ActivationDriverRepo> {
        &self.repo
    }

    pub fn config(&self) -> &NrpConfig {
        &self.config
    }

    #[instrument(skip(self, request), fields(endpoints = request.endpoints.len()))]
    pub async fn create(&self, request: CreateServiceRequest) -> NrpResult<ConnectivityService> {
        self.validator.check_create(&request).into_result()?;

        let service_id = ServiceId::new(format!("cs:{}", Uuid::new_v4()));
        let service_type = request.effective_service_type();
        let context =
            BuilderContext::new(service_id.clone(), service_type).exclusive(request.exclusive);

        let Some(sub_requests) = self.decomposer.decompose(&request.endpoints).await? else {
            info!("No path between endpoints of {}, service not created", service_id);
            return Err(NrpError::no_path(
                "no path between the requested endpoints",
            ));
        };

        let mut tx = self.prepare(&sub_requests, &service_id, &context)?;
        let outcome = tx.activate().await?;
        if let Some(failure) = &outcome.failure {
            warn!(
                "Activation of {} failed on {}: {}",
                service_id, failure.driver, failure.error
            );
        }
        outcome.into_result()?;

        let service = ConnectivityService {
            connections: sub_requests
                .iter()
                .map(|s| Connection::from_sub_request(&service_id, s))
                .collect(),
            id: service_id,
            service_type,
            exclusive: request.exclusive,
            endpoints: request.endpoints,
            created_at: Utc::now(),
        };
        self.store.put_service(service.clone()).await?;

        info!(
            "Connectivity service {} created over {} devices",
            service.id,
            service.connections.len()
        );
        Ok(service)
    }

    #[instrument(skip(self, endpoint), fields(local_id = ?endpoint.local_id))]
    pub async fn update_endpoint(
        &self,
        service_id: &ServiceId,
        endpoint: ServiceEndPoint,
    ) -> NrpResult<ConnectivityService> {
        let mut service = self.require(service_id).await?;
        self.validator
            .check_update(&service, &endpoint)
            .into_result()?;

        let topology = self.store.read_topology(&self.config.topology_id()).await?;
        let (node, edge_point) = topology.find_sip(&endpoint.sip).ok_or_else(|| {
            NrpError::failure(format!(
                "Service interface point {} not found in the system",
                endpoint.sip
            ))
        })?;
        let sub_request = SubRequest::new(
            node.id.clone(),
            node.activation_driver_id.clone(),
            vec![EndPoint::new(endpoint.clone())
                .with_nep_ref(NepRef::new(node.id.clone(), edge_point.id.clone()))],
        );

        let context = BuilderContext::new(service.id.clone(), service.service_type)
            .exclusive(service.exclusive);
        let mut tx = self.prepare(&[sub_request], &service.id, &context)?;
        tx.update().await?.into_result()?;

        service.replace_endpoint(endpoint);
        self.store.put_service(service.clone()).await?;

        info!("Connectivity service {} updated", service.id);
        Ok(service)
    }

    /// Deactivates and removes a service, returning the removed record.
    #[instrument(skip(self))]
    pub async fn delete(&self, service_id: &ServiceId) -> NrpResult<ConnectivityService> {
        let service = self.require(service_id).await?;

        let sub_requests: Vec<SubRequest> = service
            .connections
            .iter()
            .map(Connection::to_sub_request)
            .collect();

        if sub_requests.is_empty() {
            warn!("Connectivity service {} has no connections", service.id);
        } else {
            let context = BuilderContext::new(service.id.clone(), service.service_type)
                .exclusive(service.exclusive);
            let mut tx = self.prepare(&sub_requests, &service.id, &context)?;
            tx.deactivate().await?.into_result()?;
        }

        self.store.remove_service(&service.id).await?;

        info!("Connectivity service {} deleted", service.id);
        Ok(service)
    }

    pub async fn get(&self, service_id: &ServiceId) -> NrpResult<Option<ConnectivityService>> {
        self.store.get_service(service_id).await
    }

    pub async fn list(&self) -> NrpResult<Vec<ConnectivityService>> {
        self.store.list_services().await
    }

    async fn require(&self, service_id: &ServiceId) -> NrpResult<ConnectivityService> {
        self.store.get_service(service_id).await?.ok_or_else(|| {
            NrpError::failure(format!("Connectivity service {} does not exist", service_id))
        })
    }

    /// Selects and binds one driver per sub-request.
    fn prepare(
        &self,
        sub_requests: &[SubRequest],
        service_id: &ServiceId,
        context: &BuilderContext,
    ) -> NrpResult<ActivationTransaction> {
        let mut tx = ActivationTransaction::from_config(&self.config);
        for sub in sub_requests {
            let mut driver = self.repo.get_driver(sub, context)?;
            driver
                .initialize(&sub.endpoints, service_id, context)
                .map_err(|source| NrpError::DriverInitialization {
                    node: sub.node_id.to_string(),
                    source,
                })?;
            tx.add_driver(driver)?;
        }
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use unimgr_nrp_common::{Topology, TopologyId};
    use unimgr_nrp_test::{ep, CallLog, RecordingBuilder};

    mock! {
        Store {}

        #[async_trait]
        impl DataStore for Store {
            async fn read_topology(&self, id: &TopologyId) -> NrpResult<Topology>;
            async fn write_topology(&self, topology: Topology) -> NrpResult<()>;
            async fn put_service(&self, service: ConnectivityService) -> NrpResult<()>;
            async fn get_service(&self, id: &ServiceId) -> NrpResult<Option<ConnectivityService>>;
            async fn remove_service(&self, id: &ServiceId) -> NrpResult<Option<ConnectivityService>>;
            async fn list_services(&self) -> NrpResult<Vec<ConnectivityService>>;
            fn version(&self) -> u64;
        }
    }

    fn manager(store: MockStore, log: &CallLog) -> ConnectivityServiceManager {
        let repo = Arc::new(ActivationDriverRepo::new());
        repo.register(Arc::new(RecordingBuilder::new("rec", log.clone())));
        ConnectivityServiceManager::new(Arc::new(store), repo, NrpConfig::default())
    }

    #[tokio::test]
    async fn test_unreadable_topology_aborts_create() {
        let mut store = MockStore::new();
        store
            .expect_read_topology()
            .times(1)
            .returning(|id| Err(NrpError::topology_unavailable(id.as_str(), "read failed")));
        store.expect_put_service().times(0);
        let log = CallLog::new();

        let err = manager(store, &log)
            .create(CreateServiceRequest::new(vec![ep("n1:1"), ep("n2:1")]))
            .await
            .unwrap_err();

        assert!(matches!(err, NrpError::TopologyUnavailable { .. }));
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request_never_reads_store() {
        let mut store = MockStore::new();
        store.expect_read_topology().times(0);
        let log = CallLog::new();

        let err = manager(store, &log)
            .create(CreateServiceRequest::new(vec![ep("n1:1"), ep("n1:1")]))
            .await
            .unwrap_err();

        assert!(matches!(err, NrpError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_delete_unknown_service() {
        let mut store = MockStore::new();
        store.expect_get_service().returning(|_| Ok(None));
        store.expect_remove_service().times(0);
        let log = CallLog::new();

        let err = manager(store, &log)
            .delete(&ServiceId::new("cs:missing"))
            .await
            .unwrap_err();

        assert!(matches!(err, NrpError::FailureResult { .. }));
    }

    #[tokio::test]
    async fn test_delete_without_connections_only_removes() {
        let stored = ConnectivityService {
            id: ServiceId::new("cs:1"),
            service_type: Default::default(),
            exclusive: false,
            endpoints: vec![],
            connections: vec![],
            created_at: Utc::now(),
        };
        let mut store = MockStore::new();
        let found = stored.clone();
        store
            .expect_get_service()
            .returning(move |_| Ok(Some(found.clone())));
        let removed = stored.clone();
        store
            .expect_remove_service()
            .times(1)
            .returning(move |_| Ok(Some(removed.clone())));
        let log = CallLog::new();

        let deleted = manager(store, &log).delete(&stored.id).await.unwrap();

        assert_eq!(deleted, stored);
        assert!(log.is_empty());
    }
}
