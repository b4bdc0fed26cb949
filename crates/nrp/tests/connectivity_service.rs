//! Connectivity service lifecycle against an in-memory store

use pretty_assertions::assert_eq;
use std::sync::Arc;
use unimgr_nrp::{
    ActivationDriverRepo, ConnectivityServiceManager, CreateServiceRequest, InMemoryDataStore,
    NrpConfig,
};
use unimgr_nrp_common::{NrpError, OperationalState, ServiceType, Topology};
use unimgr_nrp_test::{
    ep, init_test_logging, topologies, CallLog, CallLogVerifier, DriverOp, RecordingBuilder,
};

fn manager(topo: Topology, builder: RecordingBuilder) -> ConnectivityServiceManager {
    init_test_logging();
    let repo = Arc::new(ActivationDriverRepo::new());
    repo.register(Arc::new(builder));
    ConnectivityServiceManager::new(
        Arc::new(InMemoryDataStore::with_topology(topo)),
        repo,
        NrpConfig::default(),
    )
}

fn chain_request() -> CreateServiceRequest {
    CreateServiceRequest::new(vec![ep("n1:2"), ep("n3:2")])
}

#[tokio::test]
async fn test_create_activates_and_stores() {
    let log = CallLog::new();
    let mgr = manager(
        topologies::three_node_chain(OperationalState::Enabled),
        RecordingBuilder::new("rec", log.clone()),
    );

    let service = mgr.create(chain_request()).await.unwrap();

    assert!(service.id.as_str().starts_with("cs:"));
    assert_eq!(service.service_type, ServiceType::PointToPoint);
    assert_eq!(service.connections.len(), 3);
    CallLogVerifier::new(&log)
        .assert_committed(&["rec@n1", "rec@n2", "rec@n3"])
        .unwrap();

    assert_eq!(mgr.get(&service.id).await.unwrap(), Some(service.clone()));
    assert_eq!(mgr.list().await.unwrap(), vec![service]);
}

#[tokio::test]
async fn test_create_multipoint() {
    let log = CallLog::new();
    let mgr = manager(topologies::star(), RecordingBuilder::new("rec", log.clone()));

    let service = mgr
        .create(CreateServiceRequest::new(vec![
            ep("n1:2"),
            ep("n2:2"),
            ep("n3:2"),
        ]))
        .await
        .unwrap();

    assert_eq!(service.service_type, ServiceType::MultiPoint);
    assert_eq!(service.connections.len(), 4);
}

#[tokio::test]
async fn test_create_without_path_touches_no_device() {
    let log = CallLog::new();
    let mgr = manager(
        topologies::isolated_nodes(),
        RecordingBuilder::new("rec", log.clone()),
    );

    let err = mgr
        .create(CreateServiceRequest::new(vec![ep("n1:1"), ep("n2:1")]))
        .await
        .unwrap_err();

    assert!(matches!(err, NrpError::NoPath { .. }));
    assert!(!err.is_caller_error());
    assert!(log.is_empty());
    assert!(mgr.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_with_unknown_endpoint_is_caller_error() {
    let log = CallLog::new();
    let mgr = manager(
        topologies::isolated_nodes(),
        RecordingBuilder::new("rec", log.clone()),
    );

    let err = mgr
        .create(CreateServiceRequest::new(vec![ep("n1:1"), ep("n9:1")]))
        .await
        .unwrap_err();

    assert!(matches!(err, NrpError::FailureResult { .. }));
    assert!(err.is_caller_error());
    assert!(log.is_empty());
}

#[tokio::test]
async fn test_create_rejects_shared_sip() {
    let log = CallLog::new();
    let mgr = manager(
        topologies::linked_pair(OperationalState::Enabled),
        RecordingBuilder::new("rec", log.clone()),
    );

    let err = mgr
        .create(CreateServiceRequest::new(vec![
            ep("n1:1"),
            ep("n1:1").with_local_id("other"),
            ep("n2:1"),
        ]))
        .await
        .unwrap_err();

    assert!(matches!(err, NrpError::Validation { .. }));
    assert!(log.is_empty());
    assert!(mgr.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_rolls_back_on_device_failure() {
    let log = CallLog::new();
    let mgr = manager(
        topologies::three_node_chain(OperationalState::Enabled),
        RecordingBuilder::new("rec", log.clone()).failing_on_node("n3", DriverOp::Activate),
    );

    let err = mgr.create(chain_request()).await.unwrap_err();

    assert!(matches!(
        err,
        NrpError::ActivationFailed {
            driver_index: 2,
            ..
        }
    ));
    CallLogVerifier::new(&log)
        .assert_rolled_back(&["rec@n1", "rec@n2", "rec@n3"])
        .unwrap();
    assert!(mgr.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_with_ambiguous_drivers() {
    let log = CallLog::new();
    let mgr = manager(
        topologies::linked_pair(OperationalState::Enabled),
        RecordingBuilder::new("a", log.clone()),
    );
    mgr.repo()
        .register(Arc::new(RecordingBuilder::new("b", log.clone())));

    let err = mgr
        .create(CreateServiceRequest::new(vec![ep("n1:1"), ep("n2:1")]))
        .await
        .unwrap_err();

    assert!(matches!(err, NrpError::DriverAmbiguous { .. }));
    assert!(log.is_empty());
}

#[tokio::test]
async fn test_create_rejects_invalid_request() {
    let log = CallLog::new();
    let mgr = manager(
        topologies::linked_pair(OperationalState::Enabled),
        RecordingBuilder::new("rec", log.clone()),
    );

    let err = mgr
        .create(CreateServiceRequest::new(vec![ep("n1:1")]))
        .await
        .unwrap_err();

    assert!(matches!(err, NrpError::Validation { .. }));
    assert!(log.is_empty());
}

#[tokio::test]
async fn test_update_endpoint_drives_one_device() {
    let log = CallLog::new();
    let mgr = manager(
        topologies::three_node_chain(OperationalState::Enabled),
        RecordingBuilder::new("rec", log.clone()),
    );
    let service = mgr.create(chain_request()).await.unwrap();
    log.clear();

    let updated = mgr
        .update_endpoint(&service.id, ep("n3:2").with_attr("vlan", "100"))
        .await
        .unwrap();

    let verifier = CallLogVerifier::new(&log);
    verifier.assert_order(DriverOp::Update, &["rec@n3"]).unwrap();
    verifier.assert_committed(&["rec@n3"]).unwrap();

    let stored = mgr.get(&service.id).await.unwrap().unwrap();
    assert_eq!(stored, updated);
    let attrs = stored.endpoint("n3:2").and_then(|e| e.attrs.clone()).unwrap();
    assert_eq!(attrs.get("vlan").map(String::as_str), Some("100"));
}

#[tokio::test]
async fn test_update_endpoint_with_changed_sip_rejected() {
    let log = CallLog::new();
    let mgr = manager(
        topologies::three_node_chain(OperationalState::Enabled),
        RecordingBuilder::new("rec", log.clone()),
    );
    let service = mgr.create(chain_request()).await.unwrap();
    log.clear();

    let moved = ep("n3:1").with_local_id("n3:2");
    let err = mgr.update_endpoint(&service.id, moved).await.unwrap_err();

    assert!(matches!(err, NrpError::Validation { .. }));
    assert!(log.is_empty());
    assert_eq!(mgr.get(&service.id).await.unwrap(), Some(service));
}

#[tokio::test]
async fn test_delete_deactivates_and_removes() {
    let log = CallLog::new();
    let mgr = manager(
        topologies::three_node_chain(OperationalState::Enabled),
        RecordingBuilder::new("rec", log.clone()),
    );
    let service = mgr.create(chain_request()).await.unwrap();
    log.clear();

    let deleted = mgr.delete(&service.id).await.unwrap();

    assert_eq!(deleted.id, service.id);
    let verifier = CallLogVerifier::new(&log);
    verifier
        .assert_order(DriverOp::Deactivate, &["rec@n1", "rec@n2", "rec@n3"])
        .unwrap();
    verifier
        .assert_committed(&["rec@n1", "rec@n2", "rec@n3"])
        .unwrap();
    assert_eq!(mgr.get(&service.id).await.unwrap(), None);

    let err = mgr.delete(&service.id).await.unwrap_err();
    assert!(matches!(err, NrpError::FailureResult { .. }));
}
