//! Driver selection and transactional activation of decomposed requests

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use unimgr_nrp::{
    ActivationDriverRepo, ActivationTransaction, BasicDecomposer, InMemoryDataStore,
    RequestDecomposer, RollbackOrder, TxState,
};
use unimgr_nrp_common::{
    BuilderContext, NrpError, OperationalState, ServiceId, ServiceType, SubRequest, Topology,
    SYSTEM_TOPOLOGY,
};
use unimgr_nrp_test::{
    ep, init_test_logging, l, n_with_driver, topologies, topology, CallLog, CallLogVerifier,
    DriverOp, RecordingBuilder, RecordingDriver, TargetKind,
};

async fn sub_requests(topo: Topology, eps: &[&str]) -> Vec<SubRequest> {
    init_test_logging();
    let eps: Vec<_> = eps.iter().map(|p| ep(p)).collect();
    BasicDecomposer::new(Arc::new(InMemoryDataStore::with_topology(topo)), SYSTEM_TOPOLOGY)
        .decompose(&eps)
        .await
        .unwrap()
        .unwrap()
}

fn context() -> BuilderContext {
    BuilderContext::new("cs:test", ServiceType::PointToPoint)
}

fn build_transaction(
    repo: &ActivationDriverRepo,
    subs: &[SubRequest],
) -> Result<ActivationTransaction, NrpError> {
    let ctx = context();
    let mut tx = ActivationTransaction::new();
    for sub in subs {
        let mut driver = repo.get_driver(sub, &ctx)?;
        driver
            .initialize(&sub.endpoints, &ServiceId::new("cs:test"), &ctx)
            .unwrap();
        tx.add_driver(driver)?;
    }
    Ok(tx)
}

#[tokio::test]
async fn test_chain_activates_every_device() {
    let log = CallLog::new();
    let repo = ActivationDriverRepo::new();
    repo.register(Arc::new(RecordingBuilder::new("rec", log.clone())));

    let subs = sub_requests(
        topologies::three_node_chain(OperationalState::Enabled),
        &["n1:2", "n3:2"],
    )
    .await;
    let mut tx = build_transaction(&repo, &subs).unwrap();

    let outcome = tx.activate().await.unwrap();

    assert!(outcome.is_committed());
    let drivers = ["rec@n1", "rec@n2", "rec@n3"];
    let verifier = CallLogVerifier::new(&log);
    verifier.assert_order(DriverOp::Activate, &drivers).unwrap();
    verifier.assert_committed(&drivers).unwrap();
    for d in drivers {
        verifier.assert_count(d, DriverOp::Initialize, 1).unwrap();
    }
}

#[tokio::test]
async fn test_device_failure_rolls_back_every_device() {
    let log = CallLog::new();
    let repo = ActivationDriverRepo::new();
    repo.register(Arc::new(
        RecordingBuilder::new("rec", log.clone()).failing_on_node("n2", DriverOp::Activate),
    ));

    let subs = sub_requests(
        topologies::three_node_chain(OperationalState::Enabled),
        &["n1:2", "n3:2"],
    )
    .await;
    let mut tx = build_transaction(&repo, &subs).unwrap();

    let outcome = tx.activate().await.unwrap();

    assert_eq!(outcome.state, TxState::RolledBack);
    assert_eq!(outcome.failure.as_ref().map(|f| f.driver.as_str()), Some("rec@n2"));
    let verifier = CallLogVerifier::new(&log);
    verifier
        .assert_order(DriverOp::Activate, &["rec@n1", "rec@n2"])
        .unwrap();
    verifier
        .assert_rolled_back(&["rec@n1", "rec@n2", "rec@n3"])
        .unwrap();
}

#[tokio::test]
async fn test_priorities_across_driver_families() {
    let log = CallLog::new();
    let repo = ActivationDriverRepo::new();
    repo.register(Arc::new(
        RecordingBuilder::new("late", log.clone())
            .for_driver_id("d1")
            .with_priority(10),
    ));
    repo.register(Arc::new(
        RecordingBuilder::new("early", log.clone())
            .for_driver_id("d2")
            .with_priority(0),
    ));

    let topo = topology(
        vec![
            n_with_driver("n1", "d1", &["n1:1", "n1:2"]),
            n_with_driver("n2", "d2", &["n2:1", "n2:2"]),
        ],
        vec![l("n1:1", "n2:1", OperationalState::Enabled)],
    );
    let subs = sub_requests(topo, &["n1:2", "n2:2"]).await;
    let mut tx = build_transaction(&repo, &subs).unwrap();

    tx.activate().await.unwrap();

    CallLogVerifier::new(&log)
        .assert_order(DriverOp::Activate, &["early@n2", "late@n1"])
        .unwrap();
}

#[tokio::test]
async fn test_ambiguous_builders_stop_selection() {
    let repo = ActivationDriverRepo::new();
    repo.register(Arc::new(RecordingBuilder::new("a", CallLog::new())));
    repo.register(Arc::new(RecordingBuilder::new("b", CallLog::new())));

    let subs = sub_requests(
        topologies::linked_pair(OperationalState::Enabled),
        &["n1:1", "n2:1"],
    )
    .await;
    let err = build_transaction(&repo, &subs).err().unwrap();

    assert!(err.is_driver_selection_error());
    assert!(matches!(err, NrpError::DriverAmbiguous { candidates: 2, .. }));
}

#[tokio::test]
async fn test_missing_builder_for_pair() {
    let repo = ActivationDriverRepo::new();
    repo.register(Arc::new(
        RecordingBuilder::new("single-only", CallLog::new()).answering(&[TargetKind::SinglePort]),
    ));

    let subs = sub_requests(
        topologies::three_node_chain(OperationalState::Enabled),
        &["n1:2", "n3:2"],
    )
    .await;
    let err = build_transaction(&repo, &subs).err().unwrap();

    assert!(matches!(err, NrpError::DriverNotFound { .. }));
}

#[tokio::test]
async fn test_priority_scenario_with_reverse_rollback() {
    let log = CallLog::new();
    let mut tx = ActivationTransaction::new().with_rollback_order(RollbackOrder::Reverse);
    for (name, priority) in [("p10", 10), ("p0", 0), ("p5", 5)] {
        let mut driver = RecordingDriver::new(name, log.clone()).with_priority(priority);
        if priority == 0 {
            driver = driver.failing_on(DriverOp::Activate);
        }
        tx.add_driver(Box::new(driver)).unwrap();
    }

    let outcome = tx.activate().await.unwrap();

    assert_eq!(outcome.state, TxState::RolledBack);
    let verifier = CallLogVerifier::new(&log);
    verifier.assert_order(DriverOp::Activate, &["p0"]).unwrap();
    verifier
        .assert_order(DriverOp::Rollback, &["p10", "p5", "p0"])
        .unwrap();
    verifier.assert_none(DriverOp::Commit).unwrap();
}

#[tokio::test]
async fn test_stuck_device_times_out() {
    let log = CallLog::new();
    let mut tx =
        ActivationTransaction::new().with_driver_timeout(Some(Duration::from_millis(10)));
    tx.add_driver(Box::new(RecordingDriver::new("ok", log.clone())))
        .unwrap();
    tx.add_driver(Box::new(
        RecordingDriver::new("stuck", log.clone())
            .with_priority(1)
            .with_delay(Duration::from_secs(10)),
    ))
    .unwrap();

    let err = tx.activate().await.unwrap().into_result().unwrap_err();

    match err {
        NrpError::ActivationFailed {
            driver_index,
            source,
        } => {
            assert_eq!(driver_index, 1);
            assert!(source.is_timeout());
        }
        other => panic!("unexpected error {:?}", other),
    }
    CallLogVerifier::new(&log)
        .assert_rolled_back(&["ok", "stuck"])
        .unwrap();
}
