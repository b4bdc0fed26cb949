//! Recording activation drivers and builders
//!
//! Every lifecycle call is appended to a shared [`CallLog`] so tests can
//! assert on execution order across all drivers of a transaction.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use unimgr_nrp_common::{
    ActivationDriver, ActivationDriverBuilder, BuilderContext, DriverError, DriverResult,
    DriverTarget, EndPoint, NodeId, ServiceId,
};

/// Driver lifecycle operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOp {
    Initialize,
    Activate,
    Deactivate,
    Update,
    Commit,
    Rollback,
}

/// One recorded driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverCall {
    pub driver: String,
    pub op: DriverOp,
}

/// Call log shared by any number of drivers
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<DriverCall>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, driver: impl Into<String>, op: DriverOp) {
        self.calls.lock().push(DriverCall {
            driver: driver.into(),
            op,
        });
    }

    /// Snapshot of all calls in order
    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().clone()
    }

    /// Operations invoked on one driver, in order
    pub fn ops_for(&self, driver: &str) -> Vec<DriverOp> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.driver == driver)
            .map(|c| c.op)
            .collect()
    }

    /// Drivers that received `op`, in call order
    pub fn drivers_with(&self, op: DriverOp) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.op == op)
            .map(|c| c.driver.clone())
            .collect()
    }

    pub fn count(&self, driver: &str, op: DriverOp) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.driver == driver && c.op == op)
            .count()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

/// Driver that records its lifecycle and optionally fails or stalls
pub struct RecordingDriver {
    name: String,
    priority: i32,
    log: CallLog,
    fail_on: Option<DriverOp>,
    delay: Option<Duration>,
    rollback_delay: Option<Duration>,
    endpoints: Vec<EndPoint>,
    service_id: Option<ServiceId>,
}

impl RecordingDriver {
    pub fn new(name: impl Into<String>, log: CallLog) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            log,
            fail_on: None,
            delay: None,
            rollback_delay: None,
            endpoints: Vec::new(),
            service_id: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Make `op` fail with a device error
    pub fn failing_on(mut self, op: DriverOp) -> Self {
        self.fail_on = Some(op);
        self
    }

    /// Sleep after recording activate/deactivate
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep after recording rollback
    pub fn with_rollback_delay(mut self, delay: Duration) -> Self {
        self.rollback_delay = Some(delay);
        self
    }

    pub fn endpoints(&self) -> &[EndPoint] {
        &self.endpoints
    }

    pub fn service_id(&self) -> Option<&ServiceId> {
        self.service_id.as_ref()
    }

    fn call(&self, op: DriverOp) -> DriverResult<()> {
        self.log.record(self.name.clone(), op);
        if self.fail_on == Some(op) {
            return Err(DriverError::device(
                self.name.clone(),
                format!("{:?} failed", op),
            ));
        }
        Ok(())
    }

    async fn stall(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ActivationDriver for RecordingDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(
        &mut self,
        endpoints: &[EndPoint],
        service_id: &ServiceId,
        _context: &BuilderContext,
    ) -> DriverResult<()> {
        self.call(DriverOp::Initialize)?;
        self.endpoints = endpoints.to_vec();
        self.service_id = Some(service_id.clone());
        Ok(())
    }

    async fn activate(&mut self) -> DriverResult<()> {
        self.log.record(self.name.clone(), DriverOp::Activate);
        self.stall().await;
        if self.fail_on == Some(DriverOp::Activate) {
            return Err(DriverError::device(self.name.clone(), "Activate failed"));
        }
        Ok(())
    }

    async fn deactivate(&mut self) -> DriverResult<()> {
        self.log.record(self.name.clone(), DriverOp::Deactivate);
        self.stall().await;
        if self.fail_on == Some(DriverOp::Deactivate) {
            return Err(DriverError::device(self.name.clone(), "Deactivate failed"));
        }
        Ok(())
    }

    async fn update(&mut self) -> DriverResult<()> {
        self.call(DriverOp::Update)
    }

    async fn commit(&mut self) {
        self.log.record(self.name.clone(), DriverOp::Commit);
    }

    async fn rollback(&mut self) {
        self.log.record(self.name.clone(), DriverOp::Rollback);
        if let Some(delay) = self.rollback_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// Kind of target a builder answers for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    SinglePort,
    PortPair,
    Multipoint,
}

impl TargetKind {
    pub fn of(target: &DriverTarget) -> Self {
        match target {
            DriverTarget::SinglePort(_) => TargetKind::SinglePort,
            DriverTarget::PortPair(_, _) => TargetKind::PortPair,
            DriverTarget::Multipoint(_) => TargetKind::Multipoint,
        }
    }
}

/// Builder producing [`RecordingDriver`]s named `<builder>@<node>`
pub struct RecordingBuilder {
    id: String,
    activation_driver_id: Option<String>,
    kinds: Vec<TargetKind>,
    priority: i32,
    fail_on: Option<(Option<NodeId>, DriverOp)>,
    log: CallLog,
}

impl RecordingBuilder {
    /// Builder answering every target kind for every driver family
    pub fn new(id: impl Into<String>, log: CallLog) -> Self {
        Self {
            id: id.into(),
            activation_driver_id: None,
            kinds: vec![
                TargetKind::SinglePort,
                TargetKind::PortPair,
                TargetKind::Multipoint,
            ],
            priority: 0,
            fail_on: None,
            log,
        }
    }

    /// Only answer for nodes declaring this activation driver id
    pub fn for_driver_id(mut self, activation_driver_id: impl Into<String>) -> Self {
        self.activation_driver_id = Some(activation_driver_id.into());
        self
    }

    /// Only answer for these target kinds
    pub fn answering(mut self, kinds: &[TargetKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Drivers for every node fail on `op`
    pub fn failing_on(mut self, op: DriverOp) -> Self {
        self.fail_on = Some((None, op));
        self
    }

    /// Only the driver for `node` fails on `op`
    pub fn failing_on_node(mut self, node: impl Into<NodeId>, op: DriverOp) -> Self {
        self.fail_on = Some((Some(node.into()), op));
        self
    }

    /// Name of the driver this builder produces for `node`
    pub fn driver_name(&self, node: &str) -> String {
        format!("{}@{}", self.id, node)
    }
}

impl ActivationDriverBuilder for RecordingBuilder {
    fn id(&self) -> &str {
        &self.id
    }

    fn driver_for(
        &self,
        target: &DriverTarget,
        _context: &BuilderContext,
    ) -> Option<Box<dyn ActivationDriver>> {
        if !self.kinds.contains(&TargetKind::of(target)) {
            return None;
        }
        let ports = target.ports();
        let first = ports.first()?;
        if let Some(family) = &self.activation_driver_id {
            if ports.iter().any(|p| &p.activation_driver_id != family) {
                return None;
            }
        }

        let node = &first.nep_ref.node_id;
        let mut driver = RecordingDriver::new(self.driver_name(node.as_str()), self.log.clone())
            .with_priority(self.priority);
        match &self.fail_on {
            Some((None, op)) => driver = driver.failing_on(*op),
            Some((Some(n), op)) if n == node => driver = driver.failing_on(*op),
            _ => {}
        }
        Some(Box::new(driver))
    }
}
