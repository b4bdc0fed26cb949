//! Activation driver contract and the builder capability probe.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::endpoint::{EndPoint, ServiceEndPoint, SubRequest};
use crate::error::DriverResult;
use crate::types::{NepRef, ServiceId};

/// Kind of connectivity service being (de)activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceType {
    #[default]
    PointToPoint,
    MultiPoint,
    RootedMultiPoint,
}

impl ServiceType {
    /// Infers the service type from the number of requested endpoints.
    pub fn for_endpoint_count(count: usize) -> Self {
        if count > 2 {
            ServiceType::MultiPoint
        } else {
            ServiceType::PointToPoint
        }
    }
}

/// Context handed to builders and drivers taking part in one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuilderContext {
    /// Connectivity service the transaction belongs to, once allocated.
    pub service_id: Option<ServiceId>,
    /// Whether the service owns its ports exclusively (port-based service).
    pub exclusive: bool,
    pub service_type: ServiceType,
}

impl BuilderContext {
    pub fn new(service_id: impl Into<ServiceId>, service_type: ServiceType) -> Self {
        Self {
            service_id: Some(service_id.into()),
            exclusive: false,
            service_type,
        }
    }

    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }
}

/// A port a builder is asked to drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub nep_ref: NepRef,
    /// Driver family declared by the owning node.
    pub activation_driver_id: String,
    /// The caller's endpoint, `None` for pass-through ports.
    pub endpoint: Option<ServiceEndPoint>,
}

impl Port {
    /// Builds a port from a decomposed endpoint; `None` if it was never
    /// resolved to an edge point.
    pub fn from_endpoint(endpoint: &EndPoint, activation_driver_id: &str) -> Option<Self> {
        let nep_ref = endpoint.nep_ref.clone()?;
        Some(Self {
            nep_ref,
            activation_driver_id: activation_driver_id.to_string(),
            endpoint: endpoint.endpoint.clone(),
        })
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nep_ref)
    }
}

/// What a builder is asked to drive on a single device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverTarget {
    SinglePort(Port),
    /// Device-internal cross-connect between two ports.
    PortPair(Port, Port),
    /// More than two ports of one device in a multipoint service.
    Multipoint(Vec<Port>),
}

impl DriverTarget {
    /// Derives the target from a sub-request's endpoints.
    ///
    /// Returns `None` for an empty sub-request or one with unresolved
    /// endpoints.
    pub fn from_sub_request(sub: &SubRequest) -> Option<Self> {
        let ports = sub
            .endpoints
            .iter()
            .map(|e| Port::from_endpoint(e, &sub.activation_driver_id))
            .collect::<Option<Vec<_>>>()?;
        Self::from_ports(ports)
    }

    pub fn from_ports(mut ports: Vec<Port>) -> Option<Self> {
        match ports.len() {
            0 => None,
            1 => ports.pop().map(DriverTarget::SinglePort),
            2 => {
                let z = ports.pop()?;
                let a = ports.pop()?;
                Some(DriverTarget::PortPair(a, z))
            }
            _ => Some(DriverTarget::Multipoint(ports)),
        }
    }

    /// All ports of the target in order.
    pub fn ports(&self) -> Vec<&Port> {
        match self {
            DriverTarget::SinglePort(p) => vec![p],
            DriverTarget::PortPair(a, z) => vec![a, z],
            DriverTarget::Multipoint(ps) => ps.iter().collect(),
        }
    }
}

impl fmt::Display for DriverTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ports: Vec<String> = self.ports().iter().map(|p| p.to_string()).collect();
        write!(f, "[{}]", ports.join(", "))
    }
}

/// Device-specific unit of work that turns a sub-request into configuration.
///
/// # Lifecycle
///
/// 1. A builder produces a fresh driver for a sub-request
/// 2. `initialize()` binds it to the sub-request's endpoints
/// 3. The driver is added to an activation transaction
/// 4. `activate()`, `deactivate()` or `update()` is called at most once
/// 5. `commit()` if every driver in the transaction succeeded, otherwise
///    `rollback()`
///
/// A driver may be rolled back without ever having been activated and must
/// tolerate that. Instances are single-use.
#[async_trait]
pub trait ActivationDriver: Send + Sync {
    /// Returns a name for logging.
    fn name(&self) -> &str {
        "activation-driver"
    }

    /// Binds the driver to the endpoints it will configure.
    fn initialize(
        &mut self,
        endpoints: &[EndPoint],
        service_id: &ServiceId,
        context: &BuilderContext,
    ) -> DriverResult<()>;

    /// Applies the configuration.
    async fn activate(&mut self) -> DriverResult<()>;

    /// Removes the configuration.
    async fn deactivate(&mut self) -> DriverResult<()>;

    /// Re-applies the configuration after an endpoint change.
    async fn update(&mut self) -> DriverResult<()> {
        self.deactivate().await?;
        self.activate().await
    }

    /// Finalizes after every driver in the transaction succeeded.
    async fn commit(&mut self);

    /// Undoes whatever was applied; called for every driver when any failed.
    async fn rollback(&mut self);

    /// Execution order within a transaction (lower runs first).
    fn priority(&self) -> i32 {
        0
    }
}

/// Stateless factory for activation drivers.
pub trait ActivationDriverBuilder: Send + Sync {
    /// Unique id used for registration.
    fn id(&self) -> &str;

    /// Returns a fresh driver if this builder can drive `target`.
    fn driver_for(
        &self,
        target: &DriverTarget,
        context: &BuilderContext,
    ) -> Option<Box<dyn ActivationDriver>>;
}
