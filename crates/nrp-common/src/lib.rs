//! Common NRP abstractions.
//!
//! This crate provides the model and contracts shared by the request
//! decomposer, the driver repository and device-specific drivers:
//!
//! - [`Topology`]: Snapshot of nodes, owned edge points and links
//! - [`ServiceEndPoint`] / [`EndPoint`] / [`SubRequest`]: Request data before
//!   and after decomposition
//! - [`ActivationDriver`]: Per-device unit of work with commit/rollback
//! - [`ActivationDriverBuilder`]: Capability probe producing drivers
//! - [`NrpError`] / [`DriverError`]: Error taxonomy
//!
//! # Architecture
//!
//! 1. A caller asks for connectivity between service interface points
//! 2. The decomposer maps the request onto the topology graph and splits it
//!    into one sub-request per device
//! 3. Each sub-request is resolved to exactly one driver
//! 4. All drivers run inside one activation transaction
//!
//! # Example
//!
//! ```ignore
//! use unimgr_nrp_common::{ActivationDriver, BuilderContext, DriverResult, EndPoint, ServiceId};
//!
//! struct VlanDriver { /* ... */ }
//!
//! #[async_trait]
//! impl ActivationDriver for VlanDriver {
//!     fn initialize(&mut self, eps: &[EndPoint], id: &ServiceId, ctx: &BuilderContext) -> DriverResult<()> {
//!         // remember what to configure
//!         Ok(())
//!     }
//!     async fn activate(&mut self) -> DriverResult<()> { /* push config */ Ok(()) }
//!     async fn deactivate(&mut self) -> DriverResult<()> { Ok(()) }
//!     async fn commit(&mut self) {}
//!     async fn rollback(&mut self) {}
//!     fn priority(&self) -> i32 { 10 }
//! }
//! ```

mod driver;
mod endpoint;
mod error;
mod types;

pub use driver::{
    ActivationDriver, ActivationDriverBuilder, BuilderContext, DriverTarget, Port, ServiceType,
};
pub use endpoint::{EndPoint, EndPointAttrs, ServiceEndPoint, SubRequest};
pub use error::{DriverError, DriverResult, NrpError, NrpResult};
pub use types::{
    EdgePointId, Link, NepRef, Node, NodeId, OperationalState, OwnedEdgePoint, PortDirection,
    ServiceId, SipId, Topology, TopologyId, SYSTEM_TOPOLOGY,
};
