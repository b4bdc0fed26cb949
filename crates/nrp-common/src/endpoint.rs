//! Request endpoints and the per-device sub-requests produced by decomposition.

use crate::types::{EdgePointId, NepRef, NodeId, PortDirection, SipId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque per-endpoint attributes passed through to drivers
/// (e.g. VLAN or bandwidth settings owned by a device driver).
pub type EndPointAttrs = BTreeMap<String, String>;

/// Endpoint of a connectivity service as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndPoint {
    /// Caller-chosen id, unique within one request.
    #[serde(default)]
    pub local_id: Option<String>,
    pub sip: SipId,
    #[serde(default)]
    pub direction: PortDirection,
    #[serde(default)]
    pub attrs: Option<EndPointAttrs>,
}

impl ServiceEndPoint {
    /// Creates a bidirectional endpoint for `sip`.
    pub fn new(sip: impl Into<SipId>) -> Self {
        Self {
            local_id: None,
            sip: sip.into(),
            direction: PortDirection::Bidirectional,
            attrs: None,
        }
    }

    pub fn with_direction(mut self, direction: PortDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_local_id(mut self, local_id: impl Into<String>) -> Self {
        self.local_id = Some(local_id.into());
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs
            .get_or_insert_with(EndPointAttrs::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Endpoint as seen by a driver: the caller's endpoint (if any) decorated with
/// the edge point it resolved to.
///
/// Pass-through hops on transit devices carry no caller endpoint, only the
/// edge point reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndPoint {
    pub endpoint: Option<ServiceEndPoint>,
    pub nep_ref: Option<NepRef>,
}

impl EndPoint {
    pub fn new(endpoint: ServiceEndPoint) -> Self {
        Self {
            endpoint: Some(endpoint),
            nep_ref: None,
        }
    }

    /// Creates a pass-through endpoint for a transit edge point.
    pub fn synthetic(nep_ref: NepRef) -> Self {
        Self {
            endpoint: None,
            nep_ref: Some(nep_ref),
        }
    }

    pub fn with_nep_ref(mut self, nep_ref: NepRef) -> Self {
        self.nep_ref = Some(nep_ref);
        self
    }

    /// Returns true if this endpoint was not part of the caller's request.
    pub fn is_synthetic(&self) -> bool {
        self.endpoint.is_none()
    }

    pub fn sip(&self) -> Option<&SipId> {
        self.endpoint.as_ref().map(|e| &e.sip)
    }

    pub fn edge_point_id(&self) -> Option<&EdgePointId> {
        self.nep_ref.as_ref().map(|r| &r.edge_point_id)
    }

    pub fn node_id(&self) -> Option<&NodeId> {
        self.nep_ref.as_ref().map(|r| &r.node_id)
    }
}

/// The slice of a decomposed request that falls on one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubRequest {
    pub node_id: NodeId,
    pub activation_driver_id: String,
    pub endpoints: Vec<EndPoint>,
}

impl SubRequest {
    pub fn new(
        node_id: impl Into<NodeId>,
        activation_driver_id: impl Into<String>,
        endpoints: Vec<EndPoint>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            activation_driver_id: activation_driver_id.into(),
            endpoints,
        }
    }

    /// Endpoints that came from the caller's request.
    pub fn service_endpoints(&self) -> impl Iterator<Item = &EndPoint> {
        self.endpoints.iter().filter(|e| !e.is_synthetic())
    }
}
