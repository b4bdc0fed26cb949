//! Connectivity service records kept in the data store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unimgr_nrp_common::{EndPoint, NodeId, ServiceEndPoint, ServiceId, ServiceType, SubRequest};

/// Request to create a connectivity service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateServiceRequest {
    pub endpoints: Vec<ServiceEndPoint>,
    /// Inferred from the endpoint count when absent.
    #[serde(default)]
    pub service_type: Option<ServiceType>,
    /// Port-based service owning its ports exclusively.
    #[serde(default)]
    pub exclusive: bool,
}

impl CreateServiceRequest {
    pub fn new(endpoints: Vec<ServiceEndPoint>) -> Self {
        Self {
            endpoints,
            service_type: None,
            exclusive: false,
        }
    }

    pub fn with_service_type(mut self, service_type: ServiceType) -> Self {
        self.service_type = Some(service_type);
        self
    }

    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn effective_service_type(&self) -> ServiceType {
        self.service_type
            .unwrap_or_else(|| ServiceType::for_endpoint_count(self.endpoints.len()))
    }
}

/// Per-device slice of an active service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub node_id: NodeId,
    pub activation_driver_id: String,
    pub endpoints: Vec<EndPoint>,
}

impl Connection {
    pub fn from_sub_request(service_id: &ServiceId, sub: &SubRequest) -> Self {
        Self {
            id: format!("{}:{}", service_id, sub.node_id),
            node_id: sub.node_id.clone(),
            activation_driver_id: sub.activation_driver_id.clone(),
            endpoints: sub.endpoints.clone(),
        }
    }

    pub fn to_sub_request(&self) -> SubRequest {
        SubRequest::new(
            self.node_id.clone(),
            self.activation_driver_id.clone(),
            self.endpoints.clone(),
        )
    }
}

/// An activated connectivity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityService {
    pub id: ServiceId,
    pub service_type: ServiceType,
    pub exclusive: bool,
    pub endpoints: Vec<ServiceEndPoint>,
    pub connections: Vec<Connection>,
    pub created_at: DateTime<Utc>,
}

impl ConnectivityService {
    /// Finds an endpoint by its local id.
    pub fn endpoint(&self, local_id: &str) -> Option<&ServiceEndPoint> {
        self.endpoints
            .iter()
            .find(|e| e.local_id.as_deref() == Some(local_id))
    }

    /// Replaces the endpoint with the same local id, returning true if found.
    pub fn replace_endpoint(&mut self, endpoint: ServiceEndPoint) -> bool {
        let Some(local_id) = endpoint.local_id.clone() else {
            return false;
        };
        let mut replaced = false;
        for e in self
            .endpoints
            .iter_mut()
            .filter(|e| e.local_id.as_deref() == Some(local_id.as_str()))
        {
            *e = endpoint.clone();
            replaced = true;
        }
        for conn in &mut self.connections {
            for ep in conn.endpoints.iter_mut().filter(|ep| {
                ep.endpoint
                    .as_ref()
                    .and_then(|e| e.local_id.as_deref())
                    == Some(local_id.as_str())
            }) {
                ep.endpoint = Some(endpoint.clone());
            }
        }
        replaced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unimgr_nrp_common::NepRef;

    fn service() -> ConnectivityService {
        let a = ServiceEndPoint::new("sip:a").with_local_id("a");
        let z = ServiceEndPoint::new("sip:z").with_local_id("z");
        ConnectivityService {
            id: ServiceId::new("cs:1"),
            service_type: ServiceType::PointToPoint,
            exclusive: false,
            endpoints: vec![a.clone(), z],
            connections: vec![Connection {
                id: "cs:1:n1".to_string(),
                node_id: NodeId::new("n1"),
                activation_driver_id: "d1".to_string(),
                endpoints: vec![EndPoint::new(a).with_nep_ref(NepRef::new("n1", "n1:1"))],
            }],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_effective_service_type() {
        let eps = vec![
            ServiceEndPoint::new("a"),
            ServiceEndPoint::new("b"),
            ServiceEndPoint::new("c"),
        ];
        let req = CreateServiceRequest::new(eps.clone());
        assert_eq!(req.effective_service_type(), ServiceType::MultiPoint);

        let req = CreateServiceRequest::new(eps).with_service_type(ServiceType::RootedMultiPoint);
        assert_eq!(req.effective_service_type(), ServiceType::RootedMultiPoint);
    }

    #[test]
    fn test_replace_endpoint_updates_connections() {
        let mut svc = service();
        let updated = ServiceEndPoint::new("sip:a")
            .with_local_id("a")
            .with_attr("vlan", "200");

        assert!(svc.replace_endpoint(updated.clone()));
        assert_eq!(svc.endpoint("a"), Some(&updated));
        assert_eq!(svc.connections[0].endpoints[0].endpoint, Some(updated));
    }

    #[test]
    fn test_replace_unknown_endpoint() {
        let mut svc = service();
        assert!(!svc.replace_endpoint(ServiceEndPoint::new("sip:a").with_local_id("x")));
        assert!(!svc.replace_endpoint(ServiceEndPoint::new("sip:a")));
    }

    #[test]
    fn test_connection_round_trip() {
        let svc = service();
        let sub = svc.connections[0].to_sub_request();
        let conn = Connection::from_sub_request(&svc.id, &sub);
        assert_eq!(conn, svc.connections[0]);
    }
}
