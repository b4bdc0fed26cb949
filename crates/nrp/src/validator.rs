//! Payload checks run before a request reaches the decomposer.

use std::collections::BTreeSet;
use tracing::debug;
use unimgr_nrp_common::{NrpError, NrpResult, ServiceEndPoint};

use crate::config::ValidationConfig;
use crate::model::{ConnectivityService, CreateServiceRequest};

/// Problems found while validating a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub problems: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn problem(mut self, message: impl Into<String>) -> Self {
        self.problems.push(message.into());
        self
    }

    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn merge(mut self, other: ValidationResult) -> Self {
        self.problems.extend(other.problems);
        self
    }

    /// Converts into `NrpError::Validation` when any problem was found.
    pub fn into_result(self) -> NrpResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(NrpError::Validation {
                problems: self.problems,
            })
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DefaultValidator {
    config: ValidationConfig,
}

impl DefaultValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn check_create(&self, request: &CreateServiceRequest) -> ValidationResult {
        debug!("Validation for create request started");
        let mut result = ValidationResult::new();

        if request.endpoints.is_empty() {
            return result.problem("No endpoints specified for a connectivity service");
        }

        if request.endpoints.len() < self.config.min_endpoints {
            result = result.problem(format!(
                "At least {} endpoints required, got {}",
                self.config.min_endpoints,
                request.endpoints.len()
            ));
        }

        if self.config.reject_duplicate_local_ids {
            let mut seen = BTreeSet::new();
            let first_duplicate = request
                .endpoints
                .iter()
                .filter_map(|e| e.local_id.as_deref())
                .find(|id| !seen.insert(*id));
            if let Some(id) = first_duplicate {
                result = result.problem(format!("A duplicate endpoint id: {}", id));
            }
        }

        let mut sips = BTreeSet::new();
        if let Some(sip) = request
            .endpoints
            .iter()
            .map(|e| &e.sip)
            .find(|sip| !sips.insert(*sip))
        {
            result = result.problem(format!("A duplicate service interface point: {}", sip));
        }

        result
    }

    /// Checks an endpoint change against the stored service.
    pub fn check_update(
        &self,
        service: &ConnectivityService,
        endpoint: &ServiceEndPoint,
    ) -> ValidationResult {
        let Some(local_id) = endpoint.local_id.as_deref() else {
            return ValidationResult::new()
                .problem(format!("Endpoint local id not defined for {}", service.id));
        };

        match service.endpoint(local_id) {
            None => ValidationResult::new().problem(format!(
                "No endpoint with local id {} defined for {}",
                local_id, service.id
            )),
            Some(existing) if existing.sip != endpoint.sip => {
                ValidationResult::new().problem(format!(
                    "Sip mapping for endpoint {} is not matching for service {}",
                    local_id, service.id
                ))
            }
            Some(_) => ValidationResult::new(),
        }
    }
}
