//! Verification helpers for driver call logs and decomposition results
//!
//! Provides assertion helpers that report what was expected and what was
//! actually observed.

use std::collections::BTreeMap;
use thiserror::Error;
use unimgr_nrp_common::{ServiceEndPoint, SipId, SubRequest};

use crate::drivers::{CallLog, DriverOp};

/// Verification error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Driver '{driver}' expected {expected} {op:?} calls, got {actual}")]
    CallCountMismatch {
        driver: String,
        op: DriverOp,
        expected: usize,
        actual: usize,
    },

    #[error("Expected {op:?} order {expected:?}, got {actual:?}")]
    OrderMismatch {
        op: DriverOp,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Endpoint {sip} appears {count} times in decomposition")]
    EndpointCoverage { sip: String, count: usize },

    #[error("Sub-request for node {node} has no endpoints")]
    EmptySubRequest { node: String },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Call log verification helper
pub struct CallLogVerifier<'a> {
    log: &'a CallLog,
}

impl<'a> CallLogVerifier<'a> {
    pub fn new(log: &'a CallLog) -> Self {
        Self { log }
    }

    /// Verify that `driver` received `op` exactly `expected` times
    pub fn assert_count(&self, driver: &str, op: DriverOp, expected: usize) -> VerifyResult<()> {
        let actual = self.log.count(driver, op);
        if actual != expected {
            return Err(VerificationError::CallCountMismatch {
                driver: driver.to_string(),
                op,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Verify that exactly these drivers received `op`, in this order
    pub fn assert_order(&self, op: DriverOp, expected: &[&str]) -> VerifyResult<()> {
        let actual = self.log.drivers_with(op);
        if actual != expected {
            return Err(VerificationError::OrderMismatch {
                op,
                expected: expected.iter().map(|s| s.to_string()).collect(),
                actual,
            });
        }
        Ok(())
    }

    /// Verify that `op` was never invoked on any driver
    pub fn assert_none(&self, op: DriverOp) -> VerifyResult<()> {
        self.assert_order(op, &[])
    }

    /// Verify the transaction committed: every driver committed once, none rolled back
    pub fn assert_committed(&self, drivers: &[&str]) -> VerifyResult<()> {
        for d in drivers {
            self.assert_count(d, DriverOp::Commit, 1)?;
        }
        self.assert_none(DriverOp::Rollback)
    }

    /// Verify the transaction rolled back: every driver rolled back once, none committed
    pub fn assert_rolled_back(&self, drivers: &[&str]) -> VerifyResult<()> {
        for d in drivers {
            self.assert_count(d, DriverOp::Rollback, 1)?;
        }
        self.assert_none(DriverOp::Commit)
    }
}

/// Verify that every requested endpoint appears in exactly one sub-request
/// and that no sub-request is empty
pub fn verify_endpoint_coverage(
    requested: &[ServiceEndPoint],
    result: &[SubRequest],
) -> VerifyResult<()> {
    let mut seen: BTreeMap<&SipId, usize> = requested.iter().map(|e| (&e.sip, 0)).collect();

    for sub in result {
        if sub.endpoints.is_empty() {
            return Err(VerificationError::EmptySubRequest {
                node: sub.node_id.to_string(),
            });
        }
        for sip in sub.service_endpoints().filter_map(|e| e.sip()) {
            *seen.entry(sip).or_insert(0) += 1;
        }
    }

    match seen.into_iter().find(|(_, count)| *count != 1) {
        Some((sip, count)) => Err(VerificationError::EndpointCoverage {
            sip: sip.to_string(),
            count,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ep;
    use unimgr_nrp_common::{EndPoint, NepRef};

    #[test]
    fn test_order_mismatch() {
        let log = CallLog::new();
        log.record("a", DriverOp::Activate);
        log.record("b", DriverOp::Activate);

        let verifier = CallLogVerifier::new(&log);
        assert!(verifier.assert_order(DriverOp::Activate, &["a", "b"]).is_ok());
        assert!(verifier.assert_order(DriverOp::Activate, &["b", "a"]).is_err());
        assert!(verifier.assert_none(DriverOp::Commit).is_ok());
    }

    #[test]
    fn test_coverage() {
        let a = ep("n1:1");
        let z = ep("n2:1");
        let sub = |node: &str, e: &ServiceEndPoint| {
            SubRequest::new(
                node,
                node,
                vec![EndPoint::new(e.clone()).with_nep_ref(NepRef::new(node, "p"))],
            )
        };

        let ok = vec![sub("n1", &a), sub("n2", &z)];
        assert!(verify_endpoint_coverage(&[a.clone(), z.clone()], &ok).is_ok());

        let missing = vec![sub("n1", &a)];
        assert_eq!(
            verify_endpoint_coverage(&[a.clone(), z.clone()], &missing),
            Err(VerificationError::EndpointCoverage {
                sip: z.sip.to_string(),
                count: 0
            })
        );

        let duplicated = vec![sub("n1", &a), sub("n2", &a), sub("n2", &z)];
        assert!(verify_endpoint_coverage(&[a, z], &duplicated).is_err());
    }
}
