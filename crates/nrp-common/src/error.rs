//! Error types for decomposition, driver selection and activation.
//!
//! Infeasible requests are not errors: decomposition reports them as
//! `Ok(None)`. Everything here is either a malformed request, an unreadable
//! data store, a driver registration problem or a device fault.

use std::io;
use thiserror::Error;

/// Result type alias for NRP operations.
pub type NrpResult<T> = Result<T, NrpError>;

/// Result type alias for driver lifecycle calls.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors surfaced by the NRP core.
#[derive(Debug, Error)]
pub enum NrpError {
    /// Malformed request (too few endpoints, direction mismatch).
    #[error("Illegal argument: {message}")]
    IllegalArgument {
        /// Error message.
        message: String,
    },

    /// Request references data the system does not have (e.g. unknown sip).
    #[error("Request failed: {message}")]
    FailureResult {
        /// Error message.
        message: String,
    },

    /// The endpoints are valid but cannot be interconnected.
    #[error("No path: {message}")]
    NoPath {
        /// Error message.
        message: String,
    },

    /// The topology could not be read.
    #[error("Topology '{topology}' unavailable: {message}")]
    TopologyUnavailable {
        /// The topology id.
        topology: String,
        /// Error message.
        message: String,
    },

    /// More than one registered builder claimed the target.
    #[error("Ambiguous activation driver for {target}: {candidates} builders matched")]
    DriverAmbiguous {
        /// Description of the port(s) being driven.
        target: String,
        /// Number of builders that produced a driver.
        candidates: usize,
    },

    /// No registered builder claimed the target.
    #[error("No activation driver found for {target}")]
    DriverNotFound {
        /// Description of the port(s) being driven.
        target: String,
    },

    /// Operation not permitted in the current state.
    #[error("Illegal state: {message}")]
    IllegalState {
        /// Error message.
        message: String,
    },

    /// A driver failed and the transaction was rolled back.
    #[error("Activation rolled back: driver #{driver_index} failed: {source}")]
    ActivationFailed {
        /// Position of the failing driver in execution order.
        driver_index: usize,
        /// The underlying driver error.
        #[source]
        source: DriverError,
    },

    /// A selected driver refused the endpoints it was bound to.
    #[error("Driver initialization failed for node {node}: {source}")]
    DriverInitialization {
        /// Node the sub-request belongs to.
        node: String,
        /// The underlying driver error.
        #[source]
        source: DriverError,
    },

    /// Data store read or write failed.
    #[error("Data store operation failed: {operation}: {message}")]
    DataStore {
        /// The operation that failed.
        operation: String,
        /// Error message.
        message: String,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message.
        message: String,
    },

    /// Request validation produced problems.
    #[error("Validation failed: {}", .problems.join("; "))]
    Validation {
        /// All problems found.
        problems: Vec<String>,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl NrpError {
    /// Creates an illegal argument error.
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument {
            message: message.into(),
        }
    }

    /// Creates a failure result.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::FailureResult {
            message: message.into(),
        }
    }

    /// Creates a topology unavailable error.
    pub fn topology_unavailable(topology: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TopologyUnavailable {
            topology: topology.into(),
            message: message.into(),
        }
    }

    /// Creates an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Creates a data store error.
    pub fn data_store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataStore {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a no-path error.
    pub fn no_path(message: impl Into<String>) -> Self {
        Self::NoPath {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns true if the request itself was malformed.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            NrpError::IllegalArgument { .. }
                | NrpError::FailureResult { .. }
                | NrpError::Validation { .. }
        )
    }

    /// Returns true if driver registration could not serve the request.
    pub fn is_driver_selection_error(&self) -> bool {
        matches!(
            self,
            NrpError::DriverAmbiguous { .. } | NrpError::DriverNotFound { .. }
        )
    }
}

/// Failure raised by a driver lifecycle call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Device rejected or failed to apply configuration.
    #[error("Device error on {device}: {message}")]
    Device { device: String, message: String },

    /// The call did not complete before its deadline.
    #[error("Driver call '{operation}' timed out after {millis} ms")]
    Timeout { operation: String, millis: u64 },

    /// The driver cannot serve the request it was initialized with.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DriverError {
    /// Creates a device error.
    pub fn device(device: impl Into<String>, message: impl Into<String>) -> Self {
        DriverError::Device {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>, millis: u64) -> Self {
        DriverError::Timeout {
            operation: operation.into(),
            millis,
        }
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        DriverError::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        DriverError::Internal {
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NrpError::topology_unavailable("topo", "not found");
        assert_eq!(err.to_string(), "Topology 'topo' unavailable: not found");

        let err = NrpError::DriverAmbiguous {
            target: "n1/n1:1".to_string(),
            candidates: 2,
        };
        assert_eq!(
            err.to_string(),
            "Ambiguous activation driver for n1/n1:1: 2 builders matched"
        );
    }

    #[test]
    fn test_validation_display() {
        let err = NrpError::Validation {
            problems: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Validation failed: a; b");
    }

    #[test]
    fn test_activation_failed_source() {
        let err = NrpError::ActivationFailed {
            driver_index: 0,
            source: DriverError::device("n1", "commit refused"),
        };
        assert!(err.to_string().contains("driver #0"));
        assert!(err.to_string().contains("commit refused"));
    }

    #[test]
    fn test_classification() {
        assert!(NrpError::illegal_argument("x").is_caller_error());
        assert!(NrpError::failure("x").is_caller_error());
        assert!(!NrpError::topology_unavailable("t", "x").is_caller_error());
        assert!(!NrpError::no_path("x").is_caller_error());
        assert_eq!(NrpError::no_path("x").to_string(), "No path: x");
        assert!(NrpError::DriverNotFound {
            target: "t".to_string()
        }
        .is_driver_selection_error());
        assert!(!NrpError::illegal_state("x").is_driver_selection_error());
        assert!(DriverError::timeout("activate", 10).is_timeout());
        assert!(!DriverError::internal("x").is_timeout());
    }
}
