//! Connectivity service decomposition and activation
//!
//! Turns a multi-endpoint connectivity request into one sub-request per
//! device and activates the selected device drivers with all-or-nothing
//! semantics.
//!
//! - [`TopologyGraph`]: Directed port graph built from a topology snapshot
//! - [`DecompositionAction`] / [`BasicDecomposer`]: Path search and per-device grouping
//! - [`ActivationDriverRepo`]: Builder registry and driver selection
//! - [`ActivationTransaction`]: Ordered execution with commit/rollback
//! - [`ConnectivityServiceManager`]: Create, update and delete flows over a [`DataStore`]

mod config;
mod datastore;
mod decomposer;
mod driver_repo;
mod graph;
mod model;
mod service;
mod transaction;
mod validator;

pub use config::{ActivationConfig, NrpConfig, TopologyConfig, ValidationConfig};
pub use datastore::{DataStore, InMemoryDataStore};
pub use decomposer::{BasicDecomposer, DecompositionAction, RequestDecomposer};
pub use driver_repo::ActivationDriverRepo;
pub use graph::{TopologyGraph, Vertex};
pub use model::{Connection, ConnectivityService, CreateServiceRequest};
pub use service::ConnectivityServiceManager;
pub use transaction::{
    ActivationTransaction, RollbackOrder, TransactionFailure, TransactionOutcome, TxState,
};
pub use validator::{DefaultValidator, ValidationResult};
