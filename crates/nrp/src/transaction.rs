//! All-or-nothing execution of the drivers serving one request.
//!
//! # State machine
//!
//! ```text
//! Building --activate/deactivate/update--> Activating --+--> Committed
//!                                                       +--> RolledBack
//! ```
//!
//! Drivers run one at a time in ascending priority (ties keep insertion
//! order). The first failure stops the loop; every driver in the
//! transaction is then rolled back, activated or not. If all succeed every
//! driver is committed. Commit and rollback share the per-call deadline; an
//! overrun is logged and the next driver proceeds. A finished transaction
//! accepts no further calls.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use unimgr_nrp_common::{ActivationDriver, DriverError, DriverResult, NrpError, NrpResult};

use crate::config::NrpConfig;

/// Order in which drivers are rolled back after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollbackOrder {
    /// Same ascending-priority order used for activation
    #[default]
    Forward,
    /// Descending priority, unwinding dependencies
    Reverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Building,
    Activating,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxOperation {
    Activate,
    Deactivate,
    Update,
}

impl fmt::Display for TxOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxOperation::Activate => "activate",
            TxOperation::Deactivate => "deactivate",
            TxOperation::Update => "update",
        };
        write!(f, "{}", s)
    }
}

/// The driver call that caused a rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFailure {
    /// Position in execution order.
    pub driver_index: usize,
    pub driver: String,
    pub priority: i32,
    pub error: DriverError,
}

/// Result of running a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutcome {
    pub state: TxState,
    pub failure: Option<TransactionFailure>,
}

impl TransactionOutcome {
    pub fn is_committed(&self) -> bool {
        self.state == TxState::Committed
    }

    /// Converts a rolled back outcome into `NrpError::ActivationFailed`.
    pub fn into_result(self) -> NrpResult<()> {
        match self.failure {
            None => Ok(()),
            Some(failure) => Err(NrpError::ActivationFailed {
                driver_index: failure.driver_index,
                source: failure.error,
            }),
        }
    }
}

/// Drivers for exactly one logical request.
pub struct ActivationTransaction {
    drivers: Vec<Box<dyn ActivationDriver>>,
    state: TxState,
    rollback_order: RollbackOrder,
    driver_timeout: Option<Duration>,
}

impl Default for ActivationTransaction {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivationTransaction {
    pub fn new() -> Self {
        Self {
            drivers: Vec::new(),
            state: TxState::Building,
            rollback_order: RollbackOrder::default(),
            driver_timeout: None,
        }
    }

    pub fn from_config(config: &NrpConfig) -> Self {
        Self::new()
            .with_rollback_order(config.activation.rollback_order)
            .with_driver_timeout(config.driver_timeout())
    }

    pub fn with_rollback_order(mut self, order: RollbackOrder) -> Self {
        self.rollback_order = order;
        self
    }

    /// Deadline for each activate/deactivate/update call.
    pub fn with_driver_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.driver_timeout = timeout;
        self
    }

    pub fn add_driver(&mut self, driver: Box<dyn ActivationDriver>) -> NrpResult<()> {
        if self.state != TxState::Building {
            return Err(NrpError::illegal_state(format!(
                "cannot add driver to transaction in state {:?}",
                self.state
            )));
        }
        self.drivers.push(driver);
        Ok(())
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    #[instrument(skip(self), fields(drivers = self.drivers.len()))]
    pub async fn activate(&mut self) -> NrpResult<TransactionOutcome> {
        self.run(TxOperation::Activate).await
    }

    #[instrument(skip(self), fields(drivers = self.drivers.len()))]
    pub async fn deactivate(&mut self) -> NrpResult<TransactionOutcome> {
        self.run(TxOperation::Deactivate).await
    }

    #[instrument(skip(self), fields(drivers = self.drivers.len()))]
    pub async fn update(&mut self) -> NrpResult<TransactionOutcome> {
        self.run(TxOperation::Update).await
    }

    async fn run(&mut self, op: TxOperation) -> NrpResult<TransactionOutcome> {
        if self.state != TxState::Building {
            return Err(NrpError::illegal_state(format!(
                "transaction already executed, state {:?}",
                self.state
            )));
        }
        if self.drivers.is_empty() {
            return Err(NrpError::illegal_state("at least one driver required"));
        }

        self.drivers.sort_by_key(|d| d.priority());
        self.state = TxState::Activating;

        let mut failure = None;
        for (index, driver) in self.drivers.iter_mut().enumerate() {
            debug!(
                "Running {} on driver {} (priority {})",
                op,
                driver.name(),
                driver.priority()
            );
            if let Err(error) = invoke(driver.as_mut(), op, self.driver_timeout).await {
                failure = Some(TransactionFailure {
                    driver_index: index,
                    driver: driver.name().to_string(),
                    priority: driver.priority(),
                    error,
                });
                break;
            }
        }

        match failure {
            None => {
                for driver in self.drivers.iter_mut() {
                    settle(driver.as_mut(), Settle::Commit, self.driver_timeout).await;
                }
                self.state = TxState::Committed;
                info!("Transaction {} committed on {} drivers", op, self.drivers.len());
            }
            Some(ref f) => {
                warn!(
                    "Rolling back transaction, {} failed on driver {}: {}",
                    op, f.driver, f.error
                );
                match self.rollback_order {
                    RollbackOrder::Forward => {
                        for driver in self.drivers.iter_mut() {
                            settle(driver.as_mut(), Settle::Rollback, self.driver_timeout).await;
                        }
                    }
                    RollbackOrder::Reverse => {
                        for driver in self.drivers.iter_mut().rev() {
                            settle(driver.as_mut(), Settle::Rollback, self.driver_timeout).await;
                        }
                    }
                }
                self.state = TxState::RolledBack;
            }
        }

        Ok(TransactionOutcome {
            state: self.state,
            failure,
        })
    }
}

async fn invoke(
    driver: &mut dyn ActivationDriver,
    op: TxOperation,
    timeout: Option<Duration>,
) -> DriverResult<()> {
    let call = async {
        match op {
            TxOperation::Activate => driver.activate().await,
            TxOperation::Deactivate => driver.deactivate().await,
            TxOperation::Update => driver.update().await,
        }
    };

    match timeout {
        None => call.await,
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::timeout(
                op.to_string(),
                u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            )),
        },
    }
}

#[derive(Debug, Clone, Copy)]
enum Settle {
    Commit,
    Rollback,
}

/// Commits or rolls back one driver; an overrun is logged and abandoned.
async fn settle(driver: &mut dyn ActivationDriver, kind: Settle, timeout: Option<Duration>) {
    let name = driver.name().to_string();
    let call = async {
        match kind {
            Settle::Commit => driver.commit().await,
            Settle::Rollback => driver.rollback().await,
        }
    };

    match timeout {
        None => call.await,
        Some(limit) => {
            if tokio::time::timeout(limit, call).await.is_err() {
                warn!(
                    "{:?} on driver {} did not finish within {:?}",
                    kind, name, limit
                );
            }
        }
    }
}
