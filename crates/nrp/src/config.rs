//! Configuration file support for the NRP core
//!
//! Loads and validates NRP configuration from TOML files.
//! Default location: /etc/unimgr/nrp.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use unimgr_nrp_common::{NrpError, NrpResult, TopologyId, SYSTEM_TOPOLOGY};

use crate::transaction::RollbackOrder;

/// Topology configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Topology the decomposer reads
    #[serde(default = "default_topology_id")]
    pub topology_id: String,
}

/// Activation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationConfig {
    /// Deadline for each driver call in milliseconds (0 disables)
    #[serde(default = "default_driver_timeout")]
    pub driver_timeout_ms: u64,

    /// Order in which drivers are rolled back
    #[serde(default)]
    pub rollback_order: RollbackOrder,
}

/// Request validation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Reject create requests that reuse an endpoint local id
    #[serde(default = "default_reject_duplicate_local_ids")]
    pub reject_duplicate_local_ids: bool,

    /// Minimum number of endpoints in a create request
    #[serde(default = "default_min_endpoints")]
    pub min_endpoints: usize,
}

/// Complete NRP configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NrpConfig {
    #[serde(default)]
    pub topology: TopologyConfig,

    #[serde(default)]
    pub activation: ActivationConfig,

    #[serde(default)]
    pub validation: ValidationConfig,
}

fn default_topology_id() -> String {
    SYSTEM_TOPOLOGY.to_string()
}

fn default_driver_timeout() -> u64 {
    30_000
}

fn default_reject_duplicate_local_ids() -> bool {
    true
}

fn default_min_endpoints() -> usize {
    2
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            topology_id: default_topology_id(),
        }
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            driver_timeout_ms: default_driver_timeout(),
            rollback_order: RollbackOrder::default(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            reject_duplicate_local_ids: default_reject_duplicate_local_ids(),
            min_endpoints: default_min_endpoints(),
        }
    }
}

impl NrpConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> NrpResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config = toml::from_str(&content).map_err(|e| {
                    NrpError::configuration(format!(
                        "Failed to parse config file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(NrpError::Io(e)),
        }
    }

    /// Load from default location or defaults
    pub fn load() -> NrpResult<Self> {
        Self::load_or_default("/etc/unimgr/nrp.toml")
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> NrpResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| NrpError::configuration(format!("Failed to serialize config: {}", e)))?;

        fs::write(path.as_ref(), content)?;

        Ok(())
    }

    pub fn topology_id(&self) -> TopologyId {
        TopologyId::new(self.topology.topology_id.clone())
    }

    /// Get driver call deadline, `None` when disabled
    pub fn driver_timeout(&self) -> Option<Duration> {
        match self.activation.driver_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> NrpResult<()> {
        if self.topology.topology_id.trim().is_empty() {
            return Err(NrpError::configuration("topology_id must not be empty"));
        }

        if self.validation.min_endpoints < 2 {
            return Err(NrpError::configuration("min_endpoints must be >= 2"));
        }

        Ok(())
    }
}
