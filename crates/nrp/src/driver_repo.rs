//! Registry of activation driver builders.
//!
//! Selection asks every registered builder whether it can drive a target and
//! requires exactly one of them to answer.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use unimgr_nrp_common::{
    ActivationDriver, ActivationDriverBuilder, BuilderContext, DriverTarget, NrpError, NrpResult,
    SubRequest,
};

/// Concurrent registry of driver builders keyed by builder id.
#[derive(Default)]
pub struct ActivationDriverRepo {
    builders: RwLock<BTreeMap<String, Arc<dyn ActivationDriverBuilder>>>,
}

impl ActivationDriverRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a builder, replacing and returning any builder with the same id.
    pub fn register(
        &self,
        builder: Arc<dyn ActivationDriverBuilder>,
    ) -> Option<Arc<dyn ActivationDriverBuilder>> {
        let id = builder.id().to_string();
        info!("Activation driver builder {} registered", id);
        self.builders.write().insert(id, builder)
    }

    pub fn unregister(&self, id: &str) -> Option<Arc<dyn ActivationDriverBuilder>> {
        let removed = self.builders.write().remove(id);
        if removed.is_some() {
            info!("Activation driver builder {} unregistered", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.builders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.read().is_empty()
    }

    pub fn builder_ids(&self) -> Vec<String> {
        self.builders.read().keys().cloned().collect()
    }

    /// Selects the driver for a decomposed sub-request.
    ///
    /// One endpoint is probed as a single port, two as a port pair and more
    /// as a multipoint target.
    pub fn get_driver(
        &self,
        sub_request: &SubRequest,
        context: &BuilderContext,
    ) -> NrpResult<Box<dyn ActivationDriver>> {
        let target = DriverTarget::from_sub_request(sub_request).ok_or_else(|| {
            NrpError::illegal_argument(format!(
                "sub-request for node {} has no resolved endpoints",
                sub_request.node_id
            ))
        })?;
        self.get_driver_for(&target, context)
    }

    pub fn get_driver_for(
        &self,
        target: &DriverTarget,
        context: &BuilderContext,
    ) -> NrpResult<Box<dyn ActivationDriver>> {
        let snapshot: Vec<Arc<dyn ActivationDriverBuilder>> =
            self.builders.read().values().cloned().collect();

        let mut drivers: Vec<Box<dyn ActivationDriver>> = snapshot
            .iter()
            .filter_map(|b| b.driver_for(target, context))
            .collect();

        match drivers.len() {
            0 => {
                warn!("No activation driver found for {}", target);
                Err(NrpError::DriverNotFound {
                    target: target.to_string(),
                })
            }
            1 => {
                let driver = drivers.remove(0);
                debug!("Selected driver {} for {}", driver.name(), target);
                Ok(driver)
            }
            candidates => {
                warn!(
                    "Ambiguous activation driver for {}: {} candidates",
                    target, candidates
                );
                Err(NrpError::DriverAmbiguous {
                    target: target.to_string(),
                    candidates,
                })
            }
        }
    }
}
