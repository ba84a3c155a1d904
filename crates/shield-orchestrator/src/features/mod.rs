//! Optional capabilities attached to an existing workload.
//!
//! Each attach converges on the desired state whatever the starting
//! point: repeating a call is a no-op, and detaching something absent
//! succeeds.

mod autoscaling;
mod backup;
mod storage;

use std::sync::Arc;

use shield_core::config::BackupConfig;
use shield_core::TenantKey;
use shield_platform::{Platform, Workload};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::quota::QuotaTracker;

pub use autoscaling::{AutoscalingPolicy, AutoscalingState, MAX_REPLICAS};
pub use backup::{BackupRecord, BackupState};
pub use storage::StorageState;

#[derive(Clone)]
pub struct FeatureManager {
    platform: Arc<dyn Platform>,
    quota: QuotaTracker,
    backup: BackupConfig,
}

impl FeatureManager {
    pub fn new(platform: Arc<dyn Platform>, quota: QuotaTracker, backup: BackupConfig) -> Self {
        Self {
            platform,
            quota,
            backup,
        }
    }

    async fn workload(&self, tenant: &TenantKey, name: &str) -> OrchestratorResult<Workload> {
        self.platform
            .get_workload(tenant.as_str(), name)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("workload {tenant}/{name}")))
    }
}
