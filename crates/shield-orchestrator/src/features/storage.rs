use serde::Serialize;
use tracing::{debug, info};

use shield_core::catalog;
use shield_core::quantity;
use shield_core::TenantKey;
use shield_platform::{Claim, PlatformResultExt, VolumeMount, Workload};

use super::FeatureManager;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::identity::{self, SecondaryKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StorageState {
    Absent,
    Attached {
        claim: String,
        size: String,
        mount_path: String,
    },
}

impl StorageState {
    pub(crate) fn from_claim(claim: Option<&Claim>, workload: Option<&Workload>) -> Self {
        match claim {
            None => Self::Absent,
            Some(claim) => {
                let mount_path = workload
                    .and_then(|w| w.mount_for(&claim.name).map(|m| m.mount_path.clone()))
                    .unwrap_or_else(|| {
                        catalog::data_path(
                            workload.and_then(Workload::service_type).unwrap_or_default(),
                        )
                        .to_string()
                    });
                Self::Attached {
                    claim: claim.name.clone(),
                    size: claim.size.clone(),
                    mount_path,
                }
            }
        }
    }
}

impl FeatureManager {
    /// Give a workload persistent storage of `size`, or resize what it has.
    pub async fn attach_storage(
        &self,
        tenant: &TenantKey,
        workload_name: &str,
        size: &str,
    ) -> OrchestratorResult<StorageState> {
        let requested = quantity::parse_bytes(size)?;
        let ns = tenant.as_str();
        let mut workload = self.workload(tenant, workload_name).await?;
        let claim_name = identity::secondary_name(&workload.name, SecondaryKind::Claim);

        let existing = self.platform.get_claim(ns, &claim_name).await?;
        if let Some(current) = existing.as_ref() {
            if quantity::parse_bytes(&current.size).is_ok_and(|bytes| requested < bytes) {
                return Err(OrchestratorError::Validation(format!(
                    "storage can only grow: {claim_name} is {}, requested {size}",
                    current.size
                )));
            }
        }

        // The workload's own claim is being replaced, not added to.
        self.quota.check(tenant, requested, Some(&claim_name)).await?;

        match existing {
            None => {
                let claim = Claim {
                    name: claim_name.clone(),
                    labels: workload.labels.clone(),
                    size: size.to_string(),
                    capacity: None,
                    storage_class: None,
                };
                self.platform.create_claim(ns, &claim).await.existing_ok()?;
                info!(%tenant, workload = %workload.name, %size, "storage claim created");
            }
            Some(existing) if quantity::parse_bytes(&existing.size).ok() != Some(requested) => {
                self.platform.resize_claim(ns, &claim_name, size).await?;
                info!(%tenant, workload = %workload.name, from = %existing.size, to = %size, "storage claim resized");
            }
            Some(_) => debug!(%tenant, claim = %claim_name, "storage claim already sized"),
        }

        if workload.mount_for(&claim_name).is_none() {
            let mount_path = catalog::data_path(workload.service_type().unwrap_or_default());
            workload.mounts.push(VolumeMount {
                claim: claim_name.clone(),
                mount_path: mount_path.to_string(),
            });
            self.platform.replace_workload(ns, &workload).await?;
            info!(%tenant, workload = %workload.name, %mount_path, "storage mounted");
        }

        let claim = self.platform.get_claim(ns, &claim_name).await?;
        Ok(StorageState::from_claim(claim.as_ref(), Some(&workload)))
    }

    /// Unmount and delete a workload's storage. Absent storage is success.
    pub async fn detach_storage(&self, tenant: &TenantKey, workload_name: &str) -> OrchestratorResult<()> {
        let ns = tenant.as_str();
        let claim_name = identity::secondary_name(workload_name, SecondaryKind::Claim);

        if let Some(mut workload) = self.platform.get_workload(ns, workload_name).await? {
            if workload.mount_for(&claim_name).is_some() {
                workload.mounts.retain(|m| m.claim != claim_name);
                self.platform.replace_workload(ns, &workload).await?;
                info!(%tenant, workload = %workload_name, "storage unmounted");
            }
        }

        let deleted = self.platform.delete_claim(ns, &claim_name).await.absent_ok()?;
        debug!(%tenant, claim = %claim_name, deleted, "storage detached");
        Ok(())
    }

    pub async fn get_storage(&self, tenant: &TenantKey, workload_name: &str) -> OrchestratorResult<StorageState> {
        let workload = self.workload(tenant, workload_name).await?;
        let claim_name = identity::secondary_name(&workload.name, SecondaryKind::Claim);
        let claim = self.platform.get_claim(tenant.as_str(), &claim_name).await?;
        Ok(StorageState::from_claim(claim.as_ref(), Some(&workload)))
    }
}
