use serde::Serialize;
use tracing::{debug, info};

use shield_core::TenantKey;
use shield_platform::{Autoscaler, PlatformError, PlatformResultExt};

use super::FeatureManager;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::identity::{self, SecondaryKind};

/// Upper bound on autoscaled replicas per workload.
pub const MAX_REPLICAS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AutoscalingPolicy {
    pub min: u32,
    pub max: u32,
    /// Target average CPU utilization, percent.
    pub cpu_target: u32,
}

impl AutoscalingPolicy {
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.min < 1 || self.min > self.max || self.max > MAX_REPLICAS {
            return Err(OrchestratorError::Validation(format!(
                "replica bounds must satisfy 1 <= min <= max <= {MAX_REPLICAS}, got min={} max={}",
                self.min, self.max
            )));
        }
        if !(1..=100).contains(&self.cpu_target) {
            return Err(OrchestratorError::Validation(format!(
                "cpu target must be 1-100 percent, got {}",
                self.cpu_target
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AutoscalingState {
    Disabled,
    Enabled(AutoscalingPolicy),
}

impl From<Option<&Autoscaler>> for AutoscalingState {
    fn from(autoscaler: Option<&Autoscaler>) -> Self {
        match autoscaler {
            Some(a) => Self::Enabled(AutoscalingPolicy {
                min: a.min,
                max: a.max,
                cpu_target: a.cpu_utilization,
            }),
            None => Self::Disabled,
        }
    }
}

impl FeatureManager {
    /// Create or replace the autoscaling policy of a workload.
    pub async fn configure_autoscaling(
        &self,
        tenant: &TenantKey,
        workload_name: &str,
        min: u32,
        max: u32,
        cpu_target: u32,
    ) -> OrchestratorResult<AutoscalingState> {
        let policy = AutoscalingPolicy {
            min,
            max,
            cpu_target,
        };
        policy.validate()?;

        let ns = tenant.as_str();
        let workload = self.workload(tenant, workload_name).await?;
        let autoscaler = Autoscaler {
            name: identity::secondary_name(&workload.name, SecondaryKind::Autoscaler),
            labels: workload.labels.clone(),
            target: workload.name.clone(),
            min,
            max,
            cpu_utilization: cpu_target,
        };

        let existing = self.platform.get_autoscaler(ns, &autoscaler.name).await?;
        if existing.as_ref() == Some(&autoscaler) {
            debug!(%tenant, workload = %workload.name, "autoscaling already configured");
            return Ok(AutoscalingState::Enabled(policy));
        }
        match existing {
            Some(_) => self.platform.replace_autoscaler(ns, &autoscaler).await?,
            None => match self.platform.create_autoscaler(ns, &autoscaler).await {
                // Created concurrently; ours is the desired state.
                Err(PlatformError::Conflict(_)) => {
                    self.platform.replace_autoscaler(ns, &autoscaler).await?
                }
                other => other?,
            },
        }

        info!(%tenant, workload = %workload.name, min, max, cpu_target, "autoscaling configured");
        Ok(AutoscalingState::Enabled(policy))
    }

    pub async fn disable_autoscaling(&self, tenant: &TenantKey, workload_name: &str) -> OrchestratorResult<()> {
        let name = identity::secondary_name(workload_name, SecondaryKind::Autoscaler);
        let deleted = self
            .platform
            .delete_autoscaler(tenant.as_str(), &name)
            .await
            .absent_ok()?;
        info!(%tenant, workload = %workload_name, deleted, "autoscaling disabled");
        Ok(())
    }

    pub async fn get_autoscaling(
        &self,
        tenant: &TenantKey,
        workload_name: &str,
    ) -> OrchestratorResult<AutoscalingState> {
        let name = identity::secondary_name(workload_name, SecondaryKind::Autoscaler);
        let autoscaler = self.platform.get_autoscaler(tenant.as_str(), &name).await?;
        Ok(AutoscalingState::from(autoscaler.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(min: u32, max: u32, cpu_target: u32) -> AutoscalingPolicy {
        AutoscalingPolicy { min, max, cpu_target }
    }

    #[test]
    fn bounds_are_checked() {
        assert!(policy(1, 1, 50).validate().is_ok());
        assert!(policy(2, 10, 70).validate().is_ok());
        assert!(policy(0, 3, 70).validate().is_err());
        assert!(policy(2, 1, 70).validate().is_err());
        assert!(policy(1, 11, 70).validate().is_err());
    }

    #[test]
    fn cpu_target_is_a_percentage() {
        assert!(policy(1, 2, 0).validate().is_err());
        assert!(policy(1, 2, 100).validate().is_ok());
        assert!(policy(1, 2, 101).validate().is_err());
    }
}
