//! Tenant monitoring: summary counts, resource usage, logs.
//!
//! Usage comes from the platform's metrics API, which clusters may not
//! run. When it is unavailable the snapshot still succeeds with usage
//! reported as unknown.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use shield_core::catalog::{self, Category};
use shield_core::labels;
use shield_core::quantity;
use shield_core::{PriceTable, TenantKey};
use shield_platform::{InstanceUsage, Platform};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::status::{self, InstanceStatus};

/// CPU and memory of one instance, summed over its containers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceUsage {
    pub cpu_millicores: u64,
    pub memory_mib: f64,
}

impl ResourceUsage {
    /// Sum container usage; `None` if any quantity is malformed.
    pub fn from_sample(sample: &InstanceUsage) -> Option<Self> {
        let mut cpu = 0u64;
        let mut memory = 0u64;
        for container in &sample.containers {
            cpu += quantity::parse_millicpu(&container.cpu).ok()?;
            memory += quantity::parse_bytes(&container.memory).ok()?;
        }
        Some(Self {
            cpu_millicores: cpu,
            memory_mib: quantity::to_mebibytes(memory),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceMetrics {
    pub instance: String,
    pub workload: Option<String>,
    pub status: InstanceStatus,
    /// `None` when metrics are unavailable.
    pub usage: Option<ResourceUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloutView {
    pub workload: String,
    pub desired: u32,
    pub ready: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoringSummary {
    pub total_instances: usize,
    pub total_workloads: usize,
    pub status_counts: BTreeMap<InstanceStatus, usize>,
    pub category_counts: BTreeMap<Category, usize>,
    /// `None` when metrics are unavailable.
    pub cpu_millicores: Option<u64>,
    pub memory_mib: Option<f64>,
    pub monthly_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoringSnapshot {
    pub summary: MonitoringSummary,
    pub instances: Vec<InstanceMetrics>,
    pub rollouts: Vec<RolloutView>,
}

#[derive(Clone)]
pub struct Monitor {
    platform: Arc<dyn Platform>,
    prices: Arc<PriceTable>,
    default_tail: u32,
}

impl Monitor {
    pub fn new(platform: Arc<dyn Platform>, prices: Arc<PriceTable>, default_tail: u32) -> Self {
        Self {
            platform,
            prices,
            default_tail,
        }
    }

    /// Usage samples keyed by instance, or `None` without a metrics API.
    async fn usage_index(&self, tenant: &TenantKey) -> Option<BTreeMap<String, InstanceUsage>> {
        match self.platform.instance_usage(tenant.as_str()).await {
            Ok(samples) => Some(
                samples
                    .into_iter()
                    .map(|s| (s.instance.clone(), s))
                    .collect(),
            ),
            Err(e) => {
                warn!(%tenant, error = %e, "metrics unavailable");
                None
            }
        }
    }

    pub async fn snapshot(&self, tenant: &TenantKey) -> OrchestratorResult<MonitoringSnapshot> {
        let ns = tenant.as_str();
        let selector = labels::managed();
        let workloads = self.platform.list_workloads(ns, &selector).await?;
        let instances = self.platform.list_instances(ns, &selector).await?;
        let usage = self.usage_index(tenant).await;

        let mut status_counts = BTreeMap::new();
        let mut category_counts = BTreeMap::new();
        let mut rows = Vec::new();
        let mut cpu_total = 0u64;
        let mut memory_total = 0f64;

        for instance in instances
            .iter()
            .filter(|i| i.label(labels::WORKLOAD).is_some())
        {
            let status = status::summarize(instance);
            *status_counts.entry(status).or_insert(0) += 1;
            let category = catalog::category(instance.label(labels::SERVICE_TYPE).unwrap_or_default());
            *category_counts.entry(category).or_insert(0) += 1;

            let sample = usage
                .as_ref()
                .and_then(|u| u.get(&instance.name))
                .and_then(ResourceUsage::from_sample);
            if let Some(sample) = sample {
                cpu_total += sample.cpu_millicores;
                memory_total += sample.memory_mib;
            }
            rows.push(InstanceMetrics {
                instance: instance.name.clone(),
                workload: instance.label(labels::WORKLOAD).map(str::to_string),
                status,
                usage: sample,
            });
        }

        let rollouts = workloads
            .iter()
            .map(|w| RolloutView {
                workload: w.name.clone(),
                desired: w.rollout.desired,
                ready: w.rollout.ready,
            })
            .collect();
        let monthly_cost = workloads
            .iter()
            .map(|w| self.prices.monthly(w.service_type().unwrap_or_default()))
            .sum();

        let metrics_available = usage.is_some();
        debug!(%tenant, instances = rows.len(), metrics_available, "monitoring snapshot");
        Ok(MonitoringSnapshot {
            summary: MonitoringSummary {
                total_instances: rows.len(),
                total_workloads: workloads.len(),
                status_counts,
                category_counts,
                cpu_millicores: metrics_available.then_some(cpu_total),
                memory_mib: metrics_available.then_some(memory_total),
                monthly_cost,
            },
            instances: rows,
            rollouts,
        })
    }

    /// Tail of an instance's log; `tail` defaults to the configured count.
    pub async fn instance_logs(
        &self,
        tenant: &TenantKey,
        instance: &str,
        tail: Option<u32>,
    ) -> OrchestratorResult<String> {
        let tail = tail.unwrap_or(self.default_tail);
        Ok(self
            .platform
            .instance_logs(tenant.as_str(), instance, tail)
            .await?)
    }

    /// Current usage of one instance; `None` when metrics are unavailable
    /// or the instance has not been sampled yet.
    pub async fn instance_usage(
        &self,
        tenant: &TenantKey,
        instance: &str,
    ) -> OrchestratorResult<Option<ResourceUsage>> {
        let instances = self
            .platform
            .list_instances(tenant.as_str(), &labels::managed())
            .await?;
        if !instances.iter().any(|i| i.name == instance) {
            return Err(OrchestratorError::NotFound(format!("instance {tenant}/{instance}")));
        }
        Ok(self
            .usage_index(tenant)
            .await
            .and_then(|u| u.get(instance).and_then(ResourceUsage::from_sample)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shield_platform::ContainerUsage;

    #[test]
    fn sample_sums_containers() {
        let sample = InstanceUsage {
            instance: "x".to_string(),
            containers: vec![
                ContainerUsage {
                    name: "a".to_string(),
                    cpu: "250m".to_string(),
                    memory: "64Mi".to_string(),
                },
                ContainerUsage {
                    name: "b".to_string(),
                    cpu: "2000000n".to_string(),
                    memory: "32Mi".to_string(),
                },
            ],
        };
        let usage = ResourceUsage::from_sample(&sample).unwrap();
        assert_eq!(usage.cpu_millicores, 252);
        assert_eq!(usage.memory_mib, 96.0);
    }

    #[test]
    fn malformed_sample_is_unknown() {
        let sample = InstanceUsage {
            instance: "x".to_string(),
            containers: vec![ContainerUsage {
                name: "a".to_string(),
                cpu: "fast".to_string(),
                memory: "64Mi".to_string(),
            }],
        };
        assert!(ResourceUsage::from_sample(&sample).is_none());
    }
}
