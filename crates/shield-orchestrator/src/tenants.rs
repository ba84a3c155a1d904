//! Tenant registration, deletion, and the cross-tenant overview.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use shield_core::config::RegistryConfig;
use shield_core::labels::{self, Labels};
use shield_core::{NamespacePolicy, PriceTable, TenantKey};
use shield_platform::{Namespace, Platform, PlatformResultExt, Secret};

use crate::error::{OrchestratorError, OrchestratorResult};

/// Labels stamped on every tenant namespace.
fn tenant_labels(company: Option<&str>) -> Labels {
    let mut out = labels::managed();
    out.insert(labels::TENANT.to_string(), "true".to_string());
    if let Some(company) = company.map(labels::label_value).filter(|c| !c.is_empty()) {
        out.insert(labels::COMPANY.to_string(), company);
    }
    out
}

/// Create the tenant namespace unless it already exists.
pub(crate) async fn ensure_namespace(
    platform: &dyn Platform,
    tenant: &TenantKey,
    company: Option<&str>,
) -> OrchestratorResult<bool> {
    let namespace = Namespace {
        name: tenant.as_str().to_string(),
        labels: tenant_labels(company),
    };
    let created = platform.create_namespace(&namespace).await.existing_ok()?;
    if created {
        info!(%tenant, "tenant namespace created");
    } else {
        debug!(%tenant, "tenant namespace already present");
    }
    Ok(created)
}

/// Result of registering a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub tenant: TenantKey,
    pub created: bool,
    /// Name of the pull secret copied in, if one is configured.
    pub pull_secret: Option<String>,
}

/// One row of the admin overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenantSummary {
    pub tenant: TenantKey,
    pub company: Option<String>,
    pub workloads: usize,
    pub instances: usize,
    pub monthly_cost: f64,
    /// Set when the tenant could not be read; counts are zero then.
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct TenantManager {
    platform: Arc<dyn Platform>,
    policy: NamespacePolicy,
    registry: RegistryConfig,
    prices: Arc<PriceTable>,
}

impl TenantManager {
    pub fn new(
        platform: Arc<dyn Platform>,
        policy: NamespacePolicy,
        registry: RegistryConfig,
        prices: Arc<PriceTable>,
    ) -> Self {
        Self {
            platform,
            policy,
            registry,
            prices,
        }
    }

    /// Namespace key of a company under the configured policy.
    pub fn key(&self, company: &str) -> OrchestratorResult<TenantKey> {
        Ok(TenantKey::derive(company, &self.policy)?)
    }

    /// Ensure the company's namespace and copy the registry pull secret.
    pub async fn register(&self, company: &str) -> OrchestratorResult<Registration> {
        let tenant = self.key(company)?;
        let created = ensure_namespace(self.platform.as_ref(), &tenant, Some(company)).await?;
        let pull_secret = self.propagate_pull_secret(&tenant).await?;
        info!(%tenant, %company, created, "tenant registered");
        Ok(Registration {
            tenant,
            created,
            pull_secret,
        })
    }

    async fn propagate_pull_secret(&self, tenant: &TenantKey) -> OrchestratorResult<Option<String>> {
        let Some(name) = self.registry.pull_secret.as_deref() else {
            return Ok(None);
        };
        let source = self
            .platform
            .get_secret(&self.registry.source_namespace, name)
            .await?
            .ok_or_else(|| {
                OrchestratorError::NotFound(format!(
                    "pull secret {}/{name}",
                    self.registry.source_namespace
                ))
            })?;

        let copy = Secret {
            name: name.to_string(),
            labels: labels::managed(),
            kind: source.kind,
            data: source.data,
        };
        let created = self
            .platform
            .create_secret(tenant.as_str(), &copy)
            .await
            .existing_ok()?;
        debug!(%tenant, secret = %name, created, "pull secret propagated");
        Ok(Some(name.to_string()))
    }

    /// Delete the company's namespace and everything in it.
    ///
    /// Returns `false` when there was nothing to delete.
    pub async fn delete(&self, company: &str) -> OrchestratorResult<bool> {
        let tenant = self.key(company)?;
        let deleted = self
            .platform
            .delete_namespace(tenant.as_str())
            .await
            .absent_ok()?;
        info!(%tenant, deleted, "tenant deleted");
        Ok(deleted)
    }

    /// Every tenant with its workload count, instance count and cost.
    ///
    /// A tenant that cannot be read is reported with its error instead of
    /// failing the whole overview.
    pub async fn overview(&self) -> OrchestratorResult<Vec<TenantSummary>> {
        let mut selector = labels::managed();
        selector.insert(labels::TENANT.to_string(), "true".to_string());
        let namespaces = self.platform.list_namespaces(&selector).await?;

        let mut out = Vec::with_capacity(namespaces.len());
        for namespace in namespaces {
            let tenant = TenantKey::from_namespace(namespace.name);
            let company = namespace.labels.get(labels::COMPANY).cloned();
            let summary = match self.summarize(&tenant).await {
                Ok((workloads, instances, monthly_cost)) => TenantSummary {
                    tenant,
                    company,
                    workloads,
                    instances,
                    monthly_cost,
                    error: None,
                },
                Err(e) => {
                    warn!(%tenant, error = %e, "tenant overview degraded");
                    TenantSummary {
                        tenant,
                        company,
                        workloads: 0,
                        instances: 0,
                        monthly_cost: 0.0,
                        error: Some(e.to_string()),
                    }
                }
            };
            out.push(summary);
        }
        Ok(out)
    }

    async fn summarize(&self, tenant: &TenantKey) -> OrchestratorResult<(usize, usize, f64)> {
        let workloads = self
            .platform
            .list_workloads(tenant.as_str(), &labels::managed())
            .await?;
        let instances = self
            .platform
            .list_instances(tenant.as_str(), &labels::managed())
            .await?;

        let names: BTreeSet<&str> = workloads.iter().map(|w| w.name.as_str()).collect();
        let running = instances
            .iter()
            .filter(|i| i.label(labels::WORKLOAD).is_some_and(|w| names.contains(w)))
            .count();
        let cost = workloads
            .iter()
            .map(|w| self.prices.monthly(w.service_type().unwrap_or_default()))
            .sum();
        Ok((workloads.len(), running, cost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_labels_mark_namespace() {
        let labels = tenant_labels(Some("Acme Corp"));
        assert_eq!(labels[labels::TENANT], "true");
        assert_eq!(labels[labels::COMPANY], "Acme-Corp");
        assert_eq!(labels[labels::MANAGED_BY], labels::MANAGED_BY_VALUE);

        let anonymous = tenant_labels(None);
        assert!(!anonymous.contains_key(labels::COMPANY));
    }
}
