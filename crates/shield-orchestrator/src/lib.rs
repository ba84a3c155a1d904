//! shield-orchestrator — tenant workload orchestration for Shield.
//!
//! Turns operator requests ("deploy a postgres for Acme", "give it 10Gi
//! of storage") into platform resources, and reads those resources back
//! into one status model.
//!
//! ```text
//!                      ┌──────────────┐
//!                      │ Orchestrator │
//!                      └──────┬───────┘
//!      ┌──────────┬──────────┼───────────┬───────────┬──────────┐
//!      ▼          ▼          ▼           ▼           ▼          ▼
//!  Tenants    Provisioner  Features    Status     Monitor    Resolver
//!      │          │          │  └─Quota   │           │          │
//!      └──────────┴──────────┴─────┬──────┴───────────┴──────────┘
//!                                  ▼
//!                         Arc<dyn Platform>
//!                   (KubePlatform / MemoryPlatform)
//! ```
//!
//! Every operation is single-request and converges: creates adopt what
//! already exists, deletes treat absence as success, and nothing is
//! rolled back.

pub mod error;
pub mod features;
pub mod group;
pub mod identity;
pub mod monitoring;
pub mod quota;
pub mod status;
pub mod tenants;

use std::sync::Arc;

use shield_core::{ShieldConfig, TenantKey};
use shield_platform::Platform;

pub use error::{MemberFailure, OrchestratorError, OrchestratorResult};
pub use features::{
    AutoscalingPolicy, AutoscalingState, BackupRecord, BackupState, FeatureManager, StorageState,
};
pub use group::{
    CreateRequest, DeletionReport, GroupMember, GroupOutcome, GroupProvisioner, ResourceGroup,
};
pub use identity::{Resolver, SecondaryKind};
pub use monitoring::{Monitor, MonitoringSnapshot, ResourceUsage};
pub use quota::{QuotaTracker, QuotaUsage};
pub use status::{Field, InstanceStatus, StatusAggregator, WorkloadView};
pub use tenants::{Registration, TenantManager, TenantSummary};

/// Entry point wiring every component to one platform.
#[derive(Clone)]
pub struct Orchestrator {
    tenants: TenantManager,
    resolver: Resolver,
    quota: QuotaTracker,
    provisioner: GroupProvisioner,
    features: FeatureManager,
    status: StatusAggregator,
    monitor: Monitor,
}

impl Orchestrator {
    pub fn new(platform: Arc<dyn Platform>, config: ShieldConfig) -> OrchestratorResult<Self> {
        let ceiling = config.storage_ceiling_bytes()?;
        let prices = Arc::new(config.price_table());

        let resolver = Resolver::new(platform.clone());
        let quota = QuotaTracker::new(platform.clone(), ceiling);
        let provisioner = GroupProvisioner::new(
            platform.clone(),
            resolver.clone(),
            config.ingress.clone(),
            config.registry.pull_secret.clone(),
        );
        let features = FeatureManager::new(platform.clone(), quota.clone(), config.backup.clone());
        let status = StatusAggregator::new(platform.clone(), prices.clone());
        let monitor = Monitor::new(
            platform.clone(),
            prices.clone(),
            config.platform.log_tail_lines,
        );
        let tenants = TenantManager::new(
            platform,
            config.namespace_policy(),
            config.registry,
            prices,
        );

        Ok(Self {
            tenants,
            resolver,
            quota,
            provisioner,
            features,
            status,
            monitor,
        })
    }

    // ── Tenants ───────────────────────────────────────────────────

    /// Namespace key for a company, without touching the platform.
    pub fn tenant_key(&self, company: &str) -> OrchestratorResult<TenantKey> {
        self.tenants.key(company)
    }

    pub async fn register_tenant(&self, company: &str) -> OrchestratorResult<Registration> {
        self.tenants.register(company).await
    }

    pub async fn delete_tenant(&self, company: &str) -> OrchestratorResult<bool> {
        self.tenants.delete(company).await
    }

    pub async fn overview(&self) -> OrchestratorResult<Vec<TenantSummary>> {
        self.tenants.overview().await
    }

    // ── Identity and quota ────────────────────────────────────────

    /// Canonical workload name owning an instance.
    pub async fn resolve(&self, tenant: &TenantKey, instance_name: &str) -> OrchestratorResult<String> {
        Ok(self
            .resolver
            .resolve_workload(tenant, instance_name)
            .await?
            .name)
    }

    pub async fn quota_usage(&self, tenant: &TenantKey) -> OrchestratorResult<QuotaUsage> {
        self.quota.usage(tenant).await
    }

    // ── Groups ────────────────────────────────────────────────────

    pub async fn create_group(
        &self,
        tenant: &TenantKey,
        request: &CreateRequest,
    ) -> OrchestratorResult<GroupOutcome> {
        self.provisioner.create_group(tenant, request).await
    }

    pub async fn delete_group(&self, tenant: &TenantKey, group_id: &str) -> OrchestratorResult<DeletionReport> {
        self.provisioner.delete_group(tenant, group_id).await
    }

    pub async fn delete_by_instance_name(
        &self,
        tenant: &TenantKey,
        instance_name: &str,
    ) -> OrchestratorResult<DeletionReport> {
        self.provisioner
            .delete_by_instance_name(tenant, instance_name)
            .await
    }

    // ── Features ──────────────────────────────────────────────────

    pub async fn attach_storage(
        &self,
        tenant: &TenantKey,
        workload: &str,
        size: &str,
    ) -> OrchestratorResult<StorageState> {
        self.features.attach_storage(tenant, workload, size).await
    }

    pub async fn detach_storage(&self, tenant: &TenantKey, workload: &str) -> OrchestratorResult<()> {
        self.features.detach_storage(tenant, workload).await
    }

    pub async fn get_storage(&self, tenant: &TenantKey, workload: &str) -> OrchestratorResult<StorageState> {
        self.features.get_storage(tenant, workload).await
    }

    pub async fn configure_autoscaling(
        &self,
        tenant: &TenantKey,
        workload: &str,
        min: u32,
        max: u32,
        cpu_target: u32,
    ) -> OrchestratorResult<AutoscalingState> {
        self.features
            .configure_autoscaling(tenant, workload, min, max, cpu_target)
            .await
    }

    pub async fn disable_autoscaling(&self, tenant: &TenantKey, workload: &str) -> OrchestratorResult<()> {
        self.features.disable_autoscaling(tenant, workload).await
    }

    pub async fn get_autoscaling(
        &self,
        tenant: &TenantKey,
        workload: &str,
    ) -> OrchestratorResult<AutoscalingState> {
        self.features.get_autoscaling(tenant, workload).await
    }

    pub async fn create_backup(&self, tenant: &TenantKey, workload: &str) -> OrchestratorResult<BackupRecord> {
        self.features.create_backup(tenant, workload).await
    }

    pub async fn restore_backup(
        &self,
        tenant: &TenantKey,
        workload: &str,
        backup: Option<&str>,
    ) -> OrchestratorResult<BackupRecord> {
        self.features.restore_backup(tenant, workload, backup).await
    }

    pub async fn list_backups(
        &self,
        tenant: &TenantKey,
        workload: &str,
    ) -> OrchestratorResult<Vec<BackupRecord>> {
        self.features.list_backups(tenant, workload).await
    }

    pub async fn configure_auto_backup(
        &self,
        tenant: &TenantKey,
        workload: &str,
        cron: Option<&str>,
    ) -> OrchestratorResult<BackupState> {
        self.features
            .configure_auto_backup(tenant, workload, cron)
            .await
    }

    pub async fn disable_auto_backup(&self, tenant: &TenantKey, workload: &str) -> OrchestratorResult<()> {
        self.features.disable_auto_backup(tenant, workload).await
    }

    pub async fn get_backup(&self, tenant: &TenantKey, workload: &str) -> OrchestratorResult<BackupState> {
        self.features.get_backup(tenant, workload).await
    }

    // ── Read model ────────────────────────────────────────────────

    pub async fn list_workloads(&self, tenant: &TenantKey) -> OrchestratorResult<Vec<WorkloadView>> {
        self.status.list_workloads(tenant).await
    }

    pub async fn monitoring(&self, tenant: &TenantKey) -> OrchestratorResult<MonitoringSnapshot> {
        self.monitor.snapshot(tenant).await
    }

    pub async fn instance_logs(
        &self,
        tenant: &TenantKey,
        instance: &str,
        tail: Option<u32>,
    ) -> OrchestratorResult<String> {
        self.monitor.instance_logs(tenant, instance, tail).await
    }

    pub async fn instance_usage(
        &self,
        tenant: &TenantKey,
        instance: &str,
    ) -> OrchestratorResult<Option<ResourceUsage>> {
        self.monitor.instance_usage(tenant, instance).await
    }
}
