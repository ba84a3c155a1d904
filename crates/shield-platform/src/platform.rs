//! The capability interface every backend implements.

use async_trait::async_trait;

use shield_core::labels::Labels;

use crate::error::PlatformResult;
use crate::types::{
    Autoscaler, Claim, Exposure, Instance, InstanceUsage, Job, Namespace, Route, Schedule, Secret,
    Workload,
};

/// Container-orchestration capabilities used by the control plane.
///
/// Creates fail with `Conflict` when the name is taken, deletes and
/// replaces fail with `NotFound` when it is not. Gets return `Ok(None)`
/// for absent resources; lists on a missing namespace return an empty
/// vector. Namespaced creates fail with `NotFound` when the namespace
/// itself is missing.
#[async_trait]
pub trait Platform: Send + Sync {
    // ── Namespaces ────────────────────────────────────────────────

    async fn create_namespace(&self, namespace: &Namespace) -> PlatformResult<()>;
    async fn delete_namespace(&self, name: &str) -> PlatformResult<()>;
    async fn namespace_exists(&self, name: &str) -> PlatformResult<bool>;
    async fn list_namespaces(&self, selector: &Labels) -> PlatformResult<Vec<Namespace>>;

    // ── Workloads ─────────────────────────────────────────────────

    async fn create_workload(&self, ns: &str, workload: &Workload) -> PlatformResult<()>;
    async fn replace_workload(&self, ns: &str, workload: &Workload) -> PlatformResult<()>;
    async fn delete_workload(&self, ns: &str, name: &str) -> PlatformResult<()>;
    async fn get_workload(&self, ns: &str, name: &str) -> PlatformResult<Option<Workload>>;
    async fn list_workloads(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Workload>>;

    // ── Instances ─────────────────────────────────────────────────

    async fn list_instances(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Instance>>;

    /// Last `tail_lines` lines of the instance's primary container log.
    async fn instance_logs(&self, ns: &str, name: &str, tail_lines: u32) -> PlatformResult<String>;

    /// Current usage of every instance in the namespace. Best-effort:
    /// clusters without a metrics API report `Unavailable`.
    async fn instance_usage(&self, ns: &str) -> PlatformResult<Vec<InstanceUsage>>;

    // ── Exposures ─────────────────────────────────────────────────

    async fn create_exposure(&self, ns: &str, exposure: &Exposure) -> PlatformResult<()>;
    async fn replace_exposure(&self, ns: &str, exposure: &Exposure) -> PlatformResult<()>;
    async fn delete_exposure(&self, ns: &str, name: &str) -> PlatformResult<()>;
    async fn get_exposure(&self, ns: &str, name: &str) -> PlatformResult<Option<Exposure>>;
    async fn list_exposures(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Exposure>>;

    // ── Routes ────────────────────────────────────────────────────

    async fn create_route(&self, ns: &str, route: &Route) -> PlatformResult<()>;
    async fn delete_route(&self, ns: &str, name: &str) -> PlatformResult<()>;
    async fn get_route(&self, ns: &str, name: &str) -> PlatformResult<Option<Route>>;
    async fn list_routes(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Route>>;

    // ── Claims ────────────────────────────────────────────────────

    async fn create_claim(&self, ns: &str, claim: &Claim) -> PlatformResult<()>;
    async fn resize_claim(&self, ns: &str, name: &str, size: &str) -> PlatformResult<()>;
    async fn delete_claim(&self, ns: &str, name: &str) -> PlatformResult<()>;
    async fn get_claim(&self, ns: &str, name: &str) -> PlatformResult<Option<Claim>>;
    async fn list_claims(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Claim>>;

    // ── Autoscalers ───────────────────────────────────────────────

    async fn create_autoscaler(&self, ns: &str, autoscaler: &Autoscaler) -> PlatformResult<()>;
    async fn replace_autoscaler(&self, ns: &str, autoscaler: &Autoscaler) -> PlatformResult<()>;
    async fn delete_autoscaler(&self, ns: &str, name: &str) -> PlatformResult<()>;
    async fn get_autoscaler(&self, ns: &str, name: &str) -> PlatformResult<Option<Autoscaler>>;
    async fn list_autoscalers(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Autoscaler>>;

    // ── Jobs and schedules ────────────────────────────────────────

    async fn create_job(&self, ns: &str, job: &Job) -> PlatformResult<()>;
    async fn list_jobs(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Job>>;
    /// Deletes the job together with its instances.
    async fn delete_job(&self, ns: &str, name: &str) -> PlatformResult<()>;

    async fn create_schedule(&self, ns: &str, schedule: &Schedule) -> PlatformResult<()>;
    async fn replace_schedule(&self, ns: &str, schedule: &Schedule) -> PlatformResult<()>;
    async fn delete_schedule(&self, ns: &str, name: &str) -> PlatformResult<()>;
    async fn get_schedule(&self, ns: &str, name: &str) -> PlatformResult<Option<Schedule>>;
    async fn list_schedules(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Schedule>>;

    // ── Secrets ───────────────────────────────────────────────────

    async fn get_secret(&self, ns: &str, name: &str) -> PlatformResult<Option<Secret>>;
    async fn create_secret(&self, ns: &str, secret: &Secret) -> PlatformResult<()>;
}
