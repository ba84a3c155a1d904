//! Status aggregation — one read model over scattered platform state.
//!
//! The instance listing is the backbone: if it fails, the call fails.
//! Every other source is auxiliary. A failed per-kind listing degrades
//! that field to [`Field::Unknown`] for every row; a failed per-item
//! lookup degrades it for that row only.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use shield_core::catalog::{self, Category};
use shield_core::labels;
use shield_core::{PriceTable, TenantKey};
use shield_platform::{
    Claim, ContainerState, Exposure, Instance, InstancePhase, Platform, PlatformResult, Route,
    Schedule, Workload,
};

use crate::error::OrchestratorResult;
use crate::features::{AutoscalingState, StorageState};
use crate::identity::{self, SecondaryKind};

/// Waiting reasons that mean the container will not start on its own.
const FAILING_REASONS: &[&str] = &[
    "CrashLoopBackOff",
    "ErrImagePull",
    "ImagePullBackOff",
    "InvalidImageName",
    "CreateContainerConfigError",
    "CreateContainerError",
    "RunContainerError",
];

/// Waiting reasons of a container on its way up.
const STARTING_REASONS: &[&str] = &["ContainerCreating", "PodInitializing"];

/// Readiness of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Ready,
    Starting,
    Pending,
    Failing,
    Completed,
    Terminating,
    Unknown,
}

/// A value that could not be read degrades to `Unknown`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Field<T> {
    Known(T),
    Unknown,
}

impl<T> Field<T> {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn known(&self) -> Option<&T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExposureView {
    pub name: String,
    pub port: u16,
    pub external_port: Option<u16>,
}

/// Everything known about one running instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadView {
    pub instance: String,
    pub workload: String,
    pub service_type: String,
    pub category: Category,
    pub group_id: Option<String>,
    pub role: Option<String>,
    pub owner: Option<String>,
    pub image: Option<String>,
    pub status: InstanceStatus,
    pub restarts: u32,
    pub ip: Option<String>,
    pub node: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub age: Option<String>,
    pub monthly_cost: f64,
    pub exposure: Field<Option<ExposureView>>,
    pub route: Field<Option<String>>,
    pub autoscaling: Field<AutoscalingState>,
    pub storage: Field<StorageState>,
    /// Cron expression of scheduled backups, if any.
    pub backup: Field<Option<String>>,
}

/// Summarize container and phase state into one readiness value.
pub fn summarize(instance: &Instance) -> InstanceStatus {
    if instance.terminating {
        return InstanceStatus::Terminating;
    }
    match instance.phase {
        InstancePhase::Succeeded => return InstanceStatus::Completed,
        InstancePhase::Failed => return InstanceStatus::Failing,
        InstancePhase::Unknown => return InstanceStatus::Unknown,
        InstancePhase::Pending | InstancePhase::Running => {}
    }

    let failing = instance.containers.iter().any(|c| match &c.state {
        ContainerState::Waiting {
            reason: Some(reason),
        } => FAILING_REASONS.contains(&reason.as_str()),
        ContainerState::Terminated { exit_code, .. } => *exit_code != 0,
        _ => false,
    });
    if failing {
        return InstanceStatus::Failing;
    }

    match instance.phase {
        InstancePhase::Pending => {
            let starting = instance.containers.iter().any(|c| {
                matches!(&c.state, ContainerState::Waiting { reason: Some(r) } if STARTING_REASONS.contains(&r.as_str()))
            });
            if starting {
                InstanceStatus::Starting
            } else {
                InstanceStatus::Pending
            }
        }
        _ => {
            if !instance.containers.is_empty() && instance.containers.iter().all(|c| c.ready) {
                InstanceStatus::Ready
            } else {
                InstanceStatus::Starting
            }
        }
    }
}

/// Compact age like `3d`, `5h`, `12m`, `40s`.
pub fn format_age(started_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - started_at).num_seconds().max(0);
    match secs {
        s if s >= 86_400 => format!("{}d", s / 86_400),
        s if s >= 3_600 => format!("{}h", s / 3_600),
        s if s >= 60 => format!("{}m", s / 60),
        s => format!("{s}s"),
    }
}

/// Index a listing by name, or degrade when the listing failed.
fn by_name<T>(
    tenant: &TenantKey,
    kind: &str,
    listing: PlatformResult<Vec<T>>,
    name: impl Fn(&T) -> &str,
) -> Option<BTreeMap<String, T>> {
    match listing {
        Ok(items) => Some(
            items
                .into_iter()
                .map(|item| (name(&item).to_string(), item))
                .collect(),
        ),
        Err(e) => {
            warn!(%tenant, kind, error = %e, "listing failed, field degraded");
            None
        }
    }
}

/// Look up the secondary of `kind` for `canonical` in an optional index.
fn lookup<T: Clone, V>(
    index: &Option<BTreeMap<String, T>>,
    canonical: &str,
    kind: SecondaryKind,
    view: impl Fn(Option<&T>) -> V,
) -> Field<V> {
    match index {
        Some(items) => Field::Known(view(items.get(&identity::secondary_name(canonical, kind)))),
        None => Field::Unknown,
    }
}

#[derive(Clone)]
pub struct StatusAggregator {
    platform: Arc<dyn Platform>,
    prices: Arc<PriceTable>,
}

impl StatusAggregator {
    pub fn new(platform: Arc<dyn Platform>, prices: Arc<PriceTable>) -> Self {
        Self { platform, prices }
    }

    /// One view per instance of every managed workload in the tenant.
    pub async fn list_workloads(&self, tenant: &TenantKey) -> OrchestratorResult<Vec<WorkloadView>> {
        let ns = tenant.as_str();
        if !self.platform.namespace_exists(ns).await? {
            debug!(%tenant, "namespace missing, nothing to list");
            return Ok(Vec::new());
        }

        let selector = labels::managed();
        let instances = self.platform.list_instances(ns, &selector).await?;

        let workloads = by_name(
            tenant,
            "workload",
            self.platform.list_workloads(ns, &selector).await,
            |w: &Workload| w.name.as_str(),
        );
        let exposures = by_name(
            tenant,
            "exposure",
            self.platform.list_exposures(ns, &selector).await,
            |e: &Exposure| e.name.as_str(),
        );
        let routes = by_name(
            tenant,
            "route",
            self.platform.list_routes(ns, &selector).await,
            |r: &Route| r.name.as_str(),
        );
        let claims = by_name(
            tenant,
            "claim",
            self.platform.list_claims(ns, &selector).await,
            |c: &Claim| c.name.as_str(),
        );
        let schedules = by_name(
            tenant,
            "schedule",
            self.platform.list_schedules(ns, &selector).await,
            |s: &Schedule| s.name.as_str(),
        );

        let known: BTreeSet<String> = workloads
            .as_ref()
            .map(|w| w.keys().cloned().collect())
            .unwrap_or_default();
        let mut autoscaling: BTreeMap<String, Field<AutoscalingState>> = BTreeMap::new();
        let now = Utc::now();
        let mut views = Vec::new();

        for instance in instances {
            // Job pods and strays carry no workload label.
            let Some(labeled) = instance.label(labels::WORKLOAD) else {
                continue;
            };
            let canonical = identity::owner_of(&instance.name, &known)
                .cloned()
                .unwrap_or_else(|| labeled.to_string());
            let workload = workloads.as_ref().and_then(|w| w.get(&canonical));

            if !autoscaling.contains_key(&canonical) {
                let field = self.autoscaling_of(tenant, &canonical).await;
                autoscaling.insert(canonical.clone(), field);
            }

            let service_type = instance
                .label(labels::SERVICE_TYPE)
                .or_else(|| workload.and_then(Workload::service_type))
                .unwrap_or_default()
                .to_string();

            views.push(WorkloadView {
                status: summarize(&instance),
                restarts: instance.containers.iter().map(|c| c.restarts).sum(),
                category: catalog::category(&service_type),
                monthly_cost: self.prices.monthly(&service_type),
                group_id: instance.label(labels::GROUP).map(str::to_string),
                role: instance.label(labels::ROLE).map(str::to_string),
                owner: instance.label(labels::OWNER).map(str::to_string),
                image: workload.map(|w| w.image.clone()),
                age: instance.started_at.map(|t| format_age(t, now)),
                started_at: instance.started_at,
                exposure: lookup(&exposures, &canonical, SecondaryKind::Exposure, |e| {
                    e.map(|e| ExposureView {
                        name: e.name.clone(),
                        port: e.port,
                        external_port: e.external_port,
                    })
                }),
                route: lookup(&routes, &canonical, SecondaryKind::Route, |r| {
                    r.map(|r| r.host.clone())
                }),
                storage: lookup(&claims, &canonical, SecondaryKind::Claim, |c| {
                    StorageState::from_claim(c, workload)
                }),
                backup: lookup(&schedules, &canonical, SecondaryKind::BackupSchedule, |s| {
                    s.map(|s| s.cron.clone())
                }),
                autoscaling: autoscaling
                    .get(&canonical)
                    .cloned()
                    .unwrap_or(Field::Unknown),
                ip: instance.ip,
                node: instance.node,
                instance: instance.name,
                workload: canonical,
                service_type,
            });
        }

        debug!(%tenant, rows = views.len(), "status aggregated");
        Ok(views)
    }

    async fn autoscaling_of(&self, tenant: &TenantKey, canonical: &str) -> Field<AutoscalingState> {
        let name = identity::secondary_name(canonical, SecondaryKind::Autoscaler);
        match self.platform.get_autoscaler(tenant.as_str(), &name).await {
            Ok(found) => Field::Known(AutoscalingState::from(found.as_ref())),
            Err(e) => {
                warn!(%tenant, workload = %canonical, error = %e, "autoscaling lookup failed");
                Field::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use shield_platform::ContainerStatus;

    fn instance(phase: InstancePhase, containers: Vec<(bool, ContainerState)>) -> Instance {
        Instance {
            name: "nginx-1-abc-xyz".to_string(),
            labels: labels::for_workload("nginx-1"),
            phase,
            ip: None,
            node: None,
            started_at: None,
            terminating: false,
            containers: containers
                .into_iter()
                .map(|(ready, state)| ContainerStatus {
                    name: "nginx".to_string(),
                    ready,
                    restarts: 0,
                    state,
                })
                .collect(),
        }
    }

    fn waiting(reason: &str) -> ContainerState {
        ContainerState::Waiting {
            reason: Some(reason.to_string()),
        }
    }

    #[test]
    fn ready_when_every_container_is_ready() {
        let i = instance(InstancePhase::Running, vec![(true, ContainerState::Running)]);
        assert_eq!(summarize(&i), InstanceStatus::Ready);

        let i = instance(
            InstancePhase::Running,
            vec![(true, ContainerState::Running), (false, ContainerState::Running)],
        );
        assert_eq!(summarize(&i), InstanceStatus::Starting);
    }

    #[test]
    fn crash_loops_are_failing() {
        let i = instance(InstancePhase::Running, vec![(false, waiting("CrashLoopBackOff"))]);
        assert_eq!(summarize(&i), InstanceStatus::Failing);

        let i = instance(InstancePhase::Pending, vec![(false, waiting("ImagePullBackOff"))]);
        assert_eq!(summarize(&i), InstanceStatus::Failing);
    }

    #[test]
    fn pending_splits_on_container_creation() {
        let i = instance(InstancePhase::Pending, vec![(false, waiting("ContainerCreating"))]);
        assert_eq!(summarize(&i), InstanceStatus::Starting);

        let i = instance(InstancePhase::Pending, vec![]);
        assert_eq!(summarize(&i), InstanceStatus::Pending);
    }

    #[test]
    fn terminal_phases() {
        let mut i = instance(InstancePhase::Running, vec![(true, ContainerState::Running)]);
        i.terminating = true;
        assert_eq!(summarize(&i), InstanceStatus::Terminating);

        let i = instance(InstancePhase::Succeeded, vec![]);
        assert_eq!(summarize(&i), InstanceStatus::Completed);
        let i = instance(InstancePhase::Unknown, vec![]);
        assert_eq!(summarize(&i), InstanceStatus::Unknown);
    }

    #[test]
    fn ages_are_compact() {
        let now = Utc::now();
        assert_eq!(format_age(now - Duration::seconds(40), now), "40s");
        assert_eq!(format_age(now - Duration::minutes(12), now), "12m");
        assert_eq!(format_age(now - Duration::hours(5), now), "5h");
        assert_eq!(format_age(now - Duration::days(3), now), "3d");
        assert_eq!(format_age(now + Duration::seconds(5), now), "0s");
    }
}
