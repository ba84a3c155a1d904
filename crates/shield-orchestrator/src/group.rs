//! Group provisioning and teardown.
//!
//! A request expands (through the catalog) into one or more members.
//! Members are created in dependency order, data tier first, each step
//! create-or-adopt. Nothing is rolled back: a failed member is reported
//! and members depending on it are skipped.
//!
//! Teardown finds members by the group label and deletes each with its
//! templated secondaries, then sweeps anything else carrying the label.
//! Resources already gone count as deleted, so teardown is retry-safe.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use shield_core::catalog::{self, BundleTemplate, Category, Offering, ServiceTemplate};
use shield_core::config::IngressConfig;
use shield_core::labels::{self, Labels};
use shield_core::TenantKey;
use shield_platform::{
    Exposure, Platform, PlatformResult, PlatformResultExt, Rollout, Route, Workload,
};

use crate::error::{MemberFailure, OrchestratorError, OrchestratorResult};
use crate::identity::{self, Resolver, SecondaryKind};
use crate::tenants;

/// Longest canonical name; leaves room for the longest secondary suffix.
const MAX_CANONICAL_LEN: usize = 47;
const NAME_DIGITS: usize = 4;
const PASSWORD_LEN: usize = 20;
const PASSWORD_ALPHABET: &[u8] = b"abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";

// ── Requests and results ──────────────────────────────────────────

/// What a caller asks to deploy.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    /// A catalog service type or bundle name.
    pub service_type: String,
    /// Canonical name (or group id, for bundles); generated when absent.
    pub name: Option<String>,
    /// Required for the custom type, ignored otherwise.
    pub image: Option<String>,
    pub port: Option<u16>,
    /// Extra environment, applied to every member over catalog defaults.
    pub env: BTreeMap<String, String>,
    pub owner: String,
    pub replicas: Option<u32>,
}

/// One provisioned member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMember {
    pub name: String,
    pub service_type: String,
    pub role: Option<String>,
    pub exposure: String,
    pub external_port: Option<u16>,
    pub host: Option<String>,
}

/// A set of workloads created and destroyed as one unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceGroup {
    pub tenant: TenantKey,
    /// `None` for singletons, which carry no group label.
    pub group_id: Option<String>,
    pub members: Vec<GroupMember>,
}

/// Outcome of a group creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GroupOutcome {
    Complete(ResourceGroup),
    Partial {
        group_id: String,
        succeeded: Vec<String>,
        failed: Vec<MemberFailure>,
    },
}

impl GroupOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    /// Turn a partial outcome into [`OrchestratorError::PartialFailure`].
    pub fn into_result(self) -> OrchestratorResult<ResourceGroup> {
        match self {
            Self::Complete(group) => Ok(group),
            Self::Partial {
                group_id,
                succeeded,
                failed,
            } => Err(OrchestratorError::PartialFailure {
                group_id,
                succeeded,
                failed,
            }),
        }
    }
}

/// What a teardown removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    /// `kind/name` of every resource deleted by this call.
    pub deleted: Vec<String>,
    /// `kind/name` of resources that were already gone.
    pub already_absent: Vec<String>,
}

impl DeletionReport {
    fn record(&mut self, kind: &str, name: &str, deleted: bool) {
        let entry = format!("{kind}/{name}");
        if deleted {
            self.deleted.push(entry);
        } else {
            self.already_absent.push(entry);
        }
    }

    fn merge(&mut self, other: DeletionReport) {
        self.deleted.extend(other.deleted);
        self.already_absent.extend(other.already_absent);
    }

    /// Nothing existed to delete.
    pub fn is_noop(&self) -> bool {
        self.deleted.is_empty()
    }
}

// ── Planning ──────────────────────────────────────────────────────

/// One member to create, fully resolved.
#[derive(Debug, Clone)]
struct MemberPlan {
    template: &'static ServiceTemplate,
    name: String,
    role: Option<&'static str>,
    /// Indices (into the plan) of members this one links to.
    depends_on: Vec<usize>,
    workload: Workload,
}

fn random_bytes(len: usize) -> OrchestratorResult<Vec<u8>> {
    let mut buf = vec![0u8; len];
    getrandom::getrandom(&mut buf)
        .map_err(|e| OrchestratorError::Platform(format!("getrandom failed: {e}")))?;
    Ok(buf)
}

fn random_digits(len: usize) -> OrchestratorResult<String> {
    Ok(random_bytes(len)?
        .into_iter()
        .map(|b| char::from(b'0' + b % 10))
        .collect())
}

fn random_password() -> OrchestratorResult<String> {
    Ok(random_bytes(PASSWORD_LEN)?
        .into_iter()
        .map(|b| char::from(PASSWORD_ALPHABET[usize::from(b) % PASSWORD_ALPHABET.len()]))
        .collect())
}

/// Canonical names must be DNS labels short enough for every suffix.
fn validate_name(name: &str) -> OrchestratorResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_CANONICAL_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-');
    if valid {
        Ok(())
    } else {
        Err(OrchestratorError::Validation(format!(
            "name {name:?} must be 1-{MAX_CANONICAL_LEN} lowercase letters, digits or inner dashes"
        )))
    }
}

/// Order members data tier first; otherwise keep catalog order.
fn tier(template: &ServiceTemplate) -> u8 {
    match template.category {
        Category::Database => 0,
        Category::Cache => 1,
        _ => 2,
    }
}

#[derive(Clone)]
pub struct GroupProvisioner {
    platform: Arc<dyn Platform>,
    resolver: Resolver,
    ingress: IngressConfig,
    pull_secret: Option<String>,
}

impl GroupProvisioner {
    pub fn new(
        platform: Arc<dyn Platform>,
        resolver: Resolver,
        ingress: IngressConfig,
        pull_secret: Option<String>,
    ) -> Self {
        Self {
            platform,
            resolver,
            ingress,
            pull_secret,
        }
    }

    fn base_workload(
        &self,
        template: &ServiceTemplate,
        name: &str,
        request: &CreateRequest,
        password: &str,
    ) -> OrchestratorResult<Workload> {
        let image = if template.service_type == catalog::CUSTOM {
            match request.image.as_deref().map(str::trim) {
                Some(image) if !image.is_empty() => image.to_string(),
                _ => {
                    return Err(OrchestratorError::Validation(
                        "custom service requires an image".to_string(),
                    ));
                }
            }
        } else {
            template.image.to_string()
        };

        let mut env: BTreeMap<String, String> = template
            .env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for key in template.secret_env {
            env.insert(key.to_string(), password.to_string());
        }
        env.extend(request.env.clone());

        let mut labels = labels::for_workload(name);
        labels.insert(labels::SERVICE_TYPE.to_string(), template.service_type.to_string());
        let owner = labels::label_value(&request.owner);
        if !owner.is_empty() {
            labels.insert(labels::OWNER.to_string(), owner);
        }

        Ok(Workload {
            name: name.to_string(),
            labels,
            container: template.service_type.to_string(),
            image,
            port: request.port.unwrap_or(template.port),
            env,
            replicas: request.replicas.unwrap_or(1),
            mounts: Vec::new(),
            pull_secret: self.pull_secret.clone(),
            rollout: Rollout::default(),
        })
    }

    fn plan_single(
        &self,
        template: &'static ServiceTemplate,
        request: &CreateRequest,
    ) -> OrchestratorResult<(Option<String>, Vec<MemberPlan>)> {
        let name = match &request.name {
            Some(name) => name.clone(),
            None => format!("{}-{}", template.service_type, random_digits(NAME_DIGITS)?),
        };
        validate_name(&name)?;
        let workload = self.base_workload(template, &name, request, &random_password()?)?;
        let plan = MemberPlan {
            template,
            name,
            role: None,
            depends_on: Vec::new(),
            workload,
        };
        Ok((None, vec![plan]))
    }

    fn plan_bundle(
        &self,
        bundle: &'static BundleTemplate,
        request: &CreateRequest,
    ) -> OrchestratorResult<(Option<String>, Vec<MemberPlan>)> {
        let digits = random_digits(NAME_DIGITS)?;
        let group_id = match &request.name {
            Some(name) => name.clone(),
            None => format!("{}-{digits}", bundle.name),
        };
        validate_name(&group_id)?;
        // One credential per group so linked members agree on it.
        let password = random_password()?;

        let mut plans = Vec::with_capacity(bundle.members.len());
        for member in bundle.members {
            let template = catalog::template(member.service_type).ok_or_else(|| {
                OrchestratorError::Validation(format!(
                    "bundle {} references unknown type {}",
                    bundle.name, member.service_type
                ))
            })?;
            let name = match &request.name {
                Some(name) => format!("{name}-{}", member.role),
                None => format!("{}-{digits}", member.service_type),
            };
            validate_name(&name)?;
            let mut workload = self.base_workload(template, &name, request, &password)?;
            workload
                .labels
                .insert(labels::GROUP.to_string(), group_id.clone());
            workload
                .labels
                .insert(labels::ROLE.to_string(), member.role.to_string());
            plans.push(MemberPlan {
                template,
                name,
                role: Some(member.role),
                depends_on: Vec::new(),
                workload,
            });
        }

        // Wire links to the exposure of the member playing each role.
        for (index, member) in bundle.members.iter().enumerate() {
            for (env_key, role) in member.links {
                let target = plans
                    .iter()
                    .position(|p| p.role == Some(*role))
                    .ok_or_else(|| {
                        OrchestratorError::Validation(format!(
                            "bundle {} links to missing role {role}",
                            bundle.name
                        ))
                    })?;
                let host = identity::secondary_name(&plans[target].name, SecondaryKind::Exposure);
                plans[index].workload.env.insert(env_key.to_string(), host);
                plans[index].depends_on.push(target);
            }
        }

        Ok((Some(group_id), plans))
    }

    /// Provision a single service or a bundle.
    pub async fn create_group(
        &self,
        tenant: &TenantKey,
        request: &CreateRequest,
    ) -> OrchestratorResult<GroupOutcome> {
        let offering = catalog::offering(&request.service_type).ok_or_else(|| {
            OrchestratorError::Validation(format!("unknown service type {}", request.service_type))
        })?;
        let (group_id, mut plans) = match offering {
            Offering::Single(template) => self.plan_single(template, request)?,
            Offering::Bundle(bundle) => self.plan_bundle(bundle, request)?,
        };

        tenants::ensure_namespace(self.platform.as_ref(), tenant, None).await?;

        // Stable sort keeps catalog order within a tier; remap dependencies.
        let mut order: Vec<usize> = (0..plans.len()).collect();
        order.sort_by_key(|&i| tier(plans[i].template));
        let position: BTreeMap<usize, usize> =
            order.iter().enumerate().map(|(pos, &i)| (i, pos)).collect();
        let mut sorted: Vec<MemberPlan> = order.iter().map(|&i| plans[i].clone()).collect();
        for plan in &mut sorted {
            plan.depends_on = plan.depends_on.iter().map(|d| position[d]).collect();
        }
        plans = sorted;

        let mut members: Vec<Option<GroupMember>> = Vec::with_capacity(plans.len());
        let mut failed = Vec::new();
        for plan in &plans {
            let broken = plan
                .depends_on
                .iter()
                .find(|&&d| members.get(d).is_some_and(Option::is_none));
            if let Some(&dependency) = broken {
                let reason = format!("dependency {} failed", plans[dependency].name);
                warn!(%tenant, member = %plan.name, %reason, "member skipped");
                failed.push(MemberFailure {
                    name: plan.name.clone(),
                    reason,
                });
                members.push(None);
                continue;
            }

            match self.provision_member(tenant, plan).await {
                Ok(member) => members.push(Some(member)),
                Err(e) => {
                    warn!(%tenant, member = %plan.name, error = %e, "member provisioning failed");
                    failed.push(MemberFailure {
                        name: plan.name.clone(),
                        reason: e.to_string(),
                    });
                    members.push(None);
                }
            }
        }

        let members: Vec<GroupMember> = members.into_iter().flatten().collect();
        if failed.is_empty() {
            info!(
                %tenant,
                group = group_id.as_deref().unwrap_or("-"),
                members = members.len(),
                "group provisioned"
            );
            Ok(GroupOutcome::Complete(ResourceGroup {
                tenant: tenant.clone(),
                group_id,
                members,
            }))
        } else {
            let group_id = group_id.unwrap_or_else(|| plans[0].name.clone());
            warn!(%tenant, group = %group_id, failed = failed.len(), "group partially provisioned");
            Ok(GroupOutcome::Partial {
                group_id,
                succeeded: members.into_iter().map(|m| m.name).collect(),
                failed,
            })
        }
    }

    /// Create (or adopt) one member's workload, exposure and route.
    async fn provision_member(
        &self,
        tenant: &TenantKey,
        plan: &MemberPlan,
    ) -> OrchestratorResult<GroupMember> {
        let ns = tenant.as_str();
        let created = self
            .platform
            .create_workload(ns, &plan.workload)
            .await
            .existing_ok()?;
        if !created {
            debug!(%tenant, workload = %plan.name, "workload exists, adopting");
        }

        let exposure_name = identity::secondary_name(&plan.name, SecondaryKind::Exposure);
        let exposure = Exposure {
            name: exposure_name.clone(),
            labels: plan.workload.labels.clone(),
            selector: Labels::from([(labels::WORKLOAD.to_string(), plan.name.clone())]),
            port: plan.workload.port,
            target_port: plan.workload.port,
            external_port: None,
        };
        if !self
            .platform
            .create_exposure(ns, &exposure)
            .await
            .existing_ok()?
        {
            debug!(%tenant, exposure = %exposure_name, "exposure exists, adopting");
        }
        let external_port = match self.platform.get_exposure(ns, &exposure_name).await {
            Ok(found) => found.and_then(|e| e.external_port),
            Err(e) => {
                debug!(%tenant, exposure = %exposure_name, error = %e, "external port unknown");
                None
            }
        };

        let host = match (&self.ingress.domain, plan.template.public) {
            (Some(domain), true) => {
                let host = format!("{}.{tenant}.{domain}", plan.name);
                let route = Route {
                    name: identity::secondary_name(&plan.name, SecondaryKind::Route),
                    labels: plan.workload.labels.clone(),
                    host: host.clone(),
                    service: exposure_name.clone(),
                    port: plan.workload.port,
                    class_name: self.ingress.class_name.clone(),
                };
                self.platform.create_route(ns, &route).await.existing_ok()?;
                Some(host)
            }
            _ => None,
        };

        info!(%tenant, workload = %plan.name, service_type = %plan.template.service_type, "member provisioned");
        Ok(GroupMember {
            name: plan.name.clone(),
            service_type: plan.template.service_type.to_string(),
            role: plan.role.map(str::to_string),
            exposure: exposure_name,
            external_port,
            host,
        })
    }

    // ── Teardown ──────────────────────────────────────────────────

    /// Delete every member of a group, its secondaries, and anything else
    /// labeled with the group id.
    pub async fn delete_group(
        &self,
        tenant: &TenantKey,
        group_id: &str,
    ) -> OrchestratorResult<DeletionReport> {
        let ns = tenant.as_str();
        let selector = labels::for_group(group_id);
        let mut report = DeletionReport::default();
        let mut first_error: Option<OrchestratorError> = None;
        let mut keep = |result: OrchestratorResult<()>| {
            if let Err(e) = result {
                warn!(%tenant, group = %group_id, error = %e, "teardown step failed");
                first_error.get_or_insert(e);
            }
        };

        for workload in self.platform.list_workloads(ns, &selector).await? {
            match self.teardown(tenant, &workload.name).await {
                Ok(part) => report.merge(part),
                Err(e) => keep(Err(e)),
            }
        }

        // Independently labeled leftovers.
        for exposure in self.platform.list_exposures(ns, &selector).await? {
            let r = self.platform.delete_exposure(ns, &exposure.name).await.absent_ok();
            keep(r.map(|d| report.record("exposure", &exposure.name, d)).map_err(Into::into));
        }
        for route in self.platform.list_routes(ns, &selector).await? {
            let r = self.platform.delete_route(ns, &route.name).await.absent_ok();
            keep(r.map(|d| report.record("route", &route.name, d)).map_err(Into::into));
        }
        for autoscaler in self.platform.list_autoscalers(ns, &selector).await? {
            let r = self.platform.delete_autoscaler(ns, &autoscaler.name).await.absent_ok();
            keep(r.map(|d| report.record("autoscaler", &autoscaler.name, d)).map_err(Into::into));
        }
        for claim in self.platform.list_claims(ns, &selector).await? {
            let r = self.platform.delete_claim(ns, &claim.name).await.absent_ok();
            keep(r.map(|d| report.record("claim", &claim.name, d)).map_err(Into::into));
        }
        for schedule in self.platform.list_schedules(ns, &selector).await? {
            let r = self.platform.delete_schedule(ns, &schedule.name).await.absent_ok();
            keep(r.map(|d| report.record("schedule", &schedule.name, d)).map_err(Into::into));
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        info!(%tenant, group = %group_id, deleted = report.deleted.len(), "group deleted");
        Ok(report)
    }

    /// Resolve an instance name and delete what owns it: its whole group
    /// when it has one, otherwise the single workload.
    pub async fn delete_by_instance_name(
        &self,
        tenant: &TenantKey,
        instance_name: &str,
    ) -> OrchestratorResult<DeletionReport> {
        match self.resolver.resolve_workload(tenant, instance_name).await {
            Ok(workload) => match workload.group_id() {
                Some(group_id) => self.delete_group(tenant, group_id).await,
                None => self.teardown(tenant, &workload.name).await,
            },
            Err(OrchestratorError::NotFound(_)) => {
                debug!(%tenant, canonical = %instance_name, "no workload, sweeping secondaries");
                self.teardown(tenant, instance_name).await
            }
            Err(e) => Err(e),
        }
    }

    /// Delete one workload, its backup jobs and all its templated
    /// secondaries, tolerating absence everywhere. The workload goes last:
    /// after a failed step it is still listed, so a retry reaches the rest.
    async fn teardown(&self, tenant: &TenantKey, canonical: &str) -> OrchestratorResult<DeletionReport> {
        let ns = tenant.as_str();
        let mut report = DeletionReport::default();

        for job in self
            .platform
            .list_jobs(ns, &labels::for_backup_target(canonical))
            .await?
        {
            let deleted = self.platform.delete_job(ns, &job.name).await.absent_ok()?;
            report.record("job", &job.name, deleted);
        }

        for kind in SecondaryKind::ALL {
            let name = identity::secondary_name(canonical, kind);
            let (label, result): (&str, PlatformResult<()>) = match kind {
                SecondaryKind::Exposure => ("exposure", self.platform.delete_exposure(ns, &name).await),
                SecondaryKind::Route => ("route", self.platform.delete_route(ns, &name).await),
                SecondaryKind::Claim | SecondaryKind::BackupClaim => {
                    ("claim", self.platform.delete_claim(ns, &name).await)
                }
                SecondaryKind::Autoscaler => {
                    ("autoscaler", self.platform.delete_autoscaler(ns, &name).await)
                }
                SecondaryKind::BackupSchedule => {
                    ("schedule", self.platform.delete_schedule(ns, &name).await)
                }
            };
            let deleted = result.absent_ok()?;
            report.record(label, &name, deleted);
        }

        let deleted = self.platform.delete_workload(ns, canonical).await.absent_ok()?;
        report.record("workload", canonical, deleted);

        debug!(%tenant, workload = %canonical, deleted = report.deleted.len(), "workload torn down");
        Ok(report)
    }
}
