//! In-memory platform for tests and local dry runs.
//!
//! Behaves like a small, perfectly consistent cluster. Creating a workload
//! materializes its instances with platform-style generated names
//! (`<workload>-<template hash>-<suffix>`), exposures get node ports
//! allocated from 30000, and jobs complete immediately. Faults can be
//! injected per resource kind and name to exercise error paths.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use shield_core::labels::{self, Labels};

use crate::error::{PlatformError, PlatformResult};
use crate::platform::Platform;
use crate::types::*;

const FIRST_NODE_PORT: u16 = 30000;
const NODE_NAME: &str = "memory-node-0";

/// Resource kinds addressable by fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Namespace,
    Workload,
    Instance,
    Logs,
    Usage,
    Exposure,
    Route,
    Claim,
    Autoscaler,
    Job,
    Schedule,
    Secret,
}

#[derive(Debug, Clone)]
struct Fault {
    kind: ResourceKind,
    /// `None` fails every call of this kind, lists included.
    name: Option<String>,
    error: PlatformError,
}

/// Anything stored per namespace and looked up by name and labels.
trait Named {
    fn name(&self) -> &str;
    fn labels(&self) -> &Labels;
}

macro_rules! impl_named {
    ($($ty:ty),* $(,)?) => {
        $(impl Named for $ty {
            fn name(&self) -> &str {
                &self.name
            }
            fn labels(&self) -> &Labels {
                &self.labels
            }
        })*
    };
}

impl_named!(Workload, Instance, Exposure, Route, Claim, Autoscaler, Job, Schedule, Secret);

/// Namespaced table keyed by `(namespace, name)`.
struct Table<T> {
    what: &'static str,
    rows: BTreeMap<(String, String), T>,
}

impl<T: Named + Clone> Table<T> {
    fn new(what: &'static str) -> Self {
        Self {
            what,
            rows: BTreeMap::new(),
        }
    }

    fn key(ns: &str, name: &str) -> (String, String) {
        (ns.to_string(), name.to_string())
    }

    fn create(&mut self, ns: &str, item: T) -> PlatformResult<()> {
        let key = Self::key(ns, item.name());
        if self.rows.contains_key(&key) {
            return Err(PlatformError::Conflict(format!("{} {ns}/{}", self.what, item.name())));
        }
        self.rows.insert(key, item);
        Ok(())
    }

    fn replace(&mut self, ns: &str, item: T) -> PlatformResult<()> {
        let key = Self::key(ns, item.name());
        match self.rows.get_mut(&key) {
            Some(slot) => {
                *slot = item;
                Ok(())
            }
            None => Err(PlatformError::NotFound(format!("{} {ns}/{}", self.what, item.name()))),
        }
    }

    fn delete(&mut self, ns: &str, name: &str) -> PlatformResult<T> {
        self.rows
            .remove(&Self::key(ns, name))
            .ok_or_else(|| PlatformError::NotFound(format!("{} {ns}/{name}", self.what)))
    }

    fn get(&self, ns: &str, name: &str) -> Option<T> {
        self.rows.get(&Self::key(ns, name)).cloned()
    }

    fn get_mut(&mut self, ns: &str, name: &str) -> PlatformResult<&mut T> {
        let what = self.what;
        self.rows
            .get_mut(&Self::key(ns, name))
            .ok_or_else(|| PlatformError::NotFound(format!("{what} {ns}/{name}")))
    }

    fn list(&self, ns: &str, selector: &Labels) -> Vec<T> {
        self.rows
            .iter()
            .filter(|((row_ns, _), item)| row_ns == ns && labels::matches(item.labels(), selector))
            .map(|(_, item)| item.clone())
            .collect()
    }

    fn purge_namespace(&mut self, ns: &str) {
        self.rows.retain(|(row_ns, _), _| row_ns != ns);
    }
}

struct State {
    namespaces: BTreeMap<String, Namespace>,
    workloads: Table<Workload>,
    instances: Table<Instance>,
    exposures: Table<Exposure>,
    routes: Table<Route>,
    claims: Table<Claim>,
    autoscalers: Table<Autoscaler>,
    jobs: Table<Job>,
    schedules: Table<Schedule>,
    secrets: Table<Secret>,
    logs: BTreeMap<(String, String), String>,
    usage: BTreeMap<(String, String), InstanceUsage>,
    faults: Vec<Fault>,
    calls: u64,
    serial: u64,
    next_node_port: u16,
    materialize: bool,
    job_outcome: JobState,
}

impl State {
    fn new() -> Self {
        Self {
            namespaces: BTreeMap::new(),
            workloads: Table::new("workload"),
            instances: Table::new("instance"),
            exposures: Table::new("exposure"),
            routes: Table::new("route"),
            claims: Table::new("claim"),
            autoscalers: Table::new("autoscaler"),
            jobs: Table::new("job"),
            schedules: Table::new("schedule"),
            secrets: Table::new("secret"),
            logs: BTreeMap::new(),
            usage: BTreeMap::new(),
            faults: Vec::new(),
            calls: 0,
            serial: 0,
            next_node_port: FIRST_NODE_PORT,
            materialize: true,
            job_outcome: JobState::Succeeded,
        }
    }

    /// Count the call and return the first matching injected fault.
    fn enter(&mut self, kind: ResourceKind, name: Option<&str>) -> PlatformResult<()> {
        self.calls += 1;
        let hit = self.faults.iter().find(|f| {
            f.kind == kind
                && match (&f.name, name) {
                    (None, _) => true,
                    (Some(expected), Some(actual)) => expected == actual,
                    (Some(_), None) => false,
                }
        });
        match hit {
            Some(fault) => Err(fault.error.clone()),
            None => Ok(()),
        }
    }

    fn require_namespace(&self, ns: &str) -> PlatformResult<()> {
        if self.namespaces.contains_key(ns) {
            Ok(())
        } else {
            Err(PlatformError::NotFound(format!("namespace {ns}")))
        }
    }

    fn materialize(&mut self, ns: &str, workload: &Workload) {
        if !self.materialize {
            return;
        }
        let template = template_hash(workload);
        for _ in 0..workload.replicas {
            self.serial += 1;
            let name = format!("{}-{template}-{}", workload.name, instance_suffix(self.serial));
            let instance = Instance {
                name,
                labels: workload.labels.clone(),
                phase: InstancePhase::Running,
                ip: Some(format!("10.42.0.{}", self.serial % 250 + 2)),
                node: Some(NODE_NAME.to_string()),
                started_at: Some(Utc::now()),
                terminating: false,
                containers: vec![ContainerStatus {
                    name: workload.container.clone(),
                    ready: true,
                    restarts: 0,
                    state: ContainerState::Running,
                }],
            };
            // Generated names never collide.
            let _ = self.instances.create(ns, instance);
        }
    }

    fn drop_instances_of(&mut self, ns: &str, workload: &str) {
        let selector = Labels::from([(labels::WORKLOAD.to_string(), workload.to_string())]);
        for instance in self.instances.list(ns, &selector) {
            let _ = self.instances.delete(ns, &instance.name);
            self.logs.remove(&(ns.to_string(), instance.name.clone()));
            self.usage.remove(&(ns.to_string(), instance.name));
        }
    }
}

/// Pod-template-hash lookalike: stable for an unchanged workload spec.
fn template_hash(workload: &Workload) -> String {
    let mut hasher = Sha256::new();
    hasher.update(workload.name.as_bytes());
    hasher.update(workload.image.as_bytes());
    for (k, v) in &workload.env {
        hasher.update(k.as_bytes());
        hasher.update(v.as_bytes());
    }
    for mount in &workload.mounts {
        hasher.update(mount.claim.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    digest[..9].to_string()
}

fn instance_suffix(serial: u64) -> String {
    let digest = hex::encode(Sha256::digest(serial.to_be_bytes()));
    digest[..5].to_string()
}

/// Platform backed by in-process maps.
pub struct MemoryPlatform {
    state: Mutex<State>,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::new()),
        }
    }

    // ── Test controls ─────────────────────────────────────────────

    /// Fail every call touching `kind` (and `name`, when given).
    pub async fn fail(&self, kind: ResourceKind, name: Option<&str>, error: PlatformError) {
        self.state.lock().await.faults.push(Fault {
            kind,
            name: name.map(str::to_string),
            error,
        });
    }

    pub async fn clear_faults(&self) {
        self.state.lock().await.faults.clear();
    }

    /// Number of platform calls served so far, failed ones included.
    pub async fn calls(&self) -> u64 {
        self.state.lock().await.calls
    }

    /// Toggle automatic instance creation for new workloads.
    pub async fn set_materialize(&self, enabled: bool) {
        self.state.lock().await.materialize = enabled;
    }

    /// State that subsequently created jobs report.
    pub async fn set_job_outcome(&self, state: JobState) {
        self.state.lock().await.job_outcome = state;
    }

    /// Insert (or overwrite) an instance directly.
    pub async fn put_instance(&self, ns: &str, instance: Instance) {
        let mut state = self.state.lock().await;
        state
            .instances
            .rows
            .insert((ns.to_string(), instance.name.clone()), instance);
    }

    /// Apply `f` to an existing instance.
    pub async fn update_instance<F>(&self, ns: &str, name: &str, f: F) -> PlatformResult<()>
    where
        F: FnOnce(&mut Instance),
    {
        let mut state = self.state.lock().await;
        f(state.instances.get_mut(ns, name)?);
        Ok(())
    }

    pub async fn set_logs(&self, ns: &str, instance: &str, text: &str) {
        self.state
            .lock()
            .await
            .logs
            .insert((ns.to_string(), instance.to_string()), text.to_string());
    }

    pub async fn set_usage(&self, ns: &str, usage: InstanceUsage) {
        self.state
            .lock()
            .await
            .usage
            .insert((ns.to_string(), usage.instance.clone()), usage);
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    // ── Namespaces ────────────────────────────────────────────────

    async fn create_namespace(&self, namespace: &Namespace) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Namespace, Some(&namespace.name))?;
        if state.namespaces.contains_key(&namespace.name) {
            return Err(PlatformError::Conflict(format!("namespace {}", namespace.name)));
        }
        state
            .namespaces
            .insert(namespace.name.clone(), namespace.clone());
        debug!(namespace = %namespace.name, "memory: namespace created");
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Namespace, Some(name))?;
        if state.namespaces.remove(name).is_none() {
            return Err(PlatformError::NotFound(format!("namespace {name}")));
        }
        state.workloads.purge_namespace(name);
        state.instances.purge_namespace(name);
        state.exposures.purge_namespace(name);
        state.routes.purge_namespace(name);
        state.claims.purge_namespace(name);
        state.autoscalers.purge_namespace(name);
        state.jobs.purge_namespace(name);
        state.schedules.purge_namespace(name);
        state.secrets.purge_namespace(name);
        state.logs.retain(|(ns, _), _| ns != name);
        state.usage.retain(|(ns, _), _| ns != name);
        Ok(())
    }

    async fn namespace_exists(&self, name: &str) -> PlatformResult<bool> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Namespace, Some(name))?;
        Ok(state.namespaces.contains_key(name))
    }

    async fn list_namespaces(&self, selector: &Labels) -> PlatformResult<Vec<Namespace>> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Namespace, None)?;
        Ok(state
            .namespaces
            .values()
            .filter(|ns| labels::matches(&ns.labels, selector))
            .cloned()
            .collect())
    }

    // ── Workloads ─────────────────────────────────────────────────

    async fn create_workload(&self, ns: &str, workload: &Workload) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Workload, Some(&workload.name))?;
        state.require_namespace(ns)?;
        let mut stored = workload.clone();
        stored.rollout = Rollout {
            desired: workload.replicas,
            ready: if state.materialize { workload.replicas } else { 0 },
        };
        state.workloads.create(ns, stored)?;
        state.materialize(ns, workload);
        Ok(())
    }

    async fn replace_workload(&self, ns: &str, workload: &Workload) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Workload, Some(&workload.name))?;
        let previous = state.workloads.get(ns, &workload.name);
        let mut stored = workload.clone();
        stored.rollout = previous.as_ref().map(|w| w.rollout).unwrap_or_default();
        state.workloads.replace(ns, stored)?;
        // A changed pod template rolls every instance.
        if previous.is_some_and(|p| template_hash(&p) != template_hash(workload)) {
            state.drop_instances_of(ns, &workload.name);
            state.materialize(ns, workload);
        }
        Ok(())
    }

    async fn delete_workload(&self, ns: &str, name: &str) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Workload, Some(name))?;
        state.workloads.delete(ns, name)?;
        state.drop_instances_of(ns, name);
        Ok(())
    }

    async fn get_workload(&self, ns: &str, name: &str) -> PlatformResult<Option<Workload>> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Workload, Some(name))?;
        Ok(state.workloads.get(ns, name))
    }

    async fn list_workloads(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Workload>> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Workload, None)?;
        Ok(state.workloads.list(ns, selector))
    }

    // ── Instances ─────────────────────────────────────────────────

    async fn list_instances(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Instance>> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Instance, None)?;
        Ok(state.instances.list(ns, selector))
    }

    async fn instance_logs(&self, ns: &str, name: &str, tail_lines: u32) -> PlatformResult<String> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Logs, Some(name))?;
        if state.instances.get(ns, name).is_none() {
            return Err(PlatformError::NotFound(format!("instance {ns}/{name}")));
        }
        let text = state
            .logs
            .get(&(ns.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_default();
        let lines: Vec<&str> = text.lines().collect();
        let start = lines.len().saturating_sub(tail_lines as usize);
        Ok(lines[start..].join("\n"))
    }

    async fn instance_usage(&self, ns: &str) -> PlatformResult<Vec<InstanceUsage>> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Usage, None)?;
        Ok(state
            .usage
            .iter()
            .filter(|((usage_ns, _), _)| usage_ns == ns)
            .map(|(_, usage)| usage.clone())
            .collect())
    }

    // ── Exposures ─────────────────────────────────────────────────

    async fn create_exposure(&self, ns: &str, exposure: &Exposure) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Exposure, Some(&exposure.name))?;
        state.require_namespace(ns)?;
        if state.exposures.get(ns, &exposure.name).is_some() {
            return Err(PlatformError::Conflict(format!("exposure {ns}/{}", exposure.name)));
        }
        let mut stored = exposure.clone();
        if stored.external_port.is_none() {
            stored.external_port = Some(state.next_node_port);
            state.next_node_port += 1;
        }
        state.exposures.create(ns, stored)
    }

    async fn replace_exposure(&self, ns: &str, exposure: &Exposure) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Exposure, Some(&exposure.name))?;
        let mut stored = exposure.clone();
        if stored.external_port.is_none() {
            stored.external_port = state
                .exposures
                .get(ns, &exposure.name)
                .and_then(|e| e.external_port);
        }
        state.exposures.replace(ns, stored)
    }

    async fn delete_exposure(&self, ns: &str, name: &str) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Exposure, Some(name))?;
        state.exposures.delete(ns, name).map(|_| ())
    }

    async fn get_exposure(&self, ns: &str, name: &str) -> PlatformResult<Option<Exposure>> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Exposure, Some(name))?;
        Ok(state.exposures.get(ns, name))
    }

    async fn list_exposures(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Exposure>> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Exposure, None)?;
        Ok(state.exposures.list(ns, selector))
    }

    // ── Routes ────────────────────────────────────────────────────

    async fn create_route(&self, ns: &str, route: &Route) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Route, Some(&route.name))?;
        state.require_namespace(ns)?;
        state.routes.create(ns, route.clone())
    }

    async fn delete_route(&self, ns: &str, name: &str) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Route, Some(name))?;
        state.routes.delete(ns, name).map(|_| ())
    }

    async fn get_route(&self, ns: &str, name: &str) -> PlatformResult<Option<Route>> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Route, Some(name))?;
        Ok(state.routes.get(ns, name))
    }

    async fn list_routes(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Route>> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Route, None)?;
        Ok(state.routes.list(ns, selector))
    }

    // ── Claims ────────────────────────────────────────────────────

    async fn create_claim(&self, ns: &str, claim: &Claim) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Claim, Some(&claim.name))?;
        state.require_namespace(ns)?;
        let mut stored = claim.clone();
        stored.capacity = Some(claim.size.clone());
        state.claims.create(ns, stored)
    }

    async fn resize_claim(&self, ns: &str, name: &str, size: &str) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Claim, Some(name))?;
        let claim = state.claims.get_mut(ns, name)?;
        claim.size = size.to_string();
        claim.capacity = Some(size.to_string());
        Ok(())
    }

    async fn delete_claim(&self, ns: &str, name: &str) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Claim, Some(name))?;
        state.claims.delete(ns, name).map(|_| ())
    }

    async fn get_claim(&self, ns: &str, name: &str) -> PlatformResult<Option<Claim>> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Claim, Some(name))?;
        Ok(state.claims.get(ns, name))
    }

    async fn list_claims(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Claim>> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Claim, None)?;
        Ok(state.claims.list(ns, selector))
    }

    // ── Autoscalers ───────────────────────────────────────────────

    async fn create_autoscaler(&self, ns: &str, autoscaler: &Autoscaler) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Autoscaler, Some(&autoscaler.name))?;
        state.require_namespace(ns)?;
        state.autoscalers.create(ns, autoscaler.clone())
    }

    async fn replace_autoscaler(&self, ns: &str, autoscaler: &Autoscaler) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Autoscaler, Some(&autoscaler.name))?;
        state.autoscalers.replace(ns, autoscaler.clone())
    }

    async fn delete_autoscaler(&self, ns: &str, name: &str) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Autoscaler, Some(name))?;
        state.autoscalers.delete(ns, name).map(|_| ())
    }

    async fn get_autoscaler(&self, ns: &str, name: &str) -> PlatformResult<Option<Autoscaler>> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Autoscaler, Some(name))?;
        Ok(state.autoscalers.get(ns, name))
    }

    async fn list_autoscalers(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Autoscaler>> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Autoscaler, None)?;
        Ok(state.autoscalers.list(ns, selector))
    }

    // ── Jobs and schedules ────────────────────────────────────────

    async fn create_job(&self, ns: &str, job: &Job) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Job, Some(&job.name))?;
        state.require_namespace(ns)?;
        let now = Utc::now();
        let outcome = state.job_outcome;
        let mut stored = job.clone();
        stored.status = JobStatus {
            state: outcome,
            started_at: Some(now),
            completed_at: (outcome != JobState::Active).then_some(now),
        };
        state.jobs.create(ns, stored)
    }

    async fn list_jobs(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Job>> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Job, None)?;
        Ok(state.jobs.list(ns, selector))
    }

    async fn delete_job(&self, ns: &str, name: &str) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Job, Some(name))?;
        state.jobs.delete(ns, name).map(|_| ())
    }

    async fn create_schedule(&self, ns: &str, schedule: &Schedule) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Schedule, Some(&schedule.name))?;
        state.require_namespace(ns)?;
        state.schedules.create(ns, schedule.clone())
    }

    async fn replace_schedule(&self, ns: &str, schedule: &Schedule) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Schedule, Some(&schedule.name))?;
        state.schedules.replace(ns, schedule.clone())
    }

    async fn delete_schedule(&self, ns: &str, name: &str) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Schedule, Some(name))?;
        state.schedules.delete(ns, name).map(|_| ())
    }

    async fn get_schedule(&self, ns: &str, name: &str) -> PlatformResult<Option<Schedule>> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Schedule, Some(name))?;
        Ok(state.schedules.get(ns, name))
    }

    async fn list_schedules(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Schedule>> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Schedule, None)?;
        Ok(state.schedules.list(ns, selector))
    }

    // ── Secrets ───────────────────────────────────────────────────

    async fn get_secret(&self, ns: &str, name: &str) -> PlatformResult<Option<Secret>> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Secret, Some(name))?;
        Ok(state.secrets.get(ns, name))
    }

    async fn create_secret(&self, ns: &str, secret: &Secret) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(ResourceKind::Secret, Some(&secret.name))?;
        state.require_namespace(ns)?;
        state.secrets.create(ns, secret.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namespace(name: &str) -> Namespace {
        Namespace {
            name: name.to_string(),
            labels: Labels::new(),
        }
    }

    fn workload(name: &str, replicas: u32) -> Workload {
        Workload {
            name: name.to_string(),
            labels: labels::for_workload(name),
            container: "main".to_string(),
            image: "nginx:latest".to_string(),
            port: 80,
            env: BTreeMap::new(),
            replicas,
            mounts: Vec::new(),
            pull_secret: None,
            rollout: Rollout::default(),
        }
    }

    async fn platform_with_ns(ns: &str) -> MemoryPlatform {
        let platform = MemoryPlatform::new();
        platform.create_namespace(&namespace(ns)).await.unwrap();
        platform
    }

    #[tokio::test]
    async fn workload_materializes_mangled_instances() {
        let platform = platform_with_ns("org-acme").await;
        platform
            .create_workload("org-acme", &workload("nginx-4821", 2))
            .await
            .unwrap();

        let instances = platform
            .list_instances("org-acme", &labels::for_workload("nginx-4821"))
            .await
            .unwrap();
        assert_eq!(instances.len(), 2);
        for instance in &instances {
            let segments: Vec<&str> = instance.name.split('-').collect();
            assert_eq!(segments.len(), 4, "{}", instance.name);
            assert!(instance.name.starts_with("nginx-4821-"));
        }

        let stored = platform.get_workload("org-acme", "nginx-4821").await.unwrap().unwrap();
        assert_eq!(stored.rollout, Rollout { desired: 2, ready: 2 });
    }

    #[tokio::test]
    async fn deleting_workload_removes_instances() {
        let platform = platform_with_ns("org-acme").await;
        platform
            .create_workload("org-acme", &workload("redis-0001", 1))
            .await
            .unwrap();
        platform.delete_workload("org-acme", "redis-0001").await.unwrap();

        let left = platform.list_instances("org-acme", &Labels::new()).await.unwrap();
        assert!(left.is_empty());
        let again = platform.delete_workload("org-acme", "redis-0001").await;
        assert!(matches!(again, Err(PlatformError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_reports_conflict_and_requires_namespace() {
        let platform = platform_with_ns("org-acme").await;
        let w = workload("nginx-1", 1);
        platform.create_workload("org-acme", &w).await.unwrap();
        assert!(matches!(
            platform.create_workload("org-acme", &w).await,
            Err(PlatformError::Conflict(_))
        ));
        assert!(matches!(
            platform.create_workload("org-missing", &w).await,
            Err(PlatformError::NotFound(_))
        ));
        assert!(platform.list_workloads("org-missing", &Labels::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn exposures_get_node_ports() {
        let platform = platform_with_ns("org-acme").await;
        for name in ["a-svc", "b-svc"] {
            let exposure = Exposure {
                name: name.to_string(),
                labels: Labels::new(),
                selector: Labels::new(),
                port: 80,
                target_port: 80,
                external_port: None,
            };
            platform.create_exposure("org-acme", &exposure).await.unwrap();
        }
        let a = platform.get_exposure("org-acme", "a-svc").await.unwrap().unwrap();
        let b = platform.get_exposure("org-acme", "b-svc").await.unwrap().unwrap();
        assert_eq!(a.external_port, Some(30000));
        assert_eq!(b.external_port, Some(30001));
    }

    #[tokio::test]
    async fn named_fault_spares_other_names_and_lists() {
        let platform = platform_with_ns("org-acme").await;
        platform
            .fail(
                ResourceKind::Autoscaler,
                Some("x-hpa"),
                PlatformError::Unavailable("boom".into()),
            )
            .await;

        assert!(platform.get_autoscaler("org-acme", "x-hpa").await.is_err());
        assert!(platform.get_autoscaler("org-acme", "y-hpa").await.unwrap().is_none());

        platform.clear_faults().await;
        assert!(platform.get_autoscaler("org-acme", "x-hpa").await.is_ok());
    }

    #[tokio::test]
    async fn logs_are_tailed() {
        let platform = platform_with_ns("org-acme").await;
        platform
            .create_workload("org-acme", &workload("nginx-1", 1))
            .await
            .unwrap();
        let instance = platform
            .list_instances("org-acme", &Labels::new())
            .await
            .unwrap()
            .remove(0);
        platform
            .set_logs("org-acme", &instance.name, "one\ntwo\nthree")
            .await;

        let tail = platform.instance_logs("org-acme", &instance.name, 2).await.unwrap();
        assert_eq!(tail, "two\nthree");
        assert!(platform.instance_logs("org-acme", "ghost", 2).await.is_err());
    }

    #[tokio::test]
    async fn namespace_delete_purges_contents() {
        let platform = platform_with_ns("org-acme").await;
        platform
            .create_workload("org-acme", &workload("nginx-1", 1))
            .await
            .unwrap();
        platform.delete_namespace("org-acme").await.unwrap();

        assert!(!platform.namespace_exists("org-acme").await.unwrap());
        assert!(platform.list_instances("org-acme", &Labels::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn calls_are_counted() {
        let platform = MemoryPlatform::new();
        let before = platform.calls().await;
        let _ = platform.namespace_exists("org-x").await;
        let _ = platform.get_claim("org-x", "c").await;
        assert_eq!(platform.calls().await, before + 2);
    }
}
