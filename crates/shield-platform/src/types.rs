//! Platform resource types.
//!
//! These are the shapes the orchestrator reads and writes through the
//! [`Platform`](crate::Platform) trait. They carry only the fields the
//! control plane uses; the Kubernetes backend maps them onto the full
//! API objects and back.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shield_core::labels::{self, Labels};

// ── Namespace ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    pub labels: Labels,
}

// ── Workload ──────────────────────────────────────────────────────

/// A deployable unit (deployment-equivalent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    /// Canonical name; stable identity chosen at creation.
    pub name: String,
    pub labels: Labels,
    /// Name of the primary container.
    pub container: String,
    pub image: String,
    pub port: u16,
    pub env: BTreeMap<String, String>,
    pub replicas: u32,
    pub mounts: Vec<VolumeMount>,
    pub pull_secret: Option<String>,
    /// Reported by the platform; ignored on create/replace.
    #[serde(default)]
    pub rollout: Rollout,
}

/// A persistent claim mounted into the primary container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub claim: String,
    pub mount_path: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollout {
    pub desired: u32,
    pub ready: u32,
}

impl Workload {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn service_type(&self) -> Option<&str> {
        self.label(labels::SERVICE_TYPE)
    }

    pub fn group_id(&self) -> Option<&str> {
        self.label(labels::GROUP)
    }

    pub fn mount_for(&self, claim: &str) -> Option<&VolumeMount> {
        self.mounts.iter().find(|m| m.claim == claim)
    }
}

// ── Instance ──────────────────────────────────────────────────────

/// A running materialization of a workload (pod-equivalent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Platform-generated name: canonical name plus random segments.
    pub name: String,
    pub labels: Labels,
    pub phase: InstancePhase,
    pub ip: Option<String>,
    pub node: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    /// Deletion has been requested but the instance is still present.
    pub terminating: bool,
    pub containers: Vec<ContainerStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstancePhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    pub ready: bool,
    pub restarts: u32,
    pub state: ContainerState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ContainerState {
    Waiting { reason: Option<String> },
    Running,
    Terminated { reason: Option<String>, exit_code: i32 },
}

impl Instance {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Point-in-time resource usage of one instance, as raw quantities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceUsage {
    pub instance: String,
    pub containers: Vec<ContainerUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerUsage {
    pub name: String,
    pub cpu: String,
    pub memory: String,
}

// ── Network ───────────────────────────────────────────────────────

/// Network exposure (service-equivalent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
    pub name: String,
    pub labels: Labels,
    /// Instances receiving traffic.
    pub selector: Labels,
    pub port: u16,
    pub target_port: u16,
    /// Externally reachable port; allocated by the platform when `None`.
    pub external_port: Option<u16>,
}

/// External route (ingress-equivalent), keyed by hostname.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub name: String,
    pub labels: Labels,
    pub host: String,
    pub service: String,
    pub port: u16,
    pub class_name: Option<String>,
}

// ── Storage ───────────────────────────────────────────────────────

/// Persistent volume claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub name: String,
    pub labels: Labels,
    /// Requested size as a quantity string ("10Gi").
    pub size: String,
    /// Size actually provisioned, once bound.
    pub capacity: Option<String>,
    pub storage_class: Option<String>,
}

impl Claim {
    /// The size that counts against quota: the request, which is what
    /// the tenant committed to.
    pub fn committed(&self) -> &str {
        &self.size
    }
}

// ── Autoscaling ───────────────────────────────────────────────────

/// CPU-based autoscaling policy bound to one workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Autoscaler {
    pub name: String,
    pub labels: Labels,
    /// Workload the policy scales.
    pub target: String,
    pub min: u32,
    pub max: u32,
    /// Target average CPU utilization, percent.
    pub cpu_utilization: u32,
}

// ── Jobs ──────────────────────────────────────────────────────────

/// What a one-shot job (or each run of a schedule) executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTemplate {
    pub image: String,
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub mounts: Vec<VolumeMount>,
    /// Seconds a finished job is kept before garbage collection.
    pub ttl_secs: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub labels: Labels,
    pub template: JobTemplate,
    /// Reported by the platform; ignored on create.
    #[serde(default)]
    pub status: JobStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Active,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub state: JobState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Recurring job executed by the platform's own scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub name: String,
    pub labels: Labels,
    pub cron: String,
    pub template: JobTemplate,
    /// Reported by the platform; ignored on create/replace.
    pub last_run: Option<DateTime<Utc>>,
}

// ── Secrets ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    pub labels: Labels,
    /// Platform secret type, e.g. `kubernetes.io/dockerconfigjson`.
    pub kind: String,
    pub data: BTreeMap<String, Vec<u8>>,
}
