//! Conversions between platform resource types and Kubernetes objects.
//!
//! Outbound conversions build complete objects; inbound conversions are
//! lenient and fill absent optional fields with defaults, since objects
//! edited by hand may lack anything we did not set.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::autoscaling::v2::{
    CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec, MetricSpec,
    MetricTarget, ResourceMetricSource,
};
use k8s_openapi::api::batch::v1::{
    CronJob, CronJobSpec, Job as K8sJob, JobSpec as K8sJobSpec, JobTemplateSpec,
};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, LocalObjectReference, Namespace as K8sNamespace,
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, Pod,
    PodSpec, PodTemplateSpec, Secret as K8sSecret, Service, ServicePort, ServiceSpec,
    Volume, VolumeMount as K8sVolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::ByteString;

use shield_core::labels::{self, Labels};

use crate::types::*;

const STORAGE: &str = "storage";
const READ_WRITE_ONCE: &str = "ReadWriteOnce";
const TASK_CONTAINER: &str = "task";

fn meta(name: &str, labels: &Labels) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        labels: Some(labels.clone()),
        ..Default::default()
    }
}

fn name_of(meta: &ObjectMeta) -> String {
    meta.name.clone().unwrap_or_default()
}

fn labels_of(meta: &ObjectMeta) -> Labels {
    meta.labels.clone().unwrap_or_default()
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn to_port(value: i32) -> u16 {
    u16::try_from(value).unwrap_or(0)
}

// ── Pod template pieces ───────────────────────────────────────────

fn env_vars(env: &BTreeMap<String, String>) -> Option<Vec<EnvVar>> {
    if env.is_empty() {
        return None;
    }
    Some(
        env.iter()
            .map(|(name, value)| EnvVar {
                name: name.clone(),
                value: Some(value.clone()),
                ..Default::default()
            })
            .collect(),
    )
}

fn env_map(vars: Option<&Vec<EnvVar>>) -> BTreeMap<String, String> {
    vars.into_iter()
        .flatten()
        .filter_map(|v| v.value.clone().map(|value| (v.name.clone(), value)))
        .collect()
}

/// Claims become volumes named after the claim.
///
/// Both lists are always present, empty included: replaces are sent as
/// merge patches, and an omitted key would leave the previous volumes
/// in place.
fn claim_volumes(mounts: &[VolumeMount]) -> (Option<Vec<Volume>>, Option<Vec<K8sVolumeMount>>) {
    let volumes = mounts
        .iter()
        .map(|m| Volume {
            name: m.claim.clone(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: m.claim.clone(),
                read_only: None,
            }),
            ..Default::default()
        })
        .collect();
    let volume_mounts = mounts
        .iter()
        .map(|m| K8sVolumeMount {
            name: m.claim.clone(),
            mount_path: m.mount_path.clone(),
            ..Default::default()
        })
        .collect();
    (Some(volumes), Some(volume_mounts))
}

fn claim_mounts(spec: &PodSpec, container: &Container) -> Vec<VolumeMount> {
    let volumes = spec.volumes.as_deref().unwrap_or_default();
    container
        .volume_mounts
        .iter()
        .flatten()
        .filter_map(|vm| {
            let volume = volumes.iter().find(|v| v.name == vm.name)?;
            let source = volume.persistent_volume_claim.as_ref()?;
            Some(VolumeMount {
                claim: source.claim_name.clone(),
                mount_path: vm.mount_path.clone(),
            })
        })
        .collect()
}

// ── Namespace ─────────────────────────────────────────────────────

pub fn namespace_object(namespace: &Namespace) -> K8sNamespace {
    K8sNamespace {
        metadata: meta(&namespace.name, &namespace.labels),
        ..Default::default()
    }
}

pub fn namespace_from(object: K8sNamespace) -> Namespace {
    Namespace {
        name: name_of(&object.metadata),
        labels: labels_of(&object.metadata),
    }
}

// ── Workload ──────────────────────────────────────────────────────

pub fn deployment_object(workload: &Workload) -> Deployment {
    let (volumes, volume_mounts) = claim_volumes(&workload.mounts);
    let container = Container {
        name: workload.container.clone(),
        image: Some(workload.image.clone()),
        ports: Some(vec![ContainerPort {
            container_port: i32::from(workload.port),
            ..Default::default()
        }]),
        env: env_vars(&workload.env),
        volume_mounts,
        ..Default::default()
    };
    let pull_secrets = workload
        .pull_secret
        .iter()
        .map(|name| LocalObjectReference { name: name.clone() })
        .collect();

    Deployment {
        metadata: meta(&workload.name, &workload.labels),
        spec: Some(DeploymentSpec {
            replicas: Some(to_i32(workload.replicas)),
            selector: LabelSelector {
                match_labels: Some(Labels::from([(
                    labels::WORKLOAD.to_string(),
                    workload.name.clone(),
                )])),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(workload.labels.clone()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes,
                    image_pull_secrets: Some(pull_secrets),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn workload_from(object: Deployment) -> Workload {
    let spec = object.spec.unwrap_or_default();
    let pod = spec.template.spec.unwrap_or_default();
    let container = pod.containers.first().cloned().unwrap_or_default();
    let status = object.status.unwrap_or_default();

    Workload {
        name: name_of(&object.metadata),
        labels: labels_of(&object.metadata),
        image: container.image.clone().unwrap_or_default(),
        port: container
            .ports
            .as_ref()
            .and_then(|ports| ports.first())
            .map(|p| to_port(p.container_port))
            .unwrap_or_default(),
        env: env_map(container.env.as_ref()),
        replicas: spec.replicas.map(to_u32).unwrap_or(1),
        mounts: claim_mounts(&pod, &container),
        pull_secret: pod
            .image_pull_secrets
            .as_ref()
            .and_then(|secrets| secrets.first())
            .map(|s| s.name.clone()),
        rollout: Rollout {
            desired: status.replicas.map(to_u32).unwrap_or_default(),
            ready: status.ready_replicas.map(to_u32).unwrap_or_default(),
        },
        container: container.name,
    }
}

// ── Instance ──────────────────────────────────────────────────────

fn phase(value: Option<&str>) -> InstancePhase {
    match value {
        Some("Pending") => InstancePhase::Pending,
        Some("Running") => InstancePhase::Running,
        Some("Succeeded") => InstancePhase::Succeeded,
        Some("Failed") => InstancePhase::Failed,
        _ => InstancePhase::Unknown,
    }
}

pub fn instance_from(object: Pod) -> Instance {
    let status = object.status.unwrap_or_default();
    let containers = status
        .container_statuses
        .unwrap_or_default()
        .into_iter()
        .map(|cs| {
            let state = cs.state.unwrap_or_default();
            let state = if let Some(terminated) = state.terminated {
                ContainerState::Terminated {
                    reason: terminated.reason,
                    exit_code: terminated.exit_code,
                }
            } else if let Some(waiting) = state.waiting {
                ContainerState::Waiting {
                    reason: waiting.reason,
                }
            } else if state.running.is_some() {
                ContainerState::Running
            } else {
                ContainerState::Waiting { reason: None }
            };
            ContainerStatus {
                name: cs.name,
                ready: cs.ready,
                restarts: to_u32(cs.restart_count),
                state,
            }
        })
        .collect();

    Instance {
        name: name_of(&object.metadata),
        labels: labels_of(&object.metadata),
        phase: phase(status.phase.as_deref()),
        ip: status.pod_ip,
        node: object.spec.and_then(|s| s.node_name),
        started_at: status.start_time.map(|t| t.0),
        terminating: object.metadata.deletion_timestamp.is_some(),
        containers,
    }
}

// ── Exposure ──────────────────────────────────────────────────────

pub fn service_object(exposure: &Exposure) -> Service {
    Service {
        metadata: meta(&exposure.name, &exposure.labels),
        spec: Some(ServiceSpec {
            type_: Some("NodePort".to_string()),
            selector: Some(exposure.selector.clone()),
            ports: Some(vec![ServicePort {
                port: i32::from(exposure.port),
                target_port: Some(IntOrString::Int(i32::from(exposure.target_port))),
                node_port: exposure.external_port.map(i32::from),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn exposure_from(object: Service) -> Exposure {
    let spec = object.spec.unwrap_or_default();
    let port = spec
        .ports
        .as_ref()
        .and_then(|ports| ports.first())
        .cloned()
        .unwrap_or_default();
    let target_port = match port.target_port {
        Some(IntOrString::Int(p)) => to_port(p),
        _ => to_port(port.port),
    };

    Exposure {
        name: name_of(&object.metadata),
        labels: labels_of(&object.metadata),
        selector: spec.selector.unwrap_or_default(),
        port: to_port(port.port),
        target_port,
        external_port: port.node_port.map(to_port),
    }
}

// ── Route ─────────────────────────────────────────────────────────

pub fn ingress_object(route: &Route) -> Ingress {
    Ingress {
        metadata: meta(&route.name, &route.labels),
        spec: Some(IngressSpec {
            ingress_class_name: route.class_name.clone(),
            rules: Some(vec![IngressRule {
                host: Some(route.host.clone()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: route.service.clone(),
                                port: Some(ServiceBackendPort {
                                    number: Some(i32::from(route.port)),
                                    ..Default::default()
                                }),
                            }),
                            ..Default::default()
                        },
                    }],
                }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn route_from(object: Ingress) -> Route {
    let spec = object.spec.unwrap_or_default();
    let rule = spec
        .rules
        .as_ref()
        .and_then(|rules| rules.first())
        .cloned()
        .unwrap_or_default();
    let backend = rule
        .http
        .as_ref()
        .and_then(|http| http.paths.first())
        .and_then(|path| path.backend.service.clone());

    Route {
        name: name_of(&object.metadata),
        labels: labels_of(&object.metadata),
        host: rule.host.unwrap_or_default(),
        service: backend.as_ref().map(|b| b.name.clone()).unwrap_or_default(),
        port: backend
            .and_then(|b| b.port)
            .and_then(|p| p.number)
            .map(to_port)
            .unwrap_or_default(),
        class_name: spec.ingress_class_name,
    }
}

// ── Claim ─────────────────────────────────────────────────────────

pub fn claim_object(claim: &Claim) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: meta(&claim.name, &claim.labels),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec![READ_WRITE_ONCE.to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    STORAGE.to_string(),
                    Quantity(claim.size.clone()),
                )])),
                ..Default::default()
            }),
            storage_class_name: claim.storage_class.clone(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn claim_from(object: PersistentVolumeClaim) -> Claim {
    let spec = object.spec.unwrap_or_default();
    let size = spec
        .resources
        .and_then(|r| r.requests)
        .and_then(|mut requests| requests.remove(STORAGE))
        .map(|q| q.0)
        .unwrap_or_default();
    let capacity = object
        .status
        .and_then(|s| s.capacity)
        .and_then(|mut capacity| capacity.remove(STORAGE))
        .map(|q| q.0);

    Claim {
        name: name_of(&object.metadata),
        labels: labels_of(&object.metadata),
        size,
        capacity,
        storage_class: spec.storage_class_name,
    }
}

// ── Autoscaler ────────────────────────────────────────────────────

pub fn hpa_object(autoscaler: &Autoscaler) -> HorizontalPodAutoscaler {
    HorizontalPodAutoscaler {
        metadata: meta(&autoscaler.name, &autoscaler.labels),
        spec: Some(HorizontalPodAutoscalerSpec {
            scale_target_ref: CrossVersionObjectReference {
                api_version: Some("apps/v1".to_string()),
                kind: "Deployment".to_string(),
                name: autoscaler.target.clone(),
            },
            min_replicas: Some(to_i32(autoscaler.min)),
            max_replicas: to_i32(autoscaler.max),
            metrics: Some(vec![MetricSpec {
                type_: "Resource".to_string(),
                resource: Some(ResourceMetricSource {
                    name: "cpu".to_string(),
                    target: MetricTarget {
                        type_: "Utilization".to_string(),
                        average_utilization: Some(to_i32(autoscaler.cpu_utilization)),
                        ..Default::default()
                    },
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn autoscaler_from(object: HorizontalPodAutoscaler) -> Autoscaler {
    let spec = object.spec.unwrap_or_default();
    let cpu = spec
        .metrics
        .iter()
        .flatten()
        .filter_map(|m| m.resource.as_ref())
        .find(|r| r.name == "cpu")
        .and_then(|r| r.target.average_utilization)
        .map(to_u32)
        .unwrap_or_default();

    Autoscaler {
        name: name_of(&object.metadata),
        labels: labels_of(&object.metadata),
        target: spec.scale_target_ref.name,
        min: spec.min_replicas.map(to_u32).unwrap_or(1),
        max: to_u32(spec.max_replicas),
        cpu_utilization: cpu,
    }
}

// ── Jobs ──────────────────────────────────────────────────────────

fn job_spec(template: &JobTemplate, labels: &Labels) -> K8sJobSpec {
    let (volumes, volume_mounts) = claim_volumes(&template.mounts);
    K8sJobSpec {
        backoff_limit: Some(1),
        ttl_seconds_after_finished: template.ttl_secs.map(to_i32),
        template: PodTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(labels.clone()),
                ..Default::default()
            }),
            spec: Some(PodSpec {
                restart_policy: Some("Never".to_string()),
                containers: vec![Container {
                    name: TASK_CONTAINER.to_string(),
                    image: Some(template.image.clone()),
                    command: Some(template.command.clone()),
                    env: env_vars(&template.env),
                    volume_mounts,
                    ..Default::default()
                }],
                volumes,
                ..Default::default()
            }),
        },
        ..Default::default()
    }
}

fn template_from(spec: K8sJobSpec) -> JobTemplate {
    let pod = spec.template.spec.unwrap_or_default();
    let container = pod.containers.first().cloned().unwrap_or_default();
    JobTemplate {
        image: container.image.clone().unwrap_or_default(),
        command: container.command.clone().unwrap_or_default(),
        env: env_map(container.env.as_ref()),
        mounts: claim_mounts(&pod, &container),
        ttl_secs: spec.ttl_seconds_after_finished.map(to_u32),
    }
}

pub fn job_object(job: &Job) -> K8sJob {
    K8sJob {
        metadata: meta(&job.name, &job.labels),
        spec: Some(job_spec(&job.template, &job.labels)),
        ..Default::default()
    }
}

pub fn job_from(object: K8sJob) -> Job {
    let status = object.status.unwrap_or_default();
    let state = if status.succeeded.unwrap_or(0) > 0 {
        JobState::Succeeded
    } else if status.failed.unwrap_or(0) > 0 && status.active.unwrap_or(0) == 0 {
        JobState::Failed
    } else {
        JobState::Active
    };

    Job {
        name: name_of(&object.metadata),
        labels: labels_of(&object.metadata),
        template: template_from(object.spec.unwrap_or_default()),
        status: JobStatus {
            state,
            started_at: status.start_time.map(|t| t.0),
            completed_at: status.completion_time.map(|t| t.0),
        },
    }
}

pub fn cronjob_object(schedule: &Schedule) -> CronJob {
    CronJob {
        metadata: meta(&schedule.name, &schedule.labels),
        spec: Some(CronJobSpec {
            schedule: schedule.cron.clone(),
            concurrency_policy: Some("Forbid".to_string()),
            job_template: JobTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(schedule.labels.clone()),
                    ..Default::default()
                }),
                spec: Some(job_spec(&schedule.template, &schedule.labels)),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn schedule_from(object: CronJob) -> Schedule {
    let spec = object.spec.unwrap_or_default();
    Schedule {
        name: name_of(&object.metadata),
        labels: labels_of(&object.metadata),
        cron: spec.schedule,
        template: template_from(spec.job_template.spec.unwrap_or_default()),
        last_run: object
            .status
            .and_then(|s| s.last_schedule_time)
            .map(|t| t.0),
    }
}

// ── Secret ────────────────────────────────────────────────────────

pub fn secret_object(secret: &Secret) -> K8sSecret {
    K8sSecret {
        metadata: meta(&secret.name, &secret.labels),
        type_: Some(secret.kind.clone()),
        data: Some(
            secret
                .data
                .iter()
                .map(|(k, v)| (k.clone(), ByteString(v.clone())))
                .collect(),
        ),
        ..Default::default()
    }
}

pub fn secret_from(object: K8sSecret) -> Secret {
    Secret {
        name: name_of(&object.metadata),
        labels: labels_of(&object.metadata),
        kind: object.type_.unwrap_or_else(|| "Opaque".to_string()),
        data: object
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, v.0))
            .collect(),
    }
}
