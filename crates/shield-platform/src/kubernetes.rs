//! Kubernetes-backed platform.
//!
//! Every API round-trip runs under the configured request timeout; an
//! elapsed timeout surfaces as [`PlatformError::Unavailable`]. API status
//! codes are classified into the platform error kinds: 404 is
//! `NotFound`, 409 is `Conflict`, other 4xx are `Rejected`, anything else
//! (5xx, transport, decoding) is `Unavailable`.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::batch::v1::{CronJob, Job as K8sJob};
use k8s_openapi::api::core::v1::{
    Namespace as K8sNamespace, PersistentVolumeClaim, Pod, Secret as K8sSecret, Service,
};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{
    Api, ApiResource, DeleteParams, DynamicObject, ListParams, LogParams, Patch, PatchParams,
    PostParams,
};
use kube::core::GroupVersionKind;
use kube::{Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use shield_core::labels::{self, Labels};

use crate::convert;
use crate::error::{PlatformError, PlatformResult};
use crate::platform::Platform;
use crate::types::*;

/// Platform implementation over a Kubernetes API server.
#[derive(Clone)]
pub struct KubePlatform {
    client: Client,
    timeout: Duration,
}

impl KubePlatform {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Connect using the ambient kubeconfig or in-cluster service account.
    pub async fn connect(timeout: Duration) -> PlatformResult<Self> {
        let client = match tokio::time::timeout(timeout, Client::try_default()).await {
            Ok(Ok(client)) => client,
            Ok(Err(e)) => return Err(map_error("connect", e)),
            Err(_) => {
                return Err(PlatformError::Unavailable(format!(
                    "connect: timed out after {timeout:?}"
                )));
            }
        };
        info!(?timeout, "connected to kubernetes api");
        Ok(Self::new(client, timeout))
    }

    /// Run one API call under the request timeout.
    async fn call<T, F>(&self, what: &str, fut: F) -> PlatformResult<T>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(map_error(what, e)),
            Err(_) => Err(PlatformError::Unavailable(format!(
                "{what}: timed out after {:?}",
                self.timeout
            ))),
        }
    }

    fn api<K>(&self, ns: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), ns)
    }

    // ── Generic namespaced CRUD ───────────────────────────────────

    async fn create_in<K>(&self, ns: &str, object: &K) -> PlatformResult<()>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + Debug + Serialize + DeserializeOwned,
        <K as Resource>::DynamicType: Default,
    {
        let what = describe::<K>("create", ns, object.meta().name.as_deref().unwrap_or_default());
        self.call(&what, self.api::<K>(ns).create(&PostParams::default(), object))
            .await?;
        debug!(%what, "applied");
        Ok(())
    }

    /// Merge-patch the full object over the existing one.
    async fn replace_in<K>(&self, ns: &str, object: &K) -> PlatformResult<()>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + Debug + Serialize + DeserializeOwned,
        <K as Resource>::DynamicType: Default,
    {
        let name = object.meta().name.clone().unwrap_or_default();
        let what = describe::<K>("replace", ns, &name);
        self.call(
            &what,
            self.api::<K>(ns)
                .patch(&name, &PatchParams::default(), &Patch::Merge(object)),
        )
        .await?;
        debug!(%what, "applied");
        Ok(())
    }

    async fn delete_in<K>(&self, ns: &str, name: &str) -> PlatformResult<()>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + Debug + DeserializeOwned,
        <K as Resource>::DynamicType: Default,
    {
        let what = describe::<K>("delete", ns, name);
        self.call(&what, self.api::<K>(ns).delete(name, &DeleteParams::background()))
            .await?;
        debug!(%what, "applied");
        Ok(())
    }

    async fn get_in<K>(&self, ns: &str, name: &str) -> PlatformResult<Option<K>>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + Debug + DeserializeOwned,
        <K as Resource>::DynamicType: Default,
    {
        let what = describe::<K>("get", ns, name);
        self.call(&what, self.api::<K>(ns).get_opt(name)).await
    }

    async fn list_in<K>(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<K>>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + Debug + DeserializeOwned,
        <K as Resource>::DynamicType: Default,
    {
        let what = describe::<K>("list", ns, "*");
        let params = list_params(selector);
        let list = self.call(&what, self.api::<K>(ns).list(&params)).await?;
        Ok(list.items)
    }
}

fn describe<K>(verb: &str, ns: &str, name: &str) -> String
where
    K: Resource,
    <K as Resource>::DynamicType: Default,
{
    let kind = K::kind(&Default::default()).to_lowercase();
    format!("{verb} {kind} {ns}/{name}")
}

fn list_params(selector: &Labels) -> ListParams {
    if selector.is_empty() {
        ListParams::default()
    } else {
        ListParams::default().labels(&labels::selector_string(selector))
    }
}

/// Classify a client error into a platform error kind.
fn map_error(what: &str, err: kube::Error) -> PlatformError {
    match err {
        kube::Error::Api(response) => {
            let detail = format!("{what}: {}", response.message);
            match response.code {
                404 => PlatformError::NotFound(detail),
                409 => PlatformError::Conflict(detail),
                400..=499 => PlatformError::Rejected(detail),
                _ => PlatformError::Unavailable(detail),
            }
        }
        other => PlatformError::Unavailable(format!("{what}: {other}")),
    }
}

/// Extract per-container usage from a `metrics.k8s.io` PodMetrics object.
fn usage_from(object: DynamicObject) -> InstanceUsage {
    let containers = object
        .data
        .get("containers")
        .and_then(|c| c.as_array())
        .map(|containers| {
            containers
                .iter()
                .map(|c| ContainerUsage {
                    name: c["name"].as_str().unwrap_or_default().to_string(),
                    cpu: c["usage"]["cpu"].as_str().unwrap_or("0").to_string(),
                    memory: c["usage"]["memory"].as_str().unwrap_or("0").to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    InstanceUsage {
        instance: object.metadata.name.unwrap_or_default(),
        containers,
    }
}

#[async_trait]
impl Platform for KubePlatform {
    // ── Namespaces ────────────────────────────────────────────────

    async fn create_namespace(&self, namespace: &Namespace) -> PlatformResult<()> {
        let api: Api<K8sNamespace> = Api::all(self.client.clone());
        let what = format!("create namespace {}", namespace.name);
        self.call(
            &what,
            api.create(&PostParams::default(), &convert::namespace_object(namespace)),
        )
        .await?;
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> PlatformResult<()> {
        let api: Api<K8sNamespace> = Api::all(self.client.clone());
        let what = format!("delete namespace {name}");
        self.call(&what, api.delete(name, &DeleteParams::background()))
            .await?;
        Ok(())
    }

    async fn namespace_exists(&self, name: &str) -> PlatformResult<bool> {
        let api: Api<K8sNamespace> = Api::all(self.client.clone());
        let what = format!("get namespace {name}");
        Ok(self.call(&what, api.get_opt(name)).await?.is_some())
    }

    async fn list_namespaces(&self, selector: &Labels) -> PlatformResult<Vec<Namespace>> {
        let api: Api<K8sNamespace> = Api::all(self.client.clone());
        let list = self
            .call("list namespaces", api.list(&list_params(selector)))
            .await?;
        Ok(list.items.into_iter().map(convert::namespace_from).collect())
    }

    // ── Workloads ─────────────────────────────────────────────────

    async fn create_workload(&self, ns: &str, workload: &Workload) -> PlatformResult<()> {
        self.create_in(ns, &convert::deployment_object(workload)).await
    }

    async fn replace_workload(&self, ns: &str, workload: &Workload) -> PlatformResult<()> {
        self.replace_in(ns, &convert::deployment_object(workload)).await
    }

    async fn delete_workload(&self, ns: &str, name: &str) -> PlatformResult<()> {
        self.delete_in::<Deployment>(ns, name).await
    }

    async fn get_workload(&self, ns: &str, name: &str) -> PlatformResult<Option<Workload>> {
        Ok(self
            .get_in::<Deployment>(ns, name)
            .await?
            .map(convert::workload_from))
    }

    async fn list_workloads(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Workload>> {
        let items = self.list_in::<Deployment>(ns, selector).await?;
        Ok(items.into_iter().map(convert::workload_from).collect())
    }

    // ── Instances ─────────────────────────────────────────────────

    async fn list_instances(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Instance>> {
        let items = self.list_in::<Pod>(ns, selector).await?;
        Ok(items.into_iter().map(convert::instance_from).collect())
    }

    async fn instance_logs(&self, ns: &str, name: &str, tail_lines: u32) -> PlatformResult<String> {
        let params = LogParams {
            tail_lines: Some(i64::from(tail_lines)),
            ..Default::default()
        };
        let what = format!("logs pod {ns}/{name}");
        self.call(&what, self.api::<Pod>(ns).logs(name, &params))
            .await
    }

    async fn instance_usage(&self, ns: &str) -> PlatformResult<Vec<InstanceUsage>> {
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "PodMetrics");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "pods");
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), ns, &resource);
        let what = format!("list pod metrics {ns}");
        let list = self.call(&what, api.list(&ListParams::default())).await?;
        Ok(list.items.into_iter().map(usage_from).collect())
    }

    // ── Exposures ─────────────────────────────────────────────────

    async fn create_exposure(&self, ns: &str, exposure: &Exposure) -> PlatformResult<()> {
        self.create_in(ns, &convert::service_object(exposure)).await
    }

    async fn replace_exposure(&self, ns: &str, exposure: &Exposure) -> PlatformResult<()> {
        self.replace_in(ns, &convert::service_object(exposure)).await
    }

    async fn delete_exposure(&self, ns: &str, name: &str) -> PlatformResult<()> {
        self.delete_in::<Service>(ns, name).await
    }

    async fn get_exposure(&self, ns: &str, name: &str) -> PlatformResult<Option<Exposure>> {
        Ok(self
            .get_in::<Service>(ns, name)
            .await?
            .map(convert::exposure_from))
    }

    async fn list_exposures(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Exposure>> {
        let items = self.list_in::<Service>(ns, selector).await?;
        Ok(items.into_iter().map(convert::exposure_from).collect())
    }

    // ── Routes ────────────────────────────────────────────────────

    async fn create_route(&self, ns: &str, route: &Route) -> PlatformResult<()> {
        self.create_in(ns, &convert::ingress_object(route)).await
    }

    async fn delete_route(&self, ns: &str, name: &str) -> PlatformResult<()> {
        self.delete_in::<Ingress>(ns, name).await
    }

    async fn get_route(&self, ns: &str, name: &str) -> PlatformResult<Option<Route>> {
        Ok(self
            .get_in::<Ingress>(ns, name)
            .await?
            .map(convert::route_from))
    }

    async fn list_routes(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Route>> {
        let items = self.list_in::<Ingress>(ns, selector).await?;
        Ok(items.into_iter().map(convert::route_from).collect())
    }

    // ── Claims ────────────────────────────────────────────────────

    async fn create_claim(&self, ns: &str, claim: &Claim) -> PlatformResult<()> {
        self.create_in(ns, &convert::claim_object(claim)).await
    }

    async fn resize_claim(&self, ns: &str, name: &str, size: &str) -> PlatformResult<()> {
        let patch = json!({ "spec": { "resources": { "requests": { "storage": size } } } });
        let what = format!("resize persistentvolumeclaim {ns}/{name}");
        self.call(
            &what,
            self.api::<PersistentVolumeClaim>(ns)
                .patch(name, &PatchParams::default(), &Patch::Merge(&patch)),
        )
        .await?;
        info!(namespace = %ns, claim = %name, %size, "claim resized");
        Ok(())
    }

    async fn delete_claim(&self, ns: &str, name: &str) -> PlatformResult<()> {
        self.delete_in::<PersistentVolumeClaim>(ns, name).await
    }

    async fn get_claim(&self, ns: &str, name: &str) -> PlatformResult<Option<Claim>> {
        Ok(self
            .get_in::<PersistentVolumeClaim>(ns, name)
            .await?
            .map(convert::claim_from))
    }

    async fn list_claims(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Claim>> {
        let items = self.list_in::<PersistentVolumeClaim>(ns, selector).await?;
        Ok(items.into_iter().map(convert::claim_from).collect())
    }

    // ── Autoscalers ───────────────────────────────────────────────

    async fn create_autoscaler(&self, ns: &str, autoscaler: &Autoscaler) -> PlatformResult<()> {
        self.create_in(ns, &convert::hpa_object(autoscaler)).await
    }

    async fn replace_autoscaler(&self, ns: &str, autoscaler: &Autoscaler) -> PlatformResult<()> {
        self.replace_in(ns, &convert::hpa_object(autoscaler)).await
    }

    async fn delete_autoscaler(&self, ns: &str, name: &str) -> PlatformResult<()> {
        self.delete_in::<HorizontalPodAutoscaler>(ns, name).await
    }

    async fn get_autoscaler(&self, ns: &str, name: &str) -> PlatformResult<Option<Autoscaler>> {
        Ok(self
            .get_in::<HorizontalPodAutoscaler>(ns, name)
            .await?
            .map(convert::autoscaler_from))
    }

    async fn list_autoscalers(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Autoscaler>> {
        let items = self.list_in::<HorizontalPodAutoscaler>(ns, selector).await?;
        Ok(items.into_iter().map(convert::autoscaler_from).collect())
    }

    // ── Jobs and schedules ────────────────────────────────────────

    async fn create_job(&self, ns: &str, job: &Job) -> PlatformResult<()> {
        self.create_in(ns, &convert::job_object(job)).await
    }

    async fn list_jobs(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Job>> {
        let items = self.list_in::<K8sJob>(ns, selector).await?;
        Ok(items.into_iter().map(convert::job_from).collect())
    }

    async fn delete_job(&self, ns: &str, name: &str) -> PlatformResult<()> {
        self.delete_in::<K8sJob>(ns, name).await
    }

    async fn create_schedule(&self, ns: &str, schedule: &Schedule) -> PlatformResult<()> {
        self.create_in(ns, &convert::cronjob_object(schedule)).await
    }

    async fn replace_schedule(&self, ns: &str, schedule: &Schedule) -> PlatformResult<()> {
        self.replace_in(ns, &convert::cronjob_object(schedule)).await
    }

    async fn delete_schedule(&self, ns: &str, name: &str) -> PlatformResult<()> {
        self.delete_in::<CronJob>(ns, name).await
    }

    async fn get_schedule(&self, ns: &str, name: &str) -> PlatformResult<Option<Schedule>> {
        Ok(self
            .get_in::<CronJob>(ns, name)
            .await?
            .map(convert::schedule_from))
    }

    async fn list_schedules(&self, ns: &str, selector: &Labels) -> PlatformResult<Vec<Schedule>> {
        let items = self.list_in::<CronJob>(ns, selector).await?;
        Ok(items.into_iter().map(convert::schedule_from).collect())
    }

    // ── Secrets ───────────────────────────────────────────────────

    async fn get_secret(&self, ns: &str, name: &str) -> PlatformResult<Option<Secret>> {
        Ok(self
            .get_in::<K8sSecret>(ns, name)
            .await?
            .map(convert::secret_from))
    }

    async fn create_secret(&self, ns: &str, secret: &Secret) -> PlatformResult<()> {
        self.create_in(ns, &convert::secret_object(secret)).await
    }
}
