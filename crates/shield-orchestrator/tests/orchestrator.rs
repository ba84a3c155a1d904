//! End-to-end behavior of the orchestrator over the in-memory platform.

use std::sync::Arc;

use shield_core::labels;
use shield_core::quantity::GI;
use shield_core::{ShieldConfig, TenantKey};
use shield_orchestrator::{
    AutoscalingState, BackupState, CreateRequest, Field, GroupOutcome, InstanceStatus,
    Orchestrator, OrchestratorError, StorageState,
};
use shield_platform::{
    Autoscaler, ContainerUsage, InstanceUsage, JobState, MemoryPlatform, Platform, PlatformError,
    ResourceKind,
};

// ── Fixtures ──────────────────────────────────────────────────────

fn config() -> ShieldConfig {
    let mut config = ShieldConfig::default();
    config.ingress.domain = Some("shield.test".to_string());
    config
}

fn setup_with(config: ShieldConfig) -> (Arc<MemoryPlatform>, Orchestrator, TenantKey) {
    let platform = Arc::new(MemoryPlatform::new());
    let orchestrator = Orchestrator::new(platform.clone(), config).unwrap();
    let tenant = orchestrator.tenant_key("Acme").unwrap();
    (platform, orchestrator, tenant)
}

fn setup() -> (Arc<MemoryPlatform>, Orchestrator, TenantKey) {
    setup_with(config())
}

fn single(service_type: &str, name: &str) -> CreateRequest {
    CreateRequest {
        service_type: service_type.to_string(),
        name: Some(name.to_string()),
        owner: "ops@acme.io".to_string(),
        ..Default::default()
    }
}

fn bundle(name: &str) -> CreateRequest {
    CreateRequest {
        service_type: "wordpress-stack".to_string(),
        name: Some(name.to_string()),
        owner: "ops@acme.io".to_string(),
        ..Default::default()
    }
}

async fn instance_of(platform: &MemoryPlatform, tenant: &TenantKey, workload: &str) -> String {
    platform
        .list_instances(tenant.as_str(), &labels::for_workload(workload))
        .await
        .unwrap()
        .remove(0)
        .name
}

// ── Identity ──────────────────────────────────────────────────────

#[tokio::test]
async fn mangled_instance_name_resolves_to_workload() {
    let (platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &single("nginx", "nginx-4821"))
        .await
        .unwrap();

    let resolved = orchestrator
        .resolve(&tenant, "nginx-4821-7c9f8d6b5-x2vqp")
        .await
        .unwrap();
    assert_eq!(resolved, "nginx-4821");

    let generated = instance_of(&platform, &tenant, "nginx-4821").await;
    assert_eq!(orchestrator.resolve(&tenant, &generated).await.unwrap(), "nginx-4821");
}

#[tokio::test]
async fn unknown_instance_is_not_found() {
    let (_platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &single("nginx", "web-1"))
        .await
        .unwrap();

    let err = orchestrator.resolve(&tenant, "redis-9-abc-def").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(_)), "{err}");
}

// ── Groups ────────────────────────────────────────────────────────

#[tokio::test]
async fn same_single_service_twice_yields_one_exposure() {
    let (platform, orchestrator, tenant) = setup();
    let first = orchestrator
        .create_group(&tenant, &single("nginx", "web-1"))
        .await
        .unwrap();
    let second = orchestrator
        .create_group(&tenant, &single("nginx", "web-1"))
        .await
        .unwrap();
    assert!(first.is_complete());
    assert!(second.is_complete());

    let ns = tenant.as_str();
    let exposures = platform.list_exposures(ns, &labels::managed()).await.unwrap();
    assert_eq!(exposures.len(), 1);
    let workloads = platform.list_workloads(ns, &labels::managed()).await.unwrap();
    assert_eq!(workloads.len(), 1);
}

#[tokio::test]
async fn single_service_gets_port_and_route() {
    let (_platform, orchestrator, tenant) = setup();
    let group = orchestrator
        .create_group(&tenant, &single("nginx", "web-1"))
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(group.group_id, None);
    let member = &group.members[0];
    assert_eq!(member.exposure, "web-1-svc");
    assert!(member.external_port.is_some());
    assert_eq!(member.host.as_deref(), Some(format!("web-1.{tenant}.shield.test").as_str()));
}

#[tokio::test]
async fn bundle_links_app_to_database() {
    let (platform, orchestrator, tenant) = setup();
    let group = orchestrator
        .create_group(&tenant, &bundle("blog"))
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(group.group_id.as_deref(), Some("blog"));
    let names: Vec<&str> = group.members.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["blog-database", "blog-app"]);

    let app = platform
        .get_workload(tenant.as_str(), "blog-app")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(app.env["WORDPRESS_DB_HOST"], "blog-database-svc");
    assert_eq!(app.group_id(), Some("blog"));
    // Only the public member is routed.
    assert!(group.members[0].host.is_none());
    assert!(group.members[1].host.is_some());
}

#[tokio::test]
async fn delete_group_removes_members_and_secondaries() {
    let (platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &bundle("blog"))
        .await
        .unwrap();
    orchestrator
        .attach_storage(&tenant, "blog-database", "5Gi")
        .await
        .unwrap();
    orchestrator
        .configure_autoscaling(&tenant, "blog-app", 1, 3, 70)
        .await
        .unwrap();

    let report = orchestrator.delete_group(&tenant, "blog").await.unwrap();
    assert!(report.deleted.contains(&"workload/blog-database".to_string()));
    assert!(report.deleted.contains(&"workload/blog-app".to_string()));
    assert!(report.deleted.contains(&"claim/blog-database-data".to_string()));
    assert!(report.deleted.contains(&"autoscaler/blog-app-hpa".to_string()));

    let ns = tenant.as_str();
    let all = labels::managed();
    assert!(platform.list_workloads(ns, &all).await.unwrap().is_empty());
    assert!(platform.list_instances(ns, &all).await.unwrap().is_empty());
    assert!(platform.list_exposures(ns, &all).await.unwrap().is_empty());
    assert!(platform.list_routes(ns, &all).await.unwrap().is_empty());
    assert!(platform.list_claims(ns, &all).await.unwrap().is_empty());
    assert!(platform.get_autoscaler(ns, "blog-app-hpa").await.unwrap().is_none());

    let again = orchestrator.delete_group(&tenant, "blog").await.unwrap();
    assert!(again.is_noop());
}

#[tokio::test]
async fn delete_by_instance_name_takes_whole_group() {
    let (platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &bundle("blog"))
        .await
        .unwrap();
    let instance = instance_of(&platform, &tenant, "blog-app").await;

    orchestrator
        .delete_by_instance_name(&tenant, &instance)
        .await
        .unwrap();
    let workloads = platform
        .list_workloads(tenant.as_str(), &labels::managed())
        .await
        .unwrap();
    assert!(workloads.is_empty());

    // Retrying after the workload is gone still succeeds.
    let retry = orchestrator
        .delete_by_instance_name(&tenant, &instance)
        .await
        .unwrap();
    assert!(retry.is_noop());
}

#[tokio::test]
async fn interrupted_group_delete_completes_on_retry() {
    let (platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &bundle("blog"))
        .await
        .unwrap();
    orchestrator
        .configure_autoscaling(&tenant, "blog-app", 1, 3, 70)
        .await
        .unwrap();
    platform
        .fail(
            ResourceKind::Autoscaler,
            Some("blog-app-hpa"),
            PlatformError::Unavailable("timeout".to_string()),
        )
        .await;

    let err = orchestrator.delete_group(&tenant, "blog").await.unwrap_err();
    assert!(err.is_retryable(), "{err}");
    // The workload outlives its failed secondary, so the retry finds it.
    let ns = tenant.as_str();
    assert!(platform.get_workload(ns, "blog-app").await.unwrap().is_some());

    platform.clear_faults().await;
    let report = orchestrator.delete_group(&tenant, "blog").await.unwrap();
    assert!(report.deleted.contains(&"autoscaler/blog-app-hpa".to_string()));
    assert!(report.deleted.contains(&"workload/blog-app".to_string()));
    assert!(platform.get_autoscaler(ns, "blog-app-hpa").await.unwrap().is_none());
    assert!(platform.list_workloads(ns, &labels::managed()).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_group_sweeps_labeled_autoscalers() {
    let (platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &bundle("blog"))
        .await
        .unwrap();
    let ns = tenant.as_str();
    platform
        .create_autoscaler(
            ns,
            &Autoscaler {
                name: "blog-legacy-hpa".to_string(),
                labels: labels::for_group("blog"),
                target: "blog-app".to_string(),
                min: 1,
                max: 2,
                cpu_utilization: 80,
            },
        )
        .await
        .unwrap();

    let report = orchestrator.delete_group(&tenant, "blog").await.unwrap();
    assert!(report.deleted.contains(&"autoscaler/blog-legacy-hpa".to_string()));
    assert!(platform.get_autoscaler(ns, "blog-legacy-hpa").await.unwrap().is_none());
}

#[tokio::test]
async fn teardown_removes_backup_history() {
    let (platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &single("postgres", "db-1"))
        .await
        .unwrap();
    let backup = orchestrator.create_backup(&tenant, "db-1").await.unwrap();

    let report = orchestrator
        .delete_by_instance_name(&tenant, "db-1")
        .await
        .unwrap();
    assert!(report.deleted.contains(&format!("job/{}", backup.name)));
    let ns = tenant.as_str();
    let jobs = platform
        .list_jobs(ns, &labels::for_backup_target("db-1"))
        .await
        .unwrap();
    assert!(jobs.is_empty());

    // A workload re-created under the same name starts without history.
    orchestrator
        .create_group(&tenant, &single("postgres", "db-1"))
        .await
        .unwrap();
    assert!(orchestrator.list_backups(&tenant, "db-1").await.unwrap().is_empty());
    let err = orchestrator
        .restore_backup(&tenant, "db-1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(_)), "{err}");
}

#[tokio::test]
async fn delete_by_unknown_name_sweeps_leftovers() {
    let (platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &single("nginx", "web-1"))
        .await
        .unwrap();
    let ns = tenant.as_str();
    platform.delete_workload(ns, "web-1").await.unwrap();

    let report = orchestrator
        .delete_by_instance_name(&tenant, "web-1")
        .await
        .unwrap();
    assert!(report.deleted.contains(&"exposure/web-1-svc".to_string()));
    assert!(platform.get_exposure(ns, "web-1-svc").await.unwrap().is_none());
}

#[tokio::test]
async fn failed_member_skips_its_dependents() {
    let (platform, orchestrator, tenant) = setup();
    platform
        .fail(
            ResourceKind::Workload,
            Some("blog-database"),
            PlatformError::Rejected("admission denied".to_string()),
        )
        .await;

    let outcome = orchestrator
        .create_group(&tenant, &bundle("blog"))
        .await
        .unwrap();
    let GroupOutcome::Partial {
        group_id,
        succeeded,
        failed,
    } = outcome.clone()
    else {
        panic!("expected partial outcome, got {outcome:?}");
    };
    assert_eq!(group_id, "blog");
    assert!(succeeded.is_empty());
    assert_eq!(failed.len(), 2);
    assert_eq!(failed[0].name, "blog-database");
    assert_eq!(failed[1].name, "blog-app");
    assert_eq!(failed[1].reason, "dependency blog-database failed");

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["outcome"], "partial");

    let err = outcome.into_result().unwrap_err();
    assert!(matches!(err, OrchestratorError::PartialFailure { .. }));
}

#[tokio::test]
async fn custom_service_requires_image() {
    let (_platform, orchestrator, tenant) = setup();
    let err = orchestrator
        .create_group(&tenant, &single("custom", "tool-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Validation(_)), "{err}");

    let err = orchestrator
        .create_group(&tenant, &single("cobol", "old-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Validation(_)), "{err}");
}

// ── Quota and storage ─────────────────────────────────────────────

#[tokio::test]
async fn storage_quota_is_enforced() {
    let (platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &single("nginx", "web-1"))
        .await
        .unwrap();
    orchestrator
        .create_group(&tenant, &single("nginx", "web-2"))
        .await
        .unwrap();
    orchestrator
        .attach_storage(&tenant, "web-1", "45Gi")
        .await
        .unwrap();

    let err = orchestrator
        .attach_storage(&tenant, "web-2", "10Gi")
        .await
        .unwrap_err();
    match err {
        OrchestratorError::QuotaExceeded {
            used,
            requested,
            ceiling,
        } => {
            assert_eq!(used, 45 * GI);
            assert_eq!(requested, 10 * GI);
            assert_eq!(ceiling, 50 * GI);
        }
        other => panic!("expected quota error, got {other}"),
    }
    assert!(
        platform
            .get_claim(tenant.as_str(), "web-2-data")
            .await
            .unwrap()
            .is_none()
    );

    let state = orchestrator
        .attach_storage(&tenant, "web-2", "5Gi")
        .await
        .unwrap();
    assert!(matches!(state, StorageState::Attached { .. }));
    assert_eq!(orchestrator.quota_usage(&tenant).await.unwrap().used, 50 * GI);
}

#[tokio::test]
async fn storage_attach_is_idempotent_and_resizable() {
    let (platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &single("postgres", "db-1"))
        .await
        .unwrap();

    let first = orchestrator.attach_storage(&tenant, "db-1", "10Gi").await.unwrap();
    let second = orchestrator.attach_storage(&tenant, "db-1", "10Gi").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first,
        StorageState::Attached {
            claim: "db-1-data".to_string(),
            size: "10Gi".to_string(),
            mount_path: "/var/lib/postgresql/data".to_string(),
        }
    );

    // Growing counts only the difference against the ceiling.
    orchestrator.attach_storage(&tenant, "db-1", "50Gi").await.unwrap();
    assert_eq!(orchestrator.quota_usage(&tenant).await.unwrap().used, 50 * GI);

    // Claims only grow; shrinking is refused before reaching the platform.
    let err = orchestrator
        .attach_storage(&tenant, "db-1", "20Gi")
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Validation(_)), "{err}");
    let claim = platform
        .get_claim(tenant.as_str(), "db-1-data")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claim.size, "50Gi");

    orchestrator.detach_storage(&tenant, "db-1").await.unwrap();
    orchestrator.detach_storage(&tenant, "db-1").await.unwrap();
    let workload = platform
        .get_workload(tenant.as_str(), "db-1")
        .await
        .unwrap()
        .unwrap();
    assert!(workload.mounts.is_empty());
    assert_eq!(
        orchestrator.get_storage(&tenant, "db-1").await.unwrap(),
        StorageState::Absent
    );
}

#[tokio::test]
async fn malformed_size_is_rejected() {
    let (_platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &single("nginx", "web-1"))
        .await
        .unwrap();
    let err = orchestrator
        .attach_storage(&tenant, "web-1", "abc")
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::MalformedQuantity(_)), "{err}");
}

// ── Autoscaling ───────────────────────────────────────────────────

#[tokio::test]
async fn invalid_autoscaling_makes_no_platform_call() {
    let (platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &single("nginx", "web-1"))
        .await
        .unwrap();

    let before = platform.calls().await;
    let err = orchestrator
        .configure_autoscaling(&tenant, "web-1", 2, 1, 70)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Validation(_)), "{err}");
    assert_eq!(platform.calls().await, before);
}

#[tokio::test]
async fn autoscaling_converges() {
    let (_platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &single("nginx", "web-1"))
        .await
        .unwrap();

    orchestrator
        .configure_autoscaling(&tenant, "web-1", 1, 3, 70)
        .await
        .unwrap();
    let state = orchestrator
        .configure_autoscaling(&tenant, "web-1", 2, 5, 60)
        .await
        .unwrap();
    assert_eq!(
        orchestrator.get_autoscaling(&tenant, "web-1").await.unwrap(),
        state
    );
    let AutoscalingState::Enabled(policy) = state else {
        panic!("autoscaling not enabled");
    };
    assert_eq!((policy.min, policy.max, policy.cpu_target), (2, 5, 60));

    orchestrator.disable_autoscaling(&tenant, "web-1").await.unwrap();
    orchestrator.disable_autoscaling(&tenant, "web-1").await.unwrap();
    assert_eq!(
        orchestrator.get_autoscaling(&tenant, "web-1").await.unwrap(),
        AutoscalingState::Disabled
    );
}

// ── Backups ───────────────────────────────────────────────────────

#[tokio::test]
async fn backups_are_database_only() {
    let (_platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &single("nginx", "web-1"))
        .await
        .unwrap();
    let err = orchestrator.create_backup(&tenant, "web-1").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::UnsupportedOperation(_)), "{err}");
}

#[tokio::test]
async fn backup_restore_and_schedule() {
    let (platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &single("postgres", "db-1"))
        .await
        .unwrap();

    let backup = orchestrator.create_backup(&tenant, "db-1").await.unwrap();
    assert!(backup.name.starts_with("db-1-backup-"));
    assert!(
        platform
            .get_claim(tenant.as_str(), "db-1-backups")
            .await
            .unwrap()
            .is_some()
    );

    let restore = orchestrator.restore_backup(&tenant, "db-1", None).await.unwrap();
    assert!(restore.name.starts_with("db-1-restore-"));

    let history = orchestrator.list_backups(&tenant, "db-1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|r| r.state == JobState::Succeeded));
    assert!(matches!(
        orchestrator.get_backup(&tenant, "db-1").await.unwrap(),
        BackupState::Manual { .. }
    ));

    let scheduled = orchestrator
        .configure_auto_backup(&tenant, "db-1", None)
        .await
        .unwrap();
    let BackupState::Scheduled { cron, .. } = scheduled else {
        panic!("expected a schedule");
    };
    assert_eq!(cron, "0 2 * * *");

    orchestrator.disable_auto_backup(&tenant, "db-1").await.unwrap();
    assert!(matches!(
        orchestrator.get_backup(&tenant, "db-1").await.unwrap(),
        BackupState::Manual { .. }
    ));
}

#[tokio::test]
async fn restore_refuses_unfinished_backup() {
    let (platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &single("mysql", "db-1"))
        .await
        .unwrap();
    platform.set_job_outcome(JobState::Active).await;
    let backup = orchestrator.create_backup(&tenant, "db-1").await.unwrap();

    let err = orchestrator
        .restore_backup(&tenant, "db-1", Some(&backup.name))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Validation(_)), "{err}");
    let err = orchestrator
        .restore_backup(&tenant, "db-1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(_)), "{err}");
}

// ── Status ────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_namespace_lists_nothing() {
    let (_platform, orchestrator, tenant) = setup();
    assert!(orchestrator.list_workloads(&tenant).await.unwrap().is_empty());
}

#[tokio::test]
async fn status_reports_every_instance() {
    let (_platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &single("nginx", "web-1"))
        .await
        .unwrap();
    orchestrator
        .attach_storage(&tenant, "web-1", "1Gi")
        .await
        .unwrap();

    let views = orchestrator.list_workloads(&tenant).await.unwrap();
    assert_eq!(views.len(), 1);
    let view = &views[0];
    assert_eq!(view.workload, "web-1");
    assert_eq!(view.service_type, "nginx");
    assert_eq!(view.status, InstanceStatus::Ready);
    assert_eq!(view.owner.as_deref(), Some("ops-acme.io"));
    assert_eq!(view.autoscaling, Field::Known(AutoscalingState::Disabled));
    assert!(matches!(view.storage, Field::Known(StorageState::Attached { .. })));
    assert_eq!(
        view.route,
        Field::Known(Some(format!("web-1.{tenant}.shield.test")))
    );
}

#[tokio::test]
async fn failed_autoscaling_lookup_degrades_one_row() {
    let (platform, orchestrator, tenant) = setup();
    for name in ["web-1", "web-2"] {
        orchestrator
            .create_group(&tenant, &single("nginx", name))
            .await
            .unwrap();
    }
    platform
        .fail(
            ResourceKind::Autoscaler,
            Some("web-1-hpa"),
            PlatformError::Unavailable("timed out".to_string()),
        )
        .await;

    let views = orchestrator.list_workloads(&tenant).await.unwrap();
    assert_eq!(views.len(), 2);
    for view in &views {
        if view.workload == "web-1" {
            assert!(view.autoscaling.is_unknown());
        } else {
            assert_eq!(view.autoscaling, Field::Known(AutoscalingState::Disabled));
        }
        assert!(!view.exposure.is_unknown());
    }
}

#[tokio::test]
async fn failed_listing_degrades_field_for_all_rows() {
    let (platform, orchestrator, tenant) = setup();
    for name in ["web-1", "web-2"] {
        orchestrator
            .create_group(&tenant, &single("nginx", name))
            .await
            .unwrap();
    }
    platform
        .fail(
            ResourceKind::Route,
            None,
            PlatformError::Unavailable("timed out".to_string()),
        )
        .await;

    let views = orchestrator.list_workloads(&tenant).await.unwrap();
    assert_eq!(views.len(), 2);
    assert!(views.iter().all(|v| v.route.is_unknown()));
    assert!(views.iter().all(|v| !v.storage.is_unknown()));
}

// ── Monitoring ────────────────────────────────────────────────────

#[tokio::test]
async fn snapshot_sums_usage_when_available() {
    let (platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &single("nginx", "web-1"))
        .await
        .unwrap();
    let instance = instance_of(&platform, &tenant, "web-1").await;
    platform
        .set_usage(
            tenant.as_str(),
            InstanceUsage {
                instance: instance.clone(),
                containers: vec![ContainerUsage {
                    name: "nginx".to_string(),
                    cpu: "250m".to_string(),
                    memory: "128Mi".to_string(),
                }],
            },
        )
        .await;

    let snapshot = orchestrator.monitoring(&tenant).await.unwrap();
    assert_eq!(snapshot.summary.total_instances, 1);
    assert_eq!(snapshot.summary.total_workloads, 1);
    assert_eq!(snapshot.summary.status_counts[&InstanceStatus::Ready], 1);
    assert_eq!(snapshot.summary.cpu_millicores, Some(250));
    assert_eq!(snapshot.summary.memory_mib, Some(128.0));
    assert_eq!(snapshot.rollouts[0].desired, 1);

    platform
        .fail(
            ResourceKind::Usage,
            None,
            PlatformError::NotFound("metrics.k8s.io".to_string()),
        )
        .await;
    let degraded = orchestrator.monitoring(&tenant).await.unwrap();
    assert_eq!(degraded.summary.cpu_millicores, None);
    assert!(degraded.instances[0].usage.is_none());
    assert_eq!(
        orchestrator.instance_usage(&tenant, &instance).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn logs_are_tailed() {
    let (platform, orchestrator, tenant) = setup();
    orchestrator
        .create_group(&tenant, &single("nginx", "web-1"))
        .await
        .unwrap();
    let instance = instance_of(&platform, &tenant, "web-1").await;
    platform
        .set_logs(tenant.as_str(), &instance, "one\ntwo\nthree")
        .await;

    let tail = orchestrator
        .instance_logs(&tenant, &instance, Some(2))
        .await
        .unwrap();
    assert_eq!(tail, "two\nthree");
    let err = orchestrator
        .instance_logs(&tenant, "web-1-missing-pod", None)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(_)), "{err}");
}

// ── Tenants ───────────────────────────────────────────────────────

#[tokio::test]
async fn tenant_lifecycle() {
    let (_platform, orchestrator, tenant) = setup();
    let registration = orchestrator.register_tenant("Acme").await.unwrap();
    assert_eq!(registration.tenant, tenant);
    assert!(registration.created);
    assert_eq!(registration.pull_secret, None);
    assert!(!orchestrator.register_tenant("Acme").await.unwrap().created);

    orchestrator
        .create_group(&tenant, &single("nginx", "web-1"))
        .await
        .unwrap();
    let overview = orchestrator.overview().await.unwrap();
    assert_eq!(overview.len(), 1);
    assert_eq!(overview[0].tenant, tenant);
    assert_eq!(overview[0].workloads, 1);
    assert_eq!(overview[0].instances, 1);
    assert!(overview[0].error.is_none());

    assert!(orchestrator.delete_tenant("Acme").await.unwrap());
    assert!(!orchestrator.delete_tenant("Acme").await.unwrap());
    assert!(orchestrator.overview().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_source_pull_secret_is_reported() {
    let mut config = config();
    config.registry.pull_secret = Some("regcred".to_string());
    let (_platform, orchestrator, _tenant) = setup_with(config);

    let err = orchestrator.register_tenant("Acme").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(_)), "{err}");
}

#[tokio::test]
async fn empty_company_is_invalid() {
    let (_platform, orchestrator, _tenant) = setup();
    let err = orchestrator.register_tenant("!!!").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Validation(_)), "{err}");
}
