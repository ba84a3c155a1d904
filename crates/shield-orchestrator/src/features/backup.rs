use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use shield_core::catalog::{self, BACKUP_MOUNT_PATH};
use shield_core::labels::{self, Labels};
use shield_core::quantity;
use shield_core::{BackupAction, BackupEngine, TenantKey};
use shield_platform::{
    Claim, Job, JobState, JobStatus, JobTemplate, PlatformError, PlatformResultExt, Schedule,
    VolumeMount, Workload,
};

use super::FeatureManager;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::identity::{self, SecondaryKind};

/// One backup or restore run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupRecord {
    pub name: String,
    pub action: BackupAction,
    /// Run created by the backup schedule rather than on request.
    pub scheduled: bool,
    pub state: JobState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BackupState {
    None,
    Manual {
        history: Vec<BackupRecord>,
    },
    Scheduled {
        cron: String,
        history: Vec<BackupRecord>,
    },
}

fn action_of(labels: &Labels) -> BackupAction {
    match labels.get(labels::BACKUP).map(String::as_str) {
        Some("restore") => BackupAction::Restore,
        _ => BackupAction::Backup,
    }
}

fn job_labels(canonical: &str, action: BackupAction) -> Labels {
    let mut out = labels::managed();
    out.insert(labels::BACKUP_TARGET.to_string(), canonical.to_string());
    out.insert(labels::BACKUP.to_string(), action.as_str().to_string());
    out
}

fn validate_cron(cron: &str) -> OrchestratorResult<()> {
    if cron.split_whitespace().count() == 5 {
        Ok(())
    } else {
        Err(OrchestratorError::Validation(format!(
            "schedule must be a five-field cron expression, got {cron:?}"
        )))
    }
}

fn engine_for(workload: &Workload) -> OrchestratorResult<BackupEngine> {
    let service_type = workload.service_type().unwrap_or_default();
    catalog::backup_engine(service_type).ok_or_else(|| {
        OrchestratorError::UnsupportedOperation(format!(
            "backups are not supported for service type {service_type:?}"
        ))
    })
}

impl FeatureManager {
    /// Job template running `action` for `workload` against `file`.
    fn backup_template(
        &self,
        workload: &Workload,
        engine: BackupEngine,
        action: BackupAction,
        file: &str,
    ) -> JobTemplate {
        let host = identity::secondary_name(&workload.name, SecondaryKind::Exposure);
        let mut env = BTreeMap::new();
        if let (Some(source), Some(target)) = (engine.password_source_env(), engine.password_job_env()) {
            if let Some(password) = workload.env.get(source) {
                env.insert(target.to_string(), password.clone());
            }
        }
        JobTemplate {
            image: workload.image.clone(),
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                engine.script(action, &host, file),
            ],
            env,
            mounts: vec![VolumeMount {
                claim: identity::secondary_name(&workload.name, SecondaryKind::BackupClaim),
                mount_path: BACKUP_MOUNT_PATH.to_string(),
            }],
            ttl_secs: Some(self.backup.job_ttl_secs),
        }
    }

    /// Create the shared backup claim on first use.
    async fn ensure_backup_claim(&self, tenant: &TenantKey, workload: &Workload) -> OrchestratorResult<()> {
        let ns = tenant.as_str();
        let name = identity::secondary_name(&workload.name, SecondaryKind::BackupClaim);
        if self.platform.get_claim(ns, &name).await?.is_some() {
            return Ok(());
        }
        let requested = quantity::parse_bytes(&self.backup.claim_size)?;
        self.quota.check(tenant, requested, None).await?;

        let claim = Claim {
            name: name.clone(),
            labels: workload.labels.clone(),
            size: self.backup.claim_size.clone(),
            capacity: None,
            storage_class: None,
        };
        let created = self.platform.create_claim(ns, &claim).await.existing_ok()?;
        debug!(%tenant, claim = %name, created, "backup claim ensured");
        Ok(())
    }

    async fn run_job(
        &self,
        tenant: &TenantKey,
        workload: &Workload,
        action: BackupAction,
        at: DateTime<Utc>,
        file: &str,
    ) -> OrchestratorResult<BackupRecord> {
        let engine = engine_for(workload)?;
        self.ensure_backup_claim(tenant, workload).await?;

        let job = Job {
            name: identity::job_name(&workload.name, action, at),
            labels: job_labels(&workload.name, action),
            template: self.backup_template(workload, engine, action, file),
            status: JobStatus::default(),
        };
        match self.platform.create_job(tenant.as_str(), &job).await {
            Ok(()) => {}
            Err(PlatformError::Conflict(_)) => {
                return Err(OrchestratorError::Conflict(format!(
                    "{} already started this second",
                    job.name
                )));
            }
            Err(e) => return Err(e.into()),
        }
        info!(%tenant, workload = %workload.name, job = %job.name, action = action.as_str(), "backup job started");

        Ok(BackupRecord {
            name: job.name,
            action,
            scheduled: false,
            state: JobState::Active,
            started_at: Some(at),
            completed_at: None,
        })
    }

    /// Dump a database workload into its backup claim.
    pub async fn create_backup(&self, tenant: &TenantKey, workload_name: &str) -> OrchestratorResult<BackupRecord> {
        let workload = self.workload(tenant, workload_name).await?;
        let engine = engine_for(&workload)?;
        let at = Utc::now();
        let file = format!(
            "{}.{}",
            identity::job_name(&workload.name, BackupAction::Backup, at),
            engine.extension()
        );
        self.run_job(tenant, &workload, BackupAction::Backup, at, &file)
            .await
    }

    /// Load a previous backup. Without a name, the latest successful
    /// manual backup is used.
    pub async fn restore_backup(
        &self,
        tenant: &TenantKey,
        workload_name: &str,
        backup: Option<&str>,
    ) -> OrchestratorResult<BackupRecord> {
        let workload = self.workload(tenant, workload_name).await?;
        let engine = engine_for(&workload)?;

        let history = self.list_backups(tenant, &workload.name).await?;
        let source = match backup {
            Some(name) => history
                .iter()
                .find(|r| r.name == name && r.action == BackupAction::Backup && !r.scheduled)
                .ok_or_else(|| OrchestratorError::NotFound(format!("backup {name}")))?,
            None => history
                .iter()
                .find(|r| {
                    r.action == BackupAction::Backup && !r.scheduled && r.state == JobState::Succeeded
                })
                .ok_or_else(|| {
                    OrchestratorError::NotFound(format!("completed backup of {}", workload.name))
                })?,
        };
        if source.state != JobState::Succeeded {
            return Err(OrchestratorError::Validation(format!(
                "backup {} has not completed",
                source.name
            )));
        }

        let file = format!("{}.{}", source.name, engine.extension());
        self.run_job(tenant, &workload, BackupAction::Restore, Utc::now(), &file)
            .await
    }

    /// Backup and restore runs of a workload, newest first.
    pub async fn list_backups(&self, tenant: &TenantKey, workload_name: &str) -> OrchestratorResult<Vec<BackupRecord>> {
        let selector = labels::for_backup_target(workload_name);
        let jobs = self.platform.list_jobs(tenant.as_str(), &selector).await?;
        let schedule_prefix = format!(
            "{}-",
            identity::secondary_name(workload_name, SecondaryKind::BackupSchedule)
        );

        let mut records: Vec<BackupRecord> = jobs
            .into_iter()
            .map(|job| BackupRecord {
                action: action_of(&job.labels),
                scheduled: job.name.starts_with(&schedule_prefix),
                name: job.name,
                state: job.status.state,
                started_at: job.status.started_at,
                completed_at: job.status.completed_at,
            })
            .collect();
        // Names embed the UTC stamp, so they break ties on start time.
        records.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.name.cmp(&a.name))
        });
        Ok(records)
    }

    /// Schedule recurring backups (`cron`, or the configured default).
    pub async fn configure_auto_backup(
        &self,
        tenant: &TenantKey,
        workload_name: &str,
        cron: Option<&str>,
    ) -> OrchestratorResult<BackupState> {
        let cron = cron.unwrap_or(self.backup.schedule.as_str()).to_string();
        validate_cron(&cron)?;

        let ns = tenant.as_str();
        let workload = self.workload(tenant, workload_name).await?;
        let engine = engine_for(&workload)?;
        self.ensure_backup_claim(tenant, &workload).await?;

        // Each run stamps its own file name in the shell.
        let file = format!(
            "{}-scheduled-$(date -u +%Y%m%d-%H%M%S).{}",
            workload.name,
            engine.extension()
        );
        let schedule = Schedule {
            name: identity::secondary_name(&workload.name, SecondaryKind::BackupSchedule),
            labels: job_labels(&workload.name, BackupAction::Backup),
            cron: cron.clone(),
            template: self.backup_template(&workload, engine, BackupAction::Backup, &file),
            last_run: None,
        };

        match self.platform.get_schedule(ns, &schedule.name).await? {
            Some(existing) if existing.cron == schedule.cron && existing.template == schedule.template => {
                debug!(%tenant, workload = %workload.name, "backup schedule unchanged");
            }
            Some(_) => self.platform.replace_schedule(ns, &schedule).await?,
            None => {
                if !self.platform.create_schedule(ns, &schedule).await.existing_ok()? {
                    self.platform.replace_schedule(ns, &schedule).await?;
                }
            }
        }
        info!(%tenant, workload = %workload.name, %cron, "automatic backups scheduled");

        let history = self.list_backups(tenant, &workload.name).await?;
        Ok(BackupState::Scheduled { cron, history })
    }

    pub async fn disable_auto_backup(&self, tenant: &TenantKey, workload_name: &str) -> OrchestratorResult<()> {
        let name = identity::secondary_name(workload_name, SecondaryKind::BackupSchedule);
        let deleted = self
            .platform
            .delete_schedule(tenant.as_str(), &name)
            .await
            .absent_ok()?;
        info!(%tenant, workload = %workload_name, deleted, "automatic backups disabled");
        Ok(())
    }

    pub async fn get_backup(&self, tenant: &TenantKey, workload_name: &str) -> OrchestratorResult<BackupState> {
        let name = identity::secondary_name(workload_name, SecondaryKind::BackupSchedule);
        let schedule = self.platform.get_schedule(tenant.as_str(), &name).await?;
        let history = self.list_backups(tenant, workload_name).await?;
        Ok(match (schedule, history.is_empty()) {
            (Some(schedule), _) => BackupState::Scheduled {
                cron: schedule.cron,
                history,
            },
            (None, false) => BackupState::Manual { history },
            (None, true) => BackupState::None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cron_needs_five_fields() {
        assert!(validate_cron("0 2 * * *").is_ok());
        assert!(validate_cron("*/15 * * * 1-5").is_ok());
        assert!(validate_cron("@daily").is_err());
        assert!(validate_cron("0 2 * *").is_err());
    }

    #[test]
    fn job_labels_keep_pods_out_of_workload_selectors() {
        let labels = job_labels("postgres-1", BackupAction::Restore);
        assert!(!labels.contains_key(labels::WORKLOAD));
        assert_eq!(labels[labels::BACKUP_TARGET], "postgres-1");
        assert_eq!(action_of(&labels), BackupAction::Restore);
    }
}
