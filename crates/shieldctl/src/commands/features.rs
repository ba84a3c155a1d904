use clap::Subcommand;

use super::{print_json, Context};

#[derive(Subcommand)]
pub enum StorageAction {
    /// Attach (or resize) persistent storage
    Attach {
        company: String,
        workload: String,
        /// Size such as 10Gi
        size: String,
    },
    Detach { company: String, workload: String },
    Show { company: String, workload: String },
}

#[derive(Subcommand)]
pub enum AutoscaleAction {
    Enable {
        company: String,
        workload: String,
        #[arg(long, default_value_t = 1)]
        min: u32,
        #[arg(long, default_value_t = 3)]
        max: u32,
        /// Target average CPU utilization, percent
        #[arg(long, default_value_t = 70)]
        cpu: u32,
    },
    Disable { company: String, workload: String },
    Show { company: String, workload: String },
}

#[derive(Subcommand)]
pub enum BackupAction {
    /// Start a backup job now
    Create { company: String, workload: String },
    /// Restore a backup; the latest completed one when --from is omitted
    Restore {
        company: String,
        workload: String,
        #[arg(long)]
        from: Option<String>,
    },
    List { company: String, workload: String },
    /// Schedule recurring backups
    Schedule {
        company: String,
        workload: String,
        /// Five-field cron expression; backup.schedule when omitted
        #[arg(long)]
        cron: Option<String>,
    },
    Unschedule { company: String, workload: String },
    Show { company: String, workload: String },
}

pub async fn storage(ctx: &Context, action: StorageAction) -> anyhow::Result<()> {
    let o = &ctx.orchestrator;
    match action {
        StorageAction::Attach {
            company,
            workload,
            size,
        } => print_json(&o.attach_storage(&ctx.tenant(&company)?, &workload, &size).await?),
        StorageAction::Detach { company, workload } => {
            o.detach_storage(&ctx.tenant(&company)?, &workload).await?;
            print_json(&serde_json::json!({ "workload": workload, "storage": "absent" }))
        }
        StorageAction::Show { company, workload } => {
            print_json(&o.get_storage(&ctx.tenant(&company)?, &workload).await?)
        }
    }
}

pub async fn autoscale(ctx: &Context, action: AutoscaleAction) -> anyhow::Result<()> {
    let o = &ctx.orchestrator;
    match action {
        AutoscaleAction::Enable {
            company,
            workload,
            min,
            max,
            cpu,
        } => {
            let tenant = ctx.tenant(&company)?;
            print_json(&o.configure_autoscaling(&tenant, &workload, min, max, cpu).await?)
        }
        AutoscaleAction::Disable { company, workload } => {
            o.disable_autoscaling(&ctx.tenant(&company)?, &workload).await?;
            print_json(&serde_json::json!({ "workload": workload, "autoscaling": "disabled" }))
        }
        AutoscaleAction::Show { company, workload } => {
            print_json(&o.get_autoscaling(&ctx.tenant(&company)?, &workload).await?)
        }
    }
}

pub async fn backup(ctx: &Context, action: BackupAction) -> anyhow::Result<()> {
    let o = &ctx.orchestrator;
    match action {
        BackupAction::Create { company, workload } => {
            print_json(&o.create_backup(&ctx.tenant(&company)?, &workload).await?)
        }
        BackupAction::Restore {
            company,
            workload,
            from,
        } => {
            let tenant = ctx.tenant(&company)?;
            print_json(&o.restore_backup(&tenant, &workload, from.as_deref()).await?)
        }
        BackupAction::List { company, workload } => {
            print_json(&o.list_backups(&ctx.tenant(&company)?, &workload).await?)
        }
        BackupAction::Schedule {
            company,
            workload,
            cron,
        } => {
            let tenant = ctx.tenant(&company)?;
            print_json(&o.configure_auto_backup(&tenant, &workload, cron.as_deref()).await?)
        }
        BackupAction::Unschedule { company, workload } => {
            o.disable_auto_backup(&ctx.tenant(&company)?, &workload).await?;
            print_json(&serde_json::json!({ "workload": workload, "schedule": null }))
        }
        BackupAction::Show { company, workload } => {
            print_json(&o.get_backup(&ctx.tenant(&company)?, &workload).await?)
        }
    }
}
