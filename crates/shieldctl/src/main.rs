//! shieldctl — operator CLI for the Shield control plane.
//!
//! Every command takes the company name as given by the customer; the
//! namespace key is derived from it. Results are printed as JSON.
//!
//! # Usage
//!
//! ```text
//! shieldctl tenant register "Acme Corp"
//! shieldctl deploy "Acme Corp" wordpress-stack --name blog
//! shieldctl storage attach "Acme Corp" blog-database 10Gi
//! shieldctl status "Acme Corp"
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "shieldctl",
    about = "Shield — multi-tenant workload control plane",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to shield.toml; built-in defaults when absent.
    #[arg(long, env = "SHIELD_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register, delete and list tenants
    Tenant {
        #[command(subcommand)]
        action: commands::tenant::TenantAction,
    },
    /// Deploy a catalog service or bundle
    Deploy(commands::workload::DeployArgs),
    /// Delete whatever owns an instance (its whole group, if any)
    Delete {
        company: String,
        instance: String,
    },
    /// Delete a resource group by id
    DeleteGroup {
        company: String,
        group_id: String,
    },
    /// Map an instance name to its workload
    Resolve {
        company: String,
        instance: String,
    },
    /// Unified status of every instance
    Status { company: String },
    /// Committed storage against the tenant ceiling
    Quota { company: String },
    /// Persistent storage of a workload
    Storage {
        #[command(subcommand)]
        action: commands::features::StorageAction,
    },
    /// Horizontal autoscaling of a workload
    Autoscale {
        #[command(subcommand)]
        action: commands::features::AutoscaleAction,
    },
    /// Database backups
    Backup {
        #[command(subcommand)]
        action: commands::features::BackupAction,
    },
    /// Monitoring snapshot of a tenant
    Monitor { company: String },
    /// Tail an instance's log
    Logs {
        company: String,
        instance: String,
        /// Number of lines; defaults to platform.log_tail_lines
        #[arg(long)]
        tail: Option<u32>,
    },
    /// Current CPU and memory of an instance
    Usage {
        company: String,
        instance: String,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::init_tracing(cli.log_json);

    let config = commands::load_config(cli.config.as_deref())?;
    if let Command::Config = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let ctx = commands::Context::connect(config).await?;
    match cli.command {
        Command::Tenant { action } => commands::tenant::run(&ctx, action).await,
        Command::Deploy(args) => commands::workload::deploy(&ctx, args).await,
        Command::Delete { company, instance } => {
            commands::workload::delete(&ctx, &company, &instance).await
        }
        Command::DeleteGroup { company, group_id } => {
            commands::workload::delete_group(&ctx, &company, &group_id).await
        }
        Command::Resolve { company, instance } => {
            commands::workload::resolve(&ctx, &company, &instance).await
        }
        Command::Status { company } => commands::observe::status(&ctx, &company).await,
        Command::Quota { company } => commands::observe::quota(&ctx, &company).await,
        Command::Storage { action } => commands::features::storage(&ctx, action).await,
        Command::Autoscale { action } => commands::features::autoscale(&ctx, action).await,
        Command::Backup { action } => commands::features::backup(&ctx, action).await,
        Command::Monitor { company } => commands::observe::monitor(&ctx, &company).await,
        Command::Logs {
            company,
            instance,
            tail,
        } => commands::observe::logs(&ctx, &company, &instance, tail).await,
        Command::Usage { company, instance } => {
            commands::observe::usage(&ctx, &company, &instance).await
        }
        Command::Config => Ok(()),
    }
}
