use std::collections::BTreeMap;

use clap::Args;

use shield_orchestrator::{CreateRequest, GroupOutcome};

use super::{print_json, Context};

#[derive(Args)]
pub struct DeployArgs {
    pub company: String,
    /// Catalog service type or bundle name
    pub service_type: String,
    /// Canonical name (group id for bundles); generated when omitted
    #[arg(long)]
    pub name: Option<String>,
    /// Container image, required for the custom type
    #[arg(long)]
    pub image: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    /// Extra environment as KEY=VALUE, repeatable
    #[arg(long = "env", value_parser = parse_env)]
    pub env: Vec<(String, String)>,
    /// Who asked for it; stored as a label
    #[arg(long, default_value = "")]
    pub owner: String,
    #[arg(long)]
    pub replicas: Option<u32>,
}

fn parse_env(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}

pub async fn deploy(ctx: &Context, args: DeployArgs) -> anyhow::Result<()> {
    let tenant = ctx.tenant(&args.company)?;
    let request = CreateRequest {
        service_type: args.service_type,
        name: args.name,
        image: args.image,
        port: args.port,
        env: args.env.into_iter().collect::<BTreeMap<_, _>>(),
        owner: args.owner,
        replicas: args.replicas,
    };
    let outcome = ctx.orchestrator.create_group(&tenant, &request).await?;
    print_json(&outcome)?;
    match outcome {
        GroupOutcome::Complete(_) => Ok(()),
        GroupOutcome::Partial { group_id, failed, .. } => {
            anyhow::bail!("{group_id}: {} member(s) failed", failed.len())
        }
    }
}

pub async fn delete(ctx: &Context, company: &str, instance: &str) -> anyhow::Result<()> {
    let tenant = ctx.tenant(company)?;
    print_json(&ctx.orchestrator.delete_by_instance_name(&tenant, instance).await?)
}

pub async fn delete_group(ctx: &Context, company: &str, group_id: &str) -> anyhow::Result<()> {
    let tenant = ctx.tenant(company)?;
    print_json(&ctx.orchestrator.delete_group(&tenant, group_id).await?)
}

pub async fn resolve(ctx: &Context, company: &str, instance: &str) -> anyhow::Result<()> {
    let tenant = ctx.tenant(company)?;
    let workload = ctx.orchestrator.resolve(&tenant, instance).await?;
    print_json(&serde_json::json!({ "instance": instance, "workload": workload }))
}
