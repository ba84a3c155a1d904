use shield_core::quantity;

use super::{print_json, Context};

pub async fn status(ctx: &Context, company: &str) -> anyhow::Result<()> {
    let tenant = ctx.tenant(company)?;
    print_json(&ctx.orchestrator.list_workloads(&tenant).await?)
}

pub async fn quota(ctx: &Context, company: &str) -> anyhow::Result<()> {
    let tenant = ctx.tenant(company)?;
    let usage = ctx.orchestrator.quota_usage(&tenant).await?;
    print_json(&serde_json::json!({
        "tenant": tenant,
        "used": quantity::format_bytes(usage.used),
        "ceiling": quantity::format_bytes(usage.ceiling),
        "available": quantity::format_bytes(usage.available()),
    }))
}

pub async fn monitor(ctx: &Context, company: &str) -> anyhow::Result<()> {
    let tenant = ctx.tenant(company)?;
    print_json(&ctx.orchestrator.monitoring(&tenant).await?)
}

/// Logs are printed raw, not as JSON.
pub async fn logs(ctx: &Context, company: &str, instance: &str, tail: Option<u32>) -> anyhow::Result<()> {
    let tenant = ctx.tenant(company)?;
    let text = ctx.orchestrator.instance_logs(&tenant, instance, tail).await?;
    println!("{text}");
    Ok(())
}

pub async fn usage(ctx: &Context, company: &str, instance: &str) -> anyhow::Result<()> {
    let tenant = ctx.tenant(company)?;
    let usage = ctx.orchestrator.instance_usage(&tenant, instance).await?;
    print_json(&serde_json::json!({ "instance": instance, "usage": usage }))
}
