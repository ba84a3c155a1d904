use clap::Subcommand;

use super::{print_json, Context};

#[derive(Subcommand)]
pub enum TenantAction {
    /// Create the tenant namespace and copy the registry pull secret
    Register { company: String },
    /// Delete the tenant namespace and everything in it
    Delete { company: String },
    /// Overview of every tenant
    List,
}

pub async fn run(ctx: &Context, action: TenantAction) -> anyhow::Result<()> {
    match action {
        TenantAction::Register { company } => {
            print_json(&ctx.orchestrator.register_tenant(&company).await?)
        }
        TenantAction::Delete { company } => {
            let deleted = ctx.orchestrator.delete_tenant(&company).await?;
            print_json(&serde_json::json!({ "company": company, "deleted": deleted }))
        }
        TenantAction::List => print_json(&ctx.orchestrator.overview().await?),
    }
}
