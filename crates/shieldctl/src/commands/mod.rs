pub mod features;
pub mod observe;
pub mod tenant;
pub mod workload;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use shield_core::{ShieldConfig, TenantKey};
use shield_orchestrator::Orchestrator;
use shield_platform::KubePlatform;

const DEFAULT_FILTER: &str = "info,shield=debug";

/// Logs go to stderr so stdout stays machine-readable.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<ShieldConfig> {
    match path {
        Some(path) => {
            let config = ShieldConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?;
            debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        }
        None => Ok(ShieldConfig::default()),
    }
}

/// Orchestrator bound to the current cluster.
pub struct Context {
    pub orchestrator: Orchestrator,
}

impl Context {
    pub async fn connect(config: ShieldConfig) -> anyhow::Result<Self> {
        let platform = KubePlatform::connect(config.request_timeout())
            .await
            .context("connecting to the cluster")?;
        info!(timeout_secs = config.platform.request_timeout_secs, "cluster client ready");
        let orchestrator = Orchestrator::new(Arc::new(platform), config)?;
        Ok(Self { orchestrator })
    }

    pub fn tenant(&self, company: &str) -> anyhow::Result<TenantKey> {
        Ok(self.orchestrator.tenant_key(company)?)
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
