//! shield.toml configuration parser.
//!
//! Every field has a default, so an empty file (or no file) yields a
//! working configuration.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::{DEFAULT_MONTHLY_PRICE, PriceTable};
use crate::quantity::{self, QuantityResult};
use crate::tenant::NamespacePolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldConfig {
    pub tenancy: TenancyConfig,
    pub quota: QuotaConfig,
    pub backup: BackupConfig,
    pub ingress: IngressConfig,
    pub registry: RegistryConfig,
    pub pricing: PricingConfig,
    pub platform: PlatformConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TenancyConfig {
    /// Prefix of every tenant namespace.
    pub namespace_prefix: String,
    /// Append a digest of the raw company name to namespace keys.
    pub hash_suffix: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Total persistent storage a tenant may claim (e.g. "50Gi").
    pub storage_ceiling: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Cron expression for scheduled backups.
    pub schedule: String,
    /// Size of the per-workload backup claim.
    pub claim_size: String,
    /// Finished backup jobs are garbage-collected after this many seconds.
    pub job_ttl_secs: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressConfig {
    /// Base domain for external routes; routes are skipped when unset.
    pub domain: Option<String>,
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Pull secret copied into every new tenant namespace.
    pub pull_secret: Option<String>,
    /// Namespace holding the source pull secret.
    pub source_namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Monthly price per service type, overriding the catalog.
    pub overrides: HashMap<String, f64>,
    /// Price for types absent from catalog and overrides.
    pub default_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Upper bound for a single platform round-trip.
    pub request_timeout_secs: u64,
    /// Default number of log lines returned by log tails.
    pub log_tail_lines: u32,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            namespace_prefix: "org-".to_string(),
            hash_suffix: false,
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            storage_ceiling: "50Gi".to_string(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            schedule: "0 2 * * *".to_string(),
            claim_size: "5Gi".to_string(),
            job_ttl_secs: 86_400,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            pull_secret: None,
            source_namespace: "default".to_string(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            overrides: HashMap::new(),
            default_price: DEFAULT_MONTHLY_PRICE,
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            log_tail_lines: 100,
        }
    }
}

impl ShieldConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: ShieldConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values that would only fail later, mid-request.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.storage_ceiling_bytes()?;
        self.backup_claim_bytes()?;
        if self.platform.request_timeout_secs == 0 {
            anyhow::bail!("platform.request_timeout_secs must be positive");
        }
        if self.backup.schedule.split_whitespace().count() != 5 {
            anyhow::bail!(
                "backup.schedule must be a five-field cron expression, got {:?}",
                self.backup.schedule
            );
        }
        Ok(())
    }

    pub fn namespace_policy(&self) -> NamespacePolicy {
        let prefix = self.tenancy.namespace_prefix.clone();
        if self.tenancy.hash_suffix {
            NamespacePolicy::Hashed { prefix }
        } else {
            NamespacePolicy::Plain { prefix }
        }
    }

    pub fn storage_ceiling_bytes(&self) -> QuantityResult<u64> {
        quantity::parse_bytes(&self.quota.storage_ceiling)
    }

    pub fn backup_claim_bytes(&self) -> QuantityResult<u64> {
        quantity::parse_bytes(&self.backup.claim_size)
    }

    pub fn price_table(&self) -> PriceTable {
        PriceTable::new(&self.pricing.overrides, self.pricing.default_price)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.platform.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::GI;

    #[test]
    fn empty_file_yields_defaults() {
        let config = ShieldConfig::from_toml_str("").unwrap();
        assert_eq!(config.storage_ceiling_bytes().unwrap(), 50 * GI);
        assert_eq!(config.backup.schedule, "0 2 * * *");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.ingress.domain.is_none());
        assert_eq!(
            config.namespace_policy(),
            NamespacePolicy::Plain {
                prefix: "org-".to_string()
            }
        );
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let toml_str = r#"
[quota]
storage_ceiling = "100Gi"

[tenancy]
hash_suffix = true

[pricing.overrides]
nginx = 6.5
"#;
        let config = ShieldConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.storage_ceiling_bytes().unwrap(), 100 * GI);
        assert!(matches!(config.namespace_policy(), NamespacePolicy::Hashed { .. }));
        assert_eq!(config.tenancy.namespace_prefix, "org-");
        assert_eq!(config.price_table().monthly("nginx"), 6.5);
        assert_eq!(config.price_table().monthly("postgres"), 15.0);
    }

    #[test]
    fn malformed_ceiling_is_rejected() {
        let err = ShieldConfig::from_toml_str("[quota]\nstorage_ceiling = \"lots\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn bad_schedule_is_rejected() {
        let err = ShieldConfig::from_toml_str("[backup]\nschedule = \"daily\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shield.toml");

        let mut config = ShieldConfig::default();
        config.ingress.domain = Some("apps.example.com".to_string());
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = ShieldConfig::from_file(&path).unwrap();
        assert_eq!(loaded.ingress.domain.as_deref(), Some("apps.example.com"));
    }
}
