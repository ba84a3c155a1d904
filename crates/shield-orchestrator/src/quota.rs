//! Per-tenant storage quota.
//!
//! The ledger is never stored: committed storage is the sum of every
//! claim's requested size in the tenant namespace, recomputed on demand.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use shield_core::quantity;
use shield_core::{Labels, TenantKey};
use shield_platform::{Claim, Platform};

use crate::error::{OrchestratorError, OrchestratorResult};

/// Committed storage against the ceiling, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaUsage {
    pub used: u64,
    pub ceiling: u64,
}

impl QuotaUsage {
    pub fn available(&self) -> u64 {
        self.ceiling.saturating_sub(self.used)
    }
}

/// Sum the committed sizes of `claims`, skipping the one named `excluding`.
///
/// A malformed size fails the whole sum: the ledger cannot be trusted
/// with an unknown term.
pub fn committed_bytes(claims: &[Claim], excluding: Option<&str>) -> OrchestratorResult<u64> {
    claims
        .iter()
        .filter(|c| Some(c.name.as_str()) != excluding)
        .try_fold(0u64, |total, claim| -> OrchestratorResult<u64> {
            let bytes = quantity::parse_bytes(claim.committed())?;
            Ok(total.saturating_add(bytes))
        })
}

#[derive(Clone)]
pub struct QuotaTracker {
    platform: Arc<dyn Platform>,
    ceiling: u64,
}

impl QuotaTracker {
    pub fn new(platform: Arc<dyn Platform>, ceiling: u64) -> Self {
        Self { platform, ceiling }
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    /// Current committed storage of a tenant.
    pub async fn usage(&self, tenant: &TenantKey) -> OrchestratorResult<QuotaUsage> {
        self.usage_excluding(tenant, None).await
    }

    async fn usage_excluding(
        &self,
        tenant: &TenantKey,
        excluding: Option<&str>,
    ) -> OrchestratorResult<QuotaUsage> {
        let claims = self
            .platform
            .list_claims(tenant.as_str(), &Labels::new())
            .await?;
        Ok(QuotaUsage {
            used: committed_bytes(&claims, excluding)?,
            ceiling: self.ceiling,
        })
    }

    /// Accept or reject a request for `requested` more bytes.
    ///
    /// `replacing` names a claim whose current size is about to be
    /// superseded by the request and so does not count as used.
    pub async fn check(
        &self,
        tenant: &TenantKey,
        requested: u64,
        replacing: Option<&str>,
    ) -> OrchestratorResult<QuotaUsage> {
        let usage = self.usage_excluding(tenant, replacing).await?;
        if usage.used.saturating_add(requested) > usage.ceiling {
            warn!(
                %tenant,
                used = usage.used,
                requested,
                ceiling = usage.ceiling,
                "storage quota exceeded"
            );
            return Err(OrchestratorError::QuotaExceeded {
                used: usage.used,
                requested,
                ceiling: usage.ceiling,
            });
        }
        debug!(%tenant, used = usage.used, requested, "storage quota ok");
        Ok(usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shield_core::quantity::GI;

    fn claim(name: &str, size: &str) -> Claim {
        Claim {
            name: name.to_string(),
            labels: Labels::new(),
            size: size.to_string(),
            capacity: None,
            storage_class: None,
        }
    }

    #[test]
    fn sums_mixed_units() {
        let claims = vec![claim("a", "10Gi"), claim("b", "512Mi"), claim("c", "1G")];
        let total = committed_bytes(&claims, None).unwrap();
        assert_eq!(total, 10 * GI + 512 * 1024 * 1024 + 1_000_000_000);
    }

    #[test]
    fn excluded_claim_is_skipped() {
        let claims = vec![claim("a-data", "10Gi"), claim("b-data", "5Gi")];
        assert_eq!(committed_bytes(&claims, Some("a-data")).unwrap(), 5 * GI);
    }

    #[test]
    fn malformed_size_fails_the_sum() {
        let claims = vec![claim("a", "10Gi"), claim("b", "lots")];
        assert!(matches!(
            committed_bytes(&claims, None),
            Err(OrchestratorError::MalformedQuantity(_))
        ));
    }

    #[test]
    fn available_never_underflows() {
        let usage = QuotaUsage {
            used: 60 * GI,
            ceiling: 50 * GI,
        };
        assert_eq!(usage.available(), 0);
    }
}
