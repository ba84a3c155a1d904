//! Tenant namespace keys.
//!
//! A tenant is identified by the namespace key derived from its company
//! name. The derivation lower-cases the name, turns whitespace into
//! hyphens, strips every character outside `[a-z0-9-]` and applies a
//! fixed prefix. Runs of hyphens are kept, so keys of existing tenants
//! do not change.
//!
//! # Collision risk
//!
//! Company names that differ only in stripped characters ("Acme!" and
//! "Acme", or "Café" and "Caf") sanitize to the same key and would share
//! a namespace. [`NamespacePolicy::Hashed`] appends a digest of the raw
//! name to keep such tenants apart; [`NamespacePolicy::Plain`] keeps the
//! historical keys and accepts the risk.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Longest namespace name the platform accepts (DNS label).
pub const MAX_NAMESPACE_LEN: usize = 63;

/// Hex digits of the digest appended under [`NamespacePolicy::Hashed`].
const HASH_SUFFIX_LEN: usize = 8;

/// How a company name becomes a namespace key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamespacePolicy {
    /// `<prefix><sanitized>`.
    Plain { prefix: String },
    /// `<prefix><sanitized>-<8 hex of sha256(raw name)>`.
    Hashed { prefix: String },
}

impl Default for NamespacePolicy {
    fn default() -> Self {
        Self::Plain {
            prefix: "org-".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TenantKeyError {
    #[error("company name {0:?} has no characters usable in a namespace")]
    Empty(String),
}

/// The namespace key of one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantKey(String);

impl TenantKey {
    /// Derive the key for a company name under the given policy.
    pub fn derive(company: &str, policy: &NamespacePolicy) -> Result<Self, TenantKeyError> {
        let sanitized = sanitize(company);
        if sanitized.is_empty() {
            return Err(TenantKeyError::Empty(company.to_string()));
        }

        let key = match policy {
            NamespacePolicy::Plain { prefix } => {
                clamp(&format!("{prefix}{sanitized}"), MAX_NAMESPACE_LEN)
            }
            NamespacePolicy::Hashed { prefix } => {
                let digest = Sha256::digest(company.trim().to_lowercase().as_bytes());
                let suffix = &hex::encode(digest)[..HASH_SUFFIX_LEN];
                let head = clamp(
                    &format!("{prefix}{sanitized}"),
                    MAX_NAMESPACE_LEN - HASH_SUFFIX_LEN - 1,
                );
                format!("{head}-{suffix}")
            }
        };
        Ok(Self(key))
    }

    /// Wrap an existing namespace name (e.g. one listed from the platform).
    pub fn from_namespace(namespace: impl Into<String>) -> Self {
        Self(namespace.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lower-case, whitespace → `-`, drop everything outside `[a-z0-9-]`.
/// Trailing hyphens are dropped: a namespace must end alphanumeric.
pub fn sanitize(company: &str) -> String {
    let mut out: String = company
        .trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect();
    while out.ends_with('-') {
        out.pop();
    }
    out
}

fn clamp(s: &str, max: usize) -> String {
    let mut clamped: String = s.chars().take(max).collect();
    while clamped.ends_with('-') {
        clamped.pop();
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> NamespacePolicy {
        NamespacePolicy::default()
    }

    fn hashed() -> NamespacePolicy {
        NamespacePolicy::Hashed {
            prefix: "org-".to_string(),
        }
    }

    #[test]
    fn plain_key_matches_historical_shape() {
        let key = TenantKey::derive("Acme Corp", &plain()).unwrap();
        assert_eq!(key.as_str(), "org-acme-corp");
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = TenantKey::derive("Blue  Sky Ltd.", &plain()).unwrap();
        let b = TenantKey::derive("Blue  Sky Ltd.", &plain()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "org-blue--sky-ltd");
    }

    #[test]
    fn stripped_characters_collide_under_plain_policy() {
        let a = TenantKey::derive("Acme!", &plain()).unwrap();
        let b = TenantKey::derive("Acme", &plain()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn hashed_policy_separates_colliding_names() {
        let a = TenantKey::derive("Acme!", &hashed()).unwrap();
        let b = TenantKey::derive("Acme", &hashed()).unwrap();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("org-acme-"));
        assert_eq!(a.as_str().len(), "org-acme-".len() + HASH_SUFFIX_LEN);
    }

    #[test]
    fn hashed_policy_ignores_case_and_outer_whitespace() {
        let a = TenantKey::derive("  ACME ", &hashed()).unwrap();
        let b = TenantKey::derive("acme", &hashed()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_after_sanitizing_is_rejected() {
        assert!(matches!(
            TenantKey::derive("!!!", &plain()),
            Err(TenantKeyError::Empty(_))
        ));
        assert!(TenantKey::derive("   ", &plain()).is_err());
    }

    #[test]
    fn long_names_fit_a_dns_label() {
        let long = "x".repeat(200);
        let key = TenantKey::derive(&long, &plain()).unwrap();
        assert_eq!(key.as_str().len(), MAX_NAMESPACE_LEN);

        let key = TenantKey::derive(&long, &hashed()).unwrap();
        assert_eq!(key.as_str().len(), MAX_NAMESPACE_LEN);
    }

    #[test]
    fn sanitize_drops_non_ascii_and_trailing_hyphens() {
        assert_eq!(sanitize("Café Crème"), "caf-crme");
        assert_eq!(sanitize("-Foo--Bar-"), "-foo--bar");
        assert_eq!(sanitize("Tab\tSeparated"), "tab-separated");
        assert_eq!(sanitize("Acme !"), "acme");
    }

    #[test]
    fn plain_key_keeps_hyphen_runs() {
        let key = TenantKey::derive("Blue  Sky", &plain()).unwrap();
        assert_eq!(key.as_str(), "org-blue--sky");
        assert_ne!(key, TenantKey::derive("Blue Sky", &plain()).unwrap());
    }
}
