//! Label keys stamped on every managed resource.

use std::collections::BTreeMap;

/// Label map attached to platform resources. Ordered so selectors and
/// manifests render deterministically.
pub type Labels = BTreeMap<String, String>;

pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "shield";

/// Canonical workload name; also the instance selector.
pub const WORKLOAD: &str = "shield.io/workload";
pub const SERVICE_TYPE: &str = "shield.io/service-type";
pub const OWNER: &str = "shield.io/owner";
/// Group identifier shared by members of a composite bundle.
pub const GROUP: &str = "shield.io/group";
/// Role of a member inside its group ("app", "database").
pub const ROLE: &str = "shield.io/role";
/// Marks namespaces created for tenants.
pub const TENANT: &str = "shield.io/tenant";
pub const COMPANY: &str = "shield.io/company";
/// `backup` or `restore` on one-shot backup jobs.
pub const BACKUP: &str = "shield.io/backup";
/// Canonical name of the workload a backup job belongs to. Jobs do not
/// carry [`WORKLOAD`], so their pods never count as workload instances.
pub const BACKUP_TARGET: &str = "shield.io/backup-target";

/// Selector matching everything this control plane manages.
pub fn managed() -> Labels {
    Labels::from([(MANAGED_BY.to_string(), MANAGED_BY_VALUE.to_string())])
}

/// Selector matching one workload and its instances.
pub fn for_workload(canonical: &str) -> Labels {
    let mut labels = managed();
    labels.insert(WORKLOAD.to_string(), canonical.to_string());
    labels
}

/// Selector matching every member of a group.
pub fn for_group(group_id: &str) -> Labels {
    let mut labels = managed();
    labels.insert(GROUP.to_string(), group_id.to_string());
    labels
}

/// Selector matching the backup and restore jobs of one workload.
pub fn for_backup_target(canonical: &str) -> Labels {
    let mut labels = managed();
    labels.insert(BACKUP_TARGET.to_string(), canonical.to_string());
    labels
}

/// Longest label value the platform accepts.
pub const MAX_VALUE_LEN: usize = 63;

/// Coerce arbitrary text (an email, a company name) into a valid label
/// value: `[A-Za-z0-9._-]`, alphanumeric at both ends, at most 63 chars.
pub fn label_value(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .take(MAX_VALUE_LEN)
        .collect();
    mapped
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string()
}

/// Render an equality selector as `k=v,k2=v2`.
pub fn selector_string(selector: &Labels) -> String {
    selector
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// True when every selector pair is present in `labels`.
pub fn matches(labels: &Labels, selector: &Labels) -> bool {
    selector
        .iter()
        .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_renders_sorted_pairs() {
        let selector = for_group("g-1");
        assert_eq!(
            selector_string(&selector),
            "app.kubernetes.io/managed-by=shield,shield.io/group=g-1"
        );
    }

    #[test]
    fn matching_requires_every_pair() {
        let mut labels = for_workload("nginx-1");
        labels.insert(GROUP.to_string(), "g".to_string());

        assert!(matches(&labels, &for_workload("nginx-1")));
        assert!(matches(&labels, &for_group("g")));
        assert!(!matches(&labels, &for_group("other")));
        assert!(matches(&labels, &Labels::new()));
    }

    #[test]
    fn backup_jobs_stay_out_of_workload_selection() {
        let jobs = for_backup_target("postgres-1");
        assert!(!matches(&jobs, &for_workload("postgres-1")));
        assert!(matches(&jobs, &managed()));
    }

    #[test]
    fn label_values_are_coerced() {
        assert_eq!(label_value("ops@acme.io"), "ops-acme.io");
        assert_eq!(label_value("  Acme Corp! "), "Acme-Corp");
        assert_eq!(label_value(&"x".repeat(80)).len(), MAX_VALUE_LEN);
        assert_eq!(label_value("@@"), "");
    }
}
