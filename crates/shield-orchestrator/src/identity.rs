//! Identity resolution and secondary-resource naming.
//!
//! The platform names instances `<canonical>-<template hash>-<suffix>`,
//! and canonical names themselves contain dashes (`nginx-4821`), so the
//! canonical name cannot be recovered by splitting at a fixed position.
//! The resolver tries dash-joined prefixes against the workloads that
//! actually exist. This module is the only place that strips suffixes
//! and the only place that knows the naming templates.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use shield_core::labels;
use shield_core::{BackupAction, TenantKey};
use shield_platform::{Platform, Workload};

use crate::error::{OrchestratorError, OrchestratorResult};

/// Names with fewer segments are never split.
const MIN_SPLIT_SEGMENTS: usize = 3;

/// Resources owned by one workload, each named from its canonical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryKind {
    Exposure,
    Route,
    Claim,
    Autoscaler,
    BackupSchedule,
    BackupClaim,
}

impl SecondaryKind {
    pub const ALL: [SecondaryKind; 6] = [
        Self::Exposure,
        Self::Route,
        Self::Claim,
        Self::Autoscaler,
        Self::BackupSchedule,
        Self::BackupClaim,
    ];

    fn suffix(self) -> &'static str {
        match self {
            Self::Exposure => "svc",
            Self::Route => "ingress",
            Self::Claim => "data",
            Self::Autoscaler => "hpa",
            Self::BackupSchedule => "backup-schedule",
            Self::BackupClaim => "backups",
        }
    }
}

/// Name of the `kind` resource belonging to workload `canonical`.
pub fn secondary_name(canonical: &str, kind: SecondaryKind) -> String {
    format!("{canonical}-{}", kind.suffix())
}

/// Name of a one-shot backup or restore job started at `at`.
pub fn job_name(canonical: &str, action: BackupAction, at: DateTime<Utc>) -> String {
    format!("{canonical}-{}-{}", action.as_str(), at.format("%Y%m%d-%H%M%S"))
}

/// Canonical-name candidates for an instance name, most specific first.
///
/// The whole name comes first so an exact canonical name always wins.
/// Names with three or more segments are then tried as dash-joined
/// prefixes from longest to shortest.
pub fn candidates(instance_name: &str) -> Vec<String> {
    let mut out = vec![instance_name.to_string()];
    let segments: Vec<&str> = instance_name.split('-').collect();
    if segments.len() >= MIN_SPLIT_SEGMENTS {
        for len in (1..segments.len()).rev() {
            let prefix = segments[..len].join("-");
            if !prefix.is_empty() && !out.contains(&prefix) {
                out.push(prefix);
            }
        }
    }
    out
}

/// First candidate of `instance_name` present in `known`.
pub fn owner_of<'a>(instance_name: &str, known: &'a BTreeSet<String>) -> Option<&'a String> {
    candidates(instance_name)
        .into_iter()
        .find_map(|candidate| known.get(&candidate))
}

/// Maps caller-visible names back to workloads.
#[derive(Clone)]
pub struct Resolver {
    platform: Arc<dyn Platform>,
}

impl Resolver {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }

    /// Resolve an instance (or canonical) name to its workload.
    pub async fn resolve_workload(
        &self,
        tenant: &TenantKey,
        instance_name: &str,
    ) -> OrchestratorResult<Workload> {
        let workloads = self
            .platform
            .list_workloads(tenant.as_str(), &labels::managed())
            .await?;
        let known: BTreeSet<String> = workloads.iter().map(|w| w.name.clone()).collect();

        let Some(canonical) = owner_of(instance_name, &known) else {
            return Err(OrchestratorError::NotFound(format!(
                "workload for {instance_name} in {tenant}"
            )));
        };
        debug!(%tenant, %instance_name, %canonical, "instance resolved");
        workloads
            .into_iter()
            .find(|w| &w.name == canonical)
            .ok_or_else(|| OrchestratorError::NotFound(canonical.clone()))
    }
}
