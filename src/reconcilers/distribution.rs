// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Delivering the import bundle to a managed cluster.
//!
//! Two channels exist, and at most one is used per pass:
//!
//! - **SelectorSyncSet**: for clusters provisioned by the hub (a `ClusterDeployment`
//!   exists). Hive pushes the resources as soon as the cluster is installed.
//! - **ManifestWorks**: for clusters whose agent is already reporting. The work agent
//!   pulls `<cluster>-klusterlet-crds` and `<cluster>-klusterlet` and keeps the agent
//!   itself up to date.

use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::debug;

use super::resources::{cluster_labels, owner_reference, upsert, UpsertOutcome};
use crate::bundle::ImportBundle;
use crate::constants::{CRDS_WORK_SUFFIX, MANIFESTS_WORK_SUFFIX, SYNC_SET_SUFFIX};
use crate::crd::{
    ClusterDeployment, LabelSelector, ManagedCluster, ManifestWork, ManifestWorkSpec,
    ManifestsTemplate, SelectorSyncSet, SelectorSyncSetSpec,
};
use crate::errors::ImportError;
use crate::labels::SYNC_SET_SELECTOR_LABEL;
use crate::store::{get_typed, to_dynamic, ResourceStore};

/// `SelectorSyncSet` apply mode that also removes resources dropped from the set.
const RESOURCE_APPLY_MODE_SYNC: &str = "Sync";

/// Which channel carries the bundle this pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Distribution {
    SyncSet,
    ManifestWorks,
    None,
}

/// Pick the distribution channel.
///
/// A provisioning record always wins. Otherwise works are only written for an available
/// cluster that is not the hub itself.
#[must_use]
pub const fn select_distribution(has_record: bool, available: bool, self_managed: bool) -> Distribution {
    match (has_record, available, self_managed) {
        (true, _, _) => Distribution::SyncSet,
        (false, true, false) => Distribution::ManifestWorks,
        _ => Distribution::None,
    }
}

#[must_use]
pub fn crds_work_name(cluster_name: &str) -> String {
    format!("{cluster_name}{CRDS_WORK_SUFFIX}")
}

#[must_use]
pub fn manifests_work_name(cluster_name: &str) -> String {
    format!("{cluster_name}{MANIFESTS_WORK_SUFFIX}")
}

#[must_use]
pub fn sync_set_name(cluster_name: &str) -> String {
    format!("{cluster_name}{SYNC_SET_SUFFIX}")
}

/// The `ClusterDeployment` recording that the hub provisioned this cluster, if any.
///
/// # Errors
///
/// Propagates store errors.
pub async fn find_provisioning_record(
    store: &dyn ResourceStore,
    cluster_name: &str,
) -> Result<Option<ClusterDeployment>, ImportError> {
    get_typed::<ClusterDeployment>(store, Some(cluster_name), cluster_name).await
}

/// Upsert the two core `ManifestWork`s: definitions first, then manifests.
///
/// # Errors
///
/// Returns the first store error.
pub async fn ensure_distribution_work(
    store: &dyn ResourceStore,
    cluster: &ManagedCluster,
    bundle: &ImportBundle,
) -> Result<Vec<UpsertOutcome>, ImportError> {
    let cluster_name = cluster.name_any();
    let owner = owner_reference(cluster)?;

    let mut outcomes = Vec::with_capacity(2);
    for (name, manifests) in [
        (crds_work_name(&cluster_name), &bundle.definitions),
        (manifests_work_name(&cluster_name), &bundle.manifests),
    ] {
        let work = ManifestWork {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(cluster_name.clone()),
                labels: Some(cluster_labels(&cluster_name)),
                owner_references: Some(vec![owner.clone()]),
                ..Default::default()
            },
            spec: ManifestWorkSpec {
                workload: ManifestsTemplate {
                    manifests: manifests.clone(),
                },
            },
        };
        let (_, outcome) = upsert(store, to_dynamic(&work)?).await?;
        debug!(cluster = %cluster_name, work = %name, outcome = ?outcome, "Manifest work ensured");
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Upsert the `SelectorSyncSet` targeting this cluster's deployment.
///
/// # Errors
///
/// Returns any store error.
pub async fn ensure_selector_distribution(
    store: &dyn ResourceStore,
    cluster: &ManagedCluster,
    bundle: &ImportBundle,
) -> Result<UpsertOutcome, ImportError> {
    let cluster_name = cluster.name_any();
    let name = sync_set_name(&cluster_name);

    let sync_set = SelectorSyncSet {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            labels: Some(cluster_labels(&cluster_name)),
            owner_references: Some(vec![owner_reference(cluster)?]),
            ..Default::default()
        },
        spec: SelectorSyncSetSpec {
            cluster_deployment_selector: LabelSelector {
                match_labels: Some(BTreeMap::from([(
                    SYNC_SET_SELECTOR_LABEL.to_string(),
                    cluster_name.clone(),
                )])),
            },
            resources: bundle
                .definitions
                .iter()
                .chain(&bundle.manifests)
                .cloned()
                .collect(),
            resource_apply_mode: Some(RESOURCE_APPLY_MODE_SYNC.to_string()),
        },
    };

    let (_, outcome) = upsert(store, to_dynamic(&sync_set)?).await?;
    debug!(cluster = %cluster_name, sync_set = %name, outcome = ?outcome, "Selector sync set ensured");
    Ok(outcome)
}

/// Run the selected distribution channel.
///
/// # Errors
///
/// Returns the first store error.
pub async fn distribute(
    store: &dyn ResourceStore,
    cluster: &ManagedCluster,
    bundle: &ImportBundle,
    has_record: bool,
) -> Result<Distribution, ImportError> {
    let channel = select_distribution(has_record, cluster.is_available(), cluster.is_self_managed());
    match channel {
        Distribution::SyncSet => {
            ensure_selector_distribution(store, cluster, bundle).await?;
        }
        Distribution::ManifestWorks => {
            ensure_distribution_work(store, cluster, bundle).await?;
        }
        Distribution::None => {
            debug!(
                cluster = %cluster.name_any(),
                availability = ?cluster.availability(),
                self_managed = cluster.is_self_managed(),
                "No distribution channel this pass"
            );
        }
    }
    Ok(channel)
}

#[cfg(test)]
#[path = "distribution_tests.rs"]
mod distribution_tests;
