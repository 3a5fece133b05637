// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `ManagedCluster` lifecycle reconciliation.
//!
//! One pass looks at the cluster's current state and runs exactly one path:
//!
//! - **Absent**: the cluster is gone; remove the namespace it left behind.
//! - **Active**: ensure the finalizer, hub RBAC, bootstrap identity, import bundle, and
//!   import secret, then deliver the bundle through whichever channel applies.
//! - **Terminating**: hand over to [`teardown::tear_down`](super::teardown::tear_down).
//!
//! Every step re-reads what it needs from the store and writes through idempotent
//! upserts, so a pass over unchanged state performs no writes.

use k8s_openapi::api::core::v1::Namespace;
use kube::ResourceExt;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::credentials::ensure_bootstrap_identity;
use super::direct_apply::{apply_self_managed, auto_import};
use super::distribution::{distribute, find_provisioning_record};
use super::finalizers::ensure_finalizer;
use super::import_secret::ensure_import_secret;
use super::resources::{apply_all, owner_reference, stamp};
use super::teardown::tear_down;
use crate::bundle::{self, BundleInput};
use crate::constants::{DIRECT_APPLY_RETRY_SECS, WAIT_REQUEUE_SECS};
use crate::context::Context;
use crate::crd::ManagedCluster;
use crate::errors::ImportError;
use crate::labels::{FINALIZER_IMPORT_CLEANUP, MANAGED_CLUSTER_NAMESPACE_LABEL};
use crate::store::{get_typed, ObjectKey, ResourceStore};

/// Result of a successful pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing left to do until the next watch event.
    Done,
    /// Run again after the given delay.
    RequeueAfter(Duration),
}

/// The step of a pass that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Fetch,
    Finalizer,
    HubManifests,
    BootstrapIdentity,
    GenerateBundle,
    ImportSecret,
    Distribution,
    SelfManagedApply,
    AutoImport,
    Teardown,
}

impl Step {
    /// Steps that write straight to a cluster rather than to the hub's own records.
    #[must_use]
    pub const fn is_direct_apply(self) -> bool {
        matches!(self, Self::SelfManagedApply | Self::AutoImport)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetch => "fetch",
            Self::Finalizer => "finalizer",
            Self::HubManifests => "hub-manifests",
            Self::BootstrapIdentity => "bootstrap-identity",
            Self::GenerateBundle => "generate-bundle",
            Self::ImportSecret => "import-secret",
            Self::Distribution => "distribution",
            Self::SelfManagedApply => "self-managed-apply",
            Self::AutoImport => "auto-import",
            Self::Teardown => "teardown",
        };
        f.write_str(name)
    }
}

/// A failed pass: the step, the underlying error, and when to try again.
#[derive(Error, Debug)]
#[error("{step} failed for managed cluster {cluster}: {source}")]
pub struct ReconcileError {
    pub cluster: String,
    pub step: Step,
    pub source: ImportError,
    pub retry_after: Duration,
}

impl ReconcileError {
    pub fn new(cluster: impl Into<String>, step: Step, source: ImportError) -> Self {
        let retry_after = if !source.is_conflict() && step.is_direct_apply() {
            Duration::from_secs(DIRECT_APPLY_RETRY_SECS)
        } else {
            source.retry_after()
        };
        Self {
            cluster: cluster.into(),
            step,
            source,
            retry_after,
        }
    }
}

/// Run one pass for the named cluster.
///
/// # Errors
///
/// Returns a [`ReconcileError`] naming the failed step; nothing after it ran.
pub async fn reconcile_managed_cluster(
    ctx: &Context,
    name: &str,
) -> Result<ReconcileOutcome, ReconcileError> {
    let store = ctx.store.as_ref();
    let fail = |step: Step| move |e: ImportError| ReconcileError::new(name, step, e);

    let Some(cluster) = get_typed::<ManagedCluster>(store, None, name)
        .await
        .map_err(fail(Step::Fetch))?
    else {
        return Ok(cleanup_absent(store, name).await);
    };

    if cluster.metadata.deletion_timestamp.is_some() {
        if !cluster.finalizers().iter().any(|f| f == FINALIZER_IMPORT_CLEANUP) {
            debug!(cluster = %name, "Terminating without our finalizer, nothing to do");
            return Ok(ReconcileOutcome::Done);
        }
        return tear_down(store, &cluster).await.map_err(fail(Step::Teardown));
    }

    reconcile_active(ctx, &cluster).await
}

async fn reconcile_active(
    ctx: &Context,
    cluster: &ManagedCluster,
) -> Result<ReconcileOutcome, ReconcileError> {
    let store = ctx.store.as_ref();
    let name = cluster.name_any();
    let fail = |step: Step| {
        let name = name.clone();
        move |e: ImportError| ReconcileError::new(name, step, e)
    };

    ensure_finalizer(
        store,
        &ObjectKey::of::<ManagedCluster>(None, name.as_str()),
        FINALIZER_IMPORT_CLEANUP,
    )
    .await
    .map_err(fail(Step::Finalizer))?;

    ensure_hub_manifests(store, cluster)
        .await
        .map_err(fail(Step::HubManifests))?;

    let identity = ensure_bootstrap_identity(store, cluster)
        .await
        .map_err(fail(Step::BootstrapIdentity))?;

    let bundle = bundle::generate(
        &BundleInput {
            cluster_name: &name,
            token: identity.token(),
            ca_cert: identity.ca_cert(),
            config: &ctx.config,
        },
        &[],
    )
    .map_err(fail(Step::GenerateBundle))?;

    ensure_import_secret(store, cluster, &bundle)
        .await
        .map_err(fail(Step::ImportSecret))?;

    let record = find_provisioning_record(store, &name)
        .await
        .map_err(fail(Step::Distribution))?;
    if record.as_ref().is_some_and(|r| !r.spec.installed) {
        info!(cluster = %name, "Cluster deployment not installed yet, waiting");
        return Ok(ReconcileOutcome::RequeueAfter(Duration::from_secs(
            WAIT_REQUEUE_SECS,
        )));
    }

    let channel = distribute(store, cluster, &bundle, record.is_some())
        .await
        .map_err(fail(Step::Distribution))?;
    debug!(cluster = %name, channel = ?channel, "Distribution done");

    if cluster.is_self_managed() {
        apply_self_managed(store, &name)
            .await
            .map_err(fail(Step::SelfManagedApply))?;
    }

    if let Some(retry) = cluster.auto_import_retry() {
        debug!(cluster = %name, auto_import_retry = retry, "Auto-import requested");
        auto_import(ctx, cluster, &identity, record.as_ref())
            .await
            .map_err(fail(Step::AutoImport))?;
    }

    Ok(ReconcileOutcome::Done)
}

/// Namespace plus the bootstrap ClusterRole and ClusterRoleBinding on the hub.
async fn ensure_hub_manifests(
    store: &dyn ResourceStore,
    cluster: &ManagedCluster,
) -> Result<(), ImportError> {
    let name = cluster.name_any();
    let owner = owner_reference(cluster)?;

    let mut manifests = bundle::hub_manifests(&name)?;
    for manifest in &mut manifests {
        // the namespace outlives the cluster object until cleanup_absent removes it
        let owned = manifest.get("kind").and_then(|k| k.as_str()) != Some("Namespace");
        stamp(manifest, &name, owned.then_some(&owner))?;
    }
    apply_all(store, &manifests).await?;
    Ok(())
}

/// Run one pass for a cluster namespace, keyed by the namespace name.
///
/// A namespace whose cluster still exists is left to [`reconcile_managed_cluster`].
/// Otherwise the cluster is absent and its namespace is cleaned up.
///
/// # Errors
///
/// Returns a [`ReconcileError`] at [`Step::Fetch`] if the cluster cannot be read.
pub async fn reconcile_cluster_namespace(
    ctx: &Context,
    name: &str,
) -> Result<ReconcileOutcome, ReconcileError> {
    let store = ctx.store.as_ref();
    let cluster = get_typed::<ManagedCluster>(store, None, name)
        .await
        .map_err(|e| ReconcileError::new(name, Step::Fetch, e))?;

    if cluster.is_some() {
        debug!(cluster = %name, "Managed cluster exists, namespace is in use");
        return Ok(ReconcileOutcome::Done);
    }
    Ok(cleanup_absent(store, name).await)
}

/// Clean up after a cluster that no longer exists.
///
/// The namespace is removed only when it is ours (labelled), not already going away, and
/// no provisioning record remains in it. Failures requeue instead of erroring.
pub async fn cleanup_absent(store: &dyn ResourceStore, name: &str) -> ReconcileOutcome {
    let wait = ReconcileOutcome::RequeueAfter(Duration::from_secs(WAIT_REQUEUE_SECS));

    let namespace = match get_typed::<Namespace>(store, None, name).await {
        Ok(Some(ns)) => ns,
        Ok(None) => return ReconcileOutcome::Done,
        Err(e) => {
            warn!(cluster = %name, error = %e, "Failed to read cluster namespace");
            return wait;
        }
    };

    if namespace.metadata.deletion_timestamp.is_some() {
        debug!(cluster = %name, "Cluster namespace already terminating");
        return ReconcileOutcome::Done;
    }
    if !namespace.labels().contains_key(MANAGED_CLUSTER_NAMESPACE_LABEL) {
        debug!(cluster = %name, "Namespace not created for a managed cluster, leaving it");
        return ReconcileOutcome::Done;
    }

    match find_provisioning_record(store, name).await {
        Ok(None) => {}
        Ok(Some(_)) => {
            info!(cluster = %name, "Cluster deployment still present, keeping namespace");
            return wait;
        }
        Err(e) => {
            warn!(cluster = %name, error = %e, "Failed to look up cluster deployment");
            return wait;
        }
    }

    match store.delete(&ObjectKey::of::<Namespace>(None, name)).await {
        Ok(_) => {
            info!(cluster = %name, "Deleted namespace of removed managed cluster");
            ReconcileOutcome::Done
        }
        Err(e) => {
            warn!(cluster = %name, error = %e, "Failed to delete cluster namespace");
            wait
        }
    }
}

#[cfg(test)]
#[path = "managedcluster_tests.rs"]
mod managedcluster_tests;
