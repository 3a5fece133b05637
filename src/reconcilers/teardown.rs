// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Teardown of a terminating `ManagedCluster`.
//!
//! Other controllers' works go first, so add-ons are removed while the agent that
//! removes them is still installed. The core distribution (the agent itself) goes last.
//! Only then is the finalizer released.
//!
//! When the cluster is reachable, teardown waits for the agent to acknowledge each
//! deletion. When it is not, nothing would ever acknowledge them, so the remaining
//! objects are evicted: their finalizers are cleared and the API server drops them.

use kube::{Resource, ResourceExt};
use std::time::Duration;
use tracing::{debug, info};

use super::distribution::{
    crds_work_name, find_provisioning_record, manifests_work_name, sync_set_name,
};
use super::finalizers::{evict, strip_finalizers};
use super::managedcluster::ReconcileOutcome;
use crate::constants::{
    FINALIZER_RELEASED_REQUEUE_SECS, OTHER_FINALIZERS_REQUEUE_SECS, WAIT_REQUEUE_SECS,
};
use crate::crd::{ManagedCluster, ManifestWork, SelectorSyncSet};
use crate::errors::ImportError;
use crate::labels::{FINALIZER_IMPORT_CLEANUP, FINALIZER_REGISTRATION_CLEANUP};
use crate::store::{list_typed, ObjectKey, ResourceStore};

/// Finalizers this controller releases together.
const OWNED_FINALIZERS: [&str; 2] = [FINALIZER_IMPORT_CLEANUP, FINALIZER_REGISTRATION_CLEANUP];

/// Advance teardown of a terminating cluster by one step.
///
/// # Errors
///
/// Returns any store error; the pass is retried.
pub async fn tear_down(
    store: &dyn ResourceStore,
    cluster: &ManagedCluster,
) -> Result<ReconcileOutcome, ImportError> {
    let name = cluster.name_any();

    let foreign: Vec<&String> = cluster
        .finalizers()
        .iter()
        .filter(|f| !OWNED_FINALIZERS.contains(&f.as_str()))
        .collect();
    if !foreign.is_empty() {
        info!(cluster = %name, finalizers = ?foreign, "Waiting for other finalizers");
        return Ok(ReconcileOutcome::RequeueAfter(Duration::from_secs(
            OTHER_FINALIZERS_REQUEUE_SECS,
        )));
    }

    let reachable = cluster.is_available();
    let wait = ReconcileOutcome::RequeueAfter(Duration::from_secs(WAIT_REQUEUE_SECS));

    let core_works = [crds_work_name(&name), manifests_work_name(&name)];
    let other_works: Vec<ObjectKey> = list_typed::<ManifestWork>(store, Some(name.as_str()))
        .await?
        .iter()
        .map(ResourceExt::name_any)
        .filter(|work| !core_works.contains(work))
        .map(|work| ObjectKey::of::<ManifestWork>(Some(name.as_str()), work))
        .collect();
    if !remove_all(store, &other_works, reachable).await? {
        info!(cluster = %name, remaining = other_works.len(), "Waiting for add-on works to be removed");
        return Ok(wait);
    }

    let core: Vec<ObjectKey> = if find_provisioning_record(store, &name).await?.is_some() {
        vec![ObjectKey::of::<SelectorSyncSet>(None, sync_set_name(&name))]
    } else {
        core_works
            .iter()
            .map(|work| ObjectKey::of::<ManifestWork>(Some(name.as_str()), work.as_str()))
            .collect()
    };
    if !remove_all(store, &core, reachable).await? {
        info!(cluster = %name, "Waiting for the agent to be removed");
        return Ok(wait);
    }

    strip_finalizers(
        store,
        &ObjectKey::of::<ManagedCluster>(None, name.as_str()),
        &OWNED_FINALIZERS,
    )
    .await?;
    info!(cluster = %name, kind = %ManagedCluster::kind(&()), "Teardown complete, finalizer released");

    Ok(ReconcileOutcome::RequeueAfter(Duration::from_secs(
        FINALIZER_RELEASED_REQUEUE_SECS,
    )))
}

/// Request deletion of every key, then confirm they are gone.
///
/// Reachable: returns `false` while any object remains. Unreachable: evicts what remains
/// and returns `true`.
async fn remove_all(
    store: &dyn ResourceStore,
    keys: &[ObjectKey],
    reachable: bool,
) -> Result<bool, ImportError> {
    for key in keys {
        if let Some(obj) = store.get(key).await? {
            if obj.metadata.deletion_timestamp.is_none() {
                debug!(object = %key, "Deleting");
                store.delete(key).await?;
            }
        }
    }

    if !reachable {
        for key in keys {
            evict(store, key).await?;
        }
        return Ok(true);
    }

    for key in keys {
        if store.get(key).await?.is_some() {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
#[path = "teardown_tests.rs"]
mod teardown_tests;
