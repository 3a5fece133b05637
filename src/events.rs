// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Mapping watch events back to the managed cluster they belong to.
//!
//! The controller watches `ManagedCluster` plus every kind it writes. A change to any
//! child object must trigger a pass for its owning cluster. Ownership is resolved from
//! what the event itself carries, never by walking owner references:
//!
//! 1. the `import.open-cluster-management.io/cluster-name` label, stamped on everything
//!    the controller writes
//! 2. the namespace, for namespaced kinds (each cluster has a namespace named after it)
//!
//! Cluster-scoped children without the label have no owner and are ignored.

use kube::{Resource, ResourceExt};
use std::collections::{BTreeMap, HashMap};

use crate::labels::CLUSTER_NAME_LABEL;

/// Every kind the controller watches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchedKind {
    ManagedCluster,
    ManifestWork,
    SelectorSyncSet,
    ClusterDeployment,
    ServiceAccount,
    Secret,
    ClusterRole,
    ClusterRoleBinding,
}

impl WatchedKind {
    /// Whether objects of this kind live in a namespace.
    #[must_use]
    pub const fn is_namespaced(self) -> bool {
        matches!(
            self,
            Self::ManifestWork | Self::ClusterDeployment | Self::ServiceAccount | Self::Secret
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Applied,
    Deleted,
}

/// The parts of a watch event needed to route it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchedKind,
    pub change: ChangeKind,
    pub name: String,
    pub namespace: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl WatchEvent {
    pub fn new<K: Resource>(kind: WatchedKind, change: ChangeKind, obj: &K) -> Self {
        Self {
            kind,
            change,
            name: obj.name_any(),
            namespace: obj.namespace(),
            labels: obj.labels().clone(),
        }
    }

    pub fn applied<K: Resource>(kind: WatchedKind, obj: &K) -> Self {
        Self::new(kind, ChangeKind::Applied, obj)
    }
}

/// What a watch event asks the controller to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Run a normal pass for the named cluster.
    Reconcile(String),
    /// The named cluster is gone; clean up what it left behind.
    Absent(String),
    Ignore,
}

/// Resolve the cluster an event belongs to.
#[must_use]
pub fn owning_cluster(event: &WatchEvent) -> Option<String> {
    if event.kind == WatchedKind::ManagedCluster {
        return Some(event.name.clone());
    }

    if let Some(cluster) = event.labels.get(CLUSTER_NAME_LABEL) {
        if !cluster.is_empty() {
            return Some(cluster.clone());
        }
    }

    if event.kind.is_namespaced() {
        return event.namespace.clone().filter(|ns| !ns.is_empty());
    }

    None
}

/// Route a watch event.
#[must_use]
pub fn dispatch(event: &WatchEvent) -> Dispatch {
    match (event.kind, event.change) {
        (WatchedKind::ManagedCluster, ChangeKind::Deleted) => Dispatch::Absent(event.name.clone()),
        _ => owning_cluster(event).map_or(Dispatch::Ignore, Dispatch::Reconcile),
    }
}

/// Drops watch events that only touch an object's status.
///
/// An applied object passes when it is new, its generation moved, or it was marked
/// for deletion. Deletions always pass. Work agents report status on every sync, and
/// none of it changes what a pass would do.
///
/// Objects are tracked by UID, so a work recreated under the same name passes even
/// when its deletion was never observed. Call [`SpecChangeFilter::reset`] when the
/// watch relists; entries for objects deleted while disconnected go with it.
#[derive(Debug, Default)]
pub struct SpecChangeFilter {
    seen: HashMap<SeenKey, (Option<i64>, bool)>,
}

/// Namespace, name and UID of a tracked object.
type SeenKey = (Option<String>, String, Option<String>);

impl SpecChangeFilter {
    pub fn admit<K: Resource>(&mut self, change: ChangeKind, obj: &K) -> bool {
        let key = (obj.namespace(), obj.name_any(), obj.uid());
        match change {
            ChangeKind::Deleted => {
                self.seen.remove(&key);
                true
            }
            ChangeKind::Applied => {
                let meta = obj.meta();
                let state = (meta.generation, meta.deletion_timestamp.is_some());
                self.seen.insert(key, state) != Some(state)
            }
        }
    }

    /// Forget everything seen so far. The relist that follows re-admits every object.
    pub fn reset(&mut self) {
        self.seen.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
