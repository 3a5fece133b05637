// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) watched and written by the import controller.
//!
//! None of these kinds are owned by this crate: they are installed by the cluster
//! registration, work, Hive, and agent operator projects. Only the fields the import
//! controller reads or writes are modelled; everything else round-trips through the
//! dynamic store untouched.
//!
//! # Resource Types
//!
//! - [`ManagedCluster`] - A remote cluster registered with the hub (cluster-scoped)
//! - [`ManifestWork`] - Desired state pulled and applied by the agent on a managed cluster
//! - [`ClusterDeployment`] - Hive record of a cluster provisioned by the hub
//! - [`SelectorSyncSet`] - Hive desired state delivered to matching cluster deployments
//! - [`Klusterlet`] - Agent operator configuration installed on the managed cluster
//!
//! # Example: Checking Availability
//!
//! ```rust,no_run
//! use clusterimport::crd::{ManagedCluster, ManagedClusterSpec};
//!
//! let cluster = ManagedCluster::new("c1", ManagedClusterSpec::default());
//! assert!(!cluster.is_available());
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{CONDITION_AVAILABLE, CONDITION_STATUS_TRUE};
use crate::labels::{AUTO_IMPORT_RETRY_LABEL, SELF_MANAGED_LABEL};

/// Condition represents an observation of a resource's current state.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, e.g. `ManagedClusterConditionAvailable`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Label selector restricted to `matchLabels`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Map of {key,value} pairs. All pairs must match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<BTreeMap<String, String>>,
}

/// Reference to a secret in the same namespace as the referencing object.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct LocalSecretReference {
    pub name: String,
}

// ============================================================================
// ManagedCluster
// ============================================================================

/// `ManagedCluster` spec. The import controller only reads metadata and status.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.open-cluster-management.io",
    version = "v1",
    kind = "ManagedCluster",
    doc = "ManagedCluster represents a remote cluster registered with the hub."
)]
#[kube(status = "ManagedClusterStatus")]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterSpec {
    /// Whether the hub accepts the registration agent's client certificate requests.
    #[serde(default)]
    pub hub_accepts_client: bool,

    /// Lease duration in seconds the registration agent uses to report liveness.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_duration_seconds: Option<i32>,
}

/// `ManagedCluster` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
pub struct ManagedClusterStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Reachability of a managed cluster, derived from its availability condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Availability {
    /// Condition status `True`: the agent is reporting and can acknowledge work.
    Available,
    /// Condition status `False`.
    Unavailable,
    /// Condition missing or status `Unknown`.
    Unknown,
}

impl ManagedCluster {
    #[must_use]
    pub fn availability(&self) -> Availability {
        let condition = self
            .status
            .as_ref()
            .and_then(|s| s.conditions.iter().find(|c| c.r#type == CONDITION_AVAILABLE));

        match condition.map(|c| c.status.as_str()) {
            Some(CONDITION_STATUS_TRUE) => Availability::Available,
            Some("False") => Availability::Unavailable,
            _ => Availability::Unknown,
        }
    }

    /// True only when the availability condition is `True`. False and Unknown both
    /// count as offline.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.availability() == Availability::Available
    }

    /// True when the `self-managed` label parses as boolean `true`.
    ///
    /// Unparseable values are treated as `false`.
    #[must_use]
    pub fn is_self_managed(&self) -> bool {
        self.metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(SELF_MANAGED_LABEL))
            .and_then(|v| v.trim().to_ascii_lowercase().parse::<bool>().ok())
            .unwrap_or(false)
    }

    /// The `auto-import-retry` counter, when present and a non-negative integer.
    #[must_use]
    pub fn auto_import_retry(&self) -> Option<u32> {
        self.metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(AUTO_IMPORT_RETRY_LABEL))
            .and_then(|v| v.trim().parse::<u32>().ok())
    }
}

// ============================================================================
// ManifestWork
// ============================================================================

/// `ManifestWork` spec: the manifests the agent applies on the managed cluster.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[kube(
    group = "work.open-cluster-management.io",
    version = "v1",
    kind = "ManifestWork",
    namespaced,
    doc = "ManifestWork carries resources for the work agent on a managed cluster to apply."
)]
#[serde(rename_all = "camelCase")]
pub struct ManifestWorkSpec {
    #[serde(default)]
    pub workload: ManifestsTemplate,
}

/// Resources carried by a `ManifestWork`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ManifestsTemplate {
    #[serde(default)]
    pub manifests: Vec<serde_json::Value>,
}

// ============================================================================
// Hive
// ============================================================================

/// `ClusterDeployment` spec, the fields relevant to import.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "hive.openshift.io",
    version = "v1",
    kind = "ClusterDeployment",
    namespaced,
    doc = "ClusterDeployment records a cluster provisioned by hub-managed infrastructure."
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDeploymentSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,

    /// Set by Hive once the cluster install completed.
    #[serde(default)]
    pub installed: bool,

    /// Populated once the install produced an admin kubeconfig.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_metadata: Option<ClusterMetadata>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMetadata {
    /// Secret holding the admin kubeconfig under the `kubeconfig` key.
    pub admin_kubeconfig_secret_ref: LocalSecretReference,
}

/// `SelectorSyncSet` spec: resources Hive syncs to every matching cluster deployment.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[kube(
    group = "hive.openshift.io",
    version = "v1",
    kind = "SelectorSyncSet",
    doc = "SelectorSyncSet delivers resources to cluster deployments matched by label."
)]
#[serde(rename_all = "camelCase")]
pub struct SelectorSyncSetSpec {
    #[serde(default)]
    pub cluster_deployment_selector: LabelSelector,

    #[serde(default)]
    pub resources: Vec<serde_json::Value>,

    /// `Sync` removes resources from the target when they leave the set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_apply_mode: Option<String>,
}

// ============================================================================
// Klusterlet
// ============================================================================

/// `Klusterlet` spec, rendered into the import bundle for the managed cluster.
///
/// Its generated CRD is the bundle's only definition.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "operator.open-cluster-management.io",
    version = "v1",
    kind = "Klusterlet",
    doc = "Klusterlet configures the registration and work agents on a managed cluster."
)]
#[serde(rename_all = "camelCase")]
pub struct KlusterletSpec {
    /// Name the managed cluster registers with on the hub.
    pub cluster_name: String,

    /// Namespace the agents run in.
    pub namespace: String,

    pub registration_image_pull_spec: String,

    pub work_image_pull_spec: String,

    /// Hub API server URLs the agents may reach.
    #[serde(
        rename = "externalServerURLs",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub external_server_urls: Vec<ServerUrl>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ServerUrl {
    pub url: String,
}
