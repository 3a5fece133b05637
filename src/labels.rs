// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label, annotation, and finalizer constants.
//!
//! Labels the controller reads from `ManagedCluster` objects, and the labels it stamps
//! on everything it writes so that watch events can be mapped back to their cluster.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value for `app.kubernetes.io/managed-by` on objects written by this controller
pub const MANAGED_BY_IMPORT_CONTROLLER: &str = "managedcluster-import-controller";

// ============================================================================
// ManagedCluster Labels
// ============================================================================

/// Set to `true` when the hub manages itself and the bundle is applied locally
pub const SELF_MANAGED_LABEL: &str = "self-managed";

/// Non-negative integer enabling auto-import through a supplied kubeconfig
pub const AUTO_IMPORT_RETRY_LABEL: &str = "auto-import-retry";

// ============================================================================
// Controller-Stamped Labels
// ============================================================================

/// Name of the managed cluster an object was written for
pub const CLUSTER_NAME_LABEL: &str = "import.open-cluster-management.io/cluster-name";

/// Marks a namespace as belonging to a managed cluster
pub const MANAGED_CLUSTER_NAMESPACE_LABEL: &str = "cluster.open-cluster-management.io/managedCluster";

/// Label matched by the `SelectorSyncSet` cluster deployment selector
pub const SYNC_SET_SELECTOR_LABEL: &str = "open-cluster-management.io/cluster-name";

// ============================================================================
// Annotations
// ============================================================================

/// Binds a token secret to its service account
pub const SERVICE_ACCOUNT_NAME_ANNOTATION: &str = "kubernetes.io/service-account.name";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer held by this controller on `ManagedCluster` resources
pub const FINALIZER_IMPORT_CLEANUP: &str =
    "managedcluster-import-controller.open-cluster-management.io/cleanup";

/// Finalizer held by the registration controller, released together with ours
pub const FINALIZER_REGISTRATION_CLEANUP: &str =
    "cluster.open-cluster-management.io/api-resource-cleanup";
