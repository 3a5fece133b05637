// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the cluster import controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// Availability condition type reported by the registration agent
pub const CONDITION_AVAILABLE: &str = "ManagedClusterConditionAvailable";

/// Condition status meaning the condition holds
pub const CONDITION_STATUS_TRUE: &str = "True";

// ============================================================================
// Object Naming
// ============================================================================

/// Suffix of the bootstrap `ServiceAccount` created in the cluster namespace
pub const BOOTSTRAP_SA_SUFFIX: &str = "-bootstrap-sa";

/// Suffix of the token `Secret` bound to the bootstrap `ServiceAccount`
pub const BOOTSTRAP_TOKEN_SUFFIX: &str = "-token";

/// Suffix of the import `Secret` holding the serialized bundle
pub const IMPORT_SECRET_SUFFIX: &str = "-import";

/// Suffix of the `ManifestWork` carrying the bundle definitions
pub const CRDS_WORK_SUFFIX: &str = "-klusterlet-crds";

/// Suffix of the `ManifestWork` carrying the bundle manifests
pub const MANIFESTS_WORK_SUFFIX: &str = "-klusterlet";

/// Suffix of the `SelectorSyncSet` used for hub-provisioned clusters
pub const SYNC_SET_SUFFIX: &str = "-klusterlet";

/// Name of the secret holding a kubeconfig for auto-import
pub const AUTO_IMPORT_SECRET_NAME: &str = "auto-import-secret";

/// Data key holding a kubeconfig in the auto-import and admin kubeconfig secrets
pub const KUBECONFIG_KEY: &str = "kubeconfig";

/// Name of the agent `ServiceAccount` on the managed cluster
pub const KLUSTERLET_SERVICE_ACCOUNT: &str = "klusterlet";

/// Template path of the agent `ServiceAccount`, excluded when it already exists remotely
pub const KLUSTERLET_SERVICE_ACCOUNT_TEMPLATE: &str = "klusterlet/service_account.yaml";

// ============================================================================
// Import Secret Layout
// ============================================================================

/// Import secret key holding the bundle definitions (CRDs)
pub const IMPORT_SECRET_CRDS_KEY: &str = "crds.yaml";

/// Import secret key holding the bundle manifests
pub const IMPORT_SECRET_MANIFESTS_KEY: &str = "import.yaml";

/// Line separating YAML documents in the import secret payload
pub const YAML_DOCUMENT_SEPARATOR: &str = "---";

/// Secret data key for the bound service account token
pub const TOKEN_KEY: &str = "token";

/// Secret data key for the cluster CA bundle
pub const CA_CERT_KEY: &str = "ca.crt";

/// Secret type populated by the token controller
pub const SERVICE_ACCOUNT_TOKEN_TYPE: &str = "kubernetes.io/service-account-token";

// ============================================================================
// Controller Defaults
// ============================================================================

/// Default namespace the agent is installed into on managed clusters
pub const DEFAULT_AGENT_NAMESPACE: &str = "open-cluster-management-agent";

/// Default field manager for writes
pub const DEFAULT_FIELD_MANAGER: &str = "managedcluster-import-controller";

/// Default agent operator image
pub const DEFAULT_OPERATOR_IMAGE: &str = "quay.io/open-cluster-management/registration-operator:latest";

/// Default registration agent image
pub const DEFAULT_REGISTRATION_IMAGE: &str = "quay.io/open-cluster-management/registration:latest";

/// Default work agent image
pub const DEFAULT_WORK_IMAGE: &str = "quay.io/open-cluster-management/work:latest";

/// Default number of clusters reconciled concurrently
pub const DEFAULT_CONCURRENCY: u16 = 4;

// ============================================================================
// Requeue Durations
// ============================================================================

/// Requeue when a provisioning record is not installed yet, or teardown waits on agents (1 minute)
pub const WAIT_REQUEUE_SECS: u64 = 60;

/// Requeue after the finalizer has been stripped (5 seconds)
pub const FINALIZER_RELEASED_REQUEUE_SECS: u64 = 5;

/// Requeue while other finalizer owners are still cleaning up (1 second)
pub const OTHER_FINALIZERS_REQUEUE_SECS: u64 = 1;

/// Retry after a failed direct apply (self-managed or auto-import) (30 seconds)
pub const DIRECT_APPLY_RETRY_SECS: u64 = 30;

/// Retry after a write conflict (1 second)
pub const CONFLICT_RETRY_SECS: u64 = 1;

/// Retry after any other failure (5 seconds)
pub const DEFAULT_RETRY_SECS: u64 = 5;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;
