// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for imported managed clusters.
//!
//! A single controller watches `ManagedCluster` and every object it produces. Each pass
//! runs [`reconcile_managed_cluster`], which drives one cluster through its lifecycle:
//!
//! 1. **Credentials** - bootstrap service account and token secret on the hub
//! 2. **Bundle** - klusterlet manifests rendered for the cluster
//! 3. **Import secret** - the bundle stored on the hub for manual import
//! 4. **Distribution** - `ManifestWork`s or a `SelectorSyncSet`, whichever applies
//! 5. **Direct apply** - self-managed hubs and clusters with auto-import credentials
//! 6. **Teardown** - removal of everything above once the cluster is deleted
//!
//! # Available Reconcilers
//!
//! - [`reconcile_managed_cluster`] - one pass for a named cluster
//! - [`cleanup_absent`] - namespace cleanup after the cluster object is gone
//! - [`tear_down`] - one teardown step for a terminating cluster
//!
//! # Example
//!
//! ```rust,no_run
//! use clusterimport::context::Context;
//! use clusterimport::reconcilers::{reconcile_managed_cluster, ReconcileOutcome};
//!
//! async fn run_once(ctx: &Context) -> anyhow::Result<()> {
//!     match reconcile_managed_cluster(ctx, "cluster1").await? {
//!         ReconcileOutcome::Done => println!("imported"),
//!         ReconcileOutcome::RequeueAfter(delay) => println!("check again in {delay:?}"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod credentials;
pub mod direct_apply;
pub mod distribution;
pub mod finalizers;
pub mod import_secret;
pub mod managedcluster;
pub mod resources;
pub mod retry;
pub mod teardown;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use distribution::{select_distribution, Distribution};
pub use managedcluster::{
    cleanup_absent, reconcile_cluster_namespace, reconcile_managed_cluster, ReconcileError,
    ReconcileOutcome, Step,
};
pub use teardown::tear_down;
