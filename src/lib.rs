// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # clusterimport - ManagedCluster import controller
//!
//! Runs on a hub cluster and imports `ManagedCluster`s: it provisions a bootstrap
//! identity for each cluster, renders the klusterlet agent bundle, and delivers it so
//! the agent can register back with the hub. When a cluster is deleted it removes the
//! agent again before releasing the cluster object.
//!
//! ## Modules
//!
//! - [`crd`] - Custom resource types the controller reads and writes
//! - [`bundle`] - Import bundle rendering from embedded templates
//! - [`reconcilers`] - The lifecycle state machine and its steps
//! - [`store`] - Object access for the hub and for managed clusters
//! - [`events`] - Mapping watch events to the cluster they belong to
//! - [`config`] - Command line and environment configuration
//! - [`context`] - Shared state handed to every reconcile pass
//!
//! ## Example
//!
//! ```rust,no_run
//! use clusterimport::bundle::{generate, BundleInput};
//! use clusterimport::config::ImportConfig;
//!
//! let config = ImportConfig {
//!     hub_api_server: Some("https://hub.example.com:6443".to_string()),
//!     ..ImportConfig::default()
//! };
//! let bundle = generate(
//!     &BundleInput {
//!         cluster_name: "cluster1",
//!         token: b"token",
//!         ca_cert: b"ca",
//!         config: &config,
//!     },
//!     &[],
//! )?;
//! println!("{} manifests", bundle.manifests.len());
//! # Ok::<(), clusterimport::errors::ImportError>(())
//! ```

pub mod bundle;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod errors;
pub mod events;
pub mod labels;
pub mod reconcilers;
pub mod store;

#[cfg(test)]
mod events_tests;
