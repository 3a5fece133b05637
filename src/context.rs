// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the import controller.
//!
//! Every reconcile pass receives an `Arc<Context>` holding:
//! - the hub [`ResourceStore`]
//! - the factory that builds stores for managed clusters (auto-import)
//! - the parsed [`ImportConfig`]
//!
//! Nothing in the context is mutated after startup.

use std::sync::Arc;

use crate::config::ImportConfig;
use crate::store::{RemoteClientFactory, ResourceStore};

/// Shared context passed to every reconcile pass.
#[derive(Clone)]
pub struct Context {
    /// Hub store for all reads and writes
    pub store: Arc<dyn ResourceStore>,

    /// Builds stores for managed clusters from kubeconfig secrets
    pub remote: Arc<dyn RemoteClientFactory>,

    /// Controller configuration
    pub config: ImportConfig,
}

impl Context {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        remote: Arc<dyn RemoteClientFactory>,
        config: ImportConfig,
    ) -> Self {
        Self {
            store,
            remote,
            config,
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
