// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Clients for managed clusters, built from kubeconfig blobs held in hub secrets.

use async_trait::async_trait;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;
use tracing::debug;

use super::{KubeStore, ResourceStore};
use crate::errors::ImportError;

/// Builds a [`ResourceStore`] for a managed cluster.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteClientFactory: Send + Sync {
    /// Build a store from a kubeconfig document.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Remote`] if the kubeconfig cannot be parsed or loaded.
    async fn store_from_kubeconfig(
        &self,
        kubeconfig: &[u8],
    ) -> Result<Arc<dyn ResourceStore>, ImportError>;
}

/// Production factory: kube-rs client per kubeconfig.
pub struct KubeconfigClientFactory {
    field_manager: String,
}

impl KubeconfigClientFactory {
    pub fn new(field_manager: impl Into<String>) -> Self {
        Self {
            field_manager: field_manager.into(),
        }
    }
}

#[async_trait]
impl RemoteClientFactory for KubeconfigClientFactory {
    async fn store_from_kubeconfig(
        &self,
        kubeconfig: &[u8],
    ) -> Result<Arc<dyn ResourceStore>, ImportError> {
        let text = std::str::from_utf8(kubeconfig)
            .map_err(|e| ImportError::remote(format!("kubeconfig is not valid UTF-8: {e}")))?;
        let kubeconfig = Kubeconfig::from_yaml(text)
            .map_err(|e| ImportError::remote(format!("failed to parse kubeconfig: {e}")))?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| ImportError::remote(format!("failed to load kubeconfig: {e}")))?;
        debug!(cluster_url = %config.cluster_url, "Built managed cluster client config");
        let client = Client::try_from(config)
            .map_err(|e| ImportError::remote(format!("failed to create client: {e}")))?;

        Ok(Arc::new(KubeStore::without_retry(
            client,
            self.field_manager.clone(),
        )))
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod remote_tests;
