// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller configuration.
//!
//! Every setting can be passed as a flag or through its environment variable. The
//! parsed [`ImportConfig`] is handed to each component through the shared context;
//! nothing reads the environment after startup.

use clap::Parser;

use crate::constants::{
    DEFAULT_AGENT_NAMESPACE, DEFAULT_CONCURRENCY, DEFAULT_FIELD_MANAGER, DEFAULT_OPERATOR_IMAGE,
    DEFAULT_REGISTRATION_IMAGE, DEFAULT_WORK_IMAGE,
};
use crate::errors::ImportError;

/// ManagedCluster import controller
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "clusterimport", version, about, long_about = None)]
pub struct ImportConfig {
    /// Hub API server URL embedded in the bootstrap kubeconfig.
    ///
    /// Defaults to the URL of the cluster the controller runs in.
    #[arg(long, env = "HUB_API_SERVER")]
    pub hub_api_server: Option<String>,

    /// Namespace the agent is installed into on managed clusters
    #[arg(long, env = "AGENT_NAMESPACE", default_value = DEFAULT_AGENT_NAMESPACE)]
    pub agent_namespace: String,

    /// Agent operator image
    #[arg(long, env = "OPERATOR_IMAGE", default_value = DEFAULT_OPERATOR_IMAGE)]
    pub operator_image: String,

    /// Registration agent image
    #[arg(long, env = "REGISTRATION_IMAGE", default_value = DEFAULT_REGISTRATION_IMAGE)]
    pub registration_image: String,

    /// Work agent image
    #[arg(long, env = "WORK_IMAGE", default_value = DEFAULT_WORK_IMAGE)]
    pub work_image: String,

    /// Image pull secret referenced by the agent operator Deployment
    #[arg(long, env = "IMAGE_PULL_SECRET")]
    pub image_pull_secret: Option<String>,

    /// Number of managed clusters reconciled concurrently
    #[arg(long, env = "CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: u16,

    /// Field manager recorded on writes
    #[arg(long, env = "FIELD_MANAGER", default_value = DEFAULT_FIELD_MANAGER)]
    pub field_manager: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            hub_api_server: None,
            agent_namespace: DEFAULT_AGENT_NAMESPACE.to_string(),
            operator_image: DEFAULT_OPERATOR_IMAGE.to_string(),
            registration_image: DEFAULT_REGISTRATION_IMAGE.to_string(),
            work_image: DEFAULT_WORK_IMAGE.to_string(),
            image_pull_secret: None,
            concurrency: DEFAULT_CONCURRENCY,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
        }
    }
}

impl ImportConfig {
    /// Fill in the hub API server URL when none was configured.
    #[must_use]
    pub fn with_default_hub_api_server(mut self, url: &str) -> Self {
        if self.hub_api_server.is_none() {
            self.hub_api_server = Some(url.trim_end_matches('/').to_string());
        }
        self
    }

    /// Check the settings that would otherwise only fail at bundle generation time.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Validation`] if the hub API server URL is missing, does not
    /// parse, or is not https; or if the agent namespace or concurrency is empty.
    pub fn validate(&self) -> Result<(), ImportError> {
        let raw = self
            .hub_api_server
            .as_deref()
            .ok_or_else(|| ImportError::validation("hub API server URL is not configured"))?;

        let parsed = url::Url::parse(raw)
            .map_err(|e| ImportError::validation(format!("invalid hub API server URL {raw}: {e}")))?;
        if parsed.scheme() != "https" {
            return Err(ImportError::validation(format!(
                "hub API server URL {raw} must use https"
            )));
        }

        if self.agent_namespace.trim().is_empty() {
            return Err(ImportError::validation("agent namespace must not be empty"));
        }
        if self.concurrency == 0 {
            return Err(ImportError::validation("concurrency must be at least 1"));
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
