// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Applying the import bundle straight to a cluster, bypassing the work agent.
//!
//! Used in two cases the distribution channels cannot cover:
//!
//! - the hub imports itself (`self-managed=true`): the bundle is applied to the hub
//! - the user supplied credentials (`auto-import-retry`): the bundle is applied to the
//!   managed cluster through a client built from a kubeconfig secret

use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use kube::ResourceExt;
use tracing::{debug, info};

use super::credentials::BootstrapIdentity;
use super::distribution::manifests_work_name;
use super::import_secret::read_import_bundle;
use super::resources::apply_all;
use crate::bundle::{self, BundleInput, ImportBundle};
use crate::constants::{
    AUTO_IMPORT_SECRET_NAME, KLUSTERLET_SERVICE_ACCOUNT, KLUSTERLET_SERVICE_ACCOUNT_TEMPLATE,
    KUBECONFIG_KEY,
};
use crate::context::Context;
use crate::crd::{ClusterDeployment, ManagedCluster, ManifestWork};
use crate::errors::ImportError;
use crate::store::{get_typed, ResourceStore};

/// Apply definitions, then manifests.
///
/// # Errors
///
/// Returns the first store error.
pub async fn apply_bundle(store: &dyn ResourceStore, bundle: &ImportBundle) -> Result<(), ImportError> {
    apply_all(store, &bundle.definitions).await?;
    apply_all(store, &bundle.manifests).await?;
    Ok(())
}

/// Apply the bundle stored in the import secret to the hub itself.
///
/// # Errors
///
/// Returns [`ImportError::NotFound`] if the import secret is missing, or any parse or
/// store error.
pub async fn apply_self_managed(store: &dyn ResourceStore, cluster_name: &str) -> Result<(), ImportError> {
    let bundle = read_import_bundle(store, cluster_name).await?;
    apply_bundle(store, &bundle).await?;
    debug!(cluster = %cluster_name, "Applied import bundle to the hub");
    Ok(())
}

/// Install the agent on a managed cluster using user-supplied credentials.
///
/// Returns `false` when the cluster already carries the manifests work, so the work
/// agent owns its agent and there is nothing to do.
///
/// # Errors
///
/// Returns [`ImportError::NotFound`] if no kubeconfig secret exists yet,
/// [`ImportError::Remote`] if the kubeconfig is unusable, or any store or generation
/// error.
pub async fn auto_import(
    ctx: &Context,
    cluster: &ManagedCluster,
    identity: &BootstrapIdentity,
    record: Option<&ClusterDeployment>,
) -> Result<bool, ImportError> {
    let store = ctx.store.as_ref();
    let cluster_name = cluster.name_any();

    let work_name = manifests_work_name(&cluster_name);
    if get_typed::<ManifestWork>(store, Some(cluster_name.as_str()), &work_name)
        .await?
        .is_some()
    {
        debug!(cluster = %cluster_name, "Already imported, skipping auto-import");
        return Ok(false);
    }

    let kubeconfig = import_kubeconfig(store, &cluster_name, record).await?;
    let remote = ctx.remote.store_from_kubeconfig(&kubeconfig).await?;

    let mut excluded = Vec::new();
    if get_typed::<ServiceAccount>(
        remote.as_ref(),
        Some(ctx.config.agent_namespace.as_str()),
        KLUSTERLET_SERVICE_ACCOUNT,
    )
    .await?
    .is_some()
    {
        excluded.push(KLUSTERLET_SERVICE_ACCOUNT_TEMPLATE);
    }

    let bundle = bundle::generate(
        &BundleInput {
            cluster_name: &cluster_name,
            token: identity.token(),
            ca_cert: identity.ca_cert(),
            config: &ctx.config,
        },
        &excluded,
    )?;
    apply_bundle(remote.as_ref(), &bundle).await?;

    info!(cluster = %cluster_name, "Auto-imported managed cluster");
    Ok(true)
}

/// The kubeconfig to import with: the admin kubeconfig of the cluster deployment when
/// there is one, otherwise the auto-import secret.
async fn import_kubeconfig(
    store: &dyn ResourceStore,
    cluster_name: &str,
    record: Option<&ClusterDeployment>,
) -> Result<Vec<u8>, ImportError> {
    let secret_name = match record
        .and_then(|r| r.spec.cluster_metadata.as_ref())
        .map(|m| m.admin_kubeconfig_secret_ref.name.as_str())
    {
        Some(name) => {
            debug!(cluster = %cluster_name, secret = %name, "Importing with cluster deployment credentials");
            name
        }
        None => AUTO_IMPORT_SECRET_NAME,
    };

    let secret = get_typed::<Secret>(store, Some(cluster_name), secret_name)
        .await?
        .ok_or_else(|| ImportError::not_found("Secret", format!("{cluster_name}/{secret_name}")))?;
    kubeconfig_from(&secret)
}

fn kubeconfig_from(secret: &Secret) -> Result<Vec<u8>, ImportError> {
    secret
        .data
        .as_ref()
        .and_then(|d| d.get(KUBECONFIG_KEY))
        .filter(|v| !v.0.is_empty())
        .map(|v| v.0.clone())
        .ok_or_else(|| {
            ImportError::validation(format!(
                "secret {} has no {KUBECONFIG_KEY}",
                secret.name_any()
            ))
        })
}

#[cfg(test)]
#[path = "direct_apply_tests.rs"]
mod direct_apply_tests;
