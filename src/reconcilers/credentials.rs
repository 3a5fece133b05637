// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Bootstrap identity for a managed cluster.
//!
//! Each cluster gets a `ServiceAccount` in its namespace plus a token `Secret` bound to
//! it. The token and the hub CA from that secret are what the agent uses to register.
//! The token itself is populated by the API server's token controller, so a freshly
//! created secret is usually empty on the first pass; that is reported as
//! [`ImportError::NotFound`] and retried.

use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::resources::{cluster_labels, owner_reference};
use crate::constants::{
    BOOTSTRAP_SA_SUFFIX, BOOTSTRAP_TOKEN_SUFFIX, CA_CERT_KEY, SERVICE_ACCOUNT_TOKEN_TYPE,
    TOKEN_KEY,
};
use crate::crd::ManagedCluster;
use crate::errors::ImportError;
use crate::labels::SERVICE_ACCOUNT_NAME_ANNOTATION;
use crate::store::{get_typed, to_dynamic, ResourceStore};

/// The bootstrap service account and its populated token secret.
#[derive(Clone, Debug)]
pub struct BootstrapIdentity {
    pub service_account: ServiceAccount,
    pub token_secret: Secret,
}

impl BootstrapIdentity {
    #[must_use]
    pub fn token(&self) -> &[u8] {
        secret_value(&self.token_secret, TOKEN_KEY)
    }

    #[must_use]
    pub fn ca_cert(&self) -> &[u8] {
        secret_value(&self.token_secret, CA_CERT_KEY)
    }
}

fn secret_value<'a>(secret: &'a Secret, key: &str) -> &'a [u8] {
    secret
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .map(|v| v.0.as_slice())
        .unwrap_or_default()
}

#[must_use]
pub fn service_account_name(cluster_name: &str) -> String {
    format!("{cluster_name}{BOOTSTRAP_SA_SUFFIX}")
}

#[must_use]
pub fn token_secret_name(cluster_name: &str) -> String {
    format!("{cluster_name}{BOOTSTRAP_SA_SUFFIX}{BOOTSTRAP_TOKEN_SUFFIX}")
}

/// Ensure the bootstrap service account and token secret exist, and return them once
/// the token has been issued.
///
/// Existing objects are read, never rewritten.
///
/// # Errors
///
/// Returns [`ImportError::NotFound`] while the token secret lacks a token or CA, or any
/// store error.
pub async fn ensure_bootstrap_identity(
    store: &dyn ResourceStore,
    cluster: &ManagedCluster,
) -> Result<BootstrapIdentity, ImportError> {
    let cluster_name = cluster.name_any();
    let namespace = cluster_name.as_str();
    let sa_name = service_account_name(&cluster_name);
    let secret_name = token_secret_name(&cluster_name);
    let owner = owner_reference(cluster)?;

    let service_account = match get_typed::<ServiceAccount>(store, Some(namespace), &sa_name).await? {
        Some(sa) => sa,
        None => {
            info!(cluster = %cluster_name, service_account = %sa_name, "Creating bootstrap service account");
            let sa = ServiceAccount {
                metadata: ObjectMeta {
                    name: Some(sa_name.clone()),
                    namespace: Some(namespace.to_string()),
                    labels: Some(cluster_labels(&cluster_name)),
                    owner_references: Some(vec![owner.clone()]),
                    ..Default::default()
                },
                ..Default::default()
            };
            store.create(to_dynamic(&sa)?).await?;
            sa
        }
    };

    if get_typed::<Secret>(store, Some(namespace), &secret_name)
        .await?
        .is_none()
    {
        info!(cluster = %cluster_name, secret = %secret_name, "Creating bootstrap token secret");
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(secret_name.clone()),
                namespace: Some(namespace.to_string()),
                labels: Some(cluster_labels(&cluster_name)),
                annotations: Some(BTreeMap::from([(
                    SERVICE_ACCOUNT_NAME_ANNOTATION.to_string(),
                    sa_name.clone(),
                )])),
                owner_references: Some(vec![owner]),
                ..Default::default()
            },
            type_: Some(SERVICE_ACCOUNT_TOKEN_TYPE.to_string()),
            ..Default::default()
        };
        store.create(to_dynamic(&secret)?).await?;
    }

    // read back: the token controller fills in data asynchronously
    let token_secret = get_typed::<Secret>(store, Some(namespace), &secret_name)
        .await?
        .ok_or_else(|| ImportError::not_found("Secret", format!("{namespace}/{secret_name}")))?;

    let identity = BootstrapIdentity {
        service_account,
        token_secret,
    };
    if identity.token().is_empty() || identity.ca_cert().is_empty() {
        debug!(cluster = %cluster_name, secret = %secret_name, "Token not issued yet");
        return Err(ImportError::not_found(
            "Secret",
            format!("{namespace}/{secret_name} (token)"),
        ));
    }

    Ok(identity)
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod credentials_tests;
