// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The import secret: `<cluster>/<cluster>-import`, holding the serialized bundle.
//!
//! Users fetch this secret to import a cluster by hand, and the self-managed path reads
//! the bundle back from it.

use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use tracing::debug;

use super::resources::{cluster_labels, owner_reference, upsert, UpsertOutcome};
use crate::bundle::ImportBundle;
use crate::constants::{IMPORT_SECRET_CRDS_KEY, IMPORT_SECRET_MANIFESTS_KEY, IMPORT_SECRET_SUFFIX};
use crate::crd::ManagedCluster;
use crate::errors::ImportError;
use crate::store::{from_dynamic, get_typed, to_dynamic, ResourceStore};

#[must_use]
pub fn import_secret_name(cluster_name: &str) -> String {
    format!("{cluster_name}{IMPORT_SECRET_SUFFIX}")
}

/// Create or update the import secret from `bundle`.
///
/// # Errors
///
/// Returns [`ImportError::Validation`] if either serialized key would be empty, or any
/// store error.
pub async fn ensure_import_secret(
    store: &dyn ResourceStore,
    cluster: &ManagedCluster,
    bundle: &ImportBundle,
) -> Result<(Secret, UpsertOutcome), ImportError> {
    let cluster_name = cluster.name_any();
    let data = bundle.to_secret_data()?;

    for key in [IMPORT_SECRET_CRDS_KEY, IMPORT_SECRET_MANIFESTS_KEY] {
        if data.get(key).is_none_or(|v| v.0.is_empty()) {
            return Err(ImportError::validation(format!(
                "import secret for {cluster_name} would have an empty {key}"
            )));
        }
    }

    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(import_secret_name(&cluster_name)),
            namespace: Some(cluster_name.clone()),
            labels: Some(cluster_labels(&cluster_name)),
            owner_references: Some(vec![owner_reference(cluster)?]),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(data),
        ..Default::default()
    };

    let (stored, outcome) = upsert(store, to_dynamic(&secret)?).await?;
    debug!(cluster = %cluster_name, outcome = ?outcome, "Import secret ensured");
    Ok((from_dynamic(stored)?, outcome))
}

/// Read the bundle back out of the stored import secret.
///
/// # Errors
///
/// Returns [`ImportError::NotFound`] if the secret does not exist, or a parse error.
pub async fn read_import_bundle(
    store: &dyn ResourceStore,
    cluster_name: &str,
) -> Result<ImportBundle, ImportError> {
    let name = import_secret_name(cluster_name);
    let secret = get_typed::<Secret>(store, Some(cluster_name), &name)
        .await?
        .ok_or_else(|| ImportError::not_found("Secret", format!("{cluster_name}/{name}")))?;
    ImportBundle::from_secret_data(&secret.data.unwrap_or_default())
}

#[cfg(test)]
#[path = "import_secret_tests.rs"]
mod import_secret_tests;
