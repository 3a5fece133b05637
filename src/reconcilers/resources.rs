// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic create-or-update helpers over a [`ResourceStore`].
//!
//! Every object the controller owns is written through [`upsert`]:
//!
//! - **absent**: create it
//! - **present, desired is a subset of observed**: leave it alone (no write)
//! - **present, differs**: deep-merge desired over observed and update, carrying the
//!   observed `resourceVersion` so a concurrent writer surfaces as a conflict
//!
//! Comparing as a subset means fields the API server or other controllers add (uid,
//! status, defaulted spec fields, foreign labels) never count as drift. A second pass
//! over unchanged state therefore performs zero writes.
//!
//! # Example
//!
//! ```rust,no_run
//! use clusterimport::reconcilers::resources::{upsert, UpsertOutcome};
//! use clusterimport::store::{to_dynamic, ResourceStore};
//! use k8s_openapi::api::core::v1::ServiceAccount;
//!
//! async fn example(store: &dyn ResourceStore, sa: &ServiceAccount) -> anyhow::Result<()> {
//!     let (_, outcome) = upsert(store, to_dynamic(sa)?).await?;
//!     if outcome == UpsertOutcome::Unchanged {
//!         println!("already up to date");
//!     }
//!     Ok(())
//! }
//! ```

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::DynamicObject;
use kube::{Resource, ResourceExt};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::crd::ManagedCluster;
use crate::errors::ImportError;
use crate::labels::{CLUSTER_NAME_LABEL, K8S_MANAGED_BY, MANAGED_BY_IMPORT_CONTROLLER};
use crate::store::{ObjectKey, ResourceStore};

/// What [`upsert`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Create `desired` if absent, update it if it drifted, otherwise do nothing.
///
/// # Errors
///
/// Returns [`ImportError::Conflict`] if the object changed between read and write,
/// or any store error.
pub async fn upsert(
    store: &dyn ResourceStore,
    desired: DynamicObject,
) -> Result<(DynamicObject, UpsertOutcome), ImportError> {
    let key = ObjectKey::from_object(&desired)?;

    let Some(current) = store.get(&key).await? else {
        let created = store.create(desired).await?;
        info!(object = %key, "Created");
        return Ok((created, UpsertOutcome::Created));
    };

    let desired_value = serde_json::to_value(&desired)?;
    let mut merged = serde_json::to_value(&current)?;
    if is_subset(&desired_value, &merged) {
        debug!(object = %key, "Up to date");
        return Ok((current, UpsertOutcome::Unchanged));
    }

    merge_into(&mut merged, &desired_value);
    let updated = store.update(serde_json::from_value(merged)?).await?;
    info!(object = %key, "Updated");
    Ok((updated, UpsertOutcome::Updated))
}

/// Upsert a batch of manifests in dependency order (see [`kind_priority`]).
///
/// Stops at the first failure.
///
/// # Errors
///
/// Returns the first store or conversion error.
pub async fn apply_all(
    store: &dyn ResourceStore,
    manifests: &[Value],
) -> Result<Vec<UpsertOutcome>, ImportError> {
    let mut ordered: Vec<&Value> = manifests.iter().collect();
    ordered.sort_by_key(|m| kind_priority(m.get("kind").and_then(Value::as_str).unwrap_or("")));

    let mut outcomes = Vec::with_capacity(ordered.len());
    for manifest in ordered {
        let obj: DynamicObject = serde_json::from_value(manifest.clone())?;
        let (_, outcome) = upsert(store, obj).await?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Apply priority for a resource kind (lower applies first).
#[must_use]
pub fn kind_priority(kind: &str) -> u8 {
    match kind {
        "Namespace" => 0,
        "CustomResourceDefinition" => 1,
        "ServiceAccount" => 2,
        "ClusterRole" | "Role" => 3,
        "ClusterRoleBinding" | "RoleBinding" => 4,
        "ConfigMap" | "Secret" => 5,
        "Service" => 7,
        "Deployment" | "DaemonSet" | "StatefulSet" => 8,
        _ => 10,
    }
}

/// True when every field set in `desired` has the same value in `observed`.
///
/// Objects compare key by key, arrays element by element with equal length, and
/// scalars by equality. A `null`, empty array or empty object in `desired` matches an
/// absent field, since the API server drops those on write.
#[must_use]
pub fn is_subset(desired: &Value, observed: &Value) -> bool {
    match (desired, observed) {
        (Value::Object(want), Value::Object(have)) => want.iter().all(|(k, v)| match have.get(k) {
            Some(h) => is_subset(v, h),
            None => is_empty(v),
        }),
        (Value::Array(want), Value::Array(have)) => {
            want.len() == have.len() && want.iter().zip(have).all(|(w, h)| is_subset(w, h))
        }
        (Value::Null, Value::Null) => true,
        _ => desired == observed,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Overlay `patch` onto `target`: objects merge recursively, everything else replaces.
pub fn merge_into(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(t), Value::Object(p)) => {
            for (k, v) in p {
                merge_into(t.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
        (t, p) => *t = p.clone(),
    }
}

/// Labels stamped on every hub object written for `cluster_name`.
#[must_use]
pub fn cluster_labels(cluster_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (CLUSTER_NAME_LABEL.to_string(), cluster_name.to_string()),
        (
            K8S_MANAGED_BY.to_string(),
            MANAGED_BY_IMPORT_CONTROLLER.to_string(),
        ),
    ])
}

/// Controller owner reference pointing at the managed cluster.
///
/// # Errors
///
/// Returns [`ImportError::Validation`] if the cluster has not been persisted (no uid).
pub fn owner_reference(cluster: &ManagedCluster) -> Result<OwnerReference, ImportError> {
    cluster.controller_owner_ref(&()).ok_or_else(|| {
        ImportError::validation(format!(
            "{} {} has no uid",
            ManagedCluster::kind(&()),
            cluster.name_any()
        ))
    })
}

/// Add cluster labels (and optionally an owner reference) to a raw manifest.
///
/// # Errors
///
/// Returns [`ImportError::Serialization`] if the owner reference cannot be encoded.
pub fn stamp(
    manifest: &mut Value,
    cluster_name: &str,
    owner: Option<&OwnerReference>,
) -> Result<(), ImportError> {
    let Some(obj) = manifest.as_object_mut() else {
        return Err(ImportError::validation("manifest is not an object"));
    };
    let metadata = obj
        .entry("metadata")
        .or_insert_with(|| Value::Object(Map::new()));

    let mut overlay = Map::new();
    overlay.insert("labels".to_string(), serde_json::to_value(cluster_labels(cluster_name))?);
    if let Some(owner) = owner {
        overlay.insert(
            "ownerReferences".to_string(),
            Value::Array(vec![serde_json::to_value(owner)?]),
        );
    }
    merge_into(metadata, &Value::Object(overlay));
    Ok(())
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
