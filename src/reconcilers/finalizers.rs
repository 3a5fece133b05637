// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management over a [`ResourceStore`].
//!
//! - [`ensure_finalizer`] adds our finalizer to a `ManagedCluster`
//! - [`strip_finalizers`] releases a set of finalizers, re-reading and retrying on
//!   conflict so a concurrent status update never loses the race permanently
//! - [`evict`] clears every finalizer on an object, forcing its removal when the agent
//!   that would normally release it is unreachable

use kube::api::DynamicObject;
use tracing::{debug, info, warn};

use crate::errors::ImportError;
use crate::reconcilers::retry::retry_on_conflict;
use crate::store::{ObjectKey, ResourceStore};

/// Finalizers currently set on an object.
#[must_use]
pub fn finalizers_of(obj: &DynamicObject) -> Vec<String> {
    obj.metadata.finalizers.clone().unwrap_or_default()
}

/// Add `finalizer` to the object if not already present.
///
/// Returns `true` when a write was made.
///
/// # Errors
///
/// Returns [`ImportError::NotFound`] if the object is gone, or any store error.
pub async fn ensure_finalizer(
    store: &dyn ResourceStore,
    key: &ObjectKey,
    finalizer: &str,
) -> Result<bool, ImportError> {
    let mut obj = store
        .get(key)
        .await?
        .ok_or_else(|| ImportError::not_found(key.kind.clone(), key.namespaced_name()))?;

    let mut finalizers = finalizers_of(&obj);
    if finalizers.iter().any(|f| f == finalizer) {
        return Ok(false);
    }

    info!(object = %key, finalizer = %finalizer, "Adding finalizer");
    finalizers.push(finalizer.to_string());
    obj.metadata.finalizers = Some(finalizers);
    store.update(obj).await?;
    Ok(true)
}

/// Remove every finalizer in `owned` from the object, leaving others in place.
///
/// Each attempt re-reads the object and writes with its current `resourceVersion`;
/// conflicts are retried with exponential backoff. A missing object is treated as
/// already released.
///
/// # Errors
///
/// Returns the last error if the write keeps failing.
pub async fn strip_finalizers(
    store: &dyn ResourceStore,
    key: &ObjectKey,
    owned: &[&str],
) -> Result<(), ImportError> {
    let name = key.to_string();
    retry_on_conflict(
        || async move {
            let Some(mut obj) = store.get(key).await? else {
                debug!(object = %key, "Object already gone, nothing to release");
                return Ok(());
            };

            let before = finalizers_of(&obj);
            let after: Vec<String> = before
                .iter()
                .filter(|f| !owned.contains(&f.as_str()))
                .cloned()
                .collect();
            if after.len() == before.len() {
                return Ok(());
            }

            obj.metadata.finalizers = Some(after);
            store.update(obj).await?;
            info!(object = %key, "Released finalizers");
            Ok(())
        },
        &name,
    )
    .await
}

/// Clear all finalizers on the object so the API server can remove it.
///
/// Returns `true` if the object was still present. Evicting a gone object is a no-op.
///
/// # Errors
///
/// Returns any store error other than the object disappearing mid-write.
pub async fn evict(store: &dyn ResourceStore, key: &ObjectKey) -> Result<bool, ImportError> {
    let Some(mut obj) = store.get(key).await? else {
        return Ok(false);
    };

    warn!(object = %key, "Managed cluster is unreachable, evicting");
    if obj.metadata.finalizers.as_ref().is_some_and(|f| !f.is_empty()) {
        obj.metadata.finalizers = None;
        match store.update(obj).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        }
    }

    // objects that were not yet terminating still need the delete itself
    if store.get(key).await?.is_some() {
        store.delete(key).await?;
    }
    Ok(true)
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
