// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-process [`ResourceStore`].
//!
//! Mimics the API server behaviours the import lifecycle depends on:
//!
//! - uid and `resourceVersion` assignment, with optimistic-concurrency conflicts
//! - deleting an object that carries finalizers only sets `deletionTimestamp`
//! - clearing the finalizers of a terminating object removes it
//!
//! It also counts successful writes so callers can assert that a pass was a no-op.

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::DynamicObject;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{ObjectKey, ResourceStore};
use crate::errors::ImportError;

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<ObjectKey, DynamicObject>>,
    writes: AtomicUsize,
    version: AtomicU64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> MutexGuard<'_, BTreeMap<ObjectKey, DynamicObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    /// Seed an object without counting it as a write.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Validation`] if the object has no type or name.
    pub fn insert(&self, mut obj: DynamicObject) -> Result<DynamicObject, ImportError> {
        let key = ObjectKey::from_object(&obj)?;
        if obj.metadata.uid.is_none() {
            obj.metadata.uid = Some(format!("uid-{}", key.namespaced_name()));
        }
        obj.metadata.resource_version = Some(self.next_version());
        self.objects().insert(key, obj.clone());
        Ok(obj)
    }

    /// Number of successful create, update, and delete calls so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reset_writes(&self) {
        self.writes.store(0, Ordering::SeqCst);
    }

    #[must_use]
    pub fn snapshot(&self, key: &ObjectKey) -> Option<DynamicObject> {
        self.objects().get(key).cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.objects().contains_key(key)
    }

    /// Keys of every stored object of the given kind.
    #[must_use]
    pub fn keys_of_kind(&self, kind: &str) -> Vec<ObjectKey> {
        self.objects()
            .keys()
            .filter(|k| k.kind == kind)
            .cloned()
            .collect()
    }
}

fn deletion_timestamp_now() -> Result<Time, ImportError> {
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    Ok(serde_json::from_value(serde_json::Value::String(now))?)
}

fn has_finalizers(obj: &DynamicObject) -> bool {
    obj.metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| !f.is_empty())
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>, ImportError> {
        Ok(self.snapshot(key))
    }

    async fn list(
        &self,
        api_version: &str,
        kind: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>, ImportError> {
        Ok(self
            .objects()
            .iter()
            .filter(|(k, _)| k.api_version == api_version && k.kind == kind)
            .filter(|(k, _)| namespace.is_none() || k.namespace.as_deref() == namespace)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn create(&self, mut obj: DynamicObject) -> Result<DynamicObject, ImportError> {
        let key = ObjectKey::from_object(&obj)?;
        let mut objects = self.objects();
        if objects.contains_key(&key) {
            return Err(ImportError::conflict(key.kind.clone(), key.namespaced_name()));
        }
        obj.metadata.uid = Some(format!("uid-{}", key.namespaced_name()));
        obj.metadata.resource_version = Some(self.next_version());
        obj.metadata.deletion_timestamp = None;
        objects.insert(key, obj.clone());
        self.record_write();
        Ok(obj)
    }

    async fn update(&self, mut obj: DynamicObject) -> Result<DynamicObject, ImportError> {
        let key = ObjectKey::from_object(&obj)?;
        let mut objects = self.objects();
        let current = objects
            .get(&key)
            .ok_or_else(|| ImportError::not_found(key.kind.clone(), key.namespaced_name()))?;

        if let Some(rv) = &obj.metadata.resource_version {
            if current.metadata.resource_version.as_ref() != Some(rv) {
                return Err(ImportError::conflict(key.kind.clone(), key.namespaced_name()));
            }
        }

        // server-owned fields
        obj.metadata.uid = current.metadata.uid.clone();
        obj.metadata.deletion_timestamp = current.metadata.deletion_timestamp.clone();

        if obj.metadata.deletion_timestamp.is_some() && !has_finalizers(&obj) {
            objects.remove(&key);
            self.record_write();
            return Ok(obj);
        }

        obj.metadata.resource_version = Some(self.next_version());
        objects.insert(key, obj.clone());
        self.record_write();
        Ok(obj)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<bool, ImportError> {
        let mut objects = self.objects();
        let Some(current) = objects.get_mut(key) else {
            return Ok(false);
        };

        if has_finalizers(current) {
            if current.metadata.deletion_timestamp.is_none() {
                current.metadata.deletion_timestamp = Some(deletion_timestamp_now()?);
                current.metadata.resource_version = Some(self.next_version());
                self.record_write();
            }
            return Ok(true);
        }

        objects.remove(key);
        self.record_write();
        Ok(true)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
