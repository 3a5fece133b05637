// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resource store abstraction.
//!
//! Reconcilers never talk to `kube::Api` directly. They read and write through
//! [`ResourceStore`], which works on [`DynamicObject`]s addressed by an [`ObjectKey`].
//! This keeps the lifecycle logic independent of where objects live:
//!
//! - [`api::KubeStore`] - the hub or a managed cluster's API server
//! - [`memory::MemoryStore`] - an in-process store used by tests
//!
//! Typed access goes through serde: [`to_dynamic`] / [`from_dynamic`] convert between
//! `k8s-openapi` or custom resource types and their dynamic form.

pub mod api;
pub mod memory;
pub mod remote;

use async_trait::async_trait;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

use crate::errors::ImportError;

pub use api::KubeStore;
pub use memory::MemoryStore;
pub use remote::{KubeconfigClientFactory, RemoteClientFactory};

/// Identity of a stored object: its type plus namespaced name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub api_version: String,
    pub kind: String,
    /// `None` for cluster-scoped objects.
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        namespace: Option<&str>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            namespace: namespace.map(str::to_string),
            name: name.into(),
        }
    }

    /// Key for a statically typed resource.
    pub fn of<K>(namespace: Option<&str>, name: impl Into<String>) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        Self::new(K::api_version(&()), K::kind(&()), namespace, name)
    }

    /// Key of an existing dynamic object.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Validation`] if the object has no type information or no name.
    pub fn from_object(obj: &DynamicObject) -> Result<Self, ImportError> {
        let types = obj
            .types
            .as_ref()
            .ok_or_else(|| ImportError::validation("object is missing apiVersion/kind"))?;
        let name = obj
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| ImportError::validation(format!("{} is missing a name", types.kind)))?;
        Ok(Self::new(
            types.api_version.as_str(),
            types.kind.as_str(),
            obj.metadata.namespace.as_deref(),
            name,
        ))
    }

    /// `namespace/name`, or just `name` for cluster-scoped objects.
    #[must_use]
    pub fn namespaced_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}/{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.namespaced_name())
    }
}

/// Build an `ApiResource` from an apiVersion and kind.
#[must_use]
pub fn api_resource_for(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    };
    ApiResource::from_gvk(&GroupVersionKind::gvk(group, version, kind))
}

/// Read/write access to Kubernetes-style objects.
///
/// Implementations must report a missing object from `get` as `Ok(None)`, a stale
/// `resourceVersion` or existing name on write as [`ImportError::Conflict`], and a
/// missing object on `update` as [`ImportError::NotFound`].
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>, ImportError>;

    /// List objects of one type. `namespace = None` lists across all namespaces.
    async fn list(
        &self,
        api_version: &str,
        kind: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>, ImportError>;

    async fn create(&self, obj: DynamicObject) -> Result<DynamicObject, ImportError>;

    /// Replace an existing object. A set `resourceVersion` makes the write optimistic.
    async fn update(&self, obj: DynamicObject) -> Result<DynamicObject, ImportError>;

    /// Request deletion. Returns `false` when the object did not exist.
    async fn delete(&self, key: &ObjectKey) -> Result<bool, ImportError>;
}

/// Convert a typed object into its dynamic form.
///
/// # Errors
///
/// Returns [`ImportError::Serialization`] if the object does not serialize to a map.
pub fn to_dynamic<T: Serialize>(obj: &T) -> Result<DynamicObject, ImportError> {
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}

/// Convert a dynamic object into a typed one.
///
/// # Errors
///
/// Returns [`ImportError::Serialization`] if the object does not match `T`.
pub fn from_dynamic<T: DeserializeOwned>(obj: DynamicObject) -> Result<T, ImportError> {
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}

/// Fetch and decode a typed object.
///
/// # Errors
///
/// Propagates store failures and decode failures.
pub async fn get_typed<K>(
    store: &dyn ResourceStore,
    namespace: Option<&str>,
    name: &str,
) -> Result<Option<K>, ImportError>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    match store.get(&ObjectKey::of::<K>(namespace, name)).await? {
        Some(obj) => Ok(Some(from_dynamic(obj)?)),
        None => Ok(None),
    }
}

/// List and decode typed objects.
///
/// # Errors
///
/// Propagates store failures and decode failures.
pub async fn list_typed<K>(
    store: &dyn ResourceStore,
    namespace: Option<&str>,
) -> Result<Vec<K>, ImportError>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    store
        .list(&K::api_version(&()), &K::kind(&()), namespace)
        .await?
        .into_iter()
        .map(from_dynamic)
        .collect()
}
