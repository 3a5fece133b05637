// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`ResourceStore`] backed by a Kubernetes API server.

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::Client;
use std::future::Future;
use tracing::debug;

use super::{api_resource_for, ObjectKey, ResourceStore};
use crate::errors::ImportError;
use crate::reconcilers::retry::retry_api_call;

/// Store that reads and writes through `kube::Api<DynamicObject>`.
///
/// Transient API failures are retried with backoff before surfacing, unless the store
/// was built with [`KubeStore::without_retry`]. 404 and 409 are mapped to
/// [`ImportError::NotFound`] and [`ImportError::Conflict`].
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    field_manager: String,
    retry_transient: bool,
}

impl KubeStore {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
            retry_transient: true,
        }
    }

    /// Store whose calls fail on the first error.
    ///
    /// Used for managed clusters: an unreachable cluster surfaces at once and the pass
    /// is rescheduled instead of holding a worker through the backoff.
    pub fn without_retry(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            retry_transient: false,
            ..Self::new(client, field_manager)
        }
    }

    async fn call<T, F, Fut>(
        &self,
        mut operation: F,
        operation_name: &str,
    ) -> Result<T, kube::Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, kube::Error>>,
    {
        if self.retry_transient {
            retry_api_call(operation, operation_name).await
        } else {
            operation().await
        }
    }

    fn api(&self, api_version: &str, kind: &str, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = api_resource_for(api_version, kind);
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }

    fn api_for(&self, key: &ObjectKey) -> Api<DynamicObject> {
        self.api(&key.api_version, &key.kind, key.namespace.as_deref())
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }
}

fn classify(err: kube::Error, key: &ObjectKey) -> ImportError {
    match &err {
        kube::Error::Api(ae) if ae.code == 404 => {
            ImportError::not_found(key.kind.clone(), key.namespaced_name())
        }
        kube::Error::Api(ae) if ae.code == 409 => {
            ImportError::conflict(key.kind.clone(), key.namespaced_name())
        }
        _ => ImportError::Kube(err),
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>, ImportError> {
        let api = self.api_for(key);
        self.call(|| api.get_opt(&key.name), &format!("get {key}"))
            .await
            .map_err(|e| classify(e, key))
    }

    async fn list(
        &self,
        api_version: &str,
        kind: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>, ImportError> {
        let api = self.api(api_version, kind, namespace);
        let lp = ListParams::default();
        let list = self.call(|| api.list(&lp), &format!("list {kind}"))
            .await
            .map_err(ImportError::Kube)?;
        Ok(list.items)
    }

    async fn create(&self, obj: DynamicObject) -> Result<DynamicObject, ImportError> {
        let key = ObjectKey::from_object(&obj)?;
        let api = self.api_for(&key);
        let pp = self.post_params();
        debug!(object = %key, "Creating object");
        self.call(|| api.create(&pp, &obj), &format!("create {key}"))
            .await
            .map_err(|e| classify(e, &key))
    }

    async fn update(&self, obj: DynamicObject) -> Result<DynamicObject, ImportError> {
        let key = ObjectKey::from_object(&obj)?;
        let api = self.api_for(&key);
        let pp = self.post_params();
        debug!(object = %key, "Replacing object");
        self.call(|| api.replace(&key.name, &pp, &obj), &format!("replace {key}"))
            .await
            .map_err(|e| classify(e, &key))
    }

    async fn delete(&self, key: &ObjectKey) -> Result<bool, ImportError> {
        let api = self.api_for(key);
        let dp = DeleteParams::default();
        match self.call(|| api.delete(&key.name, &dp), &format!("delete {key}")).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(false),
            Err(e) => Err(classify(e, key)),
        }
    }
}
