// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use clusterimport::config::ImportConfig;
use clusterimport::constants::{
    AUTO_IMPORT_SECRET_NAME, CONDITION_AVAILABLE, KUBECONFIG_KEY, SERVICE_ACCOUNT_TOKEN_TYPE,
};
use clusterimport::context::Context;
use clusterimport::crd::{Condition, ManagedCluster, ManagedClusterSpec, ManagedClusterStatus};
use clusterimport::errors::ImportError;
use clusterimport::store::{
    from_dynamic, to_dynamic, MemoryStore, ObjectKey, RemoteClientFactory, ResourceStore,
};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::{DynamicObject, ObjectMeta};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const HUB_URL: &str = "https://hub.example.com:6443";
pub const TOKEN: &str = "token-abc";
pub const CA_CERT: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";

/// `MemoryStore` plus the API server's token controller: service account token secrets
/// get their token and CA filled in as they are created.
#[derive(Default)]
pub struct TokenIssuingStore {
    pub memory: MemoryStore,
}

fn is_token_secret(obj: &DynamicObject) -> bool {
    obj.types.as_ref().is_some_and(|t| t.kind == "Secret")
        && obj.data.get("type").and_then(Value::as_str) == Some(SERVICE_ACCOUNT_TOKEN_TYPE)
}

#[async_trait]
impl ResourceStore for TokenIssuingStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>, ImportError> {
        self.memory.get(key).await
    }

    async fn list(
        &self,
        api_version: &str,
        kind: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>, ImportError> {
        self.memory.list(api_version, kind, namespace).await
    }

    async fn create(&self, mut obj: DynamicObject) -> Result<DynamicObject, ImportError> {
        if is_token_secret(&obj) {
            obj.data["data"] = json!({
                "token": BASE64.encode(TOKEN),
                "ca.crt": BASE64.encode(CA_CERT),
            });
        }
        self.memory.create(obj).await
    }

    async fn update(&self, obj: DynamicObject) -> Result<DynamicObject, ImportError> {
        self.memory.update(obj).await
    }

    async fn delete(&self, key: &ObjectKey) -> Result<bool, ImportError> {
        self.memory.delete(key).await
    }
}

/// Hands out the same store for every kubeconfig and counts the calls.
pub struct StaticRemoteFactory {
    pub store: Arc<MemoryStore>,
    pub calls: AtomicUsize,
}

impl StaticRemoteFactory {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteClientFactory for StaticRemoteFactory {
    async fn store_from_kubeconfig(
        &self,
        kubeconfig: &[u8],
    ) -> Result<Arc<dyn ResourceStore>, ImportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if kubeconfig.is_empty() {
            return Err(ImportError::remote("empty kubeconfig"));
        }
        Ok(self.store.clone() as Arc<dyn ResourceStore>)
    }
}

/// A hub with one remote cluster behind it.
pub struct Hub {
    pub store: Arc<TokenIssuingStore>,
    pub remote: Arc<StaticRemoteFactory>,
    pub ctx: Context,
}

impl Hub {
    pub fn new() -> Self {
        let store = Arc::new(TokenIssuingStore::default());
        let remote = Arc::new(StaticRemoteFactory::new());
        let config = ImportConfig {
            hub_api_server: Some(HUB_URL.to_string()),
            ..ImportConfig::default()
        };
        let ctx = Context::new(store.clone(), remote.clone(), config);
        Self { store, remote, ctx }
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.store.memory
    }

    pub fn seed<T: serde::Serialize>(&self, obj: &T) {
        self.memory().insert(to_dynamic(obj).unwrap()).unwrap();
    }

    pub fn cluster(&self, name: &str) -> ManagedCluster {
        let key = ObjectKey::of::<ManagedCluster>(None, name);
        from_dynamic(self.memory().snapshot(&key).unwrap()).unwrap()
    }
}

/// Build a cluster. `available` sets the availability condition status when given.
pub fn managed_cluster(
    name: &str,
    labels: &[(&str, &str)],
    available: Option<&str>,
) -> ManagedCluster {
    let mut cluster = ManagedCluster::new(name, ManagedClusterSpec::default());
    cluster.metadata.labels = Some(
        labels
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    );
    cluster.status = available.map(|status| ManagedClusterStatus {
        conditions: vec![Condition {
            r#type: CONDITION_AVAILABLE.to_string(),
            status: status.to_string(),
            ..Default::default()
        }],
    });
    cluster
}

/// The user-supplied secret that requests auto-import.
pub fn auto_import_secret(namespace: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(AUTO_IMPORT_SECRET_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            KUBECONFIG_KEY.to_string(),
            ByteString(b"apiVersion: v1\nkind: Config\n".to_vec()),
        )])),
        ..Default::default()
    }
}
