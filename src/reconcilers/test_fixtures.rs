// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared fixtures for reconciler unit tests.

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::credentials::token_secret_name;
use crate::config::ImportConfig;
use crate::constants::{CA_CERT_KEY, CONDITION_AVAILABLE, TOKEN_KEY};
use crate::context::Context;
use crate::crd::{Condition, ManagedCluster, ManagedClusterSpec, ManagedClusterStatus};
use crate::store::remote::MockRemoteClientFactory;
use crate::store::{from_dynamic, to_dynamic, MemoryStore, ObjectKey, RemoteClientFactory};

pub const HUB_URL: &str = "https://hub.example.com:6443";

pub fn config() -> ImportConfig {
    ImportConfig {
        hub_api_server: Some(HUB_URL.to_string()),
        ..ImportConfig::default()
    }
}

/// Build a cluster. `available` sets the availability condition status when given.
pub fn cluster(name: &str, labels: &[(&str, &str)], available: Option<&str>) -> ManagedCluster {
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

/// Store the cluster and return it as persisted (uid and resourceVersion set).
pub fn seed(store: &MemoryStore, cluster: &ManagedCluster) -> ManagedCluster {
    let stored = store.insert(to_dynamic(cluster).unwrap()).unwrap();
    from_dynamic(stored).unwrap()
}

/// Act as the token controller: fill in the bootstrap token secret, creating it if needed.
pub fn issue_token(store: &MemoryStore, cluster_name: &str) {
    let name = token_secret_name(cluster_name);
    let key = ObjectKey::of::<Secret>(Some(cluster_name), name.clone());
    let mut secret: Secret = match store.snapshot(&key) {
        Some(obj) => from_dynamic(obj).unwrap(),
        None => Secret {
            metadata: kube::api::ObjectMeta {
                name: Some(name),
                namespace: Some(cluster_name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        },
    };
    secret.data = Some(BTreeMap::from([
        (TOKEN_KEY.to_string(), ByteString(b"token-abc".to_vec())),
        (
            CA_CERT_KEY.to_string(),
            ByteString(b"-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n".to_vec()),
        ),
    ]));
    store.insert(to_dynamic(&secret).unwrap()).unwrap();
}

pub fn context(store: Arc<MemoryStore>, remote: MockRemoteClientFactory) -> Context {
    let remote: Arc<dyn RemoteClientFactory> = Arc::new(remote);
    Context::new(store, remote, config())
}
