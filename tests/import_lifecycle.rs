// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! End-to-end import lifecycle tests.
//!
//! Each test drives `reconcile_managed_cluster` against an in-memory hub whose store
//! issues service account tokens the way the API server does, and inspects what the
//! passes left behind.

mod common;

use clusterimport::constants::{IMPORT_SECRET_CRDS_KEY, IMPORT_SECRET_MANIFESTS_KEY};
use clusterimport::crd::{
    ClusterDeployment, ClusterDeploymentSpec, ManagedCluster, ManagedClusterStatus, ManifestWork,
    ManifestWorkSpec,
};
use clusterimport::labels::{
    AUTO_IMPORT_RETRY_LABEL, FINALIZER_IMPORT_CLEANUP, FINALIZER_REGISTRATION_CLEANUP,
    SELF_MANAGED_LABEL,
};
use clusterimport::reconcilers::{reconcile_managed_cluster, ReconcileOutcome};
use clusterimport::store::{from_dynamic, ObjectKey, ResourceStore};
use common::{auto_import_secret, managed_cluster, Hub};
use k8s_openapi::api::core::v1::{Namespace, Secret, ServiceAccount};
use std::time::Duration;

const WORK_FINALIZER: &str = "cluster.open-cluster-management.io/manifest-work-cleanup";

fn requeue(secs: u64) -> ReconcileOutcome {
    ReconcileOutcome::RequeueAfter(Duration::from_secs(secs))
}

fn provisioning_record(installed: bool) -> ClusterDeployment {
    let mut record = ClusterDeployment::new(
        "c1",
        ClusterDeploymentSpec {
            installed,
            ..Default::default()
        },
    );
    record.metadata.namespace = Some("c1".to_string());
    record
}

/// Act as the work agent: hold every existing work with a finalizer.
fn hold_works(hub: &Hub) {
    for key in hub.memory().keys_of_kind("ManifestWork") {
        let mut work = hub.memory().snapshot(&key).unwrap();
        work.metadata.finalizers = Some(vec![WORK_FINALIZER.to_string()]);
        hub.memory().insert(work).unwrap();
    }
}

/// Mark the cluster's availability and request its deletion.
async fn delete_cluster(hub: &Hub, available: &str) {
    let mut cluster = hub.cluster("c1");
    cluster.status = Some(ManagedClusterStatus {
        conditions: managed_cluster("c1", &[], Some(available))
            .status
            .unwrap()
            .conditions,
    });
    hub.seed(&cluster);
    hub.memory()
        .delete(&ObjectKey::of::<ManagedCluster>(None, "c1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unlabelled_cluster_gets_import_secret_only() {
    // Arrange: no labels, no record, availability unknown
    let hub = Hub::new();
    hub.seed(&managed_cluster("c1", &[], None));

    // Act
    let outcome = reconcile_managed_cluster(&hub.ctx, "c1").await.unwrap();

    // Assert
    assert_eq!(outcome, ReconcileOutcome::Done);
    assert!(hub
        .cluster("c1")
        .metadata
        .finalizers
        .unwrap()
        .contains(&FINALIZER_IMPORT_CLEANUP.to_string()));
    assert!(hub
        .memory()
        .contains(&ObjectKey::of::<ServiceAccount>(Some("c1"), "c1-bootstrap-sa")));
    assert!(hub
        .memory()
        .contains(&ObjectKey::of::<Secret>(Some("c1"), "c1-bootstrap-sa-token")));

    let import: Secret = from_dynamic(
        hub.memory()
            .snapshot(&ObjectKey::of::<Secret>(Some("c1"), "c1-import"))
            .unwrap(),
    )
    .unwrap();
    let data = import.data.unwrap();
    assert!(!data[IMPORT_SECRET_CRDS_KEY].0.is_empty());
    assert!(!data[IMPORT_SECRET_MANIFESTS_KEY].0.is_empty());

    assert!(hub.memory().keys_of_kind("ManifestWork").is_empty());
    assert_eq!(hub.remote.calls(), 0);
}

#[tokio::test]
async fn test_auto_import_applies_bundle_through_remote_store() {
    // Arrange
    let hub = Hub::new();
    hub.seed(&managed_cluster("c1", &[(AUTO_IMPORT_RETRY_LABEL, "0")], None));
    hub.seed(&auto_import_secret("c1"));

    // Act
    let outcome = reconcile_managed_cluster(&hub.ctx, "c1").await.unwrap();

    // Assert
    assert_eq!(outcome, ReconcileOutcome::Done);
    assert_eq!(hub.remote.calls(), 1);
    let remote = &hub.remote.store;
    assert_eq!(remote.keys_of_kind("CustomResourceDefinition").len(), 1);
    assert_eq!(remote.keys_of_kind("Klusterlet").len(), 1);
    assert_eq!(remote.keys_of_kind("Deployment").len(), 1);
}

#[tokio::test]
async fn test_foreign_finalizer_holds_teardown_without_writes() {
    // Arrange
    let hub = Hub::new();
    let mut cluster = managed_cluster("c1", &[], Some("True"));
    cluster.metadata.finalizers = Some(vec![
        FINALIZER_IMPORT_CLEANUP.to_string(),
        "example.com/unrelated".to_string(),
    ]);
    hub.seed(&cluster);
    hub.memory()
        .delete(&ObjectKey::of::<ManagedCluster>(None, "c1"))
        .await
        .unwrap();
    hub.memory().reset_writes();

    // Act
    let outcome = reconcile_managed_cluster(&hub.ctx, "c1").await.unwrap();

    // Assert
    assert_eq!(outcome, requeue(1));
    assert_eq!(hub.memory().writes(), 0);
}

#[tokio::test]
async fn test_second_pass_is_a_no_op() {
    // Arrange
    let hub = Hub::new();
    hub.seed(&managed_cluster("c1", &[], Some("True")));
    reconcile_managed_cluster(&hub.ctx, "c1").await.unwrap();
    assert_eq!(hub.memory().keys_of_kind("ManifestWork").len(), 2);
    hub.memory().reset_writes();

    // Act
    let outcome = reconcile_managed_cluster(&hub.ctx, "c1").await.unwrap();

    // Assert
    assert_eq!(outcome, ReconcileOutcome::Done);
    assert_eq!(hub.memory().writes(), 0);
}

#[tokio::test]
async fn test_self_managed_hub_applies_bundle_locally() {
    // Arrange
    let hub = Hub::new();
    hub.seed(&managed_cluster(
        "local-cluster",
        &[(SELF_MANAGED_LABEL, "true")],
        Some("True"),
    ));

    // Act
    let outcome = reconcile_managed_cluster(&hub.ctx, "local-cluster")
        .await
        .unwrap();

    // Assert
    assert_eq!(outcome, ReconcileOutcome::Done);
    assert!(hub.memory().keys_of_kind("ManifestWork").is_empty());
    assert_eq!(hub.memory().keys_of_kind("Klusterlet").len(), 1);
    assert_eq!(hub.remote.calls(), 0);
}

#[tokio::test]
async fn test_uninstalled_provisioning_record_delays_distribution() {
    // Arrange
    let hub = Hub::new();
    hub.seed(&managed_cluster("c1", &[], Some("True")));
    hub.seed(&provisioning_record(false));

    // Act
    let outcome = reconcile_managed_cluster(&hub.ctx, "c1").await.unwrap();

    // Assert
    assert_eq!(outcome, requeue(60));
    assert!(hub.memory().keys_of_kind("ManifestWork").is_empty());
    assert!(hub.memory().keys_of_kind("SelectorSyncSet").is_empty());

    // Act: the install completes
    hub.seed(&provisioning_record(true));
    let outcome = reconcile_managed_cluster(&hub.ctx, "c1").await.unwrap();

    // Assert
    assert_eq!(outcome, ReconcileOutcome::Done);
    assert_eq!(hub.memory().keys_of_kind("SelectorSyncSet").len(), 1);
}

#[tokio::test]
async fn test_offline_cluster_is_torn_down_in_one_pass() {
    // Arrange: an imported cluster whose agent holds its works, plus an add-on work
    let hub = Hub::new();
    hub.seed(&managed_cluster("c1", &[], Some("True")));
    reconcile_managed_cluster(&hub.ctx, "c1").await.unwrap();
    let mut add_on = ManifestWork::new("c1-addon-search", ManifestWorkSpec::default());
    add_on.metadata.namespace = Some("c1".to_string());
    hub.seed(&add_on);
    hold_works(&hub);
    delete_cluster(&hub, "False").await;

    // Act
    let outcome = reconcile_managed_cluster(&hub.ctx, "c1").await.unwrap();

    // Assert: works evicted, finalizers released
    assert_eq!(outcome, requeue(5));
    assert!(hub.memory().keys_of_kind("ManifestWork").is_empty());
    assert!(!hub
        .memory()
        .contains(&ObjectKey::of::<ManagedCluster>(None, "c1")));

    // Act: the follow-up pass finds the cluster gone
    let outcome = reconcile_managed_cluster(&hub.ctx, "c1").await.unwrap();

    // Assert
    assert_eq!(outcome, ReconcileOutcome::Done);
    assert!(!hub
        .memory()
        .contains(&ObjectKey::of::<Namespace>(None, "c1")));
}

#[tokio::test]
async fn test_reachable_cluster_waits_for_agent_before_release() {
    // Arrange
    let hub = Hub::new();
    hub.seed(&managed_cluster("c1", &[], Some("True")));
    reconcile_managed_cluster(&hub.ctx, "c1").await.unwrap();
    let mut cluster = hub.cluster("c1");
    cluster
        .metadata
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(FINALIZER_REGISTRATION_CLEANUP.to_string());
    hub.seed(&cluster);
    hold_works(&hub);
    delete_cluster(&hub, "True").await;

    // Act
    let outcome = reconcile_managed_cluster(&hub.ctx, "c1").await.unwrap();

    // Assert: deletion requested, agent has not acknowledged yet
    assert_eq!(outcome, requeue(60));
    let works = hub.memory().keys_of_kind("ManifestWork");
    assert_eq!(works.len(), 2);
    for key in &works {
        let work = hub.memory().snapshot(key).unwrap();
        assert!(work.metadata.deletion_timestamp.is_some());
    }

    // Act: the agent removes the works
    for key in &works {
        let mut work = hub.memory().snapshot(key).unwrap();
        work.metadata.finalizers = None;
        hub.memory().update(work).await.unwrap();
    }
    let outcome = reconcile_managed_cluster(&hub.ctx, "c1").await.unwrap();

    // Assert
    assert_eq!(outcome, requeue(5));
    assert!(!hub
        .memory()
        .contains(&ObjectKey::of::<ManagedCluster>(None, "c1")));
}
