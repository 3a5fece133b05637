// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::crd::{ManagedCluster, ManagedClusterSpec, ManifestWork, ManifestWorkSpec};
    use crate::constants::AUTO_IMPORT_SECRET_NAME;
    use crate::events::{
        dispatch, owning_cluster, ChangeKind, Dispatch, SpecChangeFilter, WatchEvent, WatchedKind,
    };
    use crate::labels::CLUSTER_NAME_LABEL;
    use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use k8s_openapi::api::rbac::v1::ClusterRole;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn cluster_label(cluster: &str) -> Option<BTreeMap<String, String>> {
        Some(BTreeMap::from([(
            CLUSTER_NAME_LABEL.to_string(),
            cluster.to_string(),
        )]))
    }

    #[test]
    fn test_managed_cluster_owns_itself() {
        let cluster = ManagedCluster::new("c1", ManagedClusterSpec::default());

        let event = WatchEvent::applied(WatchedKind::ManagedCluster, &cluster);

        assert_eq!(owning_cluster(&event), Some("c1".to_string()));
        assert_eq!(dispatch(&event), Dispatch::Reconcile("c1".to_string()));
    }

    #[test]
    fn test_managed_cluster_delete_routes_to_absent() {
        let cluster = ManagedCluster::new("c1", ManagedClusterSpec::default());

        let event = WatchEvent::new(WatchedKind::ManagedCluster, ChangeKind::Deleted, &cluster);

        assert_eq!(dispatch(&event), Dispatch::Absent("c1".to_string()));
    }

    #[test]
    fn test_label_takes_precedence_over_namespace() {
        let mut work = ManifestWork::new("w", ManifestWorkSpec::default());
        work.metadata.namespace = Some("other".to_string());
        work.metadata.labels = cluster_label("c1");

        let event = WatchEvent::applied(WatchedKind::ManifestWork, &work);

        assert_eq!(owning_cluster(&event), Some("c1".to_string()));
    }

    #[test]
    fn test_namespaced_child_falls_back_to_namespace() {
        let sa = ServiceAccount {
            metadata: ObjectMeta {
                name: Some("c2-bootstrap-sa".to_string()),
                namespace: Some("c2".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let event = WatchEvent::applied(WatchedKind::ServiceAccount, &sa);

        assert_eq!(dispatch(&event), Dispatch::Reconcile("c2".to_string()));
    }

    #[test]
    fn test_unlabelled_cluster_scoped_child_is_ignored() {
        let role = ClusterRole {
            metadata: ObjectMeta {
                name: Some("unrelated".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let event = WatchEvent::applied(WatchedKind::ClusterRole, &role);

        assert_eq!(owning_cluster(&event), None);
        assert_eq!(dispatch(&event), Dispatch::Ignore);
    }

    #[test]
    fn test_labelled_cluster_scoped_child_maps_to_cluster() {
        let role = ClusterRole {
            metadata: ObjectMeta {
                name: Some("system:open-cluster-management:managedcluster:bootstrap:c3".to_string()),
                labels: cluster_label("c3"),
                ..Default::default()
            },
            ..Default::default()
        };

        let event = WatchEvent::new(WatchedKind::ClusterRole, ChangeKind::Deleted, &role);

        assert_eq!(dispatch(&event), Dispatch::Reconcile("c3".to_string()));
    }

    #[test]
    fn test_namespaced_kinds() {
        assert!(WatchedKind::ManifestWork.is_namespaced());
        assert!(WatchedKind::Secret.is_namespaced());
        assert!(!WatchedKind::SelectorSyncSet.is_namespaced());
        assert!(!WatchedKind::ClusterRoleBinding.is_namespaced());
    }

    #[test]
    fn test_user_supplied_auto_import_secret_maps_to_its_namespace() {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(AUTO_IMPORT_SECRET_NAME.to_string()),
                namespace: Some("c2".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let event = WatchEvent::applied(WatchedKind::Secret, &secret);

        assert_eq!(dispatch(&event), Dispatch::Reconcile("c2".to_string()));
    }

    fn work(generation: i64) -> ManifestWork {
        let mut work = ManifestWork::new("c1-klusterlet", ManifestWorkSpec::default());
        work.metadata.namespace = Some("c1".to_string());
        work.metadata.generation = Some(generation);
        work
    }

    #[test]
    fn test_spec_change_filter_drops_status_only_updates() {
        let mut filter = SpecChangeFilter::default();

        assert!(filter.admit(ChangeKind::Applied, &work(1)));
        assert!(!filter.admit(ChangeKind::Applied, &work(1)));
        assert!(filter.admit(ChangeKind::Applied, &work(2)));
        assert!(!filter.admit(ChangeKind::Applied, &work(2)));
    }

    #[test]
    fn test_spec_change_filter_passes_deletion_request_and_removal() {
        let mut filter = SpecChangeFilter::default();
        filter.admit(ChangeKind::Applied, &work(1));
        let mut terminating = work(1);
        let deleted_at: Time = serde_json::from_value(serde_json::json!("2025-01-01T00:00:00Z")).unwrap();
        terminating.metadata.deletion_timestamp = Some(deleted_at);

        assert!(filter.admit(ChangeKind::Applied, &terminating));
        assert!(!filter.admit(ChangeKind::Applied, &terminating));
        assert!(filter.admit(ChangeKind::Deleted, &terminating));
        assert!(filter.admit(ChangeKind::Applied, &work(1)));
    }

    fn work_with_uid(uid: &str, generation: i64) -> ManifestWork {
        let mut work = work(generation);
        work.metadata.uid = Some(uid.to_string());
        work
    }

    #[test]
    fn test_spec_change_filter_admits_recreated_work_without_seeing_delete() {
        let mut filter = SpecChangeFilter::default();
        assert!(filter.admit(ChangeKind::Applied, &work_with_uid("uid-old", 1)));

        // Deleted and recreated while the watch was down: no Deleted event arrives
        let admitted = filter.admit(ChangeKind::Applied, &work_with_uid("uid-new", 1));

        assert!(admitted);
        assert!(!filter.admit(ChangeKind::Applied, &work_with_uid("uid-new", 1)));
    }

    #[test]
    fn test_spec_change_filter_reset_forgets_unobserved_deletions() {
        let mut filter = SpecChangeFilter::default();
        filter.admit(ChangeKind::Applied, &work_with_uid("uid-a", 1));
        filter.admit(ChangeKind::Applied, &work_with_uid("uid-b", 3));
        assert_eq!(filter.len(), 2);

        filter.reset();

        assert!(filter.is_empty());
        assert!(filter.admit(ChangeKind::Applied, &work_with_uid("uid-b", 3)));
        assert_eq!(filter.len(), 1);
    }
}
