// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `credentials.rs`

#[cfg(test)]
mod tests {
    use super::super::{ensure_bootstrap_identity, service_account_name, token_secret_name};
    use crate::constants::SERVICE_ACCOUNT_TOKEN_TYPE;
    use crate::labels::{CLUSTER_NAME_LABEL, SERVICE_ACCOUNT_NAME_ANNOTATION};
    use crate::reconcilers::test_fixtures::{cluster, issue_token, seed};
    use crate::store::{from_dynamic, MemoryStore, ObjectKey};
    use k8s_openapi::api::core::v1::{Secret, ServiceAccount};

    #[test]
    fn test_identity_names() {
        assert_eq!(service_account_name("c1"), "c1-bootstrap-sa");
        assert_eq!(token_secret_name("c1"), "c1-bootstrap-sa-token");
    }

    #[tokio::test]
    async fn test_creates_service_account_and_token_secret() {
        // Arrange
        let store = MemoryStore::new();
        let cluster = seed(&store, &cluster("c1", &[], None));

        // Act: no token issued yet
        let err = ensure_bootstrap_identity(&store, &cluster).await.unwrap_err();

        // Assert
        assert!(err.is_not_found());
        let sa = store
            .snapshot(&ObjectKey::of::<ServiceAccount>(Some("c1"), "c1-bootstrap-sa"))
            .unwrap();
        assert_eq!(sa.metadata.labels.unwrap()[CLUSTER_NAME_LABEL], "c1");

        let secret: Secret = from_dynamic(
            store
                .snapshot(&ObjectKey::of::<Secret>(Some("c1"), "c1-bootstrap-sa-token"))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(secret.type_.as_deref(), Some(SERVICE_ACCOUNT_TOKEN_TYPE));
        assert_eq!(
            secret.metadata.annotations.unwrap()[SERVICE_ACCOUNT_NAME_ANNOTATION],
            "c1-bootstrap-sa"
        );
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn test_returns_identity_once_token_issued() {
        // Arrange
        let store = MemoryStore::new();
        let cluster = seed(&store, &cluster("c1", &[], None));
        let _ = ensure_bootstrap_identity(&store, &cluster).await;
        issue_token(&store, "c1");
        store.reset_writes();

        // Act
        let identity = ensure_bootstrap_identity(&store, &cluster).await.unwrap();

        // Assert
        assert_eq!(identity.token(), b"token-abc");
        assert!(!identity.ca_cert().is_empty());
        assert_eq!(
            identity.service_account.metadata.name.as_deref(),
            Some("c1-bootstrap-sa")
        );
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_existing_objects_are_left_untouched() {
        let store = MemoryStore::new();
        let cluster = seed(&store, &cluster("c1", &[], None));
        issue_token(&store, "c1");
        let _ = ensure_bootstrap_identity(&store, &cluster).await.unwrap();
        store.reset_writes();

        ensure_bootstrap_identity(&store, &cluster).await.unwrap();

        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_unpersisted_cluster_is_rejected() {
        let store = MemoryStore::new();

        let err = ensure_bootstrap_identity(&store, &cluster("c1", &[], None))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("uid"));
        assert_eq!(store.writes(), 0);
    }
}
