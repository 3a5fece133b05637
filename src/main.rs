// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use clusterimport::{
    config::ImportConfig,
    constants::{AUTO_IMPORT_SECRET_NAME, TOKIO_WORKER_THREADS},
    context::Context,
    crd::{ClusterDeployment, ManagedCluster, ManifestWork, SelectorSyncSet},
    events::{dispatch, ChangeKind, Dispatch, SpecChangeFilter, WatchEvent, WatchedKind},
    labels::{CLUSTER_NAME_LABEL, MANAGED_CLUSTER_NAMESPACE_LABEL},
    reconcilers::{
        reconcile_cluster_namespace, reconcile_managed_cluster, ReconcileError, ReconcileOutcome,
    },
    store::{KubeStore, KubeconfigClientFactory},
};
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::{Namespace, Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::{
    runtime::{
        controller::{self, Action},
        reflector::ObjectRef,
        watcher, Controller, WatchStreamExt,
    },
    Api, Client, Resource, ResourceExt,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    let config = ImportConfig::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("clusterimport-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: ImportConfig) -> Result<()> {
    // Respects RUST_LOG (default: info) and RUST_LOG_FORMAT (json|text)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting ManagedCluster import controller");

    debug!("Initializing Kubernetes client");
    let kube_config = kube::Config::infer().await?;
    let config = config.with_default_hub_api_server(&kube_config.cluster_url.to_string());
    config.validate()?;
    let client = Client::try_from(kube_config)?;
    debug!(hub_api_server = ?config.hub_api_server, "Kubernetes client initialized");

    let ctx = Arc::new(Context::new(
        Arc::new(KubeStore::new(client.clone(), config.field_manager.clone())),
        Arc::new(KubeconfigClientFactory::new(config.field_manager.clone())),
        config,
    ));

    // Neither task should ever exit
    tokio::select! {
        result = run_managedcluster_controller(client.clone(), ctx.clone()) => {
            error!("CRITICAL: ManagedCluster controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("ManagedCluster controller exited unexpectedly without error")
        }
        result = run_cluster_namespace_controller(client, ctx) => {
            error!("CRITICAL: cluster namespace controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("cluster namespace controller exited unexpectedly without error")
        }
    }
}

/// Map a child object to the cluster it belongs to.
fn owner_of<K: Resource>(kind: WatchedKind) -> impl Fn(K) -> Option<ObjectRef<ManagedCluster>> {
    move |obj| match dispatch(&WatchEvent::applied(kind, &obj)) {
        Dispatch::Reconcile(name) => Some(ObjectRef::new(&name)),
        Dispatch::Absent(_) | Dispatch::Ignore => None,
    }
}

/// `ManifestWork` objects whose spec changed, or that are being or were deleted.
fn work_spec_changes(
    client: Client,
) -> impl Stream<Item = Result<ManifestWork, watcher::Error>> + Send + 'static {
    let mut filter = SpecChangeFilter::default();
    watcher(Api::<ManifestWork>::all(client), watcher::Config::default())
        .default_backoff()
        .filter_map(move |event| {
            let work = match event {
                Ok(watcher::Event::Apply(work) | watcher::Event::InitApply(work)) => filter
                    .admit(ChangeKind::Applied, &work)
                    .then_some(Ok(work)),
                Ok(watcher::Event::Delete(work)) => {
                    filter.admit(ChangeKind::Deleted, &work);
                    Some(Ok(work))
                }
                Ok(watcher::Event::Init) => {
                    filter.reset();
                    None
                }
                Ok(watcher::Event::InitDone) => None,
                Err(e) => Some(Err(e)),
            };
            futures::future::ready(work)
        })
}

/// Run the `ManagedCluster` controller
async fn run_managedcluster_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting ManagedCluster controller");

    // Core kinds are only watched when they carry our label
    let ours = || watcher::Config::default().labels(CLUSTER_NAME_LABEL);
    // Users create the auto-import secret without our label
    let auto_import_secrets = watcher::Config::default()
        .fields(&format!("metadata.name={AUTO_IMPORT_SECRET_NAME}"));

    Controller::new(Api::<ManagedCluster>::all(client.clone()), watcher::Config::default())
        .with_config(controller::Config::default().concurrency(ctx.config.concurrency))
        .watches_stream(
            work_spec_changes(client.clone()),
            owner_of(WatchedKind::ManifestWork),
        )
        .watches(
            Api::<SelectorSyncSet>::all(client.clone()),
            ours(),
            owner_of(WatchedKind::SelectorSyncSet),
        )
        .watches(
            Api::<ClusterDeployment>::all(client.clone()),
            watcher::Config::default(),
            owner_of(WatchedKind::ClusterDeployment),
        )
        .watches(
            Api::<ServiceAccount>::all(client.clone()),
            ours(),
            owner_of(WatchedKind::ServiceAccount),
        )
        .watches(
            Api::<Secret>::all(client.clone()),
            ours(),
            owner_of(WatchedKind::Secret),
        )
        .watches(
            Api::<Secret>::all(client.clone()),
            auto_import_secrets,
            owner_of(WatchedKind::Secret),
        )
        .watches(
            Api::<ClusterRole>::all(client.clone()),
            ours(),
            owner_of(WatchedKind::ClusterRole),
        )
        .watches(
            Api::<ClusterRoleBinding>::all(client),
            ours(),
            owner_of(WatchedKind::ClusterRoleBinding),
        )
        .run(reconcile_managedcluster_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

fn to_action(outcome: ReconcileOutcome) -> Action {
    match outcome {
        ReconcileOutcome::Done => Action::await_change(),
        ReconcileOutcome::RequeueAfter(delay) => Action::requeue(delay),
    }
}

async fn reconcile_managedcluster_wrapper(
    cluster: Arc<ManagedCluster>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let name = cluster.name_any();
    debug!(cluster = %name, "Reconcile wrapper called for ManagedCluster");

    let outcome = reconcile_managed_cluster(&ctx, &name).await?;
    debug!(cluster = %name, outcome = ?outcome, "Reconciled ManagedCluster");
    Ok(to_action(outcome))
}

fn error_policy<K: ResourceExt>(obj: Arc<K>, err: &ReconcileError, _ctx: Arc<Context>) -> Action {
    warn!(
        object = %obj.name_any(),
        step = %err.step,
        retry_after = ?err.retry_after,
        error = %err.source,
        "Reconcile failed"
    );
    Action::requeue(err.retry_after)
}

/// Run the controller for cluster namespaces.
///
/// The `ManagedCluster` controller never sees a cluster once it is gone from its cache,
/// so the namespace a removed cluster leaves behind is reconciled here. The initial
/// list also picks up namespaces whose cluster was removed while nothing was running.
async fn run_cluster_namespace_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting cluster namespace controller");

    Controller::new(
        Api::<Namespace>::all(client.clone()),
        watcher::Config::default().labels(MANAGED_CLUSTER_NAMESPACE_LABEL),
    )
    .with_config(controller::Config::default().concurrency(ctx.config.concurrency))
    .watches(
        Api::<ManagedCluster>::all(client),
        watcher::Config::default(),
        |cluster: ManagedCluster| Some(ObjectRef::<Namespace>::new(&cluster.name_any())),
    )
    .run(reconcile_namespace_wrapper, error_policy, ctx)
    .for_each(|_| futures::future::ready(()))
    .await;

    Ok(())
}

async fn reconcile_namespace_wrapper(
    namespace: Arc<Namespace>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let name = namespace.name_any();
    debug!(namespace = %name, "Reconcile wrapper called for cluster namespace");

    Ok(to_action(reconcile_cluster_namespace(&ctx, &name).await?))
}
