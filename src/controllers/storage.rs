//! Storage Controller
//!
//! Watches Storage sources together with the Topics and PullSubscriptions they
//! own, and drives each source through [`PubSubReconciler`].

use crate::controllers::{error_policy_backoff, KubeProvisioner};
use crate::crd::{PullSubscription, SetDefaults, SourceDefaults, Storage, Topic};
use crate::error::{OperatorError, Result};
use crate::reconciler::{PassState, PubSubReconciler, ReconcileOutcome};
use futures::StreamExt;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::Config;
use kube::{Client, Resource, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Finalizer guarding dependent cleanup
pub const STORAGE_FINALIZER: &str = "events.cloud.google.com/pubsub-source-cleanup";

/// Runtime settings shared by the source controllers
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Namespace to watch, or all namespaces when `None`
    pub namespace: Option<String>,
    pub defaults: SourceDefaults,
    /// Resync interval after a successful pass
    pub requeue_interval: Duration,
    /// Retry interval after a failed pass
    pub error_requeue_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            defaults: SourceDefaults::default(),
            requeue_interval: Duration::from_secs(300),
            error_requeue_interval: Duration::from_secs(30),
        }
    }
}

impl ControllerConfig {
    /// Picks the next action for a completed pass.
    pub fn next_action(&self, outcome: &ReconcileOutcome) -> Action {
        match outcome.state {
            PassState::Deleted | PassState::SpecInvalid => Action::await_change(),
            _ if outcome.requeue => Action::requeue(self.error_requeue_interval),
            _ => Action::requeue(self.requeue_interval),
        }
    }

    fn api<K>(&self, client: Client) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>,
    {
        match &self.namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        }
    }
}

/// Context for the Storage controller
pub struct StorageController {
    client: Client,
    reconciler: PubSubReconciler<KubeProvisioner>,
    config: ControllerConfig,
}

impl StorageController {
    pub fn new(client: Client, config: ControllerConfig) -> Self {
        Self {
            reconciler: PubSubReconciler::new(KubeProvisioner::new(client.clone())),
            client,
            config,
        }
    }

    /// Run the Storage controller until shutdown
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let sources: Api<Storage> = self.config.api(self.client.clone());
        let topics: Api<Topic> = self.config.api(self.client.clone());
        let subscriptions: Api<PullSubscription> = self.config.api(self.client.clone());

        info!(
            namespace = self.config.namespace.as_deref().unwrap_or("*"),
            "Starting Storage controller"
        );

        Controller::new(sources, Config::default())
            .owns(topics, Config::default())
            .owns(subscriptions, Config::default())
            .shutdown_on_signal()
            .run(
                |storage, ctx| async move { ctx.reconcile(storage).await },
                |storage, error, ctx| {
                    error_policy_backoff(storage, error, ctx.config.error_requeue_interval)
                },
                Arc::clone(&self),
            )
            .for_each(|result| async move {
                match result {
                    Ok((obj, _action)) => {
                        info!("Reconciled Storage: {}", obj.name);
                    }
                    Err(e) => {
                        error!("Reconciliation failed: {:?}", e);
                    }
                }
            })
            .await;

        Ok(())
    }

    async fn reconcile(&self, storage: Arc<Storage>) -> std::result::Result<Action, OperatorError> {
        let name = storage.name_any();
        let namespace = storage
            .namespace()
            .ok_or_else(|| OperatorError::Configuration(format!("Storage {} has no namespace", name)))?;

        info!("Reconciling Storage {}/{}", namespace, name);

        if storage.metadata.deletion_timestamp.is_some() {
            return self.handle_deletion(&storage, &namespace).await;
        }

        self.ensure_finalizer(&storage, &namespace).await?;

        let mut source = (*storage).clone();
        source.set_defaults(&self.config.defaults);

        let outcome = self.reconciler.reconcile(&mut source).await;
        if outcome.status_changed {
            self.patch_status(&source, &namespace).await?;
        }

        match outcome.state {
            PassState::SpecInvalid => warn!("Storage {}/{} has an invalid spec", namespace, name),
            PassState::NotReady if outcome.requeue => {
                warn!("Storage {}/{} has a failed dependent, retrying", namespace, name)
            }
            _ => {}
        }

        Ok(self.config.next_action(&outcome))
    }

    async fn ensure_finalizer(&self, storage: &Storage, namespace: &str) -> Result<()> {
        let finalizers = storage.finalizers();
        if finalizers.iter().any(|f| f == STORAGE_FINALIZER) {
            return Ok(());
        }

        let mut finalizers = finalizers.to_vec();
        finalizers.push(STORAGE_FINALIZER.to_string());

        let sources: Api<Storage> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers
            }
        });
        sources
            .patch(&storage.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        Ok(())
    }

    /// Deletes the dependents, then releases the finalizer
    async fn handle_deletion(
        &self,
        storage: &Storage,
        namespace: &str,
    ) -> std::result::Result<Action, OperatorError> {
        let name = storage.name_any();
        if !storage.finalizers().iter().any(|f| f == STORAGE_FINALIZER) {
            return Ok(Action::await_change());
        }

        info!("Handling deletion of Storage {}/{}", namespace, name);
        self.reconciler.finalize(storage).await?;

        let finalizers: Vec<String> = storage
            .finalizers()
            .iter()
            .filter(|f| f.as_str() != STORAGE_FINALIZER)
            .cloned()
            .collect();

        let sources: Api<Storage> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers
            }
        });
        sources
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        info!("Finalizer removed for Storage {}/{}", namespace, name);
        Ok(Action::await_change())
    }

    async fn patch_status(&self, storage: &Storage, namespace: &str) -> Result<()> {
        let name = storage.name_any();
        let sources: Api<Storage> = Api::namespaced(self.client.clone(), namespace);

        let current = sources.get_opt(&name).await?;
        if !accepts_status_patch(current.as_ref()) {
            debug!("Storage {}/{} went away during the pass, not patching status", namespace, name);
            return Ok(());
        }

        let patch = serde_json::json!({ "status": storage.status });
        sources
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

/// Status is only written back to a source that still exists and is not terminating.
fn accepts_status_patch(current: Option<&Storage>) -> bool {
    current.is_some_and(|s| s.metadata.deletion_timestamp.is_none())
}
