//! Generic reconciliation of PubSub-backed resources
//!
//! One pass over a [`PubSubable`] resource:
//!
//! 1. resets member conditions to Unknown when the generation moved on;
//! 2. validates the resource and stops with `Ready=False` if it is invalid;
//! 3. derives the desired Topic and PullSubscription;
//! 4. ensures both through the [`Provisioner`] concurrently;
//! 5. mirrors each dependent's Ready onto `TopicReady` /
//!    `PullSubscriptionReady` and recomputes the aggregate `Ready`;
//! 6. rewrites the derived status identifiers.
//!
//! The pass only mutates the resource's in-memory status. Persisting it is up
//! to the caller, guided by [`ReconcileOutcome::status_changed`].

use crate::conditions::{
    build_condition, preserve_transition_times, set_condition, Condition, ConditionStatus,
    CONDITION_PULL_SUBSCRIPTION_READY, CONDITION_TOPIC_READY,
};
use crate::crd::{
    ModeType, PropagationPolicy, PubSubStatus, PullSubscription, PullSubscriptionSpec, Topic,
    TopicSpec, Validate,
};
use crate::duck::PubSubable;
use crate::error::Result;
use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

pub const REASON_SPEC_INVALID: &str = "SpecInvalid";
pub const REASON_GENERATION_CHANGED: &str = "GenerationChanged";
pub const REASON_TOPIC_NOT_READY: &str = "TopicNotReady";
pub const REASON_TOPIC_RECONCILE_FAILED: &str = "TopicReconcileFailed";
pub const REASON_PULL_SUBSCRIPTION_NOT_READY: &str = "PullSubscriptionNotReady";
pub const REASON_PULL_SUBSCRIPTION_RECONCILE_FAILED: &str = "PullSubscriptionReconcileFailed";

pub const LABEL_SOURCE_NAME: &str = "events.cloud.google.com/source-name";
pub const LABEL_SOURCE_KIND: &str = "events.cloud.google.com/source-kind";
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const MANAGER_NAME: &str = "pubsub-source-operator";

/// Creates, updates and deletes the dependents of a PubSub-backed resource.
///
/// `ensure_*` creates the object if absent and brings it to the desired spec
/// if it drifted, returning the object as observed afterwards.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn ensure_topic(&self, desired: &Topic) -> Result<Topic>;

    async fn ensure_pull_subscription(&self, desired: &PullSubscription)
        -> Result<PullSubscription>;

    async fn delete_topic(&self, namespace: &str, name: &str) -> Result<()>;

    async fn delete_pull_subscription(&self, namespace: &str, name: &str) -> Result<()>;
}

/// Where a pass ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    /// The resource is being deleted; nothing was touched
    Deleted,
    /// Validation failed; no dependents were provisioned
    SpecInvalid,
    /// Both dependents report Ready
    Ready,
    /// At least one dependent is not Ready yet, or failed
    NotReady,
}

/// Result of a single reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub state: PassState,
    /// The resource's status differs from what it was before the pass
    pub status_changed: bool,
    /// A dependent failed to provision and the pass should be retried
    pub requeue: bool,
}

/// Reconciles any [`PubSubable`] kind against a [`Provisioner`].
pub struct PubSubReconciler<P> {
    provisioner: P,
}

impl<P: Provisioner> PubSubReconciler<P> {
    pub fn new(provisioner: P) -> Self {
        Self { provisioner }
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    /// Runs one pass over `obj`, updating its status in place.
    #[instrument(skip_all, fields(kind = %K::kind(&()), name = %obj.name_any()))]
    pub async fn reconcile<K>(&self, obj: &mut K) -> ReconcileOutcome
    where
        K: PubSubable + Validate + Send + Sync,
    {
        if obj.meta().deletion_timestamp.is_some() {
            debug!("Resource is being deleted, skipping reconcile");
            return ReconcileOutcome {
                state: PassState::Deleted,
                status_changed: false,
                requeue: false,
            };
        }

        let set = obj.condition_set();
        let generation = obj.meta().generation;
        let before = obj.pubsub_status().cloned().unwrap_or_default();
        let mut status = before.clone();

        set.initialize(&mut status.conditions);
        if status.observed_generation != generation {
            debug!(
                observed = ?status.observed_generation,
                generation = ?generation,
                "Generation changed, resetting dependent conditions"
            );
            set.reset(
                &mut status.conditions,
                REASON_GENERATION_CHANGED,
                "Waiting for dependents to observe the new generation",
            );
        }

        if let Err(err) = obj.validate() {
            warn!(error = %err, "Spec is invalid");
            set.mark_not_ready(&mut status.conditions, REASON_SPEC_INVALID, &err.to_string());
            status.observed_generation = generation;
            return commit(obj, &before, status, PassState::SpecInvalid, false);
        }

        let topic_id = topic_id(obj);
        let desired_topic = desired_topic(obj, &topic_id);
        let desired_subscription = desired_pull_subscription(obj, &topic_id);

        let (topic, subscription) = futures::join!(
            self.provisioner.ensure_topic(&desired_topic),
            self.provisioner.ensure_pull_subscription(&desired_subscription),
        );

        let mut requeue = false;

        let topic_status = match &topic {
            Ok(t) => dependent_ready(
                t.status.as_ref().and_then(|s| s.ready_condition()),
                t.status.as_ref().and_then(|s| s.observed_generation) != t.metadata.generation,
                REASON_TOPIC_NOT_READY,
                "Topic",
            ),
            Err(e) => {
                warn!(error = %e, "Failed to reconcile Topic");
                requeue = true;
                (
                    ConditionStatus::False,
                    REASON_TOPIC_RECONCILE_FAILED.to_string(),
                    format!("Failed to reconcile Topic: {}", e),
                )
            }
        };
        set_condition(
            &mut status.conditions,
            build_condition(
                CONDITION_TOPIC_READY,
                topic_status.0,
                &topic_status.1,
                &topic_status.2,
            ),
        );

        let subscription_status = match &subscription {
            Ok(ps) => dependent_ready(
                ps.status.as_ref().and_then(|s| s.ready_condition()),
                ps.status.as_ref().and_then(|s| s.observed_generation) != ps.metadata.generation,
                REASON_PULL_SUBSCRIPTION_NOT_READY,
                "PullSubscription",
            ),
            Err(e) => {
                warn!(error = %e, "Failed to reconcile PullSubscription");
                requeue = true;
                (
                    ConditionStatus::False,
                    REASON_PULL_SUBSCRIPTION_RECONCILE_FAILED.to_string(),
                    format!("Failed to reconcile PullSubscription: {}", e),
                )
            }
        };
        set_condition(
            &mut status.conditions,
            build_condition(
                CONDITION_PULL_SUBSCRIPTION_READY,
                subscription_status.0,
                &subscription_status.1,
                &subscription_status.2,
            ),
        );
        set.recompute_ready(&mut status.conditions);

        // IDs stay as last seen when the call failed
        if let Ok(t) = topic {
            let observed = t.status.unwrap_or_default();
            status.project_id = observed.project_id;
            status.topic_id = observed.topic_id;
        }
        if let Ok(ps) = subscription {
            let observed = ps.status.unwrap_or_default();
            status.sink_uri = observed.sink_uri;
            status.subscription_id = observed.subscription_id;
        }

        status.observed_generation = generation;

        let state = if set.is_ready(&status.conditions) {
            PassState::Ready
        } else {
            PassState::NotReady
        };
        commit(obj, &before, status, state, requeue)
    }

    /// Deletes both dependents of `obj`.
    #[instrument(skip_all, fields(kind = %K::kind(&()), name = %obj.name_any()))]
    pub async fn finalize<K>(&self, obj: &K) -> Result<()>
    where
        K: PubSubable + Send + Sync,
    {
        let namespace = obj.namespace().unwrap_or_default();
        let name = obj.name_any();
        self.provisioner
            .delete_pull_subscription(&namespace, &name)
            .await?;
        self.provisioner.delete_topic(&namespace, &name).await?;
        info!("Deleted Topic and PullSubscription");
        Ok(())
    }
}

fn commit<K: PubSubable>(
    obj: &mut K,
    before: &PubSubStatus,
    mut status: PubSubStatus,
    state: PassState,
    requeue: bool,
) -> ReconcileOutcome {
    preserve_transition_times(&before.conditions, &mut status.conditions);
    let status_changed = obj.pubsub_status().is_none() || *before != status;
    if status_changed {
        *obj.pubsub_status_mut() = status;
    }
    ReconcileOutcome {
        state,
        status_changed,
        requeue,
    }
}

/// Translates a dependent's Ready condition into member condition fields.
///
/// A dependent with no Ready condition yet is Unknown, never False. So is one
/// whose status was computed for an older generation of its spec.
fn dependent_ready(
    ready: Option<&Condition>,
    stale: bool,
    not_ready_reason: &str,
    kind: &str,
) -> (ConditionStatus, String, String) {
    match ready {
        Some(_) if stale => (
            ConditionStatus::Unknown,
            not_ready_reason.to_string(),
            format!("{} has not observed the latest spec", kind),
        ),
        Some(c) => (
            c.status,
            c.reason.clone().unwrap_or_default(),
            c.message.clone().unwrap_or_default(),
        ),
        None => (
            ConditionStatus::Unknown,
            not_ready_reason.to_string(),
            format!("{} has not yet reported readiness", kind),
        ),
    }
}

/// Pub/Sub topic ID for `obj`: `<kind>-<uid>`.
pub fn topic_id<K: PubSubable>(obj: &K) -> String {
    let kind = K::kind(&()).to_lowercase();
    match obj.meta().uid.as_deref() {
        Some(uid) => format!("{}-{}", kind, uid),
        None => format!(
            "{}-{}-{}",
            kind,
            obj.namespace().unwrap_or_default(),
            obj.name_any()
        ),
    }
}

fn dependent_labels<K: PubSubable>(obj: &K) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_SOURCE_NAME.to_string(), obj.name_any()),
        (LABEL_SOURCE_KIND.to_string(), K::kind(&()).to_lowercase()),
        (LABEL_MANAGED_BY.to_string(), MANAGER_NAME.to_string()),
    ])
}

/// Topic owned by `obj`, named after it.
pub fn desired_topic<K: PubSubable>(obj: &K, topic_id: &str) -> Topic {
    let spec = obj.pubsub_spec();
    let mut topic = Topic::new(
        &obj.name_any(),
        TopicSpec {
            secret: obj.topic_secret().cloned(),
            project: spec.project.clone(),
            topic: topic_id.to_string(),
            propagation_policy: Some(PropagationPolicy::CreateDelete),
        },
    );
    topic.metadata.namespace = obj.namespace();
    topic.metadata.labels = Some(dependent_labels(obj));
    topic.metadata.owner_references = Some(vec![obj.owner_reference()]);
    topic
}

/// PullSubscription owned by `obj`, delivering `topic_id` to its sink.
pub fn desired_pull_subscription<K: PubSubable>(obj: &K, topic_id: &str) -> PullSubscription {
    let spec = obj.pubsub_spec();
    let mut subscription = PullSubscription::new(
        &obj.name_any(),
        PullSubscriptionSpec {
            secret: obj.pull_subscription_secret().cloned(),
            project: spec.project.clone(),
            topic: topic_id.to_string(),
            sink: spec.sink.clone(),
            ce_overrides: spec.ce_overrides.clone(),
            mode: Some(ModeType::CloudEventsBinary),
        },
    );
    subscription.metadata.namespace = obj.namespace();
    subscription.metadata.labels = Some(dependent_labels(obj));
    subscription.metadata.owner_references = Some(vec![obj.owner_reference()]);
    subscription
}
