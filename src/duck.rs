//! The PubSubable capability contract
//!
//! Any resource kind that embeds [`PubSubSpec`] and [`PubSubStatus`] and
//! implements [`PubSubable`] can be reconciled by
//! [`crate::reconciler::PubSubReconciler`] without kind-specific code.

use crate::conditions::ConditionSet;
use crate::crd::{PubSubSpec, PubSubStatus, SecretKeySelector};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

/// A resource whose event delivery runs through a Topic and a PullSubscription.
pub trait PubSubable: Resource<DynamicType = ()> + Sized {
    /// Reference making this resource the controlling owner of its dependents.
    fn owner_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: Self::api_version(&()).to_string(),
            kind: Self::kind(&()).to_string(),
            name: self.name_any(),
            uid: self.meta().uid.clone().unwrap_or_default(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }

    fn pubsub_spec(&self) -> &PubSubSpec;

    /// `None` until the resource has been reconciled at least once.
    fn pubsub_status(&self) -> Option<&PubSubStatus>;

    fn pubsub_status_mut(&mut self) -> &mut PubSubStatus;

    /// Must contain `TopicReady` and `PullSubscriptionReady`.
    fn condition_set(&self) -> &'static ConditionSet;

    /// Credential for the Topic.
    fn topic_secret(&self) -> Option<&SecretKeySelector> {
        self.pubsub_spec().secret.as_ref()
    }

    /// Credential for the PullSubscription.
    fn pull_subscription_secret(&self) -> Option<&SecretKeySelector> {
        self.pubsub_spec().secret.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{CONDITION_PULL_SUBSCRIPTION_READY, CONDITION_TOPIC_READY};
    use crate::crd::{Storage, StorageSpec};

    fn storage() -> Storage {
        let mut s = Storage::new("photos", StorageSpec::default());
        s.metadata.namespace = Some("default".to_string());
        s.metadata.uid = Some("c0ffee".to_string());
        s
    }

    #[test]
    fn test_owner_reference_is_controller() {
        let owner = storage().owner_reference();
        assert_eq!(owner.api_version, "events.cloud.google.com/v1alpha1");
        assert_eq!(owner.kind, "Storage");
        assert_eq!(owner.name, "photos");
        assert_eq!(owner.uid, "c0ffee");
        assert_eq!(owner.controller, Some(true));
    }

    #[test]
    fn test_condition_set_declares_dependents() {
        let set = storage().condition_set();
        assert!(set.contains(CONDITION_TOPIC_READY));
        assert!(set.contains(CONDITION_PULL_SUBSCRIPTION_READY));
    }
}
