//! Custom Resource Definitions for the PubSub source operator
//!
//! - Storage: a Cloud Storage notification source (reconciled here)
//! - Topic: a Cloud Pub/Sub topic created for each source
//! - PullSubscription: delivers the topic's messages to the source's sink

pub mod defaults;
pub mod duck;
mod pullsubscription;
mod storage;
mod topic;

pub use defaults::{SetDefaults, SourceDefaults};
pub use duck::{CloudEventOverrides, Destination, KReference, PubSubSpec, PubSubStatus, SecretKeySelector};
pub use pullsubscription::{ModeType, PullSubscription, PullSubscriptionSpec, PullSubscriptionStatus};
pub use storage::{Storage, StorageSpec, StorageStatus, EVENT_TYPES, PAYLOAD_FORMATS};
pub use topic::{PropagationPolicy, Topic, TopicSpec, TopicStatus};

use crate::field_error::FieldError;

/// Field presence and shape checks, usable both by the reconciler and by an
/// admission hook. No network access.
pub trait Validate {
    fn validate(&self) -> Result<(), FieldError>;
}
