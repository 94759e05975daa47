//! PubSub Source Operator
//!
//! Reconciles event sources that deliver through Cloud Pub/Sub. Each source
//! owns a Topic and a PullSubscription; its Ready condition summarises theirs.
//!
//! ## Custom Resources
//!
//! - `Storage`: Cloud Storage notifications for a bucket
//! - `Topic`: the Pub/Sub topic a source publishes into
//! - `PullSubscription`: delivers the topic's messages to the source's sink
//!
//! ## Example
//!
//! ```yaml
//! apiVersion: events.cloud.google.com/v1alpha1
//! kind: Storage
//! metadata:
//!   name: photos
//! spec:
//!   bucket: my-photos
//!   sink:
//!     ref:
//!       apiVersion: serving.knative.dev/v1
//!       kind: Service
//!       name: event-display
//! ```

pub mod conditions;
pub mod controllers;
pub mod crd;
pub mod duck;
pub mod error;
pub mod field_error;
pub mod reconciler;
pub mod resources;

pub use conditions::{Condition, ConditionSet, ConditionStatus};
pub use controllers::{ControllerConfig, KubeProvisioner, StorageController};
pub use crd::{
    PubSubSpec, PubSubStatus, PullSubscription, SetDefaults, SourceDefaults, Storage,
    StorageSpec, Topic, Validate,
};
pub use duck::PubSubable;
pub use error::{OperatorError, Result};
pub use field_error::FieldError;
pub use reconciler::{PubSubReconciler, Provisioner};
pub use resources::build_resource_requirements;
