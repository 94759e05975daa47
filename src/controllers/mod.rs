//! Controllers for the PubSub source operator
//!
//! Each controller watches one source kind plus the dependents it owns and
//! hands every object to the shared reconciler.

mod provisioner;
mod storage;

pub use provisioner::KubeProvisioner;
pub use storage::{ControllerConfig, StorageController, STORAGE_FINALIZER};

use crate::error::OperatorError;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Error policy shared by the controllers: log and retry after `backoff`.
pub(crate) fn error_policy_backoff<K: ResourceExt>(
    obj: Arc<K>,
    error: &OperatorError,
    backoff: Duration,
) -> Action {
    warn!(
        name = %obj.name_any(),
        namespace = obj.namespace().as_deref().unwrap_or_default(),
        error = %error,
        "Reconciliation failed, requeueing in {:?}",
        backoff
    );
    Action::requeue(backoff)
}
