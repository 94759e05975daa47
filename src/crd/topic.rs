//! Topic Custom Resource Definition
//!
//! A Topic represents a Cloud Pub/Sub topic. Sources create one per instance;
//! the GCP-side topic itself is provisioned by whichever controller owns this
//! kind.

use crate::conditions::{get_condition, Condition, CONDITION_READY};
use crate::crd::duck::SecretKeySelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Topic is the Schema for the topics API
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "pubsub.cloud.google.com",
    version = "v1alpha1",
    kind = "Topic",
    namespaced,
    status = "TopicStatus",
    printcolumn = r#"{"name":"Topic","type":"string","jsonPath":".spec.topic"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TopicSpec {
    /// Credential for the Pub/Sub API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretKeySelector>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Pub/Sub topic ID
    pub topic: String,

    /// Whether the controller may create and delete the GCP topic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub propagation_policy: Option<PropagationPolicy>,
}

/// Lifecycle coupling between the Topic resource and the GCP topic
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum PropagationPolicy {
    /// Create if absent, never delete
    CreateNoDelete,
    /// Create if absent, delete together with the resource
    CreateDelete,
    /// Only use an existing topic
    NoCreateNoDelete,
}

/// Status of the Topic
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TopicStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
}

impl TopicStatus {
    pub fn ready_condition(&self) -> Option<&Condition> {
        get_condition(&self.conditions, CONDITION_READY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::Resource;

    #[test]
    fn test_topic_api_identity() {
        assert_eq!(Topic::api_version(&()), "pubsub.cloud.google.com/v1alpha1");
        assert_eq!(Topic::kind(&()), "Topic");
    }

    #[test]
    fn test_topic_spec_from_json() {
        let json = r#"{"topic": "storage-1234", "propagationPolicy": "CreateDelete"}"#;
        let spec: TopicSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.topic, "storage-1234");
        assert_eq!(spec.propagation_policy, Some(PropagationPolicy::CreateDelete));
        assert!(spec.secret.is_none());
    }
}
