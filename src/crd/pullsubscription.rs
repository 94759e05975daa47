//! PullSubscription Custom Resource Definition
//!
//! A PullSubscription pulls messages from a Pub/Sub topic and delivers them to
//! a sink as CloudEvents.

use crate::conditions::{get_condition, Condition, CONDITION_READY};
use crate::crd::duck::{CloudEventOverrides, Destination, SecretKeySelector};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// PullSubscription is the Schema for the pullsubscriptions API
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "pubsub.cloud.google.com",
    version = "v1alpha1",
    kind = "PullSubscription",
    namespaced,
    status = "PullSubscriptionStatus",
    printcolumn = r#"{"name":"Topic","type":"string","jsonPath":".spec.topic"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PullSubscriptionSpec {
    /// Credential for the Pub/Sub API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretKeySelector>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Pub/Sub topic ID to subscribe to
    pub topic: String,

    /// Where to deliver pulled messages
    pub sink: Destination,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ce_overrides: Option<CloudEventOverrides>,

    /// Encoding of delivered events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ModeType>,
}

/// How pulled messages are encoded on delivery
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ModeType {
    CloudEventsBinary,
    CloudEventsStructured,
    PushCompatible,
}

/// Status of the PullSubscription
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PullSubscriptionStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
}

impl PullSubscriptionStatus {
    pub fn ready_condition(&self) -> Option<&Condition> {
        get_condition(&self.conditions, CONDITION_READY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_subscription_spec_from_json() {
        let json = r#"{
            "topic": "storage-1234",
            "sink": {"uri": "http://sink.default.svc"},
            "mode": "CloudEventsBinary"
        }"#;
        let spec: PullSubscriptionSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.topic, "storage-1234");
        assert_eq!(spec.sink.uri.as_deref(), Some("http://sink.default.svc"));
        assert_eq!(spec.mode, Some(ModeType::CloudEventsBinary));
    }

    #[test]
    fn test_status_ready_condition() {
        let status: PullSubscriptionStatus = serde_json::from_str(
            r#"{"conditions": [{"type": "Ready", "status": "True"}], "subscriptionId": "sub-1"}"#,
        )
        .unwrap();
        assert!(status.ready_condition().is_some_and(Condition::is_true));
        assert_eq!(status.subscription_id.as_deref(), Some("sub-1"));
    }
}
