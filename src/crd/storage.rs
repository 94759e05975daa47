//! Storage Custom Resource Definition
//!
//! A Storage source turns Cloud Storage bucket notifications into CloudEvents.
//! Notifications are published to a Topic and delivered to the sink through a
//! PullSubscription, both managed by the generic PubSub reconciler.

use crate::conditions::{ConditionSet, PUBSUB_CONDITION_SET};
use crate::crd::defaults::{SetDefaults, SourceDefaults};
use crate::crd::duck::{check_secret, PubSubSpec, PubSubStatus, SecretKeySelector};
use crate::crd::Validate;
use crate::duck::PubSubable;
use crate::field_error::FieldError;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Notification payload formats accepted by Cloud Storage
pub const PAYLOAD_FORMATS: [&str; 2] = ["JSON_API_V1", "NONE"];

/// Bucket event types that may be subscribed to
pub const EVENT_TYPES: [&str; 4] = ["finalize", "delete", "archive", "metadataUpdate"];

/// Storage is the Schema for the storages API
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "events.cloud.google.com",
    version = "v1alpha1",
    kind = "Storage",
    namespaced,
    status = "StorageStatus",
    shortname = "gcsstorage",
    printcolumn = r#"{"name":"Bucket","type":"string","jsonPath":".spec.bucket"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Sink, credential and project
    #[serde(flatten)]
    pub pubsub: PubSubSpec,

    /// Bucket whose notifications are delivered
    #[serde(default)]
    pub bucket: String,

    /// Credential for managing the bucket notification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcs_secret: Option<SecretKeySelector>,

    /// Credential the PullSubscription polls with; falls back to `secret`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_subscription_secret: Option<SecretKeySelector>,

    /// Only notify for objects whose name starts with this prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name_prefix: Option<String>,

    /// Notification payload format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_format: Option<String>,

    /// Event types to notify for; all when empty
    #[serde(default)]
    pub event_types: Vec<String>,
}

/// Status of the Storage
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
pub struct StorageStatus {
    #[serde(flatten)]
    pub pubsub: PubSubStatus,
}

impl Validate for StorageSpec {
    fn validate(&self) -> Result<(), FieldError> {
        let mut errs = FieldError::default();

        if self.bucket.is_empty() {
            errs = errs.also(FieldError::missing_field(["bucket"]));
        }

        errs = errs
            .also(self.pubsub.check())
            .also(check_secret(self.gcs_secret.as_ref(), "gcsSecret"))
            .also(check_secret(
                self.pull_subscription_secret.as_ref(),
                "pullSubscriptionSecret",
            ));

        if let Some(format) = self.payload_format.as_deref() {
            if !format.is_empty() && !PAYLOAD_FORMATS.contains(&format) {
                errs = errs.also(FieldError::invalid_value(format, "payloadFormat"));
            }
        }

        for (i, event_type) in self.event_types.iter().enumerate() {
            if !EVENT_TYPES.contains(&event_type.as_str()) {
                errs = errs.also(
                    FieldError::invalid_value(event_type, format!("[{}]", i))
                        .via_field("eventTypes"),
                );
            }
        }

        errs.into_result()
    }
}

impl Validate for Storage {
    fn validate(&self) -> Result<(), FieldError> {
        self.spec.validate().map_err(|e| e.via_field("spec"))
    }
}

impl SetDefaults for Storage {
    fn set_defaults(&mut self, defaults: &SourceDefaults) {
        let spec = &mut self.spec;
        if spec.gcs_secret.as_ref().map_or(true, SecretKeySelector::is_unset) {
            spec.gcs_secret = Some(defaults.secret.clone());
        }
        if spec
            .pubsub
            .secret
            .as_ref()
            .map_or(true, SecretKeySelector::is_unset)
        {
            spec.pubsub.secret = Some(defaults.secret.clone());
        }
        if spec.payload_format.as_deref().map_or(true, str::is_empty) {
            spec.payload_format = Some(defaults.payload_format.clone());
        }
    }
}

impl PubSubable for Storage {
    fn pubsub_spec(&self) -> &PubSubSpec {
        &self.spec.pubsub
    }

    fn pubsub_status(&self) -> Option<&PubSubStatus> {
        self.status.as_ref().map(|s| &s.pubsub)
    }

    fn pubsub_status_mut(&mut self) -> &mut PubSubStatus {
        &mut self.status.get_or_insert_with(StorageStatus::default).pubsub
    }

    fn condition_set(&self) -> &'static ConditionSet {
        &PUBSUB_CONDITION_SET
    }

    fn pull_subscription_secret(&self) -> Option<&SecretKeySelector> {
        self.spec
            .pull_subscription_secret
            .as_ref()
            .filter(|s| !s.is_unset())
            .or(self.spec.pubsub.secret.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::duck::Destination;

    fn minimal_spec() -> StorageSpec {
        StorageSpec {
            bucket: "my-test-bucket".to_string(),
            pubsub: PubSubSpec {
                sink: Destination::from_ref("foo", "bar", "qux"),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_storage_spec_from_json() {
        let json = r#"{
            "bucket": "my-bucket",
            "sink": {"ref": {"apiVersion": "v1", "kind": "Service", "name": "display"}},
            "gcsSecret": {"name": "gcs", "key": "key.json"},
            "eventTypes": ["finalize"]
        }"#;
        let spec: StorageSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.bucket, "my-bucket");
        assert_eq!(
            spec.pubsub.sink.reference.as_ref().map(|r| r.name.as_str()),
            Some("display")
        );
        assert_eq!(spec.gcs_secret, Some(SecretKeySelector::new("gcs", "key.json")));
        assert_eq!(spec.event_types, vec!["finalize"]);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_minimal_spec_is_valid() {
        assert!(minimal_spec().validate().is_ok());
    }

    #[test]
    fn test_empty_spec() {
        let err = StorageSpec::default().validate().unwrap_err();
        assert_eq!(err.to_string(), "missing field(s): bucket, sink");
    }

    #[test]
    fn test_empty_resource_is_qualified_by_spec() {
        let storage = Storage::new("s", StorageSpec::default());
        let err = storage.validate().unwrap_err();
        assert_eq!(err.to_string(), "missing field(s): spec.bucket, spec.sink");
    }

    #[test]
    fn test_pull_subscription_secret_missing_key() {
        let spec = StorageSpec {
            pull_subscription_secret: Some(SecretKeySelector::new("gcs-test-secret", "")),
            ..minimal_spec()
        };
        let err = spec.validate().unwrap_err();
        assert_eq!(err.paths(), vec!["pullSubscriptionSecret.key"]);
    }

    #[test]
    fn test_pubsub_secret_missing_name() {
        let mut spec = minimal_spec();
        spec.pubsub.secret = Some(SecretKeySelector::new("", "key.json"));
        let err = spec.validate().unwrap_err();
        assert_eq!(err.paths(), vec!["secret.name"]);
    }

    #[test]
    fn test_invalid_payload_format_and_event_types() {
        let spec = StorageSpec {
            payload_format: Some("XML".to_string()),
            event_types: vec!["finalize".to_string(), "rename".to_string()],
            ..minimal_spec()
        };
        let err = spec.validate().unwrap_err();
        assert_eq!(err.paths(), vec!["eventTypes[1]", "payloadFormat"]);
    }

    #[test]
    fn test_errors_accumulate() {
        let spec = StorageSpec {
            gcs_secret: Some(SecretKeySelector::new("", "k")),
            pull_subscription_secret: Some(SecretKeySelector::new("n", "")),
            ..Default::default()
        };
        let err = spec.validate().unwrap_err();
        assert_eq!(
            err.paths(),
            vec!["bucket", "gcsSecret.name", "pullSubscriptionSecret.key", "sink"]
        );
    }

    #[test]
    fn test_set_defaults_fills_unset_fields() {
        let mut storage = Storage::new("s", minimal_spec());
        storage.set_defaults(&SourceDefaults::default());
        assert_eq!(
            storage.spec.gcs_secret,
            Some(SecretKeySelector::new("google-cloud-key", "key.json"))
        );
        assert_eq!(storage.spec.pubsub.secret, storage.spec.gcs_secret);
        assert_eq!(storage.spec.payload_format.as_deref(), Some("JSON_API_V1"));
    }

    #[test]
    fn test_set_defaults_keeps_user_values() {
        let mut storage = Storage::new(
            "s",
            StorageSpec {
                gcs_secret: Some(SecretKeySelector::new("mine", "")),
                payload_format: Some("NONE".to_string()),
                ..minimal_spec()
            },
        );
        storage.set_defaults(&SourceDefaults::default());
        assert_eq!(storage.spec.gcs_secret, Some(SecretKeySelector::new("mine", "")));
        assert_eq!(storage.spec.payload_format.as_deref(), Some("NONE"));
        // A partial secret survives defaulting and is still rejected
        assert!(storage.validate().is_err());
    }

    #[test]
    fn test_pull_subscription_secret_falls_back_to_secret() {
        let mut storage = Storage::new("s", minimal_spec());
        storage.spec.pubsub.secret = Some(SecretKeySelector::new("shared", "key.json"));
        assert_eq!(
            storage.pull_subscription_secret().map(|s| s.name.as_str()),
            Some("shared")
        );

        storage.spec.pull_subscription_secret = Some(SecretKeySelector::new("pull", "key.json"));
        assert_eq!(
            storage.pull_subscription_secret().map(|s| s.name.as_str()),
            Some("pull")
        );
    }

    #[test]
    fn test_status_mut_creates_status() {
        let mut storage = Storage::new("s", minimal_spec());
        assert!(storage.pubsub_status().is_none());
        storage.pubsub_status_mut().topic_id = Some("t".to_string());
        assert_eq!(
            storage.pubsub_status().and_then(|s| s.topic_id.as_deref()),
            Some("t")
        );
    }
}
