//! Fields shared by every PubSub-backed source kind
//!
//! Concrete sources flatten [`PubSubSpec`] into their spec and
//! [`PubSubStatus`] into their status, which is what lets the generic
//! reconciler read and write them through [`crate::duck::PubSubable`].

use crate::conditions::Condition;
use crate::field_error::FieldError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reference to an addressable object by apiVersion, kind and name
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KReference {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    /// Defaults to the namespace of the referring object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Where events are delivered: a URI, an object reference, or a reference
/// with a URI relative to it
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
pub struct Destination {
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<KReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl Destination {
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            reference: None,
            uri: Some(uri.into()),
        }
    }

    pub fn from_ref(api_version: &str, kind: &str, name: &str) -> Self {
        Self {
            reference: Some(KReference {
                api_version: api_version.to_string(),
                kind: kind.to_string(),
                name: name.to_string(),
                namespace: None,
            }),
            uri: None,
        }
    }

    fn has_uri(&self) -> bool {
        self.uri.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Problems relative to the destination itself.
    ///
    /// Neither a URI nor a reference reports the destination as missing (empty
    /// path). A partial reference without a URI reports each unset field.
    pub fn check(&self) -> FieldError {
        if self.has_uri() {
            return FieldError::default();
        }
        let Some(reference) = &self.reference else {
            return FieldError::missing_field([""]);
        };
        let missing: Vec<&str> = [
            ("apiVersion", &reference.api_version),
            ("kind", &reference.kind),
            ("name", &reference.name),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(field, _)| field)
        .collect();

        if missing.is_empty() {
            FieldError::default()
        } else {
            FieldError::missing_field(missing).via_field("ref")
        }
    }
}

/// Selects a key of a Secret in the resource's namespace
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
pub struct SecretKeySelector {
    /// Name of the secret
    #[serde(default)]
    pub name: String,
    /// Key within the secret
    #[serde(default)]
    pub key: String,
    /// Whether the secret or its key must exist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
}

impl SecretKeySelector {
    pub fn new(name: &str, key: &str) -> Self {
        Self {
            name: name.to_string(),
            key: key.to_string(),
            optional: None,
        }
    }

    /// A selector with neither name nor key counts as not given at all.
    pub fn is_unset(&self) -> bool {
        self.name.is_empty() && self.key.is_empty()
    }

    /// Reports `name` and `key` separately, relative to the selector.
    pub fn check(&self) -> FieldError {
        let missing: Vec<&str> = [("name", &self.name), ("key", &self.key)]
            .into_iter()
            .filter(|(_, value)| value.is_empty())
            .map(|(field, _)| field)
            .collect();
        if missing.is_empty() {
            FieldError::default()
        } else {
            FieldError::missing_field(missing)
        }
    }
}

/// Checks an optional selector under `field`; absent or entirely empty
/// selectors are not errors.
pub fn check_secret(selector: Option<&SecretKeySelector>, field: &str) -> FieldError {
    match selector {
        Some(s) if !s.is_unset() => s.check().via_field(field),
        _ => FieldError::default(),
    }
}

/// CloudEvent attributes added to every event the source emits
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
pub struct CloudEventOverrides {
    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
}

/// Spec fields common to every PubSub-backed source
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PubSubSpec {
    /// Where to deliver events
    #[serde(default)]
    pub sink: Destination,

    /// Credential used for the Topic and PullSubscription
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretKeySelector>,

    /// GCP project; inferred from the environment when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ce_overrides: Option<CloudEventOverrides>,
}

impl PubSubSpec {
    /// Sink and credential problems, relative to the embedding spec.
    pub fn check(&self) -> FieldError {
        self.sink
            .check()
            .via_field("sink")
            .also(check_secret(self.secret.as_ref(), "secret"))
    }
}

/// Status fields common to every PubSub-backed source
///
/// The derived identifiers serialize as `null` when unset so that a merge
/// patch clears values left over from an earlier pass.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PubSubStatus {
    /// Conditions, including the aggregate Ready
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Generation the conditions were computed for
    #[serde(default)]
    pub observed_generation: Option<i64>,

    /// Resolved address of the sink
    #[serde(default)]
    pub sink_uri: Option<String>,

    #[serde(default)]
    pub project_id: Option<String>,

    #[serde(default)]
    pub topic_id: Option<String>,

    #[serde(default)]
    pub subscription_id: Option<String>,
}
