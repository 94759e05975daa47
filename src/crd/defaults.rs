//! Defaulting for source specs
//!
//! Defaults come from a [`SourceDefaults`] value built from operator
//! configuration and handed to whoever applies them.

use crate::crd::duck::SecretKeySelector;

pub const DEFAULT_SECRET_NAME: &str = "google-cloud-key";
pub const DEFAULT_SECRET_KEY: &str = "key.json";
pub const DEFAULT_PAYLOAD_FORMAT: &str = "JSON_API_V1";

/// Values substituted for unset spec fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDefaults {
    /// Credential used where a source names none
    pub secret: SecretKeySelector,
    pub payload_format: String,
}

impl SourceDefaults {
    pub fn new(secret_name: &str, secret_key: &str) -> Self {
        Self {
            secret: SecretKeySelector::new(secret_name, secret_key),
            payload_format: DEFAULT_PAYLOAD_FORMAT.to_string(),
        }
    }
}

impl Default for SourceDefaults {
    fn default() -> Self {
        Self::new(DEFAULT_SECRET_NAME, DEFAULT_SECRET_KEY)
    }
}

/// Fills unset fields from `defaults`, leaving anything the user set alone.
pub trait SetDefaults {
    fn set_defaults(&mut self, defaults: &SourceDefaults);
}
