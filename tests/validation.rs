use pubsub_source_operator::crd::{Destination, SecretKeySelector};
use pubsub_source_operator::{SetDefaults, SourceDefaults, Storage, StorageSpec, Validate};

fn valid_spec() -> StorageSpec {
    let mut spec = StorageSpec {
        bucket: "my-bucket".to_string(),
        ..Default::default()
    };
    spec.pubsub.sink = Destination::from_ref("serving.knative.dev/v1", "Service", "event-display");
    spec
}

#[test]
fn empty_spec_reports_bucket_and_sink() {
    let err = StorageSpec::default().validate().unwrap_err();
    assert_eq!(err.to_string(), "missing field(s): bucket, sink");
}

#[test]
fn valid_spec_passes() {
    assert!(valid_spec().validate().is_ok());
}

#[test]
fn missing_sink() {
    let mut spec = valid_spec();
    spec.pubsub.sink = Destination::default();
    let err = spec.validate().unwrap_err();
    assert_eq!(err.paths(), vec!["sink".to_string()]);
}

#[test]
fn missing_bucket() {
    let mut spec = valid_spec();
    spec.bucket.clear();
    let err = spec.validate().unwrap_err();
    assert_eq!(err.to_string(), "missing field(s): bucket");
}

#[test]
fn gcs_secret_missing_name() {
    let mut spec = valid_spec();
    spec.gcs_secret = Some(SecretKeySelector::new("", "key.json"));
    let err = spec.validate().unwrap_err();
    assert_eq!(err.paths(), vec!["gcsSecret.name".to_string()]);
}

#[test]
fn gcs_secret_missing_key() {
    let mut spec = valid_spec();
    spec.gcs_secret = Some(SecretKeySelector::new("google-cloud-key", ""));
    let err = spec.validate().unwrap_err();
    assert_eq!(err.paths(), vec!["gcsSecret.key".to_string()]);
}

#[test]
fn pull_subscription_secret_missing_key() {
    let mut spec = valid_spec();
    spec.pull_subscription_secret = Some(SecretKeySelector::new("google-cloud-key", ""));
    let err = spec.validate().unwrap_err();
    assert_eq!(err.paths(), vec!["pullSubscriptionSecret.key".to_string()]);
}

#[test]
fn errors_accumulate_across_fields() {
    let mut spec = StorageSpec::default();
    spec.gcs_secret = Some(SecretKeySelector::new("", "key.json"));
    let err = spec.validate().unwrap_err();
    assert_eq!(
        err.paths(),
        vec![
            "bucket".to_string(),
            "gcsSecret.name".to_string(),
            "sink".to_string()
        ]
    );
}

#[test]
fn resource_paths_are_prefixed() {
    let storage = Storage::new("photos", StorageSpec::default());
    let err = storage.validate().unwrap_err();
    assert_eq!(err.to_string(), "missing field(s): spec.bucket, spec.sink");
}

#[test]
fn defaulted_spec_stays_valid() {
    let mut storage = Storage::new("photos", valid_spec());
    storage.set_defaults(&SourceDefaults::default());
    assert!(storage.validate().is_ok());
    assert_eq!(
        storage.spec.gcs_secret,
        Some(SecretKeySelector::new("google-cloud-key", "key.json"))
    );
}
