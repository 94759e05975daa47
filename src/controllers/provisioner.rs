//! Provisioner backed by the Kubernetes API
//!
//! Dependents are materialised as Topic and PullSubscription custom resources.
//! The controllers that own those kinds talk to Pub/Sub; this side only keeps
//! the resources in the desired shape.

use crate::crd::{PullSubscription, Topic};
use crate::error::{OperatorError, Result};
use crate::reconciler::{Provisioner, MANAGER_NAME};
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

/// Creates, updates and deletes dependents through the API server
#[derive(Clone)]
pub struct KubeProvisioner {
    client: Client,
}

impl KubeProvisioner {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// A dependent kind the provisioner knows how to keep in shape.
trait Dependent: Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned {
    /// Identity that cannot change in place, e.g. the Pub/Sub topic ID
    fn identity(&self) -> &str;

    fn same_as(&self, desired: &Self) -> bool;

    /// Takes over the desired spec and labels, keeping server-set metadata.
    fn adopt(&mut self, desired: &Self);
}

impl Dependent for Topic {
    fn identity(&self) -> &str {
        &self.spec.topic
    }

    fn same_as(&self, desired: &Self) -> bool {
        self.spec == desired.spec && self.metadata.labels == desired.metadata.labels
    }

    fn adopt(&mut self, desired: &Self) {
        self.spec = desired.spec.clone();
        self.metadata.labels = desired.metadata.labels.clone();
    }
}

impl Dependent for PullSubscription {
    fn identity(&self) -> &str {
        &self.spec.topic
    }

    fn same_as(&self, desired: &Self) -> bool {
        self.spec == desired.spec && self.metadata.labels == desired.metadata.labels
    }

    fn adopt(&mut self, desired: &Self) {
        self.spec = desired.spec.clone();
        self.metadata.labels = desired.metadata.labels.clone();
    }
}

async fn ensure<K: Dependent>(api: Api<K>, desired: &K) -> Result<K> {
    let name = desired.name_any();
    let kind = K::kind(&());
    let post = PostParams {
        field_manager: Some(MANAGER_NAME.to_string()),
        ..Default::default()
    };

    let existing = match api.get_opt(&name).await? {
        Some(existing) => existing,
        None => {
            info!(%kind, %name, "Creating dependent");
            return Ok(api.create(&post, desired).await?);
        }
    };

    if existing.meta().deletion_timestamp.is_some() {
        return Err(OperatorError::Provisioning(format!(
            "{} {} is still being deleted",
            kind, name
        )));
    }

    if existing.identity() != desired.identity() {
        info!(
            %kind,
            %name,
            from = existing.identity(),
            to = desired.identity(),
            "Dependent identity changed, recreating"
        );
        api.delete(&name, &DeleteParams::foreground()).await?;
        return Err(OperatorError::Provisioning(format!(
            "{} {} is being recreated",
            kind, name
        )));
    }

    if existing.same_as(desired) {
        debug!(%kind, %name, "Dependent up to date");
        return Ok(existing);
    }

    info!(%kind, %name, "Updating drifted dependent");
    let mut updated = existing;
    updated.adopt(desired);
    Ok(api.replace(&name, &post, &updated).await?)
}

async fn delete<K>(api: Api<K>, name: &str) -> Result<()>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            info!(kind = %K::kind(&()), %name, "Deleted dependent");
            Ok(())
        }
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn namespace_of<K: Resource>(obj: &K) -> Result<String> {
    obj.meta().namespace.clone().ok_or_else(|| {
        OperatorError::Provisioning(format!(
            "{} has no namespace",
            obj.meta().name.as_deref().unwrap_or_default()
        ))
    })
}

#[async_trait]
impl Provisioner for KubeProvisioner {
    async fn ensure_topic(&self, desired: &Topic) -> Result<Topic> {
        let api: Api<Topic> = Api::namespaced(self.client.clone(), &namespace_of(desired)?);
        ensure(api, desired).await
    }

    async fn ensure_pull_subscription(
        &self,
        desired: &PullSubscription,
    ) -> Result<PullSubscription> {
        let api: Api<PullSubscription> =
            Api::namespaced(self.client.clone(), &namespace_of(desired)?);
        ensure(api, desired).await
    }

    async fn delete_topic(&self, namespace: &str, name: &str) -> Result<()> {
        delete(Api::<Topic>::namespaced(self.client.clone(), namespace), name).await
    }

    async fn delete_pull_subscription(&self, namespace: &str, name: &str) -> Result<()> {
        delete(
            Api::<PullSubscription>::namespaced(self.client.clone(), namespace),
            name,
        )
        .await
    }
}
