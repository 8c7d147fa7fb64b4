use std::{fmt::Debug, future::Future, sync::Arc};

use kube::{
    Api, Resource, ResourceExt,
    api::{DeleteParams, PostParams},
    runtime::reflector::{ObjectRef, Store},
};
use mesh_cni_bgp_crds::v1alpha1::{
    advertisement::{BgpAdvertisement, BgpAdvertisementSpec},
    node_config::{BgpNodeConfig, BgpNodeConfigSpec},
    peer_config::{BgpPeerConfig, BgpPeerConfigSpec},
    peering_policy::BgpPeeringPolicy,
};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("resource already exists")]
    AlreadyExists,

    #[error("resource not found")]
    NotFound,

    #[error("kube error: {0}")]
    Kube(kube::Error),
}

impl From<kube::Error> for StoreError {
    fn from(err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
                Self::AlreadyExists
            }
            kube::Error::Api(resp) if resp.code == 404 => Self::NotFound,
            _ => Self::Kube(err),
        }
    }
}

/// Access to one kind of derived resource. `cached` and `list` read the local snapshot,
/// which may lag the API server; the async methods go to the authoritative copy.
pub trait ResourceStore<K>: Send + Sync {
    fn cached(&self, name: &str) -> Option<Arc<K>>;

    fn list(&self) -> Vec<Arc<K>>;

    fn get(&self, name: &str) -> impl Future<Output = Result<K, StoreError>> + Send;

    /// Fails with [`StoreError::AlreadyExists`] when the name is taken.
    fn create(&self, object: &K) -> impl Future<Output = Result<K, StoreError>> + Send;

    fn replace(&self, object: &K) -> impl Future<Output = Result<K, StoreError>> + Send;

    /// Fails with [`StoreError::NotFound`] when the object is already gone.
    fn delete(&self, name: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// A resource whose spec is computed from a BgpPeeringPolicy. Only the spec is managed;
/// metadata written by others is left alone on update.
pub trait DerivedResource:
    Resource<DynamicType = ()> + Clone + Debug + Send + Sync + 'static
{
    type Spec: PartialEq + Clone + Debug + Send + Sync;

    fn spec(&self) -> &Self::Spec;

    fn set_spec(&mut self, spec: Self::Spec);
}

impl DerivedResource for BgpAdvertisement {
    type Spec = BgpAdvertisementSpec;

    fn spec(&self) -> &Self::Spec {
        &self.spec
    }

    fn set_spec(&mut self, spec: Self::Spec) {
        self.spec = spec;
    }
}

impl DerivedResource for BgpPeerConfig {
    type Spec = BgpPeerConfigSpec;

    fn spec(&self) -> &Self::Spec {
        &self.spec
    }

    fn set_spec(&mut self, spec: Self::Spec) {
        self.spec = spec;
    }
}

impl DerivedResource for BgpNodeConfig {
    type Spec = BgpNodeConfigSpec;

    fn spec(&self) -> &Self::Spec {
        &self.spec
    }

    fn set_spec(&mut self, spec: Self::Spec) {
        self.spec = spec;
    }
}

/// Cluster-scoped resources backed by the API server with a reflector cache.
pub struct KubeStore<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    api: Api<K>,
    cache: Store<K>,
}

impl<K> KubeStore<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    pub fn new(api: Api<K>, cache: Store<K>) -> Self {
        Self { api, cache }
    }
}

impl<K> ResourceStore<K> for KubeStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned,
    K: Send + Sync + 'static,
{
    fn cached(&self, name: &str) -> Option<Arc<K>> {
        self.cache.get(&ObjectRef::new(name))
    }

    fn list(&self) -> Vec<Arc<K>> {
        self.cache.state()
    }

    async fn get(&self, name: &str) -> Result<K, StoreError> {
        Ok(self.api.get(name).await?)
    }

    async fn create(&self, object: &K) -> Result<K, StoreError> {
        Ok(self.api.create(&PostParams::default(), object).await?)
    }

    async fn replace(&self, object: &K) -> Result<K, StoreError> {
        Ok(self
            .api
            .replace(&object.name_any(), &PostParams::default(), object)
            .await?)
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }
}

/// Supplies the policies to reconcile in a pass.
pub trait PolicySource {
    fn list_policies(&self) -> Vec<Arc<BgpPeeringPolicy>>;
}

impl PolicySource for Store<BgpPeeringPolicy> {
    fn list_policies(&self) -> Vec<Arc<BgpPeeringPolicy>> {
        self.state()
    }
}
