use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::serde::de::DeserializeOwned;
use kube::runtime::reflector::{ReflectHandle, Store};
use kube::runtime::{WatchStreamExt, reflector, watcher};
use kube::{Api, Resource, ResourceExt};
use thiserror::Error;
use tracing::{error, trace};

const SUBSCRIBER_BUFFER: usize = 1000;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to create store: {0}")]
    StoreCreation(String),

    #[error("kube error: {0}")]
    KubeError(#[from] kube::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Starts a reflector for `api` and waits for its first full listing. The returned
/// handle can feed a shared-stream Controller.
pub async fn create_store_and_subscriber<K>(
    api: Api<K>,
    timeout: Option<Duration>,
) -> Result<(Store<K>, ReflectHandle<K>)>
where
    K: Resource + Send + Clone + Debug + DeserializeOwned + Sync + 'static,
    <K as Resource>::DynamicType: Default + Eq + Send + DeserializeOwned + Hash + Clone,
{
    let (store, writer) = reflector::store_shared(SUBSCRIBER_BUFFER);
    let subscriber: ReflectHandle<K> = writer
        .subscribe()
        .ok_or_else(|| Error::StoreCreation("failed to create subscriber".into()))?;

    let kind = K::kind(&Default::default()).to_string();
    let stream = watcher(api, watcher::Config::default().any_semantic())
        .default_backoff()
        .reflect_shared(writer)
        .for_each(move |res| {
            let kind = kind.clone();
            async move {
                match res {
                    Ok(ev) => trace!("received {} event: {:?}", kind, ev),
                    Err(e) => {
                        error!(%e, "unexpected error with {} stream", kind)
                    }
                }
            }
        });

    tokio::spawn(stream);
    let wait = store.wait_until_ready();
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| Error::StoreCreation("timed out waiting for store".into()))?
            .map_err(|e| Error::StoreCreation(e.to_string()))?,
        None => wait
            .await
            .map_err(|e| Error::StoreCreation(e.to_string()))?,
    }
    Ok((store, subscriber))
}

/// Owner reference pointing at `owner`, marked as the controlling owner so the
/// API server garbage collects dependents once the owner is gone.
pub fn owner_reference<O>(owner: &O) -> OwnerReference
where
    O: Resource<DynamicType = ()>,
{
    OwnerReference {
        api_version: O::api_version(&()).into_owned(),
        kind: O::kind(&()).into_owned(),
        name: owner.meta().name.clone().unwrap_or_default(),
        uid: owner.meta().uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Reports whether `resource` carries an owner reference to `owner`. Kind and name
/// must match; the uid is compared only when both sides have one.
pub fn is_owned_by<K, O>(resource: &K, owner: &O) -> bool
where
    K: Resource,
    O: Resource<DynamicType = ()>,
{
    let kind = O::kind(&());
    let name = owner.meta().name.as_deref().unwrap_or_default();
    let uid = owner.meta().uid.as_deref();

    resource.owner_references().iter().any(|or| {
        or.kind == kind
            && or.name == name
            && match uid {
                Some(uid) if !or.uid.is_empty() => or.uid == uid,
                _ => true,
            }
    })
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::{ConfigMap, Pod};
    use kube::api::ObjectMeta;

    use super::*;

    fn make_owner(name: &str, uid: Option<&str>) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.into()),
                uid: uid.map(Into::into),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn make_owned(owner_references: Vec<OwnerReference>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("pod-a".into()),
                owner_references: Some(owner_references),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_owner_reference_fields() {
        let owner = make_owner("owner-a", Some("uid-a"));
        let or = owner_reference(&owner);

        assert_eq!(or.api_version, "v1");
        assert_eq!(or.kind, "ConfigMap");
        assert_eq!(or.name, "owner-a");
        assert_eq!(or.uid, "uid-a");
        assert_eq!(or.controller, Some(true));
    }

    #[test]
    fn test_is_owned_by_matching_owner() {
        let owner = make_owner("owner-a", Some("uid-a"));
        let pod = make_owned(vec![owner_reference(&owner)]);

        assert!(is_owned_by(&pod, &owner));
    }

    #[test]
    fn test_is_owned_by_other_name() {
        let owner = make_owner("owner-a", Some("uid-a"));
        let other = make_owner("owner-b", Some("uid-a"));
        let pod = make_owned(vec![owner_reference(&other)]);

        assert!(!is_owned_by(&pod, &owner));
    }

    #[test]
    fn test_is_owned_by_recreated_owner() {
        let owner = make_owner("owner-a", Some("uid-a"));
        let previous = make_owner("owner-a", Some("uid-old"));
        let pod = make_owned(vec![owner_reference(&previous)]);

        assert!(!is_owned_by(&pod, &owner));
    }

    #[test]
    fn test_is_owned_by_missing_uid() {
        let owner = make_owner("owner-a", None);
        let with_uid = make_owner("owner-a", Some("uid-a"));
        let pod = make_owned(vec![owner_reference(&with_uid)]);

        assert!(is_owned_by(&pod, &owner));
    }

    #[test]
    fn test_is_owned_by_other_kind() {
        let owner = make_owner("owner-a", Some("uid-a"));
        let mut or = owner_reference(&owner);
        or.kind = "Secret".into();
        let pod = make_owned(vec![or]);

        assert!(!is_owned_by(&pod, &owner));
    }

    #[test]
    fn test_is_owned_by_without_owner_references() {
        let owner = make_owner("owner-a", Some("uid-a"));
        let pod = Pod::default();

        assert!(!is_owned_by(&pod, &owner));
    }
}
