use std::{
    collections::{BTreeMap, BTreeSet},
    future::Future,
    sync::Arc,
};

use kube::{Resource, ResourceExt};
use mesh_cni_bgp_crds::v1alpha1::{
    advertisement::BgpAdvertisement, node_config::BgpNodeConfig, peer_config::BgpPeerConfig,
    peering_policy::BgpPeeringPolicy,
};
use mesh_cni_k8s_utils::is_owned_by;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    Error, ErrorList, Result,
    advertisement::{advertisement_object, desired_advertisements},
    node_config::{desired_node_configs, node_config_object},
    nodes::NodeMatcher,
    peer_config::{desired_peer_configs, peer_config_object},
    store::{DerivedResource, PolicySource, ResourceStore, StoreError},
};

/// Derives BgpAdvertisement, BgpPeerConfig and BgpNodeConfig resources from
/// BgpPeeringPolicies and keeps the stores in line with them.
pub struct Reconciler<A, P, N, M> {
    advertisements: A,
    peer_configs: P,
    node_configs: N,
    node_matcher: M,
}

impl<A, P, N, M> Reconciler<A, P, N, M>
where
    A: ResourceStore<BgpAdvertisement>,
    P: ResourceStore<BgpPeerConfig>,
    N: ResourceStore<BgpNodeConfig>,
    M: NodeMatcher + Send + Sync,
{
    pub fn new(advertisements: A, peer_configs: P, node_configs: N, node_matcher: M) -> Self {
        Self {
            advertisements,
            peer_configs,
            node_configs,
            node_matcher,
        }
    }

    /// Reconciles every policy in `policies`. A failing policy does not stop the others;
    /// all failures are returned joined. Derived resources whose owning policy is no
    /// longer listed are deleted afterwards.
    #[instrument(skip_all)]
    pub async fn reconcile_all<S: PolicySource>(
        &self,
        policies: &S,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let policies = policies.list_policies();
        let mut errors = ErrorList::default();
        for policy in &policies {
            if errors.cancelled(cancel) {
                break;
            }
            if let Err(e) = self.reconcile_policy(policy, cancel).await {
                errors.push(e);
            }
        }

        if !errors.cancelled(cancel) {
            errors.extend(delete_orphans(&self.advertisements, &policies, cancel).await);
            errors.extend(delete_orphans(&self.peer_configs, &policies, cancel).await);
            errors.extend(delete_orphans(&self.node_configs, &policies, cancel).await);
        }
        errors.into_result()
    }

    #[instrument(skip_all, fields(policy = %policy.name_any()))]
    pub async fn reconcile_policy(
        &self,
        policy: &BgpPeeringPolicy,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut policy = policy.clone();
        policy.set_defaults();
        warn_duplicate_attributes(&policy);

        info!("Started reconciling BgpPeeringPolicy {}", policy.name_any());

        let mut errors = ErrorList::default();
        if errors.cancelled(cancel) {
            return errors.into_result();
        }
        errors.extend(self.reconcile_advertisements(&policy, cancel).await);
        if errors.cancelled(cancel) {
            return errors.into_result();
        }
        errors.extend(self.reconcile_peer_configs(&policy, cancel).await);
        if errors.cancelled(cancel) {
            return errors.into_result();
        }
        errors.extend(self.reconcile_node_configs(&policy, cancel).await);
        errors.into_result()
    }

    async fn reconcile_advertisements(
        &self,
        policy: &BgpPeeringPolicy,
        cancel: &CancellationToken,
    ) -> ErrorList {
        // a peer without advertisements is treated like an unknown peer so any
        // previous object for it is deleted
        let desired = desired_advertisements(policy)
            .into_iter()
            .filter(|(_, adverts)| !adverts.is_empty())
            .map(|(key, adverts)| {
                let object = advertisement_object(policy, &key, adverts);
                (key, object)
            })
            .collect();

        sync_owned(&self.advertisements, policy, desired, cancel).await
    }

    async fn reconcile_peer_configs(
        &self,
        policy: &BgpPeeringPolicy,
        cancel: &CancellationToken,
    ) -> ErrorList {
        let desired = desired_peer_configs(policy)
            .into_iter()
            .map(|(key, spec)| {
                let object = peer_config_object(policy, &key, spec);
                (key, object)
            })
            .collect();

        sync_owned(&self.peer_configs, policy, desired, cancel).await
    }

    async fn reconcile_node_configs(
        &self,
        policy: &BgpPeeringPolicy,
        cancel: &CancellationToken,
    ) -> ErrorList {
        let plan = match desired_node_configs(policy, &self.node_matcher) {
            Ok(plan) => plan,
            Err(e) => return ErrorList::from(e),
        };

        let mut errors = ErrorList::default();
        plan.errors.into_iter().for_each(|e| errors.push(e));

        let desired = plan
            .nodes
            .into_iter()
            .map(|(node, spec)| {
                let object = node_config_object(policy, &node, spec);
                (node, object)
            })
            .collect();

        errors.extend(sync_owned(&self.node_configs, policy, desired, cancel).await);
        errors
    }
}

fn warn_duplicate_attributes(policy: &BgpPeeringPolicy) {
    for router in &policy.spec.virtual_routers {
        for neighbor in &router.neighbors {
            for selector_type in neighbor.duplicate_attribute_types() {
                warn!(
                    "neighbor {} of BgpPeeringPolicy {} declares {:?} path attributes more than once, using the first",
                    neighbor.peer_address,
                    policy.name_any(),
                    selector_type
                );
            }
        }
    }
}

/// Upserts every object in `desired` and deletes objects owned by `policy` that are no
/// longer desired. Objects owned by anything else are never deleted.
async fn sync_owned<K, S>(
    store: &S,
    policy: &BgpPeeringPolicy,
    desired: BTreeMap<String, K>,
    cancel: &CancellationToken,
) -> ErrorList
where
    K: DerivedResource,
    S: ResourceStore<K>,
{
    let mut errors = ErrorList::default();
    let desired_names: BTreeSet<String> = desired.keys().cloned().collect();

    for object in desired.into_values() {
        if errors.cancelled(cancel) {
            return errors;
        }
        if let Err(e) = upsert(store, object, cancel).await {
            errors.push(e);
        }
    }

    for current in store.list() {
        let name = current.name_any();
        if desired_names.contains(&name) || !is_owned_by(current.as_ref(), policy) {
            continue;
        }
        if errors.cancelled(cancel) {
            return errors;
        }

        if let Err(e) = delete_object::<K, S>(store, &name, cancel).await {
            errors.push(e);
        }
    }
    errors
}

/// Deletes derived resources owned by a BgpPeeringPolicy that is not in `policies`.
async fn delete_orphans<K, S>(
    store: &S,
    policies: &[Arc<BgpPeeringPolicy>],
    cancel: &CancellationToken,
) -> ErrorList
where
    K: DerivedResource,
    S: ResourceStore<K>,
{
    let policy_kind = BgpPeeringPolicy::kind(&());
    let mut errors = ErrorList::default();

    for current in store.list() {
        let has_policy_owner = current
            .owner_references()
            .iter()
            .any(|or| or.kind == policy_kind);
        if !has_policy_owner
            || policies
                .iter()
                .any(|policy| is_owned_by(current.as_ref(), policy.as_ref()))
        {
            continue;
        }
        if errors.cancelled(cancel) {
            return errors;
        }
        if let Err(e) = delete_object::<K, S>(store, &current.name_any(), cancel).await {
            errors.push(e);
        }
    }
    errors
}

/// Deletes `name`, treating an object that is already gone as deleted.
async fn delete_object<K, S>(store: &S, name: &str, cancel: &CancellationToken) -> Result<()>
where
    K: DerivedResource,
    S: ResourceStore<K>,
{
    let kind = K::kind(&());
    info!("Deleting {} {}", kind, name);
    match cancellable(cancel, store.delete(name)).await? {
        Ok(()) => Ok(()),
        Err(StoreError::NotFound) => {
            debug!("{} {} already deleted", kind, name);
            Ok(())
        }
        Err(e) => Err(Error::store("delete", &kind, name, e)),
    }
}

/// Creates or updates `desired`, writing only when the stored spec differs or the stored
/// object has no owner. A create that loses a race against a cache that has not caught
/// up is resolved against the authoritative copy.
async fn upsert<K, S>(store: &S, desired: K, cancel: &CancellationToken) -> Result<()>
where
    K: DerivedResource,
    S: ResourceStore<K>,
{
    let kind = K::kind(&());
    let name = desired.name_any();

    if let Some(cached) = store.cached(&name) {
        let mut updated = cached.as_ref().clone();
        if !merge_into(&mut updated, &desired) {
            return Ok(());
        }
        cancellable(cancel, store.replace(&updated))
            .await?
            .map_err(|e| Error::store("update", &kind, &name, e))?;
        debug!("Updated {} {}", kind, name);
        return Ok(());
    }

    match cancellable(cancel, store.create(&desired)).await? {
        Ok(_) => {
            debug!("Created {} {}", kind, name);
            Ok(())
        }
        Err(StoreError::AlreadyExists) => {
            let mut current = cancellable(cancel, store.get(&name))
                .await?
                .map_err(|e| Error::store("get", &kind, &name, e))?;
            if !merge_into(&mut current, &desired) {
                return Ok(());
            }
            cancellable(cancel, store.replace(&current))
                .await?
                .map_err(|e| Error::store("update", &kind, &name, e))?;
            debug!("Updated {} {} after create conflict", kind, name);
            Ok(())
        }
        Err(e) => Err(Error::store("create", &kind, &name, e)),
    }
}

/// Copies the desired spec onto `current` and adopts it when it has no owner. Objects
/// owned by someone else keep their owners. Returns whether `current` changed.
fn merge_into<K: DerivedResource>(current: &mut K, desired: &K) -> bool {
    let mut changed = false;
    if current.spec() != desired.spec() {
        current.set_spec(desired.spec().clone());
        changed = true;
    }
    if current.owner_references().is_empty() && !desired.owner_references().is_empty() {
        current.meta_mut().owner_references = desired.meta().owner_references.clone();
        changed = true;
    }
    changed
}

async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        out = fut => Ok(out),
    }
}
