use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use k8s_openapi::api::core::v1::Node;
use kube::{
    Api, Client,
    runtime::{
        Config, Controller,
        reflector::{ObjectRef, Store},
    },
};
use mesh_cni_bgp_crds::v1alpha1::{
    advertisement::BgpAdvertisement, node_config::BgpNodeConfig, peer_config::BgpPeerConfig,
    peering_policy::BgpPeeringPolicy,
};
use mesh_cni_k8s_utils::create_store_and_subscriber;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    Reconciler, Result,
    context::Context,
    controller::{error_policy, reconcile},
    nodes::NodeStoreMatcher,
    store::KubeStore,
};

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Requeue interval after a successful reconcile
    pub requeue: Duration,
    /// How long to wait for each reflector store to become ready
    pub store_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            requeue: Duration::from_secs(300),
            store_timeout: Duration::from_secs(30),
        }
    }
}

pub async fn start_bgp_controller(
    client: Client,
    config: ControllerConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let store_timeout = Some(config.store_timeout);
    let store_init = tokio::try_join!(
        create_store_and_subscriber(
            Api::<BgpPeeringPolicy>::all(client.clone()),
            store_timeout
        ),
        create_store_and_subscriber(
            Api::<BgpAdvertisement>::all(client.clone()),
            store_timeout
        ),
        create_store_and_subscriber(Api::<BgpPeerConfig>::all(client.clone()), store_timeout),
        create_store_and_subscriber(Api::<BgpNodeConfig>::all(client.clone()), store_timeout),
        create_store_and_subscriber(Api::<Node>::all(client.clone()), store_timeout),
    )?;

    let (
        (policy_store, policy_subscriber),
        (advertisement_store, advertisement_subscriber),
        (peer_config_store, peer_config_subscriber),
        (node_config_store, node_config_subscriber),
        (node_store, node_subscriber),
    ) = store_init;

    let reconciler = Reconciler::new(
        KubeStore::new(Api::all(client.clone()), advertisement_store),
        KubeStore::new(Api::all(client.clone()), peer_config_store),
        KubeStore::new(Api::all(client), node_config_store),
        NodeStoreMatcher::new(node_store),
    );
    let context = Arc::new(Context {
        reconciler,
        cancel: cancel.clone(),
        requeue: config.requeue,
    });

    info!("running initial BgpPeeringPolicy reconciliation");
    if let Err(e) = context.reconciler.reconcile_all(&policy_store, &cancel).await {
        for cause in e.causes() {
            warn!(%cause, "initial reconciliation failed");
        }
    }

    // node configs of different policies can share a node name, so policies are
    // reconciled one at a time
    let controller_config = Config::default()
        .debounce(Duration::from_secs(1))
        .concurrency(1);
    let mapper_store = policy_store.clone();
    Controller::for_shared_stream(policy_subscriber, policy_store)
        .owns_shared_stream(advertisement_subscriber)
        .owns_shared_stream(peer_config_subscriber)
        .owns_shared_stream(node_config_subscriber)
        .watches_shared_stream(node_subscriber, move |_: Arc<Node>| {
            all_policies(&mapper_store)
        })
        .graceful_shutdown_on(shutdown(cancel))
        .with_config(controller_config)
        .run(reconcile, error_policy, context)
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

async fn shutdown(cancel: CancellationToken) {
    cancel.cancelled().await;
}

// node membership feeds every policy's node selector
fn all_policies(policies: &Store<BgpPeeringPolicy>) -> Vec<ObjectRef<BgpPeeringPolicy>> {
    policies
        .state()
        .iter()
        .map(|policy| ObjectRef::from_obj(policy.as_ref()))
        .collect()
}
