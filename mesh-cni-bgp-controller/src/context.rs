use std::time::Duration;

use mesh_cni_bgp_crds::v1alpha1::{
    advertisement::BgpAdvertisement, node_config::BgpNodeConfig, peer_config::BgpPeerConfig,
};
use tokio_util::sync::CancellationToken;

use crate::{Reconciler, nodes::NodeStoreMatcher, store::KubeStore};

pub(crate) type KubeReconciler = Reconciler<
    KubeStore<BgpAdvertisement>,
    KubeStore<BgpPeerConfig>,
    KubeStore<BgpNodeConfig>,
    NodeStoreMatcher,
>;

pub(crate) struct Context {
    pub reconciler: KubeReconciler,
    /// Aborts in-flight store calls on shutdown
    pub cancel: CancellationToken,
    pub requeue: Duration,
}
