use thiserror::Error;

pub mod v1alpha1;

use kube::CustomResourceExt;

pub const GROUP: &str = "mesh-cni.dev";

/// Label set on every BgpAdvertisement derived from a BgpPeeringPolicy. The value is
/// the peer key, and BgpPeerConfig families select their advertisements through it.
pub const ADVERTISEMENT_LABEL: &str = "bgp.mesh-cni.dev/advertise";

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("yaml error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Prints every CRD as a multi-document YAML stream.
pub fn crd_gen_all() -> Result<()> {
    let crds = vec![
        v1alpha1::peering_policy::BgpPeeringPolicy::crd(),
        v1alpha1::advertisement::BgpAdvertisement::crd(),
        v1alpha1::peer_config::BgpPeerConfig::crd(),
        v1alpha1::node_config::BgpNodeConfig::crd(),
    ];
    for crd in crds {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use kube::CustomResourceExt;

    use crate::v1alpha1::{
        advertisement::{BgpAdvertisement, NAME_GROUP_ADVERTISEMENT},
        node_config::{BgpNodeConfig, NAME_GROUP_NODE_CONFIG},
        peer_config::{BgpPeerConfig, NAME_GROUP_PEER_CONFIG},
        peering_policy::{BgpPeeringPolicy, NAME_GROUP_PEERING_POLICY},
    };

    #[test]
    fn test_crd_names() {
        assert_eq!(BgpPeeringPolicy::crd_name(), NAME_GROUP_PEERING_POLICY);
        assert_eq!(BgpAdvertisement::crd_name(), NAME_GROUP_ADVERTISEMENT);
        assert_eq!(BgpPeerConfig::crd_name(), NAME_GROUP_PEER_CONFIG);
        assert_eq!(BgpNodeConfig::crd_name(), NAME_GROUP_NODE_CONFIG);
    }

    #[test]
    fn test_crds_are_cluster_scoped() {
        for crd in [
            BgpPeeringPolicy::crd(),
            BgpAdvertisement::crd(),
            BgpPeerConfig::crd(),
            BgpNodeConfig::crd(),
        ] {
            assert_eq!(crd.spec.scope, "Cluster");
            assert_eq!(crd.spec.group, super::GROUP);
        }
    }
}
