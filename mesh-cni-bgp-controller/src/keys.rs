//! Names of derived resources. The output is used as a Kubernetes object name, so it
//! only contains lowercase alphanumerics, `-` and `.`.

use std::net::IpAddr;

use ipnetwork::{IpNetwork, IpNetworkError};
use mesh_cni_bgp_crds::{GROUP, v1alpha1::node_config::PeerConfigReference};

use crate::{Error, Result};

const PEER_CONFIG_KIND: &str = "BgpPeerConfig";

pub fn routing_instance_key(policy_name: &str, local_asn: i64) -> String {
    format!("{policy_name}-{local_asn}").to_lowercase()
}

/// Shared name of the BgpAdvertisement and BgpPeerConfig derived for one neighbor.
pub fn peer_key(policy_name: &str, local_asn: i64, peer_address: &str) -> String {
    let peer_address = peer_address.replace('/', "-").replace(':', ".");
    format!("{policy_name}-{local_asn}-{peer_address}").to_lowercase()
}

pub fn peer_config_ref(
    policy_name: &str,
    local_asn: i64,
    peer_address: &str,
) -> PeerConfigReference {
    PeerConfigReference {
        group: GROUP.into(),
        kind: PEER_CONFIG_KIND.into(),
        name: peer_key(policy_name, local_asn, peer_address),
    }
}

/// Bare address of a host prefix such as `10.0.0.5/32`.
pub fn prefix_to_address(cidr: &str) -> Result<IpAddr> {
    let invalid = |source| Error::InvalidPeerAddress {
        address: cidr.to_string(),
        source,
    };
    if !cidr.contains('/') {
        return Err(invalid(IpNetworkError::InvalidCidrFormat(format!(
            "missing prefix length in {cidr}"
        ))));
    }
    let network: IpNetwork = cidr.parse().map_err(invalid)?;
    Ok(network.ip())
}
