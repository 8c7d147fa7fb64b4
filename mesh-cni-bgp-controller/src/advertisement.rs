use std::collections::BTreeMap;

use kube::ResourceExt;
use mesh_cni_bgp_crds::{
    ADVERTISEMENT_LABEL,
    v1alpha1::{
        advertisement::{Advertisement, BgpAdvertisement, BgpAdvertisementSpec},
        common::AdvertisementType,
        peering_policy::BgpPeeringPolicy,
    },
};
use mesh_cni_k8s_utils::owner_reference;

use crate::{attributes::select_attributes, keys::peer_key};

/// Advertisements wanted for every neighbor of the policy, keyed by peer key. Every
/// neighbor has an entry; an empty list means no BgpAdvertisement should exist for it.
pub fn desired_advertisements(policy: &BgpPeeringPolicy) -> BTreeMap<String, Vec<Advertisement>> {
    let policy_name = policy.name_any();
    let mut desired = BTreeMap::new();

    for router in &policy.spec.virtual_routers {
        for neighbor in &router.neighbors {
            let mut advertisements = Vec::new();

            if router.export_pod_cidr == Some(true) {
                advertisements.push(Advertisement {
                    advertisement_type: AdvertisementType::PodCidr,
                    selector: None,
                    attributes: select_attributes(neighbor, AdvertisementType::PodCidr),
                });
            }

            if let Some(selector) = &router.service_selector {
                advertisements.push(Advertisement {
                    advertisement_type: AdvertisementType::Service,
                    selector: Some(selector.clone()),
                    attributes: select_attributes(neighbor, AdvertisementType::Service),
                });
            }

            if let Some(selector) = &router.pod_ip_pool_selector {
                advertisements.push(Advertisement {
                    advertisement_type: AdvertisementType::PodIpPool,
                    selector: Some(selector.clone()),
                    attributes: select_attributes(neighbor, AdvertisementType::PodIpPool),
                });
            }

            let key = peer_key(&policy_name, router.local_asn, &neighbor.peer_address);
            desired.insert(key, advertisements);
        }
    }
    desired
}

pub fn advertisement_object(
    policy: &BgpPeeringPolicy,
    key: &str,
    advertisements: Vec<Advertisement>,
) -> BgpAdvertisement {
    let mut advert = BgpAdvertisement::new(key, BgpAdvertisementSpec { advertisements });
    advert.metadata.owner_references = Some(vec![owner_reference(policy)]);
    advert.metadata.labels = Some(BTreeMap::from([(
        ADVERTISEMENT_LABEL.to_string(),
        key.to_string(),
    )]));
    advert
}
