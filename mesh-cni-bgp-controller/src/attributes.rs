use mesh_cni_bgp_crds::v1alpha1::{
    common::{AdvertisementType, Attributes},
    peering_policy::Neighbor,
};

/// Path attributes the neighbor declares for `category`. The first matching entry wins.
pub fn select_attributes(neighbor: &Neighbor, category: AdvertisementType) -> Option<Attributes> {
    neighbor
        .advertised_path_attributes
        .iter()
        .find(|attr| attr.selector_type == category)
        .map(|attr| attr.attributes.clone())
}
