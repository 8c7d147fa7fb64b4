use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{AdvertisementType, Attributes, label_selector};

pub const NAME_GROUP_ADVERTISEMENT: &str = "bgpadvertisements.mesh-cni.dev";

#[derive(CustomResource, Serialize, Deserialize, JsonSchema, Default, PartialEq, Clone, Debug)]
#[kube(
    group = "mesh-cni.dev",
    version = "v1alpha1",
    kind = "BgpAdvertisement",
    shortname = "bgpadvert",
    plural = "bgpadvertisements",
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct BgpAdvertisementSpec {
    pub advertisements: Vec<Advertisement>,
}

#[derive(Serialize, Deserialize, JsonSchema, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Advertisement {
    pub advertisement_type: AdvertisementType,
    /// Scopes the advertised routes. Unset for pod CIDR advertisements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "label_selector")]
    pub selector: Option<LabelSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
}
