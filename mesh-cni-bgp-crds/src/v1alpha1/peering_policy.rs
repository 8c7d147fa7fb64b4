use std::collections::HashSet;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{AdvertisementType, Attributes, Family, GracefulRestart, label_selector};

pub const NAME_GROUP_PEERING_POLICY: &str = "bgppeeringpolicies.mesh-cni.dev";

pub const DEFAULT_PEER_PORT: i32 = 179;
pub const DEFAULT_EBGP_MULTIHOP_TTL: i32 = 1;
pub const DEFAULT_CONNECT_RETRY_TIME_SECONDS: i32 = 120;
pub const DEFAULT_HOLD_TIME_SECONDS: i32 = 90;
pub const DEFAULT_KEEP_ALIVE_TIME_SECONDS: i32 = 30;
pub const DEFAULT_GR_RESTART_TIME_SECONDS: i32 = 120;

/// Declares the BGP sessions and advertisements a set of nodes should run. The
/// controller derives BgpAdvertisement, BgpPeerConfig and BgpNodeConfig resources
/// from it and never writes the policy itself.
#[derive(CustomResource, Serialize, Deserialize, JsonSchema, Default, PartialEq, Clone, Debug)]
#[kube(
    group = "mesh-cni.dev",
    version = "v1alpha1",
    kind = "BgpPeeringPolicy",
    shortname = "bgpp",
    plural = "bgppeeringpolicies",
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct BgpPeeringPolicySpec {
    /// Nodes the policy applies to. An empty selector applies to every node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "label_selector")]
    pub node_selector: Option<LabelSelector>,
    pub virtual_routers: Vec<VirtualRouter>,
}

#[derive(Serialize, Deserialize, JsonSchema, Default, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VirtualRouter {
    #[serde(rename = "localASN")]
    pub local_asn: i64,
    /// Advertise the node's pod CIDR to every neighbor of this router
    #[serde(rename = "exportPodCIDR", default, skip_serializing_if = "Option::is_none")]
    pub export_pod_cidr: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "label_selector")]
    pub service_selector: Option<LabelSelector>,
    #[serde(rename = "podIPPoolSelector", default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "label_selector")]
    pub pod_ip_pool_selector: Option<LabelSelector>,
    #[serde(default)]
    pub neighbors: Vec<Neighbor>,
}

#[derive(Serialize, Deserialize, JsonSchema, Default, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Neighbor {
    /// Address of the peer in CIDR notation (/32 or /128)
    pub peer_address: String,
    #[serde(rename = "peerASN")]
    pub peer_asn: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_port: Option<i32>,
    /// Name of the Secret holding the session password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_secret_ref: Option<String>,
    #[serde(rename = "eBGPMultihopTTL", default, skip_serializing_if = "Option::is_none")]
    pub ebgp_multihop_ttl: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_retry_time_seconds: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_time_seconds: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive_time_seconds: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graceful_restart: Option<GracefulRestart>,
    #[serde(default)]
    pub families: Vec<Family>,
    #[serde(default)]
    pub advertised_path_attributes: Vec<PathAttributes>,
}

#[derive(Serialize, Deserialize, JsonSchema, PartialEq, Eq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PathAttributes {
    pub selector_type: AdvertisementType,
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl BgpPeeringPolicy {
    /// Fills every optional field the derived resources depend on.
    pub fn set_defaults(&mut self) {
        for router in &mut self.spec.virtual_routers {
            router.set_defaults();
        }
    }
}

impl VirtualRouter {
    pub fn set_defaults(&mut self) {
        self.export_pod_cidr.get_or_insert(false);
        for neighbor in &mut self.neighbors {
            neighbor.set_defaults();
        }
    }
}

impl Neighbor {
    pub fn set_defaults(&mut self) {
        self.peer_port.get_or_insert(DEFAULT_PEER_PORT);
        self.ebgp_multihop_ttl.get_or_insert(DEFAULT_EBGP_MULTIHOP_TTL);
        self.connect_retry_time_seconds
            .get_or_insert(DEFAULT_CONNECT_RETRY_TIME_SECONDS);
        self.hold_time_seconds.get_or_insert(DEFAULT_HOLD_TIME_SECONDS);
        self.keep_alive_time_seconds
            .get_or_insert(DEFAULT_KEEP_ALIVE_TIME_SECONDS);

        if let Some(gr) = self.graceful_restart.as_mut()
            && gr.enabled
        {
            gr.restart_time_seconds
                .get_or_insert(DEFAULT_GR_RESTART_TIME_SECONDS);
        }

        if self.families.is_empty() {
            self.families = vec![Family::new("ipv4", "unicast"), Family::new("ipv6", "unicast")];
        }
    }

    /// Categories that appear more than once in the advertised path attributes. Only
    /// the first entry of each is ever used.
    pub fn duplicate_attribute_types(&self) -> Vec<AdvertisementType> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for attr in &self.advertised_path_attributes {
            if !seen.insert(attr.selector_type) && !duplicates.contains(&attr.selector_type) {
                duplicates.push(attr.selector_type);
            }
        }
        duplicates
    }
}
