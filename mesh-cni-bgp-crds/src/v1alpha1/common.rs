use schemars::{JsonSchema, json_schema};
use serde::{Deserialize, Serialize};

/// Category of routes announced to a peer. Neighbors tag their path attributes with
/// the category they apply to.
#[derive(Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum AdvertisementType {
    #[serde(rename = "PodCIDR")]
    PodCidr,
    Service,
    #[serde(rename = "PodIPPool")]
    PodIpPool,
}

#[derive(Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    pub afi: String,
    pub safi: String,
}

impl Family {
    pub fn new(afi: &str, safi: &str) -> Self {
        Self {
            afi: afi.into(),
            safi: safi.into(),
        }
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GracefulRestart {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_time_seconds: Option<i32>,
}

#[derive(Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Communities {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub standard: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub well_known: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub large: Vec<String>,
}

/// BGP path attributes attached to advertised routes.
#[derive(Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Attributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub communities: Option<Communities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_preference: Option<i64>,
}

// LabelSelector carries no JsonSchema impl, so selector fields point at this schema instead.
pub(crate) fn label_selector(_: &mut schemars::generate::SchemaGenerator) -> schemars::Schema {
    json_schema!({
        "type": "object",
        "properties": {
            "matchLabels": {
                "type": "object",
                "additionalProperties": { "type": "string" }
            },
            "matchExpressions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "key": { "type": "string" },
                        "operator": { "type": "string" },
                        "values": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["key", "operator"]
                }
            }
        }
    })
}
