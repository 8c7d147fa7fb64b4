use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::ResourceExt;
use mesh_cni_bgp_crds::{
    ADVERTISEMENT_LABEL,
    v1alpha1::{
        peer_config::{BgpPeerConfig, BgpPeerConfigSpec, FamilyWithAdverts, Timers, Transport},
        peering_policy::BgpPeeringPolicy,
    },
};
use mesh_cni_k8s_utils::owner_reference;

use crate::keys::peer_key;

/// Session configuration for every neighbor of the policy, keyed by peer key. Expects
/// a defaulted policy.
pub fn desired_peer_configs(policy: &BgpPeeringPolicy) -> BTreeMap<String, BgpPeerConfigSpec> {
    let policy_name = policy.name_any();
    let mut desired = BTreeMap::new();

    for router in &policy.spec.virtual_routers {
        for neighbor in &router.neighbors {
            let key = peer_key(&policy_name, router.local_asn, &neighbor.peer_address);

            // every family announces the same advertisement, the one sharing this key
            let families = neighbor
                .families
                .iter()
                .map(|family| FamilyWithAdverts {
                    afi: family.afi.clone(),
                    safi: family.safi.clone(),
                    advertisements: Some(advertisement_selector(&key)),
                })
                .collect();

            let spec = BgpPeerConfigSpec {
                transport: Some(Transport {
                    peer_port: neighbor.peer_port,
                }),
                timers: Some(Timers {
                    connect_retry_time_seconds: neighbor.connect_retry_time_seconds,
                    hold_time_seconds: neighbor.hold_time_seconds,
                    keep_alive_time_seconds: neighbor.keep_alive_time_seconds,
                }),
                graceful_restart: neighbor.graceful_restart.clone(),
                auth_secret_ref: neighbor.auth_secret_ref.clone(),
                ebgp_multihop: neighbor.ebgp_multihop_ttl,
                families,
            };
            desired.insert(key, spec);
        }
    }
    desired
}

/// Selects the BgpAdvertisement labelled with `key`.
pub fn advertisement_selector(key: &str) -> LabelSelector {
    LabelSelector {
        match_labels: Some(BTreeMap::from([(
            ADVERTISEMENT_LABEL.to_string(),
            key.to_string(),
        )])),
        match_expressions: None,
    }
}

pub fn peer_config_object(
    policy: &BgpPeeringPolicy,
    key: &str,
    spec: BgpPeerConfigSpec,
) -> BgpPeerConfig {
    let mut peer_config = BgpPeerConfig::new(key, spec);
    peer_config.metadata.owner_references = Some(vec![owner_reference(policy)]);
    peer_config
}

#[cfg(test)]
mod tests {
    use kube::core::{Selector, SelectorExt};
    use mesh_cni_bgp_crds::v1alpha1::{
        common::{Family, GracefulRestart},
        peering_policy::{BgpPeeringPolicySpec, Neighbor, VirtualRouter},
    };

    use super::*;
    use crate::advertisement::advertisement_object;

    fn make_policy(neighbors: Vec<Neighbor>) -> BgpPeeringPolicy {
        let mut policy = BgpPeeringPolicy::new(
            "policy-a",
            BgpPeeringPolicySpec {
                node_selector: None,
                virtual_routers: vec![VirtualRouter {
                    local_asn: 100,
                    neighbors,
                    ..Default::default()
                }],
            },
        );
        policy.set_defaults();
        policy
    }

    #[test]
    fn test_peer_config_from_defaulted_neighbor() {
        let policy = make_policy(vec![Neighbor {
            peer_address: "10.0.0.5/32".into(),
            peer_asn: 200,
            ..Default::default()
        }]);

        let desired = desired_peer_configs(&policy);
        let spec = &desired["policy-a-100-10.0.0.5-32"];

        assert_eq!(
            spec.transport,
            Some(Transport {
                peer_port: Some(179)
            })
        );
        assert_eq!(
            spec.timers,
            Some(Timers {
                connect_retry_time_seconds: Some(120),
                hold_time_seconds: Some(90),
                keep_alive_time_seconds: Some(30),
            })
        );
        assert_eq!(spec.ebgp_multihop, Some(1));
        assert_eq!(spec.graceful_restart, None);
        assert_eq!(spec.auth_secret_ref, None);

        let families: Vec<(&str, &str)> = spec
            .families
            .iter()
            .map(|f| (f.afi.as_str(), f.safi.as_str()))
            .collect();
        assert_eq!(families, vec![("ipv4", "unicast"), ("ipv6", "unicast")]);
        assert!(spec.families.iter().all(|f| {
            f.advertisements == Some(advertisement_selector("policy-a-100-10.0.0.5-32"))
        }));
    }

    #[test]
    fn test_peer_config_copies_session_fields() {
        let policy = make_policy(vec![Neighbor {
            peer_address: "fd00::1/128".into(),
            peer_asn: 65001,
            peer_port: Some(1790),
            auth_secret_ref: Some("bgp-auth".into()),
            ebgp_multihop_ttl: Some(3),
            graceful_restart: Some(GracefulRestart {
                enabled: true,
                restart_time_seconds: Some(60),
            }),
            families: vec![Family::new("ipv6", "unicast")],
            ..Default::default()
        }]);

        let desired = desired_peer_configs(&policy);
        let spec = &desired["policy-a-100-fd00..1-128"];

        assert_eq!(spec.transport.as_ref().unwrap().peer_port, Some(1790));
        assert_eq!(spec.auth_secret_ref.as_deref(), Some("bgp-auth"));
        assert_eq!(spec.ebgp_multihop, Some(3));
        assert_eq!(
            spec.graceful_restart,
            Some(GracefulRestart {
                enabled: true,
                restart_time_seconds: Some(60),
            })
        );
        assert_eq!(spec.families.len(), 1);
    }

    #[test]
    fn test_family_selector_matches_advertisement_labels() {
        let policy = make_policy(vec![
            Neighbor {
                peer_address: "10.0.0.5/32".into(),
                peer_asn: 200,
                ..Default::default()
            },
            Neighbor {
                peer_address: "10.0.0.6/32".into(),
                peer_asn: 200,
                ..Default::default()
            },
        ]);

        let desired = desired_peer_configs(&policy);
        let spec = &desired["policy-a-100-10.0.0.5-32"];
        let selector = spec.families[0].advertisements.clone().unwrap();
        let selector = Selector::try_from(selector).unwrap();

        let own = advertisement_object(&policy, "policy-a-100-10.0.0.5-32", vec![]);
        let other = advertisement_object(&policy, "policy-a-100-10.0.0.6-32", vec![]);
        assert!(selector.matches(own.labels()));
        assert!(!selector.matches(other.labels()));
    }
}
