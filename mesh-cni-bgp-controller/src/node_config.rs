use std::collections::BTreeMap;

use kube::ResourceExt;
use mesh_cni_bgp_crds::v1alpha1::{
    node_config::{BgpNodeConfig, BgpNodeConfigSpec, NodeInstance, NodePeer},
    peering_policy::BgpPeeringPolicy,
};
use mesh_cni_k8s_utils::owner_reference;
use tracing::warn;

use crate::{
    Error, Result,
    keys::{peer_config_ref, peer_key, prefix_to_address, routing_instance_key},
    nodes::NodeMatcher,
};

/// Per-node configuration wanted by a policy.
#[derive(Debug, Default)]
pub struct NodeConfigPlan {
    /// Matched node name to its configuration. Every node gets the same spec.
    pub nodes: BTreeMap<String, BgpNodeConfigSpec>,
    /// Neighbors left out of the instances because their address did not parse.
    pub errors: Vec<Error>,
}

pub fn desired_node_configs<M: NodeMatcher>(
    policy: &BgpPeeringPolicy,
    matcher: &M,
) -> Result<NodeConfigPlan> {
    let policy_name = policy.name_any();
    let matched = matcher.matching_nodes(policy.spec.node_selector.as_ref(), &policy_name)?;

    let (bgp_instances, errors) = node_instances(policy);
    let spec = BgpNodeConfigSpec { bgp_instances };

    Ok(NodeConfigPlan {
        nodes: matched
            .into_iter()
            .map(|node| (node, spec.clone()))
            .collect(),
        errors,
    })
}

/// One instance per virtual router. Neighbors whose address is not a valid prefix are
/// skipped and reported.
pub fn node_instances(policy: &BgpPeeringPolicy) -> (Vec<NodeInstance>, Vec<Error>) {
    let policy_name = policy.name_any();
    let mut errors = Vec::new();
    let mut instances = Vec::with_capacity(policy.spec.virtual_routers.len());

    for router in &policy.spec.virtual_routers {
        let mut instance = NodeInstance {
            name: routing_instance_key(&policy_name, router.local_asn),
            local_asn: Some(router.local_asn),
            peers: Vec::with_capacity(router.neighbors.len()),
        };

        for neighbor in &router.neighbors {
            let peer_address = match prefix_to_address(&neighbor.peer_address) {
                Ok(addr) => addr,
                Err(e) => {
                    warn!(
                        "skipping neighbor {} of BgpPeeringPolicy {}: {}",
                        neighbor.peer_address, policy_name, e
                    );
                    errors.push(e);
                    continue;
                }
            };

            instance.peers.push(NodePeer {
                name: peer_key(&policy_name, router.local_asn, &neighbor.peer_address),
                peer_address: Some(peer_address.to_string()),
                peer_asn: Some(neighbor.peer_asn),
                peer_config_ref: Some(peer_config_ref(
                    &policy_name,
                    router.local_asn,
                    &neighbor.peer_address,
                )),
            });
        }
        instances.push(instance);
    }
    (instances, errors)
}

pub fn node_config_object(
    policy: &BgpPeeringPolicy,
    node: &str,
    spec: BgpNodeConfigSpec,
) -> BgpNodeConfig {
    let mut node_config = BgpNodeConfig::new(node, spec);
    node_config.metadata.owner_references = Some(vec![owner_reference(policy)]);
    node_config
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
    use mesh_cni_bgp_crds::v1alpha1::peering_policy::{
        BgpPeeringPolicySpec, Neighbor, VirtualRouter,
    };

    use super::*;

    struct FixedNodes(Vec<&'static str>);

    impl NodeMatcher for FixedNodes {
        fn matching_nodes(
            &self,
            _selector: Option<&LabelSelector>,
            _policy_name: &str,
        ) -> Result<BTreeSet<String>> {
            Ok(self.0.iter().map(|n| n.to_string()).collect())
        }
    }

    struct BrokenMatcher;

    impl NodeMatcher for BrokenMatcher {
        fn matching_nodes(
            &self,
            _selector: Option<&LabelSelector>,
            policy_name: &str,
        ) -> Result<BTreeSet<String>> {
            Err(Error::InvalidNodeSelector {
                policy: policy_name.to_string(),
                reason: "unsupported".into(),
            })
        }
    }

    fn make_neighbor(address: &str, asn: i64) -> Neighbor {
        Neighbor {
            peer_address: address.into(),
            peer_asn: asn,
            ..Default::default()
        }
    }

    fn make_policy(routers: Vec<VirtualRouter>) -> BgpPeeringPolicy {
        BgpPeeringPolicy::new(
            "policy-a",
            BgpPeeringPolicySpec {
                node_selector: None,
                virtual_routers: routers,
            },
        )
    }

    #[test]
    fn test_every_matched_node_gets_same_topology() {
        let policy = make_policy(vec![VirtualRouter {
            local_asn: 100,
            neighbors: vec![make_neighbor("10.0.0.5/32", 200)],
            ..Default::default()
        }]);

        let plan = desired_node_configs(&policy, &FixedNodes(vec!["node-a", "node-b"])).unwrap();
        assert!(plan.errors.is_empty());
        assert_eq!(
            plan.nodes.keys().cloned().collect::<Vec<_>>(),
            vec!["node-a", "node-b"]
        );
        assert_eq!(plan.nodes["node-a"], plan.nodes["node-b"]);

        let instances = &plan.nodes["node-a"].bgp_instances;
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].name, "policy-a-100");
        assert_eq!(instances[0].local_asn, Some(100));
        assert_eq!(
            instances[0].peers,
            vec![NodePeer {
                name: "policy-a-100-10.0.0.5-32".into(),
                peer_address: Some("10.0.0.5".into()),
                peer_asn: Some(200),
                peer_config_ref: Some(peer_config_ref("policy-a", 100, "10.0.0.5/32")),
            }]
        );
    }

    #[test]
    fn test_invalid_neighbor_is_skipped() {
        let policy = make_policy(vec![
            VirtualRouter {
                local_asn: 100,
                neighbors: vec![
                    make_neighbor("10.0.0.5/32", 200),
                    make_neighbor("10.0.0.300/32", 201),
                    make_neighbor("fd00::6/128", 202),
                ],
                ..Default::default()
            },
            VirtualRouter {
                local_asn: 101,
                neighbors: vec![make_neighbor("10.0.1.5/32", 300)],
                ..Default::default()
            },
        ]);

        let (instances, errors) = node_instances(&policy);
        assert_eq!(errors.len(), 1);
        assert!(
            matches!(&errors[0], Error::InvalidPeerAddress { address, .. } if address == "10.0.0.300/32")
        );

        assert_eq!(instances.len(), 2);
        let peers: Vec<&str> = instances[0]
            .peers
            .iter()
            .filter_map(|p| p.peer_address.as_deref())
            .collect();
        assert_eq!(peers, vec!["10.0.0.5", "fd00::6"]);
        assert_eq!(instances[1].peers.len(), 1);
    }

    #[test]
    fn test_router_without_neighbors_is_kept() {
        let policy = make_policy(vec![VirtualRouter {
            local_asn: 100,
            ..Default::default()
        }]);

        let (instances, errors) = node_instances(&policy);
        assert!(errors.is_empty());
        assert_eq!(instances.len(), 1);
        assert!(instances[0].peers.is_empty());
    }

    #[test]
    fn test_no_matching_nodes() {
        let policy = make_policy(vec![]);
        let plan = desired_node_configs(&policy, &FixedNodes(vec![])).unwrap();
        assert!(plan.nodes.is_empty());
    }

    #[test]
    fn test_matcher_error() {
        let policy = make_policy(vec![]);
        let err = desired_node_configs(&policy, &BrokenMatcher).unwrap_err();
        assert!(matches!(err, Error::InvalidNodeSelector { .. }));
    }
}
