use std::collections::BTreeSet;

use k8s_openapi::{api::core::v1::Node, apimachinery::pkg::apis::meta::v1::LabelSelector};
use kube::{
    ResourceExt,
    core::{Selector, SelectorExt},
    runtime::reflector::Store,
};

use crate::{Error, Result};

/// Resolves a policy's node selector into node names.
pub trait NodeMatcher {
    fn matching_nodes(
        &self,
        selector: Option<&LabelSelector>,
        policy_name: &str,
    ) -> Result<BTreeSet<String>>;
}

/// Matches against the nodes cached in a reflector store. A missing selector matches
/// every node.
pub struct NodeStoreMatcher {
    nodes: Store<Node>,
}

impl NodeStoreMatcher {
    pub fn new(nodes: Store<Node>) -> Self {
        Self { nodes }
    }
}

impl NodeMatcher for NodeStoreMatcher {
    fn matching_nodes(
        &self,
        selector: Option<&LabelSelector>,
        policy_name: &str,
    ) -> Result<BTreeSet<String>> {
        let selector = selector
            .map(|s| {
                Selector::try_from(s.clone()).map_err(|e| Error::InvalidNodeSelector {
                    policy: policy_name.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        Ok(self
            .nodes
            .state()
            .iter()
            .filter(|node| {
                selector
                    .as_ref()
                    .is_none_or(|selector| selector.matches(node.labels()))
            })
            .map(|node| node.name_any())
            .collect())
    }
}
