pub mod advertisement;
pub mod common;
pub mod node_config;
pub mod peer_config;
pub mod peering_policy;
