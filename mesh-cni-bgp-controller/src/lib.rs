pub mod advertisement;
pub mod attributes;
mod context;
mod controller;
mod error;
pub mod keys;
pub mod node_config;
pub mod nodes;
pub mod peer_config;
pub mod reconciler;
mod runtime;
pub mod store;

pub use error::{Error, ErrorList};
pub use reconciler::Reconciler;
pub use runtime::{ControllerConfig, start_bgp_controller};

pub type Result<T, E = Error> = std::result::Result<T, E>;
