use std::time::Duration;

use clap::{Parser, Subcommand};
use mesh_cni_bgp_controller::ControllerConfig;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand, Debug)]
pub enum Commands {
    /// Run the BgpPeeringPolicy controller
    Controller(ControllerArgs),
    /// Print the CRDs as YAML
    CrdGen,
}

#[derive(Parser, Debug, Clone)]
pub struct ControllerArgs {
    /// Seconds between periodic reconciles of a policy
    #[arg(long, env = "BGP_REQUEUE_SECONDS", default_value_t = 300)]
    pub requeue_seconds: u64,

    /// Seconds to wait for the reflector stores to sync on startup
    #[arg(long, env = "BGP_STORE_TIMEOUT_SECONDS", default_value_t = 30)]
    pub store_timeout_seconds: u64,
}

impl From<&ControllerArgs> for ControllerConfig {
    fn from(args: &ControllerArgs) -> Self {
        Self {
            requeue: Duration::from_secs(args.requeue_seconds),
            store_timeout: Duration::from_secs(args.store_timeout_seconds),
        }
    }
}
