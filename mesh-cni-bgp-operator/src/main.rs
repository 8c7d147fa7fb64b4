mod config;

use clap::Parser;
use config::{Cli, Commands};
use mesh_cni_bgp_controller::{ControllerConfig, start_bgp_controller};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::CrdGen => mesh_cni_bgp_crds::crd_gen_all()?,
        Commands::Controller(args) => {
            setup_subscriber();

            let client = kube::Client::try_default().await?;
            let cancel = CancellationToken::new();
            let mut controller_handle = tokio::spawn(start_bgp_controller(
                client,
                ControllerConfig::from(&args),
                cancel.child_token(),
            ));

            tokio::select! {
                h = &mut controller_handle => match h {
                    Ok(Ok(())) => info!("controller exited"),
                    Ok(Err(e)) => error!("controller failed with error: {e}"),
                    Err(e) => error!("controller task failed to complete: {e}"),
                },
                _ = shutdown_signal() => {
                    cancel.cancel();
                    if let Err(e) = controller_handle.await {
                        error!("controller exited with error: {e}");
                    }
                },
            };
            info!("Exiting...");
        }
    }
    Ok(())
}

fn setup_subscriber() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mesh_cni_bgp_operator=info,mesh_cni_bgp_controller=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };
    tokio::select! {
        _ = ctrl_c => {
            info!("captured ctrl_c signal");
        },
        _ = terminate => {},
    }
}
