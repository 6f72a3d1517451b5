mod cli;
mod cluster;
mod config;
mod error;
mod layout;
mod logs;
mod resolver;
mod resources;
mod selector;
mod session;
mod types;

use clap::Parser;
use kube::{Client, config as kubeconfig};
use tracing::{error, info};

use cli::Cli;
use config::load_configuration;
use session::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.dir.as_os_str().is_empty() {
        error!("Directory where to store logs and resources is not defined");
        std::process::exit(1);
    }

    let client = initialize_client(cli.context.as_deref()).await?;

    let configuration = load_configuration(&client, &cli.namespace, &cli.config_map).await?;
    if configuration.is_none() {
        info!("No configuration present");
        return Ok(());
    }

    let session = Session::connect(client, &cli.dir).await?;
    match session.run(configuration.as_ref()).await {
        Ok(report) => {
            info!(
                objects = report.objects_written,
                log_files = report.log_files_written,
                skipped = report.skipped,
                "Collection complete"
            );
            Ok(())
        }
        Err(errors) => {
            error!("Failed to collect data: {}", errors);
            std::process::exit(1);
        }
    }
}

async fn initialize_client(context: Option<&str>) -> anyhow::Result<Client> {
    let config = match context {
        Some(ctx) => kubeconfig::Config::from_kubeconfig(&kubeconfig::KubeConfigOptions {
            context: Some(ctx.to_string()),
            ..Default::default()
        })
        .await
        .map_err(|e| anyhow::anyhow!("Context '{}' not found in kubeconfig: {}", ctx, e))?,
        None => kubeconfig::Config::infer().await?,
    };
    let client = Client::try_from(config)?;
    match context {
        Some(ctx) => info!("Initialized client for context: {}", ctx),
        None => info!("Using current context"),
    }
    Ok(client)
}
