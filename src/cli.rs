use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kube-snapshot")]
#[command(about = "Collect a point-in-time snapshot of Kubernetes resources and pod logs")]
pub struct Cli {
    /// Name of the ConfigMap containing the configuration
    #[arg(long = "config-map")]
    pub config_map: String,

    /// Namespace of the ConfigMap
    #[arg(short = 'n', long, env = "COLLECTOR_NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Directory where logs and resources will be stored
    #[arg(long)]
    pub dir: PathBuf,

    /// Kubeconfig context
    #[arg(long)]
    pub context: Option<String>,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
