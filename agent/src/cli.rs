use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "comsat-agent")]
#[command(about = "Edge agent dispatching ComSat connections to local clients", long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "agent.toml")]
    pub config: String,

    /// Override deployment mode (public or private)
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Override ComSat intake listen address
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Override local container address
    #[arg(long)]
    pub container: Option<String>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log directory
    #[arg(long)]
    pub log_dir: Option<String>,
}
