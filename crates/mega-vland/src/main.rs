//! vland - VLAN alias tool for minimega nodes
//!
//! Parses netspecs against the node's alias table, prints the table and
//! generates MACs from the vendor prefix registry.

use anyhow::Context;
use clap::{Parser, Subcommand};
use mega_common::{MegaConfig, DEFAULT_CONFIG_PATH};
use mega_vland::{network_table, LocalMesh, MegaNode};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// minimega VLAN alias tool
#[derive(Parser, Debug)]
#[command(name = "vland")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Namespace aliases are resolved in
    #[arg(short = 'n', long, default_value = "minimega")]
    namespace: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse netspecs, allocating VLANs for new aliases
    Parse {
        /// Netspecs, e.g. `br0,DMZ,00:11:22:33:44:55,e1000`
        #[arg(required = true)]
        netspecs: Vec<String>,
    },
    /// Print the alias table
    Vlans {
        /// List every namespace instead of just the current one
        #[arg(short, long)]
        all: bool,
    },
    /// Print a random MAC with a registered vendor prefix
    RandomMac,
}

/// Initializes tracing/logging subsystem
fn init_logging(log_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = MegaConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let mesh = Arc::new(LocalMesh::new(
        config.node.hostname.clone(),
        config.broadcast.channel_capacity,
    ));
    let node = MegaNode::start(config, mesh)
        .await
        .context("starting node")?;

    match args.command {
        Command::Parse { netspecs } => {
            let nets = node.parser().parse_all(&args.namespace, &netspecs[..]).await?;
            for net in &nets {
                println!("{}", serde_json::to_string(net)?);
            }
            info!(
                networks = %network_table(&args.namespace, &nets, node.allocator().as_ref()),
                "Parsed netspecs"
            );
        }
        Command::Vlans { all } => {
            let filter = (!all).then_some(args.namespace.as_str());
            print!("{}", node.vlan_info(filter));
        }
        Command::RandomMac => {
            let mac = node
                .random_mac()
                .context("MAC prefix registry is empty")?;
            println!("{mac}");
        }
    }

    node.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
